//! Configuration types for background-dl

use serde::{Deserialize, Serialize};
use std::{path::PathBuf, time::Duration};

/// Main configuration for [`BackgroundDownloader`](crate::BackgroundDownloader)
///
/// Every field has a default, so `Config::default()` is a working configuration and a
/// partial JSON document deserializes into a complete one.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Config {
    /// Progress throttling settings
    #[serde(default)]
    pub progress: ProgressConfig,

    /// Progress Monitor polling cadence
    #[serde(default)]
    pub polling: PollingConfig,

    /// HTTP settings for redirect resolution, the begin probe, and gateway requests
    #[serde(default)]
    pub network: NetworkConfig,

    /// Task store location
    #[serde(default)]
    pub persistence: PersistenceConfig,

    /// Capacity of the broadcast event channel (default: 1000)
    #[serde(default = "default_event_buffer")]
    pub event_buffer: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            progress: ProgressConfig::default(),
            polling: PollingConfig::default(),
            network: NetworkConfig::default(),
            persistence: PersistenceConfig::default(),
            event_buffer: default_event_buffer(),
        }
    }
}

impl Config {
    /// Check settings that would make the engine misbehave rather than merely run slowly
    pub fn validate(&self) -> crate::Result<()> {
        if self.persistence.namespace.trim().is_empty() {
            return Err(crate::Error::Config {
                message: "namespace must not be empty".to_string(),
                key: Some("persistence.namespace".to_string()),
            });
        }
        if self.event_buffer == 0 {
            return Err(crate::Error::Config {
                message: "event buffer capacity must be at least 1".to_string(),
                key: Some("event_buffer".to_string()),
            });
        }
        if !(0.0..1.0).contains(&self.progress.percent_threshold) {
            return Err(crate::Error::Config {
                message: format!(
                    "percent threshold must be in [0, 1), got {}",
                    self.progress.percent_threshold
                ),
                key: Some("progress.percent_threshold".to_string()),
            });
        }
        Ok(())
    }
}

/// Progress throttle configuration
///
/// `interval` and `min_bytes` are the initial values of the two runtime settings
/// persisted in the task store; stored values take precedence on start.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ProgressConfig {
    /// Minimum time between two progress flushes (default: 1000 ms)
    #[serde(default = "default_progress_interval", with = "duration_ms_serde")]
    pub interval: Duration,

    /// Byte delta that batches a sample regardless of percent (default: 1 MiB, 0 disables)
    #[serde(default = "default_progress_min_bytes")]
    pub min_bytes: u64,

    /// Fractional delta that batches a sample (default: 0.01)
    #[serde(default = "default_percent_threshold")]
    pub percent_threshold: f64,
}

impl Default for ProgressConfig {
    fn default() -> Self {
        Self {
            interval: default_progress_interval(),
            min_bytes: default_progress_min_bytes(),
            percent_threshold: default_percent_threshold(),
        }
    }
}

/// Polling cadence of the Progress Monitor, per observed state
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PollingConfig {
    /// Sleep after a tick that saw an active transfer (default: 250 ms)
    #[serde(default = "default_active_interval", with = "duration_ms_serde")]
    pub active_interval: Duration,

    /// Sleep once an active transfer has stopped moving (default: 500 ms)
    #[serde(default = "default_stalled_interval", with = "duration_ms_serde")]
    pub stalled_interval: Duration,

    /// Polls without byte progress before an active transfer counts as stalled (default: 4)
    #[serde(default = "default_stall_threshold")]
    pub stall_threshold: u32,

    /// Sleep while the gateway has the transfer queued (default: 1 s)
    #[serde(default = "default_pending_interval", with = "duration_ms_serde")]
    pub pending_interval: Duration,

    /// Sleep while the transfer is paused (default: 2 s)
    #[serde(default = "default_paused_interval", with = "duration_ms_serde")]
    pub paused_interval: Duration,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            active_interval: default_active_interval(),
            stalled_interval: default_stalled_interval(),
            stall_threshold: default_stall_threshold(),
            pending_interval: default_pending_interval(),
            paused_interval: default_paused_interval(),
        }
    }
}

/// HTTP behaviour shared by the redirect resolver, the begin probe and gateway requests
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct NetworkConfig {
    /// User-Agent sent when the caller did not supply one
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Value of the `Keep-Alive` request header (default: "timeout=600, max=1000")
    #[serde(default = "default_keep_alive")]
    pub keep_alive: String,

    /// Timeout of one redirect hop (default: 10 seconds)
    #[serde(default = "default_redirect_timeout", with = "duration_serde")]
    pub redirect_timeout: Duration,

    /// Connect timeout of the begin probe (default: 30 seconds)
    #[serde(default = "default_probe_connect_timeout", with = "duration_serde")]
    pub probe_connect_timeout: Duration,

    /// Overall timeout of the begin probe (default: 60 seconds)
    #[serde(default = "default_probe_read_timeout", with = "duration_serde")]
    pub probe_read_timeout: Duration,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            user_agent: default_user_agent(),
            keep_alive: default_keep_alive(),
            redirect_timeout: default_redirect_timeout(),
            probe_connect_timeout: default_probe_connect_timeout(),
            probe_read_timeout: default_probe_read_timeout(),
        }
    }
}

/// Task store configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PersistenceConfig {
    /// Database path (default: "./background-dl.db")
    #[serde(default = "default_database_path")]
    pub database_path: PathBuf,

    /// Key space for tasks and settings, so several engines can share one file
    #[serde(default = "default_namespace")]
    pub namespace: String,
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            namespace: default_namespace(),
        }
    }
}

fn default_event_buffer() -> usize {
    1000
}

fn default_progress_interval() -> Duration {
    Duration::from_millis(1000)
}

fn default_progress_min_bytes() -> u64 {
    1024 * 1024
}

fn default_percent_threshold() -> f64 {
    0.01
}

fn default_active_interval() -> Duration {
    Duration::from_millis(250)
}

fn default_stalled_interval() -> Duration {
    Duration::from_millis(500)
}

fn default_stall_threshold() -> u32 {
    4
}

fn default_pending_interval() -> Duration {
    Duration::from_secs(1)
}

fn default_paused_interval() -> Duration {
    Duration::from_secs(2)
}

fn default_user_agent() -> String {
    format!("background-dl/{}", env!("CARGO_PKG_VERSION"))
}

fn default_keep_alive() -> String {
    "timeout=600, max=1000".to_string()
}

fn default_redirect_timeout() -> Duration {
    Duration::from_secs(10)
}

fn default_probe_connect_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_probe_read_timeout() -> Duration {
    Duration::from_secs(60)
}

fn default_database_path() -> PathBuf {
    PathBuf::from("./background-dl.db")
}

fn default_namespace() -> String {
    "background-dl".to_string()
}

// Duration serialization helper (whole seconds)
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_secs())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}

// Duration serialization helper (milliseconds)
mod duration_ms_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_millis() as u64)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let ms = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(ms))
    }
}
