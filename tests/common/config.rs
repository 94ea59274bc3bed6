//! Test configuration helpers for creating downloaders over a shared store

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use background_dl::config::PollingConfig;
use background_dl::gateway::MemoryGateway;
use background_dl::{BackgroundDownloader, Config};

/// Config with a store under `dir`, fast polling and an immediate flush interval
pub fn fast_config(dir: &Path) -> Config {
    let mut config = Config::default();
    config.persistence.database_path = dir.join("tasks.db");
    config.progress.interval = Duration::from_millis(1);
    config.polling = PollingConfig {
        active_interval: Duration::from_millis(5),
        stalled_interval: Duration::from_millis(5),
        stall_threshold: 4,
        pending_interval: Duration::from_millis(5),
        paused_interval: Duration::from_millis(5),
    };
    config
}

/// Start a downloader over `gateway` with its store under `dir`
///
/// Calling this twice with the same `dir` simulates a process restart.
pub async fn start(dir: &Path, gateway: &Arc<MemoryGateway>) -> BackgroundDownloader {
    BackgroundDownloader::new(fast_config(dir), gateway.clone())
        .await
        .expect("Failed to create downloader")
}
