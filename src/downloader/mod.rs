//! Task orchestrator split into focused submodules.
//!
//! The `BackgroundDownloader` struct and its methods are organized by domain:
//! - [`submit`] - Validating and enqueueing new tasks
//! - [`control`] - Cancel and acknowledge
//! - [`listing`] - Active task snapshots and adoption of known handles
//! - [`pipeline`] - Begin probe + progress monitor per task, resume on start
//! - [`completion`] - Terminal status handling and file relocation
//! - [`settings`] - Runtime progress settings
//! - [`lifecycle`] - Graceful shutdown
//! - [`services`] - Gateway completion-signal listener

mod completion;
mod control;
mod lifecycle;
mod listing;
mod pipeline;
mod services;
mod settings;
mod submit;

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
pub(crate) mod test_helpers;
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests;

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::config::Config;
use crate::db::Database;
use crate::error::Result;
use crate::gateway::DownloadGateway;
use crate::probe::BeginProbe;
use crate::redirect::RedirectResolver;
use crate::relocate::FileMover;
use crate::throttle::ProgressThrottle;
use crate::types::{DownloadHandle, Event, TaskConfig, TaskId};

/// Running begin+progress pipeline of one task
pub(crate) struct PipelineEntry {
    /// Stops the pipeline at its next check
    pub(crate) cancel: CancellationToken,
    /// Taken by shutdown to wait for the pipeline to exit
    pub(crate) task: Option<JoinHandle<()>>,
}

/// In-memory task maps, guarded by one lock together with store writes
#[derive(Default)]
pub(crate) struct TaskMaps {
    pub(crate) configs: HashMap<DownloadHandle, TaskConfig>,
    pub(crate) handles: HashMap<TaskId, DownloadHandle>,
    pub(crate) pipelines: HashMap<DownloadHandle, PipelineEntry>,
    /// Handles whose terminal status is being handled right now
    pub(crate) completing: HashSet<DownloadHandle>,
}

impl TaskMaps {
    pub(crate) fn track(&mut self, handle: DownloadHandle, config: TaskConfig) {
        self.handles.insert(config.id.clone(), handle);
        self.configs.insert(handle, config);
    }

    /// Drop every trace of `handle`, stopping its pipeline
    pub(crate) fn untrack(&mut self, handle: DownloadHandle) -> Option<TaskConfig> {
        if let Some(entry) = self.pipelines.remove(&handle) {
            entry.cancel.cancel();
        }
        self.completing.remove(&handle);
        let config = self.configs.remove(&handle)?;
        self.handles.remove(&config.id);
        Some(config)
    }
}

/// Task orchestrator (cloneable - all fields are Arc-wrapped)
#[derive(Clone)]
pub struct BackgroundDownloader {
    /// Task store
    /// Public for integration tests to inspect persisted tasks
    pub db: Arc<Database>,
    /// Event broadcast channel sender (multiple subscribers supported)
    pub(crate) event_tx: tokio::sync::broadcast::Sender<Event>,
    pub(crate) config: Arc<Config>,
    pub(crate) gateway: Arc<dyn DownloadGateway>,
    /// Shared progress batch; a std mutex because the progress callback is synchronous
    pub(crate) throttle: Arc<std::sync::Mutex<ProgressThrottle>>,
    pub(crate) maps: Arc<tokio::sync::Mutex<TaskMaps>>,
    pub(crate) resolver: RedirectResolver,
    pub(crate) probe: BeginProbe,
    pub(crate) mover: FileMover,
    /// Set to false during shutdown
    pub(crate) accepting_new: Arc<AtomicBool>,
    /// Stops background services on shutdown
    pub(crate) services_cancel: CancellationToken,
    unclean_shutdown: bool,
}

impl BackgroundDownloader {
    /// Create a new BackgroundDownloader over `gateway`
    ///
    /// This:
    /// - Opens/creates the SQLite task store and runs migrations
    /// - Applies persisted progress settings over the configured defaults
    /// - Starts listening for the gateway's "transfer finished" signal
    /// - Resumes every stored task (the begin probe is skipped when already reported)
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use std::sync::Arc;
    /// use background_dl::{BackgroundDownloader, Config, DownloadOptions, DownloadRequest};
    /// use background_dl::gateway::MemoryGateway;
    ///
    /// #[tokio::main]
    /// async fn main() -> Result<(), Box<dyn std::error::Error>> {
    ///     let downloader =
    ///         BackgroundDownloader::new(Config::default(), Arc::new(MemoryGateway::new())).await?;
    ///
    ///     let mut events = downloader.subscribe();
    ///     tokio::spawn(async move {
    ///         while let Ok(event) = events.recv().await {
    ///             println!("Event: {:?}", event);
    ///         }
    ///     });
    ///
    ///     downloader
    ///         .submit(
    ///             DownloadRequest::new("a", "http://example.com/file.bin", "/data/file.bin"),
    ///             DownloadOptions::default(),
    ///         )
    ///         .await?;
    ///     Ok(())
    /// }
    /// ```
    pub async fn new(config: Config, gateway: Arc<dyn DownloadGateway>) -> Result<Self> {
        config.validate()?;

        let db = Database::new(
            &config.persistence.database_path,
            &config.persistence.namespace,
        )
        .await?;

        let unclean_shutdown = db.was_unclean_shutdown().await?;
        if unclean_shutdown {
            tracing::warn!("Previous session did not shut down cleanly");
        }
        db.set_clean_start().await?;

        // persisted settings win over configured defaults when positive
        let interval = db
            .get_progress_interval()
            .await?
            .filter(|interval| !interval.is_zero())
            .unwrap_or(config.progress.interval);
        let min_bytes = db
            .get_progress_min_bytes()
            .await?
            .filter(|bytes| *bytes > 0)
            .unwrap_or(config.progress.min_bytes);
        let throttle = ProgressThrottle::new(interval, min_bytes, config.progress.percent_threshold);

        let (event_tx, _rx) = tokio::sync::broadcast::channel(config.event_buffer);

        let downloader = Self {
            db: Arc::new(db),
            event_tx,
            resolver: RedirectResolver::new(&config.network)?,
            probe: BeginProbe::new(&config.network)?,
            config: Arc::new(config),
            gateway,
            throttle: Arc::new(std::sync::Mutex::new(throttle)),
            maps: Arc::new(tokio::sync::Mutex::new(TaskMaps::default())),
            mover: FileMover::spawn(),
            accepting_new: Arc::new(AtomicBool::new(true)),
            services_cancel: CancellationToken::new(),
            unclean_shutdown,
        };

        downloader.start_completion_listener();
        downloader.restore_tasks().await?;

        Ok(downloader)
    }

    /// Subscribe to task events
    ///
    /// Multiple subscribers are supported. Each subscriber receives all events independently.
    /// A subscriber that falls behind by more than `event_buffer` events receives
    /// `RecvError::Lagged`.
    pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<Event> {
        self.event_tx.subscribe()
    }

    /// Get the current configuration
    pub fn get_config(&self) -> Arc<Config> {
        Arc::clone(&self.config)
    }

    /// Whether the previous session ended without `shutdown()`
    pub fn was_unclean_shutdown(&self) -> bool {
        self.unclean_shutdown
    }

    /// Emit an event to all subscribers
    ///
    /// With no subscribers the event is dropped.
    pub(crate) fn emit_event(&self, event: Event) {
        self.event_tx.send(event).ok();
    }

    pub(crate) fn lock_throttle(&self) -> std::sync::MutexGuard<'_, ProgressThrottle> {
        self.throttle
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
