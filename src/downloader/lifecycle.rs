//! Shutdown coordination.

use std::time::Duration;

use crate::error::Result;
use crate::types::Event;

use super::BackgroundDownloader;

/// Upper bound on waiting for pipelines to exit
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(30);

impl BackgroundDownloader {
    /// Gracefully shut down the downloader
    ///
    /// This method performs a graceful shutdown sequence:
    /// 1. Stops accepting new submissions
    /// 2. Stops the completion listener and every pipeline
    /// 3. Waits for pipelines to exit with a timeout (30 seconds)
    /// 4. Marks a clean shutdown in the store
    /// 5. Emits [`Event::Shutdown`]
    ///
    /// Tasks stay in the store and their transfers keep running in the gateway; the next
    /// `BackgroundDownloader::new` resumes them.
    pub async fn shutdown(&self) -> Result<()> {
        tracing::info!("Initiating graceful shutdown");

        self.accepting_new
            .store(false, std::sync::atomic::Ordering::SeqCst);
        self.services_cancel.cancel();

        let pipelines: Vec<_> = {
            let mut maps = self.maps.lock().await;
            tracing::debug!(active_count = maps.pipelines.len(), "Stopping pipelines");
            maps.pipelines
                .values_mut()
                .filter_map(|entry| {
                    entry.cancel.cancel();
                    entry.task.take()
                })
                .collect()
        };

        match tokio::time::timeout(SHUTDOWN_TIMEOUT, futures::future::join_all(pipelines)).await {
            Ok(results) => {
                for result in results {
                    if let Err(e) = result {
                        tracing::warn!(error = %e, "Pipeline task ended abnormally");
                    }
                }
                tracing::info!("All pipelines stopped");
            }
            Err(_) => {
                tracing::warn!("Timeout waiting for pipelines to stop, proceeding with shutdown");
            }
        }

        if let Err(e) = self.db.set_clean_shutdown().await {
            tracing::error!(error = %e, "Failed to mark clean shutdown in database");
        } else {
            tracing::info!("Marked clean shutdown in database");
        }

        self.emit_event(Event::Shutdown);
        tracing::info!("Graceful shutdown complete");
        Ok(())
    }
}
