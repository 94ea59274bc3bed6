//! Background service starters: gateway completion-signal listener.

use tokio::sync::broadcast::error::RecvError;

use super::BackgroundDownloader;

impl BackgroundDownloader {
    /// Route the gateway's "transfer finished" signals to the completion handler
    ///
    /// Returns `None` when the gateway offers no signal; monitors still observe every
    /// terminal status by polling.
    pub(crate) fn start_completion_listener(&self) -> Option<tokio::task::JoinHandle<()>> {
        let Some(mut finished) = self.gateway.subscribe_finished() else {
            tracing::info!("Gateway has no completion signal, relying on polling");
            return None;
        };

        let downloader = self.clone();
        let cancel = self.services_cancel.clone();
        let handle = tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    received = finished.recv() => match received {
                        Ok(handle) => {
                            tracing::debug!(handle = handle.0, "Transfer finished signal");
                            downloader.handle_completion(handle, None).await;
                        }
                        Err(RecvError::Lagged(missed)) => {
                            tracing::warn!(missed, "Completion listener lagged, relying on polling");
                        }
                        Err(RecvError::Closed) => break,
                    },
                }
            }
            tracing::debug!("Completion listener stopped");
        });

        tracing::info!("Completion listener started");
        Some(handle)
    }
}
