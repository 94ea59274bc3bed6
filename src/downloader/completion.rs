//! Completion handling: terminal status → relocation → `complete` / `failed`.
//!
//! Reached from the gateway's "transfer finished" signal and from a task's own progress
//! monitor. Handling is claimed per handle, so whichever path arrives second (or any
//! signal after cancel/acknowledge) finds nothing to do. A cancel that lands while the
//! file is being moved wins as well: the terminal event is only emitted for a task that
//! is still tracked.

use crate::error::{ErrorCode, TaskFailure};
use crate::gateway::reason::{COULD_NOT_FIND, failure_for};
use crate::gateway::{GatewayStatus, TransferStatus};
use crate::types::{DownloadHandle, Event, TaskConfig};

use super::BackgroundDownloader;

impl BackgroundDownloader {
    /// React to a finished transfer
    ///
    /// `observed` is used when it is terminal; otherwise the gateway is queried. Returns
    /// false only while the transfer is still in flight, true once there is nothing left
    /// to do for `handle`.
    pub(crate) async fn handle_completion(
        &self,
        handle: DownloadHandle,
        observed: Option<TransferStatus>,
    ) -> bool {
        let reported_begin = {
            let maps = self.maps.lock().await;
            match maps.configs.get(&handle) {
                Some(config) => config.reported_begin,
                None => {
                    tracing::debug!(handle = handle.0, "Completion for untracked handle ignored");
                    return true;
                }
            }
        };
        if !reported_begin {
            // the pipeline is still probing; its monitor observes the terminal status later
            tracing::debug!(handle = handle.0, "Completion deferred until begin is reported");
            return false;
        }

        let status = match observed.filter(|s| s.status.is_terminal()) {
            Some(status) => status,
            None => match self.gateway.query(handle).await {
                Ok(Some(status)) => status,
                Ok(None) => {
                    self.fail_task(
                        handle,
                        TaskFailure::new(ErrorCode::FileNotFound, COULD_NOT_FIND),
                    )
                    .await;
                    return true;
                }
                Err(e) => {
                    self.fail_task(handle, TaskFailure::from(&e)).await;
                    return true;
                }
            },
        };

        match status.status {
            GatewayStatus::Successful => self.complete_task(handle, status).await,
            GatewayStatus::Failed => self.fail_task(handle, failure_for(status.reason)).await,
            GatewayStatus::Pending | GatewayStatus::Running | GatewayStatus::Paused => {
                return false;
            }
        }
        true
    }

    /// Take ownership of the terminal handling of `handle`
    ///
    /// Stops the task's pipeline and drops its unsent progress before returning, so no
    /// progress event follows the terminal event.
    async fn claim(&self, handle: DownloadHandle) -> Option<TaskConfig> {
        let (config, cancel) = {
            let mut maps = self.maps.lock().await;
            let config = maps.configs.get(&handle)?.clone();
            if !maps.completing.insert(handle) {
                return None;
            }
            let cancel = maps.pipelines.get(&handle).map(|entry| entry.cancel.clone());
            (config, cancel)
        };

        let mut throttle = self.lock_throttle();
        if let Some(cancel) = cancel {
            cancel.cancel();
        }
        throttle.forget(&config.id);
        Some(config)
    }

    /// Untrack a finished task and announce it, in one critical section
    ///
    /// Returns false, emitting nothing, when the task was cancelled or acknowledged while
    /// its terminal handling ran.
    async fn finish(&self, handle: DownloadHandle, event: Event) -> bool {
        let mut maps = self.maps.lock().await;
        let Some(config) = maps.untrack(handle) else {
            tracing::debug!(handle = handle.0, "Task untracked during completion, event dropped");
            return false;
        };
        if let Err(e) = self.db.remove_task(handle).await {
            tracing::error!(task_id = %config.id, error = %e, "Failed to remove task from store");
        }
        self.emit_event(event);
        true
    }

    async fn complete_task(&self, handle: DownloadHandle, status: TransferStatus) {
        let Some(config) = self.claim(handle).await else {
            return;
        };

        let moved = match status.local_path {
            Some(source) => self
                .mover
                .relocate(source, config.destination.clone())
                .await
                .map_err(|e| TaskFailure::new(ErrorCode::Unknown, e.to_string())),
            None => Err(TaskFailure::new(
                ErrorCode::Unknown,
                "gateway reported success without a local file",
            )),
        };

        match moved {
            Ok(()) => {
                let bytes_downloaded = status.bytes_downloaded.max(0) as u64;
                let bytes_total = status.bytes_total.max(0) as u64;
                let event = Event::Complete {
                    id: config.id.clone(),
                    location: config.destination.clone(),
                    bytes_downloaded,
                    bytes_total,
                };
                if self.finish(handle, event).await {
                    tracing::info!(
                        task_id = %config.id,
                        location = %config.destination.display(),
                        bytes_downloaded,
                        "Task completed"
                    );
                }
            }
            Err(failure) => self.finish_failed(handle, config, failure).await,
        }
    }

    /// Report `handle` as failed and stop tracking it
    pub(crate) async fn fail_task(&self, handle: DownloadHandle, failure: TaskFailure) {
        let Some(config) = self.claim(handle).await else {
            return;
        };
        self.finish_failed(handle, config, failure).await;
    }

    async fn finish_failed(&self, handle: DownloadHandle, config: TaskConfig, failure: TaskFailure) {
        let event = Event::Failed {
            id: config.id.clone(),
            error_code: failure.code,
            error_message: failure.message.clone(),
        };
        if self.finish(handle, event).await {
            tracing::warn!(
                task_id = %config.id,
                error_code = %failure.code,
                error = %failure.message,
                "Task failed"
            );
        }
    }
}
