//! Per-task begin+progress pipeline and resume on start.
//!
//! One pipeline runs per tracked task: the begin probe (once per task lifetime), then
//! the progress monitor until a terminal status, a lost handle, or a stop.

use std::collections::HashMap;
use std::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::error::{ErrorCode, Result, TaskFailure};
use crate::gateway::reason::COULD_NOT_FIND;
use crate::http::request_headers;
use crate::monitor::{MonitorOutcome, ProgressMonitor};
use crate::probe::ProbeResult;
use crate::types::{DownloadHandle, Event, TaskConfig, TaskId};

use super::{BackgroundDownloader, PipelineEntry, TaskMaps};

impl BackgroundDownloader {
    /// Start the pipeline for a task that was just tracked in `maps`
    pub(crate) fn spawn_pipeline(
        &self,
        maps: &mut TaskMaps,
        handle: DownloadHandle,
        config: TaskConfig,
        headers: Vec<(String, String)>,
    ) {
        let cancel = CancellationToken::new();
        let downloader = self.clone();
        let token = cancel.clone();
        let task = tokio::spawn(async move {
            downloader.run_pipeline(handle, config, headers, token).await;
        });
        maps.pipelines.insert(
            handle,
            PipelineEntry {
                cancel,
                task: Some(task),
            },
        );
    }

    /// Track and resume every task in the store
    pub(crate) async fn restore_tasks(&self) -> Result<()> {
        let tasks = self.db.list_tasks().await?;
        if tasks.is_empty() {
            return Ok(());
        }
        tracing::info!(count = tasks.len(), "Resuming stored tasks");

        // caller headers are not persisted; a resumed probe sends the defaults
        let headers = request_headers(&self.config.network, &HashMap::new());
        let mut maps = self.maps.lock().await;
        for (handle, config) in tasks {
            tracing::debug!(
                task_id = %config.id,
                handle = handle.0,
                reported_begin = config.reported_begin,
                "Resuming task"
            );
            maps.track(handle, config.clone());
            self.spawn_pipeline(&mut maps, handle, config, headers.clone());
        }
        Ok(())
    }

    async fn run_pipeline(
        &self,
        handle: DownloadHandle,
        config: TaskConfig,
        headers: Vec<(String, String)>,
        cancel: CancellationToken,
    ) {
        let mut expected_bytes = 0;
        if !config.reported_begin {
            let probe = match self.probe.probe(&config.url, &headers).await {
                Ok(result) => result,
                Err(e) => {
                    tracing::warn!(
                        task_id = %config.id,
                        url = %config.url,
                        error = %e,
                        "Begin probe failed, total size unknown"
                    );
                    ProbeResult::default()
                }
            };
            if cancel.is_cancelled() {
                return;
            }
            expected_bytes = probe.expected_bytes;
            if !self.report_begin(handle, &config.id, probe).await {
                return;
            }
        }

        loop {
            let outcome = ProgressMonitor::new(
                self.gateway.clone(),
                handle,
                self.config.polling.clone(),
                cancel.clone(),
                expected_bytes,
            )
            .run(self.progress_callback(config.id.clone(), cancel.clone()))
            .await;

            match outcome {
                MonitorOutcome::Stopped => {
                    tracing::debug!(task_id = %config.id, "Progress monitor stopped");
                    return;
                }
                MonitorOutcome::Finished(status) => {
                    if status.bytes_total > 0 {
                        expected_bytes = status.bytes_total as u64;
                    }
                    if self.handle_completion(handle, Some(status)).await {
                        return;
                    }
                    // every byte arrived but the gateway has not finalized the transfer
                    tokio::select! {
                        _ = cancel.cancelled() => return,
                        _ = tokio::time::sleep(self.config.polling.active_interval) => {}
                    }
                }
                MonitorOutcome::Lost => {
                    self.fail_task(
                        handle,
                        TaskFailure::new(ErrorCode::FileNotFound, COULD_NOT_FIND),
                    )
                    .await;
                    return;
                }
                MonitorOutcome::QueryFailed(e) => {
                    self.fail_task(handle, TaskFailure::from(&e)).await;
                    return;
                }
            }
        }
    }

    /// Persist `reported_begin` and emit the begin event, both under the maps lock
    ///
    /// Returns false when the task stopped being tracked while probing.
    async fn report_begin(&self, handle: DownloadHandle, id: &TaskId, probe: ProbeResult) -> bool {
        let mut maps = self.maps.lock().await;
        let Some(config) = maps.configs.get_mut(&handle) else {
            return false;
        };

        // flag before event: begin is emitted at most once, even across a crash
        if let Err(e) = self.db.set_reported_begin(handle).await {
            tracing::error!(task_id = %id, error = %e, "Failed to persist begin flag");
        }
        config.reported_begin = true;

        tracing::info!(
            task_id = %id,
            expected_bytes = probe.expected_bytes,
            "Task began"
        );
        self.emit_event(Event::Begin {
            id: id.clone(),
            headers: probe.headers,
            expected_bytes: probe.expected_bytes,
        });
        true
    }

    /// Feed one task's samples through the shared throttle
    ///
    /// The stop check runs under the throttle lock, so no progress for a task is emitted
    /// once completion handling has stopped it.
    fn progress_callback(
        &self,
        id: TaskId,
        cancel: CancellationToken,
    ) -> impl FnMut(u64, u64) + Send + use<> {
        let throttle = self.throttle.clone();
        let event_tx = self.event_tx.clone();
        move |bytes_downloaded, bytes_total| {
            let mut throttle = throttle
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            if cancel.is_cancelled() {
                return;
            }
            if let Some(reports) = throttle.record(&id, bytes_downloaded, bytes_total, Instant::now())
            {
                event_tx.send(Event::Progress { reports }).ok();
            }
        }
    }
}
