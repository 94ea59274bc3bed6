//! Active task listing and adoption of known handles.

use std::collections::HashMap;

use crate::error::Result;
use crate::gateway::GatewayStatus;
use crate::http::request_headers;
use crate::types::TaskSnapshot;

use super::BackgroundDownloader;

impl BackgroundDownloader {
    /// Snapshot every transfer the gateway knows, joined against the task store
    ///
    /// Side effects:
    /// - a `Successful` transfer has its file relocated (best-effort)
    /// - a stored task this process does not track yet is adopted and monitored
    /// - a transfer with no stored task is an orphan and gets cancelled
    pub async fn list_active(&self) -> Result<Vec<TaskSnapshot>> {
        let transfers = self.gateway.query_all().await?;
        let stored = self.db.list_tasks().await?;

        let mut snapshots = Vec::with_capacity(transfers.len());
        for (handle, status) in transfers {
            let Some(config) = stored.get(&handle) else {
                tracing::warn!(handle = handle.0, "Cancelling orphaned transfer");
                if let Err(e) = self.gateway.cancel(handle).await {
                    tracing::warn!(handle = handle.0, error = %e, "Failed to cancel orphaned transfer");
                }
                continue;
            };

            if status.status == GatewayStatus::Successful
                && let Some(source) = status.local_path.clone()
                && let Err(e) = self
                    .mover
                    .relocate(source, config.destination.clone())
                    .await
            {
                tracing::warn!(task_id = %config.id, error = %e, "Failed to relocate finished file");
            }

            let bytes_downloaded = status.bytes_downloaded.max(0) as u64;
            let bytes_total = status.bytes_total.max(0) as u64;
            snapshots.push(TaskSnapshot {
                id: config.id.clone(),
                metadata: config.metadata.clone(),
                state: status.status.task_state(),
                bytes_downloaded,
                bytes_total,
                percent: if bytes_total > 0 {
                    bytes_downloaded as f64 / bytes_total as f64
                } else {
                    0.0
                },
            });

            let mut maps = self.maps.lock().await;
            if maps.configs.contains_key(&handle) {
                continue;
            }
            // re-read under the lock: the task may have finished since the listing
            match self.db.get_task(handle).await {
                Ok(Some(current)) => {
                    tracing::info!(task_id = %current.id, handle = handle.0, "Adopting task");
                    maps.track(handle, current.clone());
                    let headers = request_headers(&self.config.network, &HashMap::new());
                    self.spawn_pipeline(&mut maps, handle, current, headers);
                }
                Ok(None) => {}
                Err(e) => {
                    tracing::error!(handle = handle.0, error = %e, "Failed to read task for adoption");
                }
            }
        }

        Ok(snapshots)
    }
}
