//! Task control: cancel and acknowledge.
//!
//! Both untrack the task before asking the gateway to cancel, so a completion signal
//! racing with the call finds no owning config.

use crate::error::{Error, Result};
use crate::types::{DownloadHandle, TaskId};

use super::BackgroundDownloader;

impl BackgroundDownloader {
    /// Cancel a tracked task
    ///
    /// Removes it from the store and the in-memory maps, stops its pipeline, then cancels
    /// the transfer with the gateway. No further event is emitted for the task.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if no task with `id` is tracked.
    pub async fn cancel(&self, id: &str) -> Result<()> {
        let id = TaskId::from(id);
        let Some(handle) = self.untrack_by_id(&id).await? else {
            return Err(Error::NotFound(format!("task {id} not found")));
        };

        tracing::info!(task_id = %id, handle = handle.0, "Cancelling task");
        self.gateway.cancel(handle).await
    }

    /// Client-side cleanup after a `complete` or `failed` event
    ///
    /// Removes any remaining trace of the task and cancels its handle with the gateway so
    /// it does not reappear in [`list_active`](Self::list_active). Unknown ids and
    /// repeated calls are no-ops.
    pub async fn acknowledge_completion(&self, id: &str) -> Result<()> {
        let id = TaskId::from(id);
        let Some(handle) = self.untrack_by_id(&id).await? else {
            tracing::debug!(task_id = %id, "Acknowledge for unknown task ignored");
            return Ok(());
        };

        tracing::debug!(task_id = %id, handle = handle.0, "Task acknowledged");
        if let Err(e) = self.gateway.cancel(handle).await {
            tracing::warn!(task_id = %id, handle = handle.0, error = %e, "Failed to cancel acknowledged handle");
        }
        Ok(())
    }

    /// Drop the task from maps, store and throttle under the maps lock
    async fn untrack_by_id(&self, id: &TaskId) -> Result<Option<DownloadHandle>> {
        let handle = {
            let mut maps = self.maps.lock().await;
            let handle = match maps.handles.get(id) {
                Some(handle) => Some(*handle),
                None => self.db.find_handle(id).await?,
            };
            let Some(handle) = handle else {
                return Ok(None);
            };
            maps.untrack(handle);
            self.db.remove_task(handle).await?;
            handle
        };

        self.lock_throttle().forget(id);
        Ok(Some(handle))
    }
}
