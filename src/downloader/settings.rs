//! Runtime progress settings.

use std::time::Duration;

use crate::error::{Error, Result};

use super::BackgroundDownloader;

impl BackgroundDownloader {
    /// Change how often batched progress is flushed
    ///
    /// Takes effect on the next sample and is persisted for later runs.
    pub async fn set_progress_interval(&self, interval: Duration) -> Result<()> {
        if interval.is_zero() {
            return Err(Error::InvalidArgument(
                "progress interval must be positive".to_string(),
            ));
        }
        self.lock_throttle().set_interval(interval);
        self.db.set_progress_interval(interval).await?;
        tracing::debug!(interval_ms = interval.as_millis() as u64, "Progress interval updated");
        Ok(())
    }

    /// Change the byte delta that batches a sample regardless of percent
    ///
    /// Takes effect on the next sample and is persisted for later runs.
    pub async fn set_progress_min_bytes(&self, min_bytes: u64) -> Result<()> {
        if min_bytes == 0 {
            return Err(Error::InvalidArgument(
                "progress byte threshold must be positive".to_string(),
            ));
        }
        self.lock_throttle().set_min_bytes(min_bytes);
        self.db.set_progress_min_bytes(min_bytes).await?;
        tracing::debug!(min_bytes, "Progress byte threshold updated");
        Ok(())
    }

    /// Current flush interval and byte threshold
    pub fn progress_settings(&self) -> (Duration, u64) {
        let throttle = self.lock_throttle();
        (throttle.interval(), throttle.min_bytes())
    }
}
