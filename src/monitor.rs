//! Progress Monitor
//!
//! One polling loop per active task. Each tick queries the gateway for the task's handle,
//! keeps the last observable byte counts, hands them to the progress callback, and sleeps
//! for a state-dependent interval. The loop holds no cross-task state.

use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::config::PollingConfig;
use crate::gateway::{DownloadGateway, GatewayStatus, TransferStatus};
use crate::types::DownloadHandle;
use crate::Error;

/// Why a monitor loop ended
#[derive(Debug)]
pub enum MonitorOutcome {
    /// The cancellation token fired
    Stopped,
    /// The gateway reported a terminal status, or every expected byte arrived
    Finished(TransferStatus),
    /// The gateway no longer knows the handle
    Lost,
    /// Querying the gateway failed
    QueryFailed(Error),
}

/// Sleep before the next tick
///
/// A running transfer whose byte count has not moved for `stall_threshold` polls is
/// polled less often.
pub fn poll_delay(polling: &PollingConfig, status: GatewayStatus, unchanged_polls: u32) -> Duration {
    match status {
        GatewayStatus::Paused => polling.paused_interval,
        GatewayStatus::Pending => polling.pending_interval,
        _ if unchanged_polls >= polling.stall_threshold => polling.stalled_interval,
        _ => polling.active_interval,
    }
}

/// Polling loop for one handle
pub struct ProgressMonitor {
    gateway: Arc<dyn DownloadGateway>,
    handle: DownloadHandle,
    polling: PollingConfig,
    cancel: CancellationToken,
    bytes_downloaded: u64,
    bytes_total: u64,
}

impl ProgressMonitor {
    /// Create a monitor; `expected_bytes` seeds the total until the gateway reports one
    pub fn new(
        gateway: Arc<dyn DownloadGateway>,
        handle: DownloadHandle,
        polling: PollingConfig,
        cancel: CancellationToken,
        expected_bytes: u64,
    ) -> Self {
        Self {
            gateway,
            handle,
            polling,
            cancel,
            bytes_downloaded: 0,
            bytes_total: expected_bytes,
        }
    }

    /// Run until stopped or a terminal condition is observed
    ///
    /// `on_progress` receives `(bytes_downloaded, bytes_total)` once per tick; a total of
    /// 0 means unknown.
    pub async fn run<F>(mut self, mut on_progress: F) -> MonitorOutcome
    where
        F: FnMut(u64, u64) + Send,
    {
        let mut unchanged_polls = 0u32;

        loop {
            if self.cancel.is_cancelled() {
                return MonitorOutcome::Stopped;
            }

            let status = match self.gateway.query(self.handle).await {
                Ok(Some(status)) => status,
                Ok(None) => return MonitorOutcome::Lost,
                Err(e) => return MonitorOutcome::QueryFailed(e),
            };

            let previous = self.bytes_downloaded;
            // keep the last good figure when a read comes back empty
            if status.bytes_total > 0 {
                self.bytes_total = status.bytes_total as u64;
            }
            if status.bytes_downloaded > 0 {
                self.bytes_downloaded = status.bytes_downloaded as u64;
            }

            tracing::debug!(
                handle = self.handle.0,
                status = ?status.status,
                bytes_downloaded = self.bytes_downloaded,
                bytes_total = self.bytes_total,
                "Progress tick"
            );
            on_progress(self.bytes_downloaded, self.bytes_total);

            if status.status.is_terminal() {
                return MonitorOutcome::Finished(status);
            }
            if self.bytes_total > 0
                && self.bytes_downloaded > 0
                && self.bytes_downloaded == self.bytes_total
            {
                return MonitorOutcome::Finished(status);
            }

            if status.status == GatewayStatus::Running && self.bytes_downloaded == previous {
                unchanged_polls = unchanged_polls.saturating_add(1);
            } else {
                unchanged_polls = 0;
            }

            let delay = poll_delay(&self.polling, status.status, unchanged_polls);
            tokio::select! {
                _ = self.cancel.cancelled() => return MonitorOutcome::Stopped,
                _ = tokio::time::sleep(delay) => {}
            }
        }
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::MemoryGateway;

    fn fast_polling() -> PollingConfig {
        PollingConfig {
            active_interval: Duration::from_millis(1),
            stalled_interval: Duration::from_millis(1),
            stall_threshold: 4,
            pending_interval: Duration::from_millis(1),
            paused_interval: Duration::from_millis(1),
        }
    }

    fn monitor(gateway: &Arc<MemoryGateway>, handle: DownloadHandle, expected: u64) -> ProgressMonitor {
        ProgressMonitor::new(
            gateway.clone(),
            handle,
            fast_polling(),
            CancellationToken::new(),
            expected,
        )
    }

    #[tokio::test]
    async fn keeps_last_good_values_and_finishes_on_success() {
        let gateway = Arc::new(MemoryGateway::new());
        gateway.script(
            "u",
            vec![
                TransferStatus::running(100, 1000),
                TransferStatus::running(0, -1),
                TransferStatus::successful("/tmp/x", 1000, 1000),
            ],
        );
        let handle = gateway.insert("u", TransferStatus::pending());

        let mut seen = Vec::new();
        let outcome = monitor(&gateway, handle, 0)
            .run(|d, t| seen.push((d, t)))
            .await;

        // the empty read in the middle must not clobber the real figures
        assert_eq!(seen, vec![(100, 1000), (100, 1000), (1000, 1000)]);
        assert!(matches!(
            outcome,
            MonitorOutcome::Finished(ref s) if s.status == GatewayStatus::Successful
        ));
    }

    #[tokio::test]
    async fn failed_status_ends_loop_with_reason() {
        let gateway = Arc::new(MemoryGateway::new());
        gateway.script(
            "u",
            vec![
                TransferStatus::running(100, 1000),
                TransferStatus::failed(1008, 0, -1),
            ],
        );
        let handle = gateway.insert("u", TransferStatus::pending());

        let mut seen = Vec::new();
        let outcome = monitor(&gateway, handle, 0)
            .run(|d, t| seen.push((d, t)))
            .await;

        assert_eq!(seen, vec![(100, 1000), (100, 1000)]);
        assert!(matches!(
            outcome,
            MonitorOutcome::Finished(ref s) if s.status == GatewayStatus::Failed && s.reason == 1008
        ));
    }

    #[tokio::test]
    async fn expected_bytes_seed_unknown_total() {
        let gateway = Arc::new(MemoryGateway::new());
        gateway.script(
            "u",
            vec![
                TransferStatus::running(10, -1),
                TransferStatus::successful("/tmp/x", 500, 500),
            ],
        );
        let handle = gateway.insert("u", TransferStatus::pending());

        let mut seen = Vec::new();
        monitor(&gateway, handle, 500).run(|d, t| seen.push((d, t))).await;

        assert_eq!(seen[0], (10, 500));
    }

    #[tokio::test]
    async fn all_bytes_arrived_counts_as_finished() {
        let gateway = Arc::new(MemoryGateway::new());
        gateway.script("u", vec![TransferStatus::running(1000, 1000)]);
        let handle = gateway.insert("u", TransferStatus::pending());

        let outcome = monitor(&gateway, handle, 0).run(|_, _| {}).await;

        assert!(matches!(
            outcome,
            MonitorOutcome::Finished(ref s) if s.status == GatewayStatus::Running
        ));
    }

    #[tokio::test]
    async fn lost_handle_ends_loop() {
        let gateway = Arc::new(MemoryGateway::new());
        let handle = gateway.insert("u", TransferStatus::running(1, 10));
        gateway.forget(handle);

        let mut ticks = 0;
        let outcome = monitor(&gateway, handle, 0).run(|_, _| ticks += 1).await;

        assert!(matches!(outcome, MonitorOutcome::Lost));
        assert_eq!(ticks, 0);
    }

    #[tokio::test]
    async fn stop_before_start_skips_query() {
        let gateway = Arc::new(MemoryGateway::new());
        gateway.script("u", vec![TransferStatus::running(5, 10)]);
        let handle = gateway.insert("u", TransferStatus::pending());
        let cancel = CancellationToken::new();
        cancel.cancel();

        let outcome = ProgressMonitor::new(gateway.clone(), handle, fast_polling(), cancel, 0)
            .run(|_, _| panic!("no tick after stop"))
            .await;

        assert!(matches!(outcome, MonitorOutcome::Stopped));
        // script untouched: the first query still yields the first step
        let status = gateway.query(handle).await.unwrap().unwrap();
        assert_eq!(status.bytes_downloaded, 5);
    }

    #[tokio::test]
    async fn stop_interrupts_long_sleep() {
        let gateway = Arc::new(MemoryGateway::new());
        let handle = gateway.insert("u", TransferStatus::paused(2, 5, 10));
        let cancel = CancellationToken::new();
        let polling = PollingConfig {
            paused_interval: Duration::from_secs(60),
            ..fast_polling()
        };

        let task = tokio::spawn(
            ProgressMonitor::new(gateway.clone(), handle, polling, cancel.clone(), 0)
                .run(|_, _| {}),
        );
        tokio::time::sleep(Duration::from_millis(50)).await;
        cancel.cancel();

        let outcome = tokio::time::timeout(Duration::from_secs(5), task)
            .await
            .expect("monitor did not observe stop")
            .unwrap();
        assert!(matches!(outcome, MonitorOutcome::Stopped));
    }

    #[test]
    fn delay_depends_on_state_and_stall() {
        let polling = PollingConfig::default();

        assert_eq!(
            poll_delay(&polling, GatewayStatus::Paused, 0),
            Duration::from_secs(2)
        );
        assert_eq!(
            poll_delay(&polling, GatewayStatus::Pending, 0),
            Duration::from_secs(1)
        );
        assert_eq!(
            poll_delay(&polling, GatewayStatus::Running, 3),
            Duration::from_millis(250)
        );
        assert_eq!(
            poll_delay(&polling, GatewayStatus::Running, 4),
            Duration::from_millis(500)
        );
    }
}
