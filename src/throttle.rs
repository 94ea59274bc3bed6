//! Progress Throttle
//!
//! Decides which raw samples are worth delivering (batching) and when the batch goes out
//! (flushing). All tasks share one batch and one flush clock, which bounds the event
//! rate system-wide rather than per task.
//!
//! Time is passed in explicitly so the policy is deterministic under test.

use std::collections::{BTreeMap, HashMap};
use std::time::{Duration, Instant};

use crate::types::{ProgressReport, TaskId};

#[derive(Clone, Copy, Debug, Default)]
struct LastReported {
    percent: f64,
    bytes: u64,
}

/// Shared batch of pending progress samples
#[derive(Debug)]
pub struct ProgressThrottle {
    interval: Duration,
    min_bytes: u64,
    percent_threshold: f64,
    last_flush: Option<Instant>,
    reported: HashMap<TaskId, LastReported>,
    pending: BTreeMap<TaskId, ProgressReport>,
}

impl ProgressThrottle {
    /// Create a throttle
    ///
    /// `min_bytes == 0` disables the byte threshold; `interval == 0` flushes on every
    /// sample that finds something pending.
    pub fn new(interval: Duration, min_bytes: u64, percent_threshold: f64) -> Self {
        Self {
            interval,
            min_bytes,
            percent_threshold,
            last_flush: None,
            reported: HashMap::new(),
            pending: BTreeMap::new(),
        }
    }

    /// Current flush interval
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Current byte threshold
    pub fn min_bytes(&self) -> u64 {
        self.min_bytes
    }

    /// Change the flush interval; takes effect on the next sample
    pub fn set_interval(&mut self, interval: Duration) {
        self.interval = interval;
    }

    /// Change the byte threshold; takes effect on the next sample
    pub fn set_min_bytes(&mut self, min_bytes: u64) {
        self.min_bytes = min_bytes;
    }

    /// Offer one sample and flush if due
    ///
    /// The sample is batched when its fraction moved more than the percent threshold
    /// since the last batched sample of the same task, or when its byte count moved by
    /// at least `min_bytes`. With an unknown total only the byte threshold applies. A
    /// newer batched sample replaces an older pending one for the same task.
    ///
    /// Returns the flushed batch, never empty.
    pub fn record(
        &mut self,
        id: &TaskId,
        bytes_downloaded: u64,
        bytes_total: u64,
        now: Instant,
    ) -> Option<Vec<ProgressReport>> {
        let last = self.reported.get(id).copied().unwrap_or_default();
        let percent = if bytes_total > 0 {
            bytes_downloaded as f64 / bytes_total as f64
        } else {
            0.0
        };

        let percent_moved = bytes_total > 0 && percent - last.percent > self.percent_threshold;
        let bytes_moved =
            self.min_bytes > 0 && bytes_downloaded.saturating_sub(last.bytes) >= self.min_bytes;

        if percent_moved || bytes_moved {
            self.pending.insert(
                id.clone(),
                ProgressReport {
                    id: id.clone(),
                    bytes_downloaded,
                    bytes_total,
                },
            );
            self.reported.insert(
                id.clone(),
                LastReported {
                    percent,
                    bytes: bytes_downloaded,
                },
            );
        }

        self.flush_due(now)
    }

    /// Flush the batch if the interval elapsed and something is pending
    pub fn flush_due(&mut self, now: Instant) -> Option<Vec<ProgressReport>> {
        if self.pending.is_empty() {
            return None;
        }
        let due = match self.last_flush {
            None => true,
            Some(last) => now.saturating_duration_since(last) > self.interval,
        };
        if !due {
            return None;
        }

        self.last_flush = Some(now);
        let batch = std::mem::take(&mut self.pending);
        Some(batch.into_values().collect())
    }

    /// Drop all state of a task, including an unsent sample
    pub fn forget(&mut self, id: &TaskId) {
        self.reported.remove(id);
        self.pending.remove(id);
    }

    /// Number of tasks with an unsent sample
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MIB: u64 = 1024 * 1024;

    fn id(s: &str) -> TaskId {
        TaskId::from(s)
    }

    fn bytes_of(batch: &[ProgressReport]) -> Vec<(String, u64)> {
        batch
            .iter()
            .map(|r| (r.id.to_string(), r.bytes_downloaded))
            .collect()
    }

    #[test]
    fn delivers_first_sample_and_suppresses_sub_percent_moves() {
        let mut throttle = ProgressThrottle::new(Duration::ZERO, MIB, 0.01);
        let t0 = Instant::now();
        let a = id("a");

        let first = throttle.record(&a, 100, 1000, t0).expect("first sample flushes");
        assert_eq!(bytes_of(&first), vec![("a".to_string(), 100)]);

        // 0.5% move: not batched, nothing to flush
        assert!(throttle.record(&a, 105, 1000, t0 + Duration::from_millis(1)).is_none());

        let third = throttle
            .record(&a, 250, 1000, t0 + Duration::from_millis(2))
            .expect("15% move flushes");
        assert_eq!(bytes_of(&third), vec![("a".to_string(), 250)]);
    }

    #[test]
    fn percent_move_is_measured_from_last_batched_sample() {
        let mut throttle = ProgressThrottle::new(Duration::ZERO, 0, 0.01);
        let t0 = Instant::now();
        let a = id("a");

        assert!(throttle.record(&a, 200, 10_000, t0).is_some());
        // each step moves 0.6%, only every second one crosses 1% from the last batched
        assert!(throttle.record(&a, 260, 10_000, t0 + Duration::from_millis(1)).is_none());
        assert!(throttle.record(&a, 320, 10_000, t0 + Duration::from_millis(2)).is_some());
        assert!(throttle.record(&a, 380, 10_000, t0 + Duration::from_millis(3)).is_none());
    }

    #[test]
    fn byte_threshold_batches_large_files() {
        // 1 MiB of a 1 GiB file is ~0.1%, below the percent threshold
        let total = 1024 * MIB;
        let mut throttle = ProgressThrottle::new(Duration::ZERO, MIB, 0.01);
        let t0 = Instant::now();
        let a = id("a");

        throttle.record(&a, MIB, total, t0);
        assert!(throttle.record(&a, MIB + 10, total, t0 + Duration::from_millis(1)).is_none());
        let batch = throttle
            .record(&a, 2 * MIB, total, t0 + Duration::from_millis(2))
            .expect("byte threshold reached");
        assert_eq!(batch[0].bytes_downloaded, 2 * MIB);
    }

    #[test]
    fn zero_min_bytes_disables_byte_threshold() {
        let mut throttle = ProgressThrottle::new(Duration::ZERO, 0, 0.01);
        let t0 = Instant::now();
        let a = id("a");
        let total = 1024 * MIB;

        throttle.record(&a, 2 * MIB, total, t0);
        assert!(throttle.record(&a, 8 * MIB, total, t0 + Duration::from_millis(1)).is_none());
    }

    #[test]
    fn unknown_total_is_gated_by_byte_threshold() {
        let mut throttle = ProgressThrottle::new(Duration::ZERO, MIB, 0.01);
        let t0 = Instant::now();
        let a = id("a");

        assert!(throttle.record(&a, 500, 0, t0).is_none());

        let batch = throttle
            .record(&a, 2 * MIB, 0, t0 + Duration::from_millis(1))
            .expect("a full byte step is reported");
        assert_eq!(batch[0].bytes_downloaded, 2 * MIB);
        assert_eq!(batch[0].bytes_total, 0);

        // a stalled stream repeats the same sample
        assert!(throttle.record(&a, 2 * MIB, 0, t0 + Duration::from_millis(2)).is_none());
        assert!(throttle.record(&a, 2 * MIB, 0, t0 + Duration::from_millis(3)).is_none());
        assert!(throttle.record(&a, 3 * MIB, 0, t0 + Duration::from_millis(4)).is_some());
    }

    #[test]
    fn flush_waits_for_interval_and_coalesces_tasks() {
        let mut throttle = ProgressThrottle::new(Duration::from_millis(1000), MIB, 0.01);
        let t0 = Instant::now();

        assert!(throttle.record(&id("a"), 100, 1000, t0).is_some());
        assert!(throttle.record(&id("a"), 300, 1000, t0 + Duration::from_millis(100)).is_none());
        assert!(throttle.record(&id("b"), 50, 100, t0 + Duration::from_millis(200)).is_none());
        assert!(throttle.record(&id("a"), 500, 1000, t0 + Duration::from_millis(300)).is_none());
        assert_eq!(throttle.pending_len(), 2);

        // exactly the interval is not enough
        assert!(throttle.flush_due(t0 + Duration::from_millis(1000)).is_none());

        let batch = throttle
            .flush_due(t0 + Duration::from_millis(1001))
            .expect("interval elapsed");
        // one entry per task, latest sample wins
        assert_eq!(
            bytes_of(&batch),
            vec![("a".to_string(), 500), ("b".to_string(), 50)]
        );
        assert_eq!(throttle.pending_len(), 0);
    }

    #[test]
    fn never_flushes_an_empty_batch() {
        let mut throttle = ProgressThrottle::new(Duration::ZERO, MIB, 0.01);
        let t0 = Instant::now();

        assert!(throttle.flush_due(t0).is_none());
        throttle.record(&id("a"), 100, 1000, t0);
        // suppressed sample after a flush leaves nothing to send
        assert!(throttle.record(&id("a"), 101, 1000, t0 + Duration::from_secs(5)).is_none());
        assert!(throttle.flush_due(t0 + Duration::from_secs(10)).is_none());
    }

    #[test]
    fn forget_discards_pending_sample_and_history() {
        let mut throttle = ProgressThrottle::new(Duration::from_secs(60), MIB, 0.01);
        let t0 = Instant::now();
        let a = id("a");

        throttle.record(&a, 100, 1000, t0);
        throttle.record(&a, 500, 1000, t0 + Duration::from_millis(1));
        assert_eq!(throttle.pending_len(), 1);

        throttle.forget(&a);
        assert_eq!(throttle.pending_len(), 0);

        // history is gone too: a small sample counts as a fresh move from zero
        throttle.record(&a, 100, 1000, t0 + Duration::from_millis(2));
        assert_eq!(throttle.pending_len(), 1);
    }

    #[test]
    fn settings_can_change_live() {
        let mut throttle = ProgressThrottle::new(Duration::from_secs(60), MIB, 0.01);
        let t0 = Instant::now();

        throttle.record(&id("a"), 100, 1000, t0);
        throttle.record(&id("a"), 500, 1000, t0 + Duration::from_millis(1));
        assert_eq!(throttle.pending_len(), 1);

        throttle.set_interval(Duration::ZERO);
        throttle.set_min_bytes(4096);
        assert_eq!(throttle.interval(), Duration::ZERO);
        assert_eq!(throttle.min_bytes(), 4096);
        assert!(throttle.flush_due(t0 + Duration::from_millis(2)).is_some());
    }
}
