//! Operation counters for the filter manager.
//!
//! Thread-safe counters incremented on successful operations, readable as
//! a point-in-time snapshot.

use std::sync::atomic::{AtomicU64, Ordering};

/// Metrics collector for manager operations.
#[derive(Default)]
pub struct Metrics {
    /// Filters created (explicit create, not discovery).
    pub filters_created: AtomicU64,
    /// Filters dropped.
    pub filters_dropped: AtomicU64,
    /// Check batches completed.
    pub check_batches: AtomicU64,
    /// Set batches completed.
    pub set_batches: AtomicU64,
    /// Keys probed across all check batches.
    pub keys_checked: AtomicU64,
    /// Keys added across all set batches.
    pub keys_set: AtomicU64,
    /// Flushes completed.
    pub flushes: AtomicU64,
    /// Unmaps completed.
    pub unmaps: AtomicU64,
    /// Hot-set insertions.
    pub hot_marks: AtomicU64,
}

impl Metrics {
    /// Create a new metrics collector.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_create(&self) {
        self.filters_created.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_drop(&self) {
        self.filters_dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_check(&self, num_keys: usize) {
        self.check_batches.fetch_add(1, Ordering::Relaxed);
        self.keys_checked.fetch_add(num_keys as u64, Ordering::Relaxed);
    }

    pub fn record_set(&self, num_keys: usize) {
        self.set_batches.fetch_add(1, Ordering::Relaxed);
        self.keys_set.fetch_add(num_keys as u64, Ordering::Relaxed);
    }

    pub fn record_flush(&self) {
        self.flushes.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_unmap(&self) {
        self.unmaps.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_hot_mark(&self) {
        self.hot_marks.fetch_add(1, Ordering::Relaxed);
    }

    /// Point-in-time view of all counters.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            filters_created: self.filters_created.load(Ordering::Relaxed),
            filters_dropped: self.filters_dropped.load(Ordering::Relaxed),
            check_batches: self.check_batches.load(Ordering::Relaxed),
            set_batches: self.set_batches.load(Ordering::Relaxed),
            keys_checked: self.keys_checked.load(Ordering::Relaxed),
            keys_set: self.keys_set.load(Ordering::Relaxed),
            flushes: self.flushes.load(Ordering::Relaxed),
            unmaps: self.unmaps.load(Ordering::Relaxed),
            hot_marks: self.hot_marks.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time metrics snapshot.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub filters_created: u64,
    pub filters_dropped: u64,
    pub check_batches: u64,
    pub set_batches: u64,
    pub keys_checked: u64,
    pub keys_set: u64,
    pub flushes: u64,
    pub unmaps: u64,
    pub hot_marks: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_start_at_zero() {
        let metrics = Metrics::new();
        assert_eq!(metrics.snapshot(), MetricsSnapshot::default());
    }

    #[test]
    fn test_batch_counters_track_keys() {
        let metrics = Metrics::new();

        metrics.record_check(3);
        metrics.record_check(0);
        metrics.record_set(2);

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.check_batches, 2);
        assert_eq!(snapshot.keys_checked, 3);
        assert_eq!(snapshot.set_batches, 1);
        assert_eq!(snapshot.keys_set, 2);
    }

    #[test]
    fn test_lifecycle_counters() {
        let metrics = Metrics::new();

        metrics.record_create();
        metrics.record_create();
        metrics.record_drop();
        metrics.record_flush();
        metrics.record_unmap();
        metrics.record_hot_mark();

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.filters_created, 2);
        assert_eq!(snapshot.filters_dropped, 1);
        assert_eq!(snapshot.flushes, 1);
        assert_eq!(snapshot.unmaps, 1);
        assert_eq!(snapshot.hot_marks, 1);
    }
}
