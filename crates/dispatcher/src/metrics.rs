//! In-process delivery counters
//!
//! Mirrors what is exported through the `metrics` facade so tests and the
//! shutdown summary can read totals without a recorder installed.

use std::sync::atomic::{AtomicU64, Ordering};

/// Metrics for a single sink
#[derive(Debug, Default)]
pub struct SinkMetrics {
    /// Total successful sends
    send_count: AtomicU64,
    /// Total send failures
    failure_count: AtomicU64,
    /// Events skipped by the sink's filter
    filtered_count: AtomicU64,
}

impl SinkMetrics {
    /// Create new metrics instance
    pub fn new() -> Self {
        Self::default()
    }

    /// Get total send count
    pub fn send_count(&self) -> u64 {
        self.send_count.load(Ordering::Relaxed)
    }

    /// Increment send count
    pub fn inc_send_count(&self) {
        self.send_count.fetch_add(1, Ordering::Relaxed);
    }

    /// Get failure count
    pub fn failure_count(&self) -> u64 {
        self.failure_count.load(Ordering::Relaxed)
    }

    /// Increment failure count
    pub fn inc_failure_count(&self) {
        self.failure_count.fetch_add(1, Ordering::Relaxed);
    }

    pub fn filtered_count(&self) -> u64 {
        self.filtered_count.load(Ordering::Relaxed)
    }

    pub fn inc_filtered_count(&self) {
        self.filtered_count.fetch_add(1, Ordering::Relaxed);
    }

    /// Get snapshot of all metrics
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            send_count: self.send_count(),
            failure_count: self.failure_count(),
            filtered_count: self.filtered_count(),
        }
    }
}

/// Snapshot of sink metrics (for reporting)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub send_count: u64,
    pub failure_count: u64,
    pub filtered_count: u64,
}

/// Controller-wide counters
#[derive(Debug, Default)]
pub struct ControllerMetrics {
    received: AtomicU64,
    stale: AtomicU64,
    enqueued: AtomicU64,
    processed: AtomicU64,
}

impl ControllerMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn inc_received(&self) {
        self.received.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn inc_stale(&self) {
        self.stale.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn inc_enqueued(&self) {
        self.enqueued.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn inc_processed(&self) {
        self.processed.fetch_add(1, Ordering::Relaxed);
    }

    /// Add/update notifications seen
    pub fn received(&self) -> u64 {
        self.received.load(Ordering::Relaxed)
    }

    /// Events dropped by the staleness filter
    pub fn stale(&self) -> u64 {
        self.stale.load(Ordering::Relaxed)
    }

    /// Events accepted into the queue
    pub fn enqueued(&self) -> u64 {
        self.enqueued.load(Ordering::Relaxed)
    }

    /// Queue items fully processed (marked done)
    pub fn processed(&self) -> u64 {
        self.processed.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sink_metrics_snapshot() {
        let metrics = SinkMetrics::new();
        metrics.inc_send_count();
        metrics.inc_send_count();
        metrics.inc_failure_count();
        metrics.inc_filtered_count();

        assert_eq!(
            metrics.snapshot(),
            MetricsSnapshot {
                send_count: 2,
                failure_count: 1,
                filtered_count: 1,
            }
        );
    }
}
