//! Publisher metrics and status snapshots
//!
//! Provides counters for monitoring publisher health: accepted, delivered,
//! dropped and failed events, overflow and blocking events, and the largest
//! queue depth ever observed.

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

/// Counters for one publisher
///
/// # Example
///
/// ```
/// use rust_log_pipeline::core::PublisherMetrics;
///
/// let metrics = PublisherMetrics::new();
/// metrics.record_accepted();
/// metrics.record_dropped();
///
/// assert_eq!(metrics.accepted_count(), 1);
/// assert_eq!(metrics.dropped_count(), 1);
/// ```
#[derive(Debug)]
pub struct PublisherMetrics {
    /// Events accepted by `log`
    accepted: AtomicU64,

    /// Successful deliveries, counted once per appender
    delivered: AtomicU64,

    /// Events dropped by the overflow policy or during shutdown
    dropped: AtomicU64,

    /// Failed or panicked deliveries, counted once per appender
    failed: AtomicU64,

    /// Number of times the queue was found full
    queue_full_events: AtomicU64,

    /// Number of times a producer had to wait for space
    block_events: AtomicU64,

    /// Largest queue depth observed after an enqueue
    high_water_mark: AtomicU64,
}

impl PublisherMetrics {
    /// Create a new metrics instance with all counters at zero
    pub const fn new() -> Self {
        Self {
            accepted: AtomicU64::new(0),
            delivered: AtomicU64::new(0),
            dropped: AtomicU64::new(0),
            failed: AtomicU64::new(0),
            queue_full_events: AtomicU64::new(0),
            block_events: AtomicU64::new(0),
            high_water_mark: AtomicU64::new(0),
        }
    }

    #[inline]
    pub fn accepted_count(&self) -> u64 {
        self.accepted.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn delivered_count(&self) -> u64 {
        self.delivered.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn dropped_count(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn failed_count(&self) -> u64 {
        self.failed.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn queue_full_events(&self) -> u64 {
        self.queue_full_events.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn block_events(&self) -> u64 {
        self.block_events.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn high_water_mark(&self) -> u64 {
        self.high_water_mark.load(Ordering::Relaxed)
    }

    /// Record an accepted event, returning the previous count
    #[inline]
    pub fn record_accepted(&self) -> u64 {
        self.accepted.fetch_add(1, Ordering::Relaxed)
    }

    #[inline]
    pub fn record_delivered(&self, count: u64) -> u64 {
        self.delivered.fetch_add(count, Ordering::Relaxed)
    }

    /// Record a dropped event, returning the previous count
    #[inline]
    pub fn record_dropped(&self) -> u64 {
        self.dropped.fetch_add(1, Ordering::Relaxed)
    }

    #[inline]
    pub fn record_failed(&self, count: u64) -> u64 {
        self.failed.fetch_add(count, Ordering::Relaxed)
    }

    #[inline]
    pub fn record_queue_full(&self) -> u64 {
        self.queue_full_events.fetch_add(1, Ordering::Relaxed)
    }

    #[inline]
    pub fn record_block(&self) -> u64 {
        self.block_events.fetch_add(1, Ordering::Relaxed)
    }

    #[inline]
    pub fn observe_depth(&self, depth: usize) {
        self.high_water_mark.fetch_max(depth as u64, Ordering::Relaxed);
    }

    /// Get drop rate as a percentage (0.0 - 100.0)
    ///
    /// Returns 0.0 if no events have been offered.
    pub fn drop_rate(&self) -> f64 {
        let dropped = self.dropped_count() as f64;
        let total = self.accepted_count() as f64 + dropped;
        if total == 0.0 {
            0.0
        } else {
            (dropped / total) * 100.0
        }
    }

    /// Point-in-time copy of every counter
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            accepted: self.accepted_count(),
            delivered: self.delivered_count(),
            dropped: self.dropped_count(),
            failed: self.failed_count(),
            queue_full_events: self.queue_full_events(),
            block_events: self.block_events(),
            high_water_mark: self.high_water_mark(),
        }
    }
}

impl Default for PublisherMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Plain copy of [`PublisherMetrics`] counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub accepted: u64,
    pub delivered: u64,
    pub dropped: u64,
    pub failed: u64,
    pub queue_full_events: u64,
    pub block_events: u64,
    pub high_water_mark: u64,
}

/// Lifecycle state of a publisher
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PublisherState {
    Created,
    Running,
    Closed,
}

/// Operational status of a publisher
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PublisherStatus {
    pub kind: &'static str,
    pub state: PublisherState,
    /// Events currently buffered between producers and the appenders
    pub queue_depth: usize,
    /// Fixed buffer capacity; 0 for the direct publisher
    pub capacity: usize,
    pub appenders: usize,
    pub metrics: MetricsSnapshot,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_new() {
        let metrics = PublisherMetrics::new();
        assert_eq!(metrics.snapshot(), MetricsSnapshot::default());
    }

    #[test]
    fn test_metrics_record_dropped() {
        let metrics = PublisherMetrics::new();
        assert_eq!(metrics.record_dropped(), 0); // Returns previous value
        assert_eq!(metrics.dropped_count(), 1);
        metrics.record_dropped();
        assert_eq!(metrics.dropped_count(), 2);
    }

    #[test]
    fn test_high_water_mark_keeps_maximum() {
        let metrics = PublisherMetrics::new();
        metrics.observe_depth(3);
        metrics.observe_depth(9);
        metrics.observe_depth(2);
        assert_eq!(metrics.high_water_mark(), 9);
    }

    #[test]
    fn test_metrics_drop_rate() {
        let metrics = PublisherMetrics::new();
        assert_eq!(metrics.drop_rate(), 0.0);

        for _ in 0..90 {
            metrics.record_accepted();
        }
        for _ in 0..10 {
            metrics.record_dropped();
        }

        let rate = metrics.drop_rate();
        assert!((9.9..=10.1).contains(&rate), "Drop rate was {}", rate);
    }

    #[test]
    fn test_status_serializes() {
        let status = PublisherStatus {
            kind: "queue",
            state: PublisherState::Running,
            queue_depth: 2,
            capacity: 10,
            appenders: 1,
            metrics: MetricsSnapshot::default(),
        };
        let json = serde_json::to_value(&status).unwrap();
        assert_eq!(json["state"], "running");
        assert_eq!(json["capacity"], 10);
    }
}
