//! Counters and call timings for a board client.
//!
//! A `MetricsCollector` is owned by whoever builds the client and handed
//! to boards and listeners as an `Arc`; there is no process-wide instance.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Aggregated timings for one named operation.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpTiming {
    pub calls: u64,
    pub failures: u64,
    pub total_micros: u64,
    pub max_micros: u64,
}

impl OpTiming {
    fn record(&mut self, elapsed: Duration, ok: bool) {
        let micros = u64::try_from(elapsed.as_micros()).unwrap_or(u64::MAX);
        self.calls += 1;
        if !ok {
            self.failures += 1;
        }
        self.total_micros = self.total_micros.saturating_add(micros);
        self.max_micros = self.max_micros.max(micros);
    }

    /// Mean call duration in microseconds.
    pub fn mean_micros(&self) -> u64 {
        if self.calls == 0 {
            0
        } else {
            self.total_micros / self.calls
        }
    }
}

/// Point-in-time copy of all metrics.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub optimistic_applied: u64,
    pub confirmed: u64,
    pub rolled_back: u64,
    pub feed_events: u64,
    pub feed_merged: u64,
    pub feed_removed: u64,
    pub refetch_dropped: u64,
    pub operations: BTreeMap<String, OpTiming>,
}

/// Owned metrics sink.
#[derive(Debug, Default)]
pub struct MetricsCollector {
    optimistic_applied: AtomicU64,
    confirmed: AtomicU64,
    rolled_back: AtomicU64,
    feed_events: AtomicU64,
    feed_merged: AtomicU64,
    feed_removed: AtomicU64,
    refetch_dropped: AtomicU64,
    operations: Mutex<BTreeMap<&'static str, OpTiming>>,
}

impl MetricsCollector {
    /// Create a collector with every counter at zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// An optimistic edit was applied.
    pub fn record_optimistic(&self) {
        self.optimistic_applied.fetch_add(1, Ordering::Relaxed);
    }

    /// A pending edit was confirmed.
    pub fn record_confirmed(&self) {
        self.confirmed.fetch_add(1, Ordering::Relaxed);
    }

    /// A pending edit was rolled back.
    pub fn record_rollback(&self) {
        self.rolled_back.fetch_add(1, Ordering::Relaxed);
    }

    /// A change-feed event arrived.
    pub fn record_feed_event(&self) {
        self.feed_events.fetch_add(1, Ordering::Relaxed);
    }

    /// A re-fetched row was merged.
    pub fn record_feed_merge(&self) {
        self.feed_merged.fetch_add(1, Ordering::Relaxed);
    }

    /// A row was removed by the feed.
    pub fn record_feed_remove(&self) {
        self.feed_removed.fetch_add(1, Ordering::Relaxed);
    }

    /// A re-fetch failed and its event was dropped.
    pub fn record_refetch_dropped(&self) {
        self.refetch_dropped.fetch_add(1, Ordering::Relaxed);
    }

    /// Record one completed call of `operation`.
    pub fn record_call(&self, operation: &'static str, elapsed: Duration, ok: bool) {
        self.operations
            .lock()
            .entry(operation)
            .or_default()
            .record(elapsed, ok);
    }

    /// Run `f`, timing it under `operation`.
    pub fn time<T, E>(
        &self,
        operation: &'static str,
        f: impl FnOnce() -> std::result::Result<T, E>,
    ) -> std::result::Result<T, E> {
        let start = Instant::now();
        let result = f();
        self.record_call(operation, start.elapsed(), result.is_ok());
        result
    }

    /// Copy of the current counters and timings.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            optimistic_applied: self.optimistic_applied.load(Ordering::Relaxed),
            confirmed: self.confirmed.load(Ordering::Relaxed),
            rolled_back: self.rolled_back.load(Ordering::Relaxed),
            feed_events: self.feed_events.load(Ordering::Relaxed),
            feed_merged: self.feed_merged.load(Ordering::Relaxed),
            feed_removed: self.feed_removed.load(Ordering::Relaxed),
            refetch_dropped: self.refetch_dropped.load(Ordering::Relaxed),
            operations: self
                .operations
                .lock()
                .iter()
                .map(|(name, timing)| (name.to_string(), *timing))
                .collect(),
        }
    }

    /// Zero every counter.
    pub fn reset(&self) {
        for counter in [
            &self.optimistic_applied,
            &self.confirmed,
            &self.rolled_back,
            &self.feed_events,
            &self.feed_merged,
            &self.feed_removed,
            &self.refetch_dropped,
        ] {
            counter.store(0, Ordering::Relaxed);
        }
        self.operations.lock().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters() {
        let metrics = MetricsCollector::new();
        metrics.record_optimistic();
        metrics.record_optimistic();
        metrics.record_rollback();

        let snap = metrics.snapshot();
        assert_eq!(snap.optimistic_applied, 2);
        assert_eq!(snap.rolled_back, 1);
        assert_eq!(snap.confirmed, 0);
    }

    #[test]
    fn test_time_records_failures() {
        let metrics = MetricsCollector::new();
        let ok: Result<u8, ()> = metrics.time("create_item", || Ok(1));
        let err: Result<u8, ()> = metrics.time("create_item", || Err(()));
        assert!(ok.is_ok());
        assert!(err.is_err());

        let timing = metrics.snapshot().operations["create_item"];
        assert_eq!(timing.calls, 2);
        assert_eq!(timing.failures, 1);
        assert!(timing.max_micros >= timing.mean_micros());
    }

    #[test]
    fn test_instances_are_independent() {
        let a = MetricsCollector::new();
        let b = MetricsCollector::new();
        a.record_feed_event();

        assert_eq!(a.snapshot().feed_events, 1);
        assert_eq!(b.snapshot().feed_events, 0);

        a.reset();
        assert_eq!(a.snapshot(), MetricsSnapshot::default());
    }
}
