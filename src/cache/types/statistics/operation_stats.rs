//! Operation counters and timing samples
//!
//! Counters are lock-free cache-padded atomics updated on the hot path.
//! Timing samples are short bounded buffers per operation kind that live
//! under the cache state lock.

use std::collections::{BTreeMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use crossbeam_utils::CachePadded;
use serde::{Deserialize, Serialize};

/// Samples retained per operation kind
pub const TIMING_SAMPLE_CAPACITY: usize = 100;

/// Kinds of timed operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum TimedOperation {
    Load,
    Update,
    Sync,
}

impl TimedOperation {
    pub fn label(&self) -> &'static str {
        match self {
            TimedOperation::Load => "load_ms",
            TimedOperation::Update => "update_ms",
            TimedOperation::Sync => "sync_ms",
        }
    }
}

/// Lock-free operation counters
#[derive(Debug)]
pub struct OperationCounters {
    cache_hits: CachePadded<AtomicU64>,
    cache_misses: CachePadded<AtomicU64>,
    load_operations: CachePadded<AtomicU64>,
    update_operations: CachePadded<AtomicU64>,
    sync_operations: CachePadded<AtomicU64>,
    sync_failures: CachePadded<AtomicU64>,
}

impl Default for OperationCounters {
    fn default() -> Self {
        Self::new()
    }
}

impl OperationCounters {
    pub fn new() -> Self {
        Self {
            cache_hits: CachePadded::new(AtomicU64::new(0)),
            cache_misses: CachePadded::new(AtomicU64::new(0)),
            load_operations: CachePadded::new(AtomicU64::new(0)),
            update_operations: CachePadded::new(AtomicU64::new(0)),
            sync_operations: CachePadded::new(AtomicU64::new(0)),
            sync_failures: CachePadded::new(AtomicU64::new(0)),
        }
    }

    #[inline(always)]
    pub fn record_hit(&self) {
        self.cache_hits.fetch_add(1, Ordering::Relaxed);
    }

    #[inline(always)]
    pub fn record_miss(&self) {
        self.cache_misses.fetch_add(1, Ordering::Relaxed);
    }

    #[inline(always)]
    pub fn record_load(&self) {
        self.load_operations.fetch_add(1, Ordering::Relaxed);
    }

    #[inline(always)]
    pub fn record_update(&self) {
        self.update_operations.fetch_add(1, Ordering::Relaxed);
    }

    #[inline(always)]
    pub fn record_sync(&self) {
        self.sync_operations.fetch_add(1, Ordering::Relaxed);
    }

    #[inline(always)]
    pub fn record_sync_failure(&self) {
        self.sync_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> OperationCounts {
        OperationCounts {
            cache_hits: self.cache_hits.load(Ordering::Relaxed),
            cache_misses: self.cache_misses.load(Ordering::Relaxed),
            load_operations: self.load_operations.load(Ordering::Relaxed),
            update_operations: self.update_operations.load(Ordering::Relaxed),
            sync_operations: self.sync_operations.load(Ordering::Relaxed),
            sync_failures: self.sync_failures.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of [`OperationCounters`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationCounts {
    pub cache_hits: u64,
    pub cache_misses: u64,
    pub load_operations: u64,
    pub update_operations: u64,
    pub sync_operations: u64,
    pub sync_failures: u64,
}

impl OperationCounts {
    /// Hit rate in percent; zero before the first lookup.
    pub fn hit_rate_percent(&self) -> f64 {
        let lookups = self.cache_hits + self.cache_misses;
        if lookups == 0 {
            0.0
        } else {
            self.cache_hits as f64 / lookups as f64 * 100.0
        }
    }
}

/// Bounded per-operation timing samples in milliseconds
#[derive(Debug, Clone, Default)]
pub struct OperationTimings {
    samples: BTreeMap<TimedOperation, VecDeque<f64>>,
}

impl OperationTimings {
    pub fn record(&mut self, operation: TimedOperation, elapsed: Duration) {
        let buffer = self
            .samples
            .entry(operation)
            .or_insert_with(|| VecDeque::with_capacity(TIMING_SAMPLE_CAPACITY));
        if buffer.len() >= TIMING_SAMPLE_CAPACITY {
            buffer.pop_front();
        }
        buffer.push_back(elapsed.as_secs_f64() * 1000.0);
    }

    pub fn sample_count(&self, operation: TimedOperation) -> usize {
        self.samples.get(&operation).map_or(0, VecDeque::len)
    }

    /// Average of retained samples keyed by label; kinds without samples are omitted.
    pub fn averages_ms(&self) -> BTreeMap<String, f64> {
        self.samples
            .iter()
            .filter(|(_, buffer)| !buffer.is_empty())
            .map(|(operation, buffer)| {
                let avg = buffer.iter().sum::<f64>() / buffer.len() as f64;
                (operation.label().to_string(), avg)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hit_rate_handles_no_lookups() {
        let counters = OperationCounters::new();
        assert_eq!(counters.snapshot().hit_rate_percent(), 0.0);

        counters.record_hit();
        counters.record_hit();
        counters.record_hit();
        counters.record_miss();
        assert_eq!(counters.snapshot().hit_rate_percent(), 75.0);
    }

    #[test]
    fn timing_buffers_are_bounded() {
        let mut timings = OperationTimings::default();
        for _ in 0..(TIMING_SAMPLE_CAPACITY + 20) {
            timings.record(TimedOperation::Sync, Duration::from_millis(2));
        }
        assert_eq!(timings.sample_count(TimedOperation::Sync), TIMING_SAMPLE_CAPACITY);
        assert_eq!(timings.sample_count(TimedOperation::Load), 0);
    }

    #[test]
    fn averages_use_millisecond_labels() {
        let mut timings = OperationTimings::default();
        timings.record(TimedOperation::Load, Duration::from_millis(10));
        timings.record(TimedOperation::Load, Duration::from_millis(20));

        let averages = timings.averages_ms();
        assert_eq!(averages.len(), 1);
        assert!((averages["load_ms"] - 15.0).abs() < 1e-9);
    }

    #[test]
    fn counts_serialize_with_operation_names() {
        let counters = OperationCounters::new();
        counters.record_sync_failure();
        let json = serde_json::to_value(counters.snapshot()).unwrap();
        assert_eq!(json["sync_failures"], 1);
        assert_eq!(json["cache_hits"], 0);
    }
}
