//! Sync worker types
//!
//! Message types, the flush target seam, and lock-free worker statistics.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::thread::JoinHandle;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use crossbeam_channel::{Receiver, Sender};
use crossbeam_utils::CachePadded;
use serde::{Deserialize, Serialize};

use crate::cache::types::BankKey;

/// Request to write one bank to disk
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncRequest {
    pub key: BankKey,
    /// Set for immediate or large updates
    pub priority: bool,
}

/// Messages on the worker queue
#[derive(Debug, Clone)]
pub enum WorkerMessage {
    Sync(SyncRequest),
    /// Unblocks the worker so it notices the shutdown flag promptly
    Wake,
}

/// What the worker flushes
///
/// Implemented by the cache core; the worker only ever holds it through an
/// `Arc` so the cache can outlive a forcibly detached worker thread.
pub trait SyncTarget: Send + Sync + 'static {
    /// Write one bank to disk, returning whether it succeeded
    fn flush_bank(&self, key: &BankKey) -> bool;

    fn is_pending(&self, key: &BankKey) -> bool;

    /// Snapshot of banks awaiting a flush
    fn pending_banks(&self) -> Vec<BankKey>;
}

/// Timing parameters of the worker loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkerTiming {
    pub sync_interval: Duration,
    pub poll_interval: Duration,
    pub shutdown_timeout: Duration,
}

/// Lock-free worker counters
#[derive(Debug)]
pub struct WorkerStats {
    pub(super) requests_processed: CachePadded<AtomicU64>,
    pub(super) requests_skipped: CachePadded<AtomicU64>,
    pub(super) periodic_runs: CachePadded<AtomicU64>,
    pub(super) banks_flushed: CachePadded<AtomicU64>,
    pub(super) flush_failures: CachePadded<AtomicU64>,
    /// Unix nanoseconds of the last periodic run, zero if none
    pub(super) last_periodic_ns: CachePadded<AtomicU64>,
    pub(super) started_at: Instant,
}

impl Default for WorkerStats {
    fn default() -> Self {
        Self {
            requests_processed: CachePadded::new(AtomicU64::new(0)),
            requests_skipped: CachePadded::new(AtomicU64::new(0)),
            periodic_runs: CachePadded::new(AtomicU64::new(0)),
            banks_flushed: CachePadded::new(AtomicU64::new(0)),
            flush_failures: CachePadded::new(AtomicU64::new(0)),
            last_periodic_ns: CachePadded::new(AtomicU64::new(0)),
            started_at: Instant::now(),
        }
    }
}

impl WorkerStats {
    pub(super) fn record_flush(&self, succeeded: bool) {
        if succeeded {
            self.banks_flushed.fetch_add(1, Ordering::Relaxed);
        } else {
            self.flush_failures.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub(super) fn mark_periodic_run(&self) {
        self.periodic_runs.fetch_add(1, Ordering::Relaxed);
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_nanos() as u64;
        self.last_periodic_ns.store(now, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> WorkerStatsSnapshot {
        WorkerStatsSnapshot {
            requests_processed: self.requests_processed.load(Ordering::Relaxed),
            requests_skipped: self.requests_skipped.load(Ordering::Relaxed),
            periodic_runs: self.periodic_runs.load(Ordering::Relaxed),
            banks_flushed: self.banks_flushed.load(Ordering::Relaxed),
            flush_failures: self.flush_failures.load(Ordering::Relaxed),
            last_periodic_ns: self.last_periodic_ns.load(Ordering::Relaxed),
            uptime_seconds: self.started_at.elapsed().as_secs(),
        }
    }
}

/// Point-in-time copy of [`WorkerStats`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerStatsSnapshot {
    pub requests_processed: u64,
    /// Requests for banks that were already clean when dequeued
    pub requests_skipped: u64,
    pub periodic_runs: u64,
    pub banks_flushed: u64,
    pub flush_failures: u64,
    pub last_periodic_ns: u64,
    pub uptime_seconds: u64,
}

/// Background thread that writes pending banks to disk
pub struct SyncWorker {
    pub(super) worker_handle: Option<JoinHandle<()>>,
    pub(super) shutdown: Arc<AtomicBool>,
    pub(super) request_sender: Sender<WorkerMessage>,
    pub(super) request_receiver: Option<Receiver<WorkerMessage>>,
    pub(super) exit_sender: Sender<()>,
    pub(super) exit_receiver: Receiver<()>,
    pub(super) stats: Arc<WorkerStats>,
    pub(super) timing: WorkerTiming,
}

impl std::fmt::Debug for SyncWorker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncWorker")
            .field("running", &self.is_running())
            .field("timing", &self.timing)
            .finish()
    }
}
