//! Background sync worker
//!
//! A dedicated thread drains a crossbeam queue of sync requests and, on a
//! fixed interval, flushes every pending bank. Flush failures are logged and
//! retried on the next interval; they never stop the worker.

pub mod manager;
pub mod task_processor;
pub mod types;

pub use manager::StopOutcome;
pub use types::{SyncRequest, SyncTarget, SyncWorker, WorkerStatsSnapshot, WorkerTiming};
