//! Cache statistics
//!
//! Lock-free operation counters, bounded timing samples, and the bounded
//! error history.

pub mod error_stats;
pub mod operation_stats;

pub use error_stats::{ERROR_LOG_CAPACITY, ErrorLog, ErrorRecord};
pub use operation_stats::{OperationCounters, OperationCounts, OperationTimings, TimedOperation};
