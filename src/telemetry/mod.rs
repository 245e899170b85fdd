//! Telemetry for the memory-bank cache
//!
//! Diagnostics export and the debug snapshot of cache contents.

pub mod debug_dump;
pub mod diagnostics;

pub use debug_dump::{DebugSnapshot, TokenMetrics};
pub use diagnostics::{BankSize, CacheSizeReport, DiagnosticsReport, RECENT_ERROR_LIMIT};
