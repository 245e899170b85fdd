//! Membank Cache - write-behind cache for markdown memory banks
//!
//! Banks are named collections of markdown files scoped as global, project,
//! or code banks. Reads are served from memory after the first load; updates
//! are merged in memory and written to disk by a background worker, or
//! immediately for large and explicitly urgent updates.
//!
//! # Features
//!
//! - **Write-behind persistence**: pending banks flushed on a fixed interval
//! - **Pluggable collaborators**: custom [`BankStore`] and [`ContentProcessor`] implementations
//! - **Execution bridge**: asynchronous processors driven from any calling context
//! - **Consistency checking**: cache-versus-disk comparison with diagnostic snapshots
//! - **Diagnostics**: operation counters, timings, and a bounded error history

pub mod membank;
pub mod prelude;

// CLI module (for binary)
#[cfg(feature = "cli")]
pub mod cli;

pub mod cache;
pub mod telemetry;

pub use membank::{MemoryBankCache, MemoryBankCacheBuilder, UpdateResponse};
pub use prelude::*;
