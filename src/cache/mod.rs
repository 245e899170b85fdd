//! Memory-bank cache system
//!
//! In-memory bank contents backed by a write-behind sync worker, with
//! consistency checking against disk and a bridge for asynchronous
//! content processors.

pub mod config;
pub mod consistency;
pub mod content;
pub mod coordinator;
pub mod storage;
pub mod sync_wrapper;
pub mod traits;
pub mod types;
pub mod worker;
