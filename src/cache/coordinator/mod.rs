//! Cache coordination
//!
//! [`CacheCore`] owns bank contents and the pending set; [`BankCacheManager`]
//! pairs it with the background sync worker.

pub mod bank_manager;
pub mod cache_core;

pub use bank_manager::{BankCacheManager, UpdateOutcome};
pub use cache_core::{AppliedUpdate, CacheCore, CacheParts};
