//! Traits and shared enums at the seams of the cache
//!
//! The cache talks to disk through [`BankStore`] and to content analysis
//! through [`ContentProcessor`]; both are injected at construction.

pub mod processor;
pub mod store;
pub mod types_and_enums;

pub use processor::{
    ContentProcessor, ProcessCall, ProcessFuture, ProcessRequest, ProcessResult,
    ProcessedContent, ProcessingMetadata, ProcessorError, WriteOperation,
};
pub use store::{BankStore, StoreError};
pub use types_and_enums::{CacheOperationError, RecoveryHint, Severity};
