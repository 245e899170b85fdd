//! Membank prelude - convenient imports for users

pub use crate::membank::{MemoryBankCache, MemoryBankCacheBuilder, UpdateResponse};

pub use crate::cache::config::CacheConfig;
pub use crate::cache::consistency::ConsistencyReport;
pub use crate::cache::sync_wrapper::{ExecutionBridge, ExecutionContext};
pub use crate::cache::traits::{
    BankStore, CacheOperationError, ContentProcessor, ProcessCall, ProcessRequest,
    ProcessedContent, ProcessingMetadata, ProcessorError, Severity, StoreError, WriteOperation,
};
pub use crate::cache::types::statistics::ErrorRecord;
pub use crate::cache::types::{BankContent, BankKey, BankType};
pub use crate::telemetry::DiagnosticsReport;
