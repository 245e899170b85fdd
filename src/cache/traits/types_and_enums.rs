//! Core enums shared across the memory-bank cache
//!
//! Error taxonomy for cache operations plus the severity levels used by the
//! bounded error log.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Severity attached to every recorded error
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Error,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Severity::Info => write!(f, "info"),
            Severity::Warning => write!(f, "warning"),
            Severity::Error => write!(f, "error"),
        }
    }
}

/// Recovery hint for cache operation errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoveryHint {
    /// Operation can be retried as-is; cache state was left untouched
    Retry,
    /// Pending data stays queued and the worker retries on its next tick
    RetryOnNextSync,
    /// Fall back to the rule-based processor or an empty bank
    Fallback,
    /// Fix the configuration and rebuild the cache
    Reconfigure,
    /// Caller contract violation; retrying cannot help
    Fatal,
}

/// Cache operation error types
///
/// Every variant except [`CacheOperationError::UnknownBankType`] and
/// [`CacheOperationError::InvalidBankId`] is recoverable:
/// it is recorded in the error log and surfaced to the caller without
/// corrupting cached state.
#[derive(Debug, Clone, PartialEq)]
pub enum CacheOperationError {
    /// Bank type string outside `global`, `project`, `code`
    UnknownBankType(String),
    /// Bank id that is empty or would leave its type directory
    InvalidBankId(String),
    /// Bank Store failed while loading a bank
    LoadError(String),
    /// Content processor failed or produced unusable output
    ProcessError(String),
    /// Processed output could not be merged into the bank
    MergeError(String),
    /// Bank Store failed while writing a bank
    SyncError(String),
    /// Execution bridge gave up waiting on asynchronous work
    BridgeTimeout(Duration),
    /// Processor output failed shape validation
    ValidationError(String),
    InvalidConfiguration(String),
    Io(String),
    SerializationError(String),
    /// Sync worker is stopped or was never started
    WorkerUnavailable,
}

impl std::fmt::Display for CacheOperationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CacheOperationError::UnknownBankType(t) => {
                write!(f, "Unknown bank type '{}': expected global, project or code", t)
            }
            CacheOperationError::InvalidBankId(id) => write!(
                f,
                "Invalid bank id '{}': expected a relative path without '..'",
                id
            ),
            CacheOperationError::LoadError(msg) => write!(f, "Load error: {}", msg),
            CacheOperationError::ProcessError(msg) => write!(f, "Process error: {}", msg),
            CacheOperationError::MergeError(msg) => write!(f, "Merge error: {}", msg),
            CacheOperationError::SyncError(msg) => write!(f, "Sync error: {}", msg),
            CacheOperationError::BridgeTimeout(after) => {
                write!(f, "Asynchronous work timed out after {:?}", after)
            }
            CacheOperationError::ValidationError(msg) => write!(f, "Validation error: {}", msg),
            CacheOperationError::InvalidConfiguration(msg) => {
                write!(f, "Invalid configuration: {}", msg)
            }
            CacheOperationError::Io(msg) => write!(f, "I/O error: {}", msg),
            CacheOperationError::SerializationError(msg) => {
                write!(f, "Serialization error: {}", msg)
            }
            CacheOperationError::WorkerUnavailable => write!(f, "Sync worker is not running"),
        }
    }
}

impl std::error::Error for CacheOperationError {}

impl CacheOperationError {
    /// Create process error
    #[inline(always)]
    pub fn process_failed(msg: impl Into<String>) -> Self {
        Self::ProcessError(msg.into())
    }

    /// Create merge error
    #[inline(always)]
    pub fn merge_failed(msg: impl Into<String>) -> Self {
        Self::MergeError(msg.into())
    }

    /// Create configuration error
    #[inline(always)]
    pub fn invalid_configuration(msg: impl Into<String>) -> Self {
        Self::InvalidConfiguration(msg.into())
    }

    /// Create IO error
    #[inline(always)]
    pub fn io_failed(msg: impl Into<String>) -> Self {
        Self::Io(msg.into())
    }

    /// Create serialization error
    #[inline(always)]
    pub fn serialization_failed(msg: impl Into<String>) -> Self {
        Self::SerializationError(msg.into())
    }

    /// Contract violations fail fast and are never recorded or retried.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::UnknownBankType(_) | Self::InvalidBankId(_))
    }

    /// Get recovery hint for this error
    pub fn recovery_hint(&self) -> RecoveryHint {
        match self {
            Self::UnknownBankType(_) | Self::InvalidBankId(_) => RecoveryHint::Fatal,
            Self::LoadError(_) => RecoveryHint::Fallback,
            Self::ProcessError(_) | Self::BridgeTimeout(_) => RecoveryHint::Fallback,
            Self::MergeError(_) | Self::ValidationError(_) => RecoveryHint::Retry,
            Self::SyncError(_) | Self::Io(_) => RecoveryHint::RetryOnNextSync,
            Self::SerializationError(_) => RecoveryHint::Retry,
            Self::InvalidConfiguration(_) | Self::WorkerUnavailable => RecoveryHint::Reconfigure,
        }
    }
}

impl From<std::io::Error> for CacheOperationError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

impl From<serde_json::Error> for CacheOperationError {
    fn from(err: serde_json::Error) -> Self {
        Self::SerializationError(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_caller_contract_violations_are_fatal() {
        assert!(CacheOperationError::UnknownBankType("team".into()).is_fatal());
        assert!(CacheOperationError::InvalidBankId("../x".into()).is_fatal());
        assert!(!CacheOperationError::SyncError("disk full".into()).is_fatal());
        assert!(!CacheOperationError::BridgeTimeout(Duration::from_secs(1)).is_fatal());
    }

    #[test]
    fn sync_errors_are_retried_by_the_worker() {
        let err = CacheOperationError::SyncError("permission denied".into());
        assert_eq!(err.recovery_hint(), RecoveryHint::RetryOnNextSync);
        assert_eq!(err.to_string(), "Sync error: permission denied");
    }

    #[test]
    fn severity_serializes_lowercase() {
        let json = serde_json::to_string(&Severity::Warning).unwrap();
        assert_eq!(json, "\"warning\"");
    }
}
