//! Persistence seam for bank contents

use std::path::PathBuf;

use crate::cache::traits::CacheOperationError;
use crate::cache::types::{BankContent, BankKey};

/// Failure reported by a [`BankStore`]
#[derive(Debug)]
pub enum StoreError {
    /// File-system failure at `path`
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    /// A file path escapes the bank root or is otherwise unusable
    InvalidPath(String),
    /// Store-specific failure (remote stores, test doubles)
    Backend(String),
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreError::Io { path, source } => write!(f, "{}: {}", path.display(), source),
            StoreError::InvalidPath(path) => write!(f, "invalid bank file path '{}'", path),
            StoreError::Backend(msg) => write!(f, "{}", msg),
        }
    }
}

impl std::error::Error for StoreError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            StoreError::Io { source, .. } => Some(source),
            _ => None,
        }
    }
}

impl StoreError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

impl From<StoreError> for CacheOperationError {
    fn from(err: StoreError) -> Self {
        CacheOperationError::SyncError(err.to_string())
    }
}

/// Durable storage for banks
///
/// Implementations must be callable from the caller's thread and from the
/// sync worker concurrently. The cache never holds its state lock across any
/// of these calls.
pub trait BankStore: Send + Sync {
    /// Read every file of a bank; `Ok(None)` means the bank does not exist.
    fn load(&self, key: &BankKey) -> Result<Option<BankContent>, StoreError>;

    /// Create an empty bank and return its initial contents.
    fn create(&self, key: &BankKey) -> Result<BankContent, StoreError>;

    /// Persist every file of `content`. Any partial failure is an error.
    fn write(&self, key: &BankKey, content: &BankContent) -> Result<(), StoreError>;
}
