//! CLI-specific error handling
//!
//! Maps cache, configuration, and I/O failures to user-facing messages.

use std::fmt;

use crate::cache::traits::CacheOperationError;

/// CLI-specific error type
#[derive(Debug)]
pub enum CliError {
    /// Cache operation error
    CacheError(CacheOperationError),
    /// Configuration error
    ConfigError(String),
    /// Input/output error
    IoError(std::io::Error),
    /// JSON parsing error
    JsonError(serde_json::Error),
    /// TOML parsing error
    TomlError(toml::de::Error),
    /// Invalid argument error
    ArgumentError(String),
    /// An operation completed but reported failure
    OperationFailed(String),
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CliError::CacheError(e) => write!(f, "Cache error: {}", e),
            CliError::ConfigError(msg) => write!(f, "Configuration error: {}", msg),
            CliError::IoError(e) => write!(f, "I/O error: {}", e),
            CliError::JsonError(e) => write!(f, "JSON error: {}", e),
            CliError::TomlError(e) => write!(f, "TOML error: {}", e),
            CliError::ArgumentError(msg) => write!(f, "Argument error: {}", msg),
            CliError::OperationFailed(msg) => write!(f, "Operation failed: {}", msg),
        }
    }
}

impl std::error::Error for CliError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CliError::CacheError(e) => Some(e),
            CliError::IoError(e) => Some(e),
            CliError::JsonError(e) => Some(e),
            CliError::TomlError(e) => Some(e),
            _ => None,
        }
    }
}

impl CliError {
    /// Process exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            CliError::ArgumentError(_) => 2,
            CliError::ConfigError(_) | CliError::TomlError(_) => 3,
            CliError::CacheError(e) if e.is_fatal() => 2,
            _ => 1,
        }
    }
}

impl From<CacheOperationError> for CliError {
    fn from(error: CacheOperationError) -> Self {
        match error {
            CacheOperationError::InvalidConfiguration(msg) => CliError::ConfigError(msg),
            other => CliError::CacheError(other),
        }
    }
}

impl From<std::io::Error> for CliError {
    fn from(error: std::io::Error) -> Self {
        CliError::IoError(error)
    }
}

impl From<serde_json::Error> for CliError {
    fn from(error: serde_json::Error) -> Self {
        CliError::JsonError(error)
    }
}

impl From<toml::de::Error> for CliError {
    fn from(error: toml::de::Error) -> Self {
        CliError::TomlError(error)
    }
}

/// Result type for CLI operations
pub type CliResult<T> = Result<T, CliError>;
