//! Configuration structures for the memory-bank cache
//!
//! All sections deserialize with defaults so partial TOML files are valid.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::cache::traits::CacheOperationError;

/// Default on-disk location of memory banks, relative to the home directory
pub const DEFAULT_STORAGE_DIR: &str = ".claude-desktop/memory";

/// Updates larger than this many bytes are flushed synchronously
pub const DEFAULT_LARGE_UPDATE_THRESHOLD: usize = 2048;

/// Top-level cache configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Root directory holding `global/`, `projects/` and `code/` banks
    pub storage_root: PathBuf,
    /// Byte size above which an update triggers an immediate flush
    pub large_update_threshold_bytes: usize,
    pub worker: WorkerConfig,
    pub bridge: BridgeConfig,
    pub diagnostics: DiagnosticsConfig,
}

/// Background sync worker settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerConfig {
    /// Seconds between periodic flushes of every pending bank
    pub sync_interval_secs: u64,
    /// How long the worker blocks on its queue before checking the clock
    pub poll_interval_ms: u64,
    /// Bounded wait for the worker to exit on shutdown
    pub shutdown_timeout_ms: u64,
    /// Start the worker thread when the cache is built
    pub start_on_build: bool,
}

/// Execution bridge settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    /// Upper bound on asynchronous processor work
    pub timeout_ms: u64,
    /// Retry a failed processor call with the rule-based processor
    pub fallback_to_rules: bool,
}

/// Diagnostics and debug output settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DiagnosticsConfig {
    /// Post-sync consistency checks, error details, and diagnostics export
    pub enabled: bool,
    /// Write a JSON snapshot of the whole cache after every load and update
    pub debug_memory_dump: bool,
    /// Defaults to `{storage_root}/diagnostics`
    pub diagnostics_dir: Option<PathBuf>,
    /// Defaults to `{storage_root}/cache_memory_dump.json`
    pub debug_dump_path: Option<PathBuf>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        let storage_root = dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(DEFAULT_STORAGE_DIR);
        Self {
            storage_root,
            large_update_threshold_bytes: DEFAULT_LARGE_UPDATE_THRESHOLD,
            worker: WorkerConfig::default(),
            bridge: BridgeConfig::default(),
            diagnostics: DiagnosticsConfig::default(),
        }
    }
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            sync_interval_secs: 60,
            poll_interval_ms: 100,
            shutdown_timeout_ms: 5_000,
            start_on_build: true,
        }
    }
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 10_000,
            fallback_to_rules: false,
        }
    }
}

impl Default for DiagnosticsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            debug_memory_dump: false,
            diagnostics_dir: None,
            debug_dump_path: None,
        }
    }
}

impl CacheConfig {
    /// Config rooted at `storage_root` with every other field defaulted
    pub fn with_storage_root(storage_root: impl Into<PathBuf>) -> Self {
        Self {
            storage_root: storage_root.into(),
            ..Self::default()
        }
    }

    /// Load and validate a TOML configuration file
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self, CacheOperationError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| {
            CacheOperationError::io_failed(format!("reading {}: {}", path.display(), e))
        })?;
        Self::from_toml_str(&raw)
    }

    pub fn from_toml_str(raw: &str) -> Result<Self, CacheOperationError> {
        let config: CacheConfig = toml::from_str(raw)
            .map_err(|e| CacheOperationError::invalid_configuration(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings the worker or bridge cannot run with
    pub fn validate(&self) -> Result<(), CacheOperationError> {
        if self.storage_root.as_os_str().is_empty() {
            return Err(CacheOperationError::invalid_configuration(
                "storage_root must not be empty",
            ));
        }
        if self.worker.sync_interval_secs == 0 {
            return Err(CacheOperationError::invalid_configuration(
                "worker.sync_interval_secs must be greater than zero",
            ));
        }
        if self.worker.poll_interval_ms == 0 {
            return Err(CacheOperationError::invalid_configuration(
                "worker.poll_interval_ms must be greater than zero",
            ));
        }
        if self.worker.shutdown_timeout_ms == 0 {
            return Err(CacheOperationError::invalid_configuration(
                "worker.shutdown_timeout_ms must be greater than zero",
            ));
        }
        if self.bridge.timeout_ms == 0 {
            return Err(CacheOperationError::invalid_configuration(
                "bridge.timeout_ms must be greater than zero",
            ));
        }
        Ok(())
    }

    pub fn diagnostics_dir(&self) -> PathBuf {
        self.diagnostics
            .diagnostics_dir
            .clone()
            .unwrap_or_else(|| self.storage_root.join("diagnostics"))
    }

    pub fn debug_dump_path(&self) -> PathBuf {
        self.diagnostics
            .debug_dump_path
            .clone()
            .unwrap_or_else(|| self.storage_root.join("cache_memory_dump.json"))
    }
}

impl WorkerConfig {
    pub fn sync_interval(&self) -> Duration {
        Duration::from_secs(self.sync_interval_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_millis(self.shutdown_timeout_ms)
    }
}

impl BridgeConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_production_values() {
        let config = CacheConfig::default();
        assert_eq!(config.large_update_threshold_bytes, 2048);
        assert_eq!(config.worker.sync_interval(), Duration::from_secs(60));
        assert_eq!(config.bridge.timeout(), Duration::from_secs(10));
        assert!(config.storage_root.ends_with(DEFAULT_STORAGE_DIR));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let config = CacheConfig::from_toml_str(
            r#"
            storage_root = "/tmp/banks"

            [worker]
            sync_interval_secs = 5
            "#,
        )
        .unwrap();

        assert_eq!(config.storage_root, PathBuf::from("/tmp/banks"));
        assert_eq!(config.worker.sync_interval_secs, 5);
        assert_eq!(config.worker.poll_interval_ms, 100);
        assert!(config.diagnostics.enabled);
        assert_eq!(
            config.diagnostics_dir(),
            PathBuf::from("/tmp/banks/diagnostics")
        );
    }

    #[test]
    fn zero_interval_is_rejected() {
        let err = CacheConfig::from_toml_str("[worker]\nsync_interval_secs = 0\n").unwrap_err();
        assert!(matches!(err, CacheOperationError::InvalidConfiguration(_)));
    }

    #[test]
    fn malformed_toml_is_a_configuration_error() {
        let err = CacheConfig::from_toml_str("storage_root = [").unwrap_err();
        assert!(matches!(err, CacheOperationError::InvalidConfiguration(_)));
    }
}
