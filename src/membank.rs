//! Public API of the memory-bank cache
//!
//! [`MemoryBankCache`] accepts bank types as strings the way tool handlers
//! receive them, and reports update failures as an `"error"` response rather
//! than an `Err`. Only an unknown bank type or a bank id that would leave the
//! storage root fails fast.
//!
//! ```no_run
//! use membank_cache::MemoryBankCache;
//!
//! let cache = MemoryBankCache::builder()
//!     .storage_root("/tmp/memory")
//!     .build()?;
//! let response = cache.update_bank("project", "demo", "Architecture: we use PostgreSQL.", false)?;
//! assert!(response.is_success());
//! cache.close();
//! # Ok::<(), membank_cache::CacheOperationError>(())
//! ```

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::cache::config::CacheConfig;
use crate::cache::consistency::ConsistencyReport;
use crate::cache::content::RuleBasedProcessor;
use crate::cache::coordinator::BankCacheManager;
use crate::cache::storage::FileBankStore;
use crate::cache::sync_wrapper::{BridgeStatsSnapshot, ExecutionBridge, ExecutionContext};
use crate::cache::traits::{BankStore, CacheOperationError, ContentProcessor};
use crate::cache::types::statistics::ErrorRecord;
use crate::cache::types::{BankContent, BankKey, BankType};
use crate::cache::worker::WorkerStatsSnapshot;
use crate::telemetry::{DiagnosticsReport, RECENT_ERROR_LIMIT};

/// Response of [`MemoryBankCache::update_bank`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateResponse {
    /// `"success"` or `"error"`
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl UpdateResponse {
    pub fn success() -> Self {
        Self {
            status: "success".to_string(),
            error: None,
        }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            status: "error".to_string(),
            error: Some(error.into()),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == "success"
    }
}

/// Write-behind cache of memory banks
#[derive(Debug)]
pub struct MemoryBankCache {
    manager: BankCacheManager,
}

impl MemoryBankCache {
    pub fn builder() -> MemoryBankCacheBuilder {
        MemoryBankCacheBuilder::new()
    }

    /// Cache over the default storage root with the rule-based processor
    pub fn new() -> Result<Self, CacheOperationError> {
        Self::builder().build()
    }

    /// Full content of a bank, loading it from disk on first access
    pub fn get_bank(
        &self,
        bank_type: &str,
        bank_id: &str,
    ) -> Result<BankContent, CacheOperationError> {
        let key = BankKey::parse(bank_type, bank_id)?;
        Ok(self.manager.get_bank(&key))
    }

    /// Merge `text` into a bank.
    ///
    /// `immediate` forces the bank to disk before returning; large updates
    /// are flushed regardless.
    pub fn update_bank(
        &self,
        bank_type: &str,
        bank_id: &str,
        text: &str,
        immediate: bool,
    ) -> Result<UpdateResponse, CacheOperationError> {
        let key = BankKey::parse(bank_type, bank_id)?;
        match self.manager.update_bank(&key, text, immediate) {
            Ok(_) => Ok(UpdateResponse::success()),
            Err(e) if e.is_fatal() => Err(e),
            Err(e) => Ok(UpdateResponse::failure(e.to_string())),
        }
    }

    /// Flush every pending bank, reporting success per bank
    pub fn sync_all_pending(&self) -> BTreeMap<BankKey, bool> {
        self.manager.core().sync_all_pending()
    }

    pub fn perform_consistency_check(
        &self,
        bank_type: Option<&str>,
        bank_id: Option<&str>,
    ) -> Result<ConsistencyReport, CacheOperationError> {
        let bank_type = bank_type.map(str::parse::<BankType>).transpose()?;
        Ok(self
            .manager
            .core()
            .perform_consistency_check(bank_type, bank_id))
    }

    pub fn diagnostics(&self) -> DiagnosticsReport {
        self.manager.core().diagnostics()
    }

    /// Write diagnostics as JSON to `path`, or a timestamped file in the
    /// diagnostics directory
    pub fn export_diagnostics(&self, path: Option<&Path>) -> bool {
        self.manager.core().export_diagnostics(path)
    }

    pub fn dump_debug_memory(&self) -> bool {
        self.manager.core().dump_debug_memory()
    }

    pub fn recent_errors(&self, count: usize) -> Vec<ErrorRecord> {
        self.manager.core().recent_errors(count)
    }

    /// The last few errors shown to operators, oldest first
    pub fn error_history(&self) -> Vec<ErrorRecord> {
        self.recent_errors(RECENT_ERROR_LIMIT)
    }

    pub fn pending_banks(&self) -> Vec<BankKey> {
        self.manager.core().pending_banks()
    }

    pub fn is_pending(&self, key: &BankKey) -> bool {
        self.manager.core().is_pending(key)
    }

    pub fn has_bank(&self, key: &BankKey) -> bool {
        self.manager.core().has_bank(key)
    }

    pub fn last_sync_time(&self, key: &BankKey) -> Option<DateTime<Utc>> {
        self.manager.core().last_sync_time(key)
    }

    pub fn worker_stats(&self) -> WorkerStatsSnapshot {
        self.manager.worker_stats()
    }

    pub fn bridge_stats(&self) -> BridgeStatsSnapshot {
        self.manager.core().bridge_stats()
    }

    pub fn config(&self) -> &CacheConfig {
        self.manager.core().config()
    }

    /// Start the sync worker when the cache was built without one
    pub fn start(&self) -> Result<(), CacheOperationError> {
        self.manager.start_worker()
    }

    /// Flush pending banks and stop the worker
    pub fn close(&self) {
        self.manager.close();
    }
}

/// Fluent construction of a [`MemoryBankCache`]
pub struct MemoryBankCacheBuilder {
    config: CacheConfig,
    store: Option<Arc<dyn BankStore>>,
    processor: Option<Arc<dyn ContentProcessor>>,
    context: ExecutionContext,
}

impl MemoryBankCacheBuilder {
    pub fn new() -> Self {
        Self {
            config: CacheConfig::default(),
            store: None,
            processor: None,
            context: ExecutionContext::default(),
        }
    }

    /// Replace the whole configuration
    pub fn config(mut self, config: CacheConfig) -> Self {
        self.config = config;
        self
    }

    pub fn storage_root(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.storage_root = path.into();
        self
    }

    /// Bank store; defaults to files under the storage root
    pub fn store(mut self, store: Arc<dyn BankStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Content processor; defaults to the rule-based processor
    pub fn processor(mut self, processor: Arc<dyn ContentProcessor>) -> Self {
        self.processor = Some(processor);
        self
    }

    /// How deferred processor work is driven from this caller
    pub fn execution_context(mut self, context: ExecutionContext) -> Self {
        self.context = context;
        self
    }

    pub fn bridge_timeout(mut self, timeout: Duration) -> Self {
        self.config.bridge.timeout_ms = ceil_millis(timeout);
        self
    }

    pub fn fallback_to_rules(mut self, enabled: bool) -> Self {
        self.config.bridge.fallback_to_rules = enabled;
        self
    }

    pub fn large_update_threshold(mut self, bytes: usize) -> Self {
        self.config.large_update_threshold_bytes = bytes;
        self
    }

    pub fn sync_interval(mut self, interval: Duration) -> Self {
        self.config.worker.sync_interval_secs = ceil_secs(interval);
        self
    }

    pub fn start_worker(mut self, start: bool) -> Self {
        self.config.worker.start_on_build = start;
        self
    }

    pub fn diagnostics(mut self, enabled: bool) -> Self {
        self.config.diagnostics.enabled = enabled;
        self
    }

    pub fn diagnostics_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.diagnostics.diagnostics_dir = Some(path.into());
        self
    }

    pub fn debug_memory_dump(mut self, enabled: bool) -> Self {
        self.config.diagnostics.debug_memory_dump = enabled;
        self
    }

    pub fn debug_dump_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.diagnostics.debug_dump_path = Some(path.into());
        self
    }

    pub fn build(self) -> Result<MemoryBankCache, CacheOperationError> {
        let store = self
            .store
            .unwrap_or_else(|| Arc::new(FileBankStore::new(&self.config.storage_root)));
        let processor = self
            .processor
            .unwrap_or_else(|| Arc::new(RuleBasedProcessor::new()));
        let bridge = ExecutionBridge::new(self.context, self.config.bridge.timeout());
        let manager = BankCacheManager::new(self.config, store, processor, bridge)?;
        Ok(MemoryBankCache { manager })
    }
}

// Durations are stored in whole units; round partial units up so a short
// non-zero duration never collapses to the rejected zero.
fn ceil_secs(duration: Duration) -> u64 {
    duration.as_secs() + u64::from(duration.subsec_nanos() > 0)
}

fn ceil_millis(duration: Duration) -> u64 {
    let whole = u64::try_from(duration.as_millis()).unwrap_or(u64::MAX);
    whole.saturating_add(u64::from(duration.subsec_nanos() % 1_000_000 > 0))
}

impl Default for MemoryBankCacheBuilder {
    fn default() -> Self {
        Self::new()
    }
}
