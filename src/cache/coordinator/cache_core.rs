//! Shared cache state and the operations that touch it
//!
//! All mutable state (bank contents, the pending set, last sync times, the
//! error log, timing samples) lives behind one mutex. The lock is held only
//! for structural reads and mutations; Bank Store I/O and content
//! processing always happen with the lock released.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use dashmap::DashMap;

use crate::cache::config::CacheConfig;
use crate::cache::consistency::{ConsistencyChecker, ConsistencyReport};
use crate::cache::content::{RuleBasedProcessor, merge_into_bank};
use crate::cache::storage::BankLayout;
use crate::cache::sync_wrapper::{BridgeStatsSnapshot, ExecutionBridge};
use crate::cache::traits::{
    BankStore, CacheOperationError, ContentProcessor, ProcessRequest, ProcessedContent, Severity,
    WriteOperation,
};
use crate::cache::types::statistics::{
    ErrorLog, ErrorRecord, OperationCounters, OperationTimings, TimedOperation,
};
use crate::cache::types::{BankContent, BankKey, BankType};
use crate::cache::worker::SyncTarget;
use crate::telemetry::diagnostics::{
    CacheSizeReport, DiagnosticsReport, RECENT_ERROR_LIMIT, default_export_path, write_json_file,
};
use crate::telemetry::DebugSnapshot;

const SLOW_LOAD: Duration = Duration::from_millis(100);
const SLOW_UPDATE: Duration = Duration::from_millis(200);
const SLOW_SYNC: Duration = Duration::from_millis(300);

#[derive(Debug, Default)]
struct BankEntry {
    content: BankContent,
    /// Bumped on every merge; a flush clears the pending flag only if it is unchanged
    generation: u64,
}

#[derive(Debug, Default)]
struct CacheState {
    banks: HashMap<BankKey, BankEntry>,
    pending: BTreeSet<BankKey>,
    last_sync: HashMap<BankKey, DateTime<Utc>>,
    errors: ErrorLog,
    timings: OperationTimings,
}

/// Result of merging one update into the cache
#[derive(Debug, Clone, PartialEq)]
pub struct AppliedUpdate {
    pub target_file: String,
    pub operation: WriteOperation,
    pub bytes_written: usize,
}

/// Collaborators injected into the cache
pub struct CacheParts {
    pub config: CacheConfig,
    pub store: Arc<dyn BankStore>,
    pub processor: Arc<dyn ContentProcessor>,
    pub bridge: ExecutionBridge,
}

pub struct CacheCore {
    state: Mutex<CacheState>,
    store: Arc<dyn BankStore>,
    processor: Arc<dyn ContentProcessor>,
    fallback: Option<RuleBasedProcessor>,
    bridge: ExecutionBridge,
    checker: ConsistencyChecker,
    counters: OperationCounters,
    flush_guards: DashMap<BankKey, Arc<Mutex<()>>>,
    config: CacheConfig,
    started: Instant,
}

impl std::fmt::Debug for CacheCore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheCore")
            .field("storage_root", &self.config.storage_root)
            .field("processor", &self.processor.name())
            .finish()
    }
}

impl CacheCore {
    pub fn new(parts: CacheParts) -> Self {
        let CacheParts {
            config,
            store,
            processor,
            bridge,
        } = parts;
        let checker = ConsistencyChecker::new(
            BankLayout::new(&config.storage_root),
            config.diagnostics_dir(),
        );
        let fallback = config.bridge.fallback_to_rules.then(RuleBasedProcessor::new);
        Self {
            state: Mutex::new(CacheState::default()),
            store,
            processor,
            fallback,
            bridge,
            checker,
            counters: OperationCounters::new(),
            flush_guards: DashMap::new(),
            config,
            started: Instant::now(),
        }
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    fn lock_state(&self) -> MutexGuard<'_, CacheState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn record_error(&self, description: String, severity: Severity, detail: Option<String>) {
        let mut record = ErrorRecord::new(description, severity);
        if self.config.diagnostics.enabled {
            record.detail = detail;
        }
        self.lock_state().errors.record(record);
    }

    /// Load a bank from the store, creating it when absent.
    /// A failing store yields an empty bank and an error record.
    fn load_from_store(&self, key: &BankKey) -> BankContent {
        self.counters.record_load();
        let started = Instant::now();

        let loaded = match self.store.load(key) {
            Ok(Some(content)) => Ok(content),
            Ok(None) => self.store.create(key),
            Err(e) => Err(e),
        };
        let content = match loaded {
            Ok(content) => content,
            Err(e) => {
                self.record_error(
                    format!("Failed to load bank {}: {}", key, e),
                    Severity::Error,
                    Some(format!("{:?}", e)),
                );
                BankContent::new()
            }
        };

        let elapsed = started.elapsed();
        if elapsed > SLOW_LOAD {
            log::warn!("Slow load of bank {}: {:?}", key, elapsed);
        }
        self.lock_state().timings.record(TimedOperation::Load, elapsed);
        content
    }

    /// Cached content of `key`, loading it on first access.
    /// Returns the content and whether it was already cached.
    fn ensure_loaded(&self, key: &BankKey) -> (BankContent, bool) {
        if let Some(entry) = self.lock_state().banks.get(key) {
            return (entry.content.clone(), true);
        }

        let loaded = self.load_from_store(key);
        let mut state = self.lock_state();
        state.last_sync.insert(key.clone(), Utc::now());
        // A concurrent caller may have loaded and merged meanwhile; keep theirs.
        let entry = state.banks.entry(key.clone()).or_insert_with(|| BankEntry {
            content: loaded,
            generation: 0,
        });
        (entry.content.clone(), false)
    }

    pub fn get_bank(&self, key: &BankKey) -> BankContent {
        let started = Instant::now();
        let (content, was_cached) = self.ensure_loaded(key);
        if was_cached {
            self.counters.record_hit();
        } else {
            self.counters.record_miss();
            self.dump_if_enabled();
        }

        let elapsed = started.elapsed();
        if elapsed > SLOW_LOAD {
            log::warn!("Slow retrieval of bank {}: {:?}", key, elapsed);
        }
        content
    }

    fn process(&self, request: ProcessRequest) -> Result<ProcessedContent, CacheOperationError> {
        let fallback_request = self.fallback.map(|rules| (rules, request.clone()));
        match self.bridge.process_content_sync(self.processor.process(request)) {
            Ok(processed) => Ok(processed),
            Err(err) => match fallback_request {
                Some((rules, request)) => {
                    self.record_error(
                        format!(
                            "Processor {} failed ({}); using rule-based fallback",
                            self.processor.name(),
                            err
                        ),
                        Severity::Warning,
                        None,
                    );
                    Ok(rules.process_sync(&request))
                }
                None => Err(err.into()),
            },
        }
    }

    /// Process `text` and merge the result into the cached bank.
    ///
    /// On processor or merge failure the bank is unchanged and the failure is
    /// recorded. On success the bank is marked pending.
    pub fn apply_update(
        &self,
        key: &BankKey,
        text: &str,
    ) -> Result<AppliedUpdate, CacheOperationError> {
        let started = Instant::now();
        self.counters.record_update();

        let (existing, _) = self.ensure_loaded(key);
        let request = ProcessRequest {
            text: text.to_string(),
            existing,
            bank_type: key.bank_type,
        };

        let processed = match self.process(request) {
            Ok(processed) => processed,
            Err(e) => {
                self.record_error(
                    format!("Failed to update bank {}: {}", key, e),
                    Severity::Error,
                    Some(format!("{:?}", e)),
                );
                return Err(e);
            }
        };

        let mut guard = self.lock_state();
        let state = &mut *guard;
        let entry = state.banks.entry(key.clone()).or_default();
        match merge_into_bank(&mut entry.content, &processed) {
            Ok(bytes_written) => {
                entry.generation += 1;
                state.pending.insert(key.clone());
                let elapsed = started.elapsed();
                state.timings.record(TimedOperation::Update, elapsed);
                drop(guard);

                if elapsed > SLOW_UPDATE {
                    log::warn!("Slow update of bank {}: {:?}", key, elapsed);
                }
                log::debug!(
                    "Merged {} bytes into {} of bank {} ({})",
                    bytes_written,
                    processed.target_file,
                    key,
                    processed.operation.name()
                );
                Ok(AppliedUpdate {
                    target_file: processed.target_file,
                    operation: processed.operation,
                    bytes_written,
                })
            }
            Err(e) => {
                let mut record =
                    ErrorRecord::new(format!("Failed to update bank {}: {}", key, e), Severity::Error);
                if self.config.diagnostics.enabled {
                    record.detail = Some(format!("target_file={}", processed.target_file));
                }
                state.errors.record(record);
                Err(e)
            }
        }
    }

    /// Write one bank to the store. Flushes of the same bank never overlap.
    pub fn flush(&self, key: &BankKey) -> bool {
        let guard = self
            .flush_guards
            .entry(key.clone())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .value()
            .clone();
        let _flushing = guard.lock().unwrap_or_else(PoisonError::into_inner);

        let snapshot = {
            let state = self.lock_state();
            state
                .banks
                .get(key)
                .map(|entry| (entry.content.clone(), entry.generation))
        };
        let Some((content, generation)) = snapshot else {
            log::warn!("Cannot sync bank {}: not in cache", key);
            return false;
        };

        self.counters.record_sync();
        let started = Instant::now();
        let written = self.store.write(key, &content);
        let elapsed = started.elapsed();

        match written {
            Ok(()) => {
                {
                    let mut state = self.lock_state();
                    let unchanged = state
                        .banks
                        .get(key)
                        .is_some_and(|entry| entry.generation == generation);
                    if unchanged {
                        state.pending.remove(key);
                    }
                    state.last_sync.insert(key.clone(), Utc::now());
                    state.timings.record(TimedOperation::Sync, elapsed);
                }
                if elapsed > SLOW_SYNC {
                    log::warn!("Slow sync of bank {}: {:?}", key, elapsed);
                }
                log::debug!("Synced bank {} ({} files)", key, content.len());

                if self.config.diagnostics.enabled {
                    self.verify_after_sync(key, &content);
                }
                true
            }
            Err(e) => {
                self.counters.record_sync_failure();
                self.lock_state().timings.record(TimedOperation::Sync, elapsed);
                self.record_error(
                    format!("Failed to sync bank {} to disk: {}", key, e),
                    Severity::Error,
                    Some(format!("{:?}", e)),
                );
                if self.config.diagnostics.enabled {
                    self.checker
                        .log_diagnostic_info(key, &format!("Sync failed: {}", e));
                }
                false
            }
        }
    }

    fn verify_after_sync(&self, key: &BankKey, written: &BankContent) {
        let (consistent, issues) = self.checker.check_bank_consistency(key, written);
        if consistent {
            return;
        }
        let summary: Vec<String> = issues.iter().map(ToString::to_string).collect();
        self.record_error(
            format!("Post-sync consistency check failed for bank {}", key),
            Severity::Warning,
            Some(summary.join("; ")),
        );
        self.checker
            .log_diagnostic_info(key, "Post-sync consistency check failed");
    }

    pub fn pending_banks(&self) -> Vec<BankKey> {
        self.lock_state().pending.iter().cloned().collect()
    }

    pub fn is_pending(&self, key: &BankKey) -> bool {
        self.lock_state().pending.contains(key)
    }

    pub fn has_bank(&self, key: &BankKey) -> bool {
        self.lock_state().banks.contains_key(key)
    }

    pub fn last_sync_time(&self, key: &BankKey) -> Option<DateTime<Utc>> {
        self.lock_state().last_sync.get(key).copied()
    }

    /// Flush every pending bank in key order
    pub fn sync_all_pending(&self) -> BTreeMap<BankKey, bool> {
        self.pending_banks()
            .into_iter()
            .map(|key| {
                let succeeded = self.flush(&key);
                (key, succeeded)
            })
            .collect()
    }

    /// Compare cached banks with disk.
    ///
    /// With a bank type and id only that bank is checked; with a type only,
    /// every cached bank of that type; with neither, every cached bank.
    pub fn perform_consistency_check(
        &self,
        bank_type: Option<BankType>,
        bank_id: Option<&str>,
    ) -> ConsistencyReport {
        let targets: Vec<(BankKey, BankContent)> = {
            let state = self.lock_state();
            let mut targets: Vec<_> = state
                .banks
                .iter()
                .filter(|(key, _)| match (bank_type, bank_id) {
                    (Some(t), Some(id)) => key.bank_type == t && key.bank_id == id,
                    (Some(t), None) => key.bank_type == t,
                    (None, _) => true,
                })
                .map(|(key, entry)| (key.clone(), entry.content.clone()))
                .collect();
            targets.sort_by(|a, b| a.0.cmp(&b.0));
            targets
        };

        let mut report = ConsistencyReport::default();
        for (key, content) in targets {
            let (consistent, issues) = self.checker.check_bank_consistency(&key, &content);
            if !consistent {
                let summary: Vec<String> = issues.iter().map(ToString::to_string).collect();
                self.checker.log_diagnostic_info(
                    &key,
                    &format!("Consistency check failed: {}", summary.join("; ")),
                );
            }
            report.record(key, &issues);
        }
        log::info!(
            "Consistency check: {} banks checked, {} inconsistent",
            report.banks_checked,
            report.banks_inconsistent
        );
        report
    }

    pub fn diagnostics(&self) -> DiagnosticsReport {
        let counts = self.counters.snapshot();
        let state = self.lock_state();
        DiagnosticsReport {
            timestamp: Utc::now(),
            uptime_seconds: self.started.elapsed().as_secs(),
            operation_counts: counts,
            cache_hit_rate_percent: counts.hit_rate_percent(),
            average_timings_ms: state.timings.averages_ms(),
            cache_size: CacheSizeReport::measure(
                state.banks.iter().map(|(key, entry)| (key, &entry.content)),
            ),
            pending_updates: state.pending.len(),
            error_count: state.errors.len(),
            recent_errors: state.errors.recent(RECENT_ERROR_LIMIT),
        }
    }

    /// Write the diagnostics report as JSON; false when disabled or on failure.
    pub fn export_diagnostics(&self, path: Option<&Path>) -> bool {
        if !self.config.diagnostics.enabled {
            log::warn!("Cannot export diagnostics: diagnostics not enabled");
            return false;
        }
        let report = self.diagnostics();
        let path = match path {
            Some(path) => path.to_path_buf(),
            None => default_export_path(&self.config.diagnostics_dir(), report.timestamp),
        };
        match write_json_file(&path, &report) {
            Ok(()) => {
                log::info!("Exported diagnostics to {}", path.display());
                true
            }
            Err(e) => {
                log::error!("Failed to export diagnostics: {}", e);
                false
            }
        }
    }

    pub fn debug_snapshot(&self) -> DebugSnapshot {
        let state = self.lock_state();
        DebugSnapshot::capture(state.banks.iter().map(|(key, entry)| (key, &entry.content)))
    }

    /// Write the debug snapshot to the configured dump path
    pub fn dump_debug_memory(&self) -> bool {
        let path = self.config.debug_dump_path();
        match write_json_file(&path, &self.debug_snapshot()) {
            Ok(()) => true,
            Err(e) => {
                log::error!("Failed to write debug memory dump {}: {}", path.display(), e);
                false
            }
        }
    }

    pub fn dump_if_enabled(&self) {
        if self.config.diagnostics.debug_memory_dump {
            self.dump_debug_memory();
        }
    }

    /// Most recent errors, oldest first
    pub fn recent_errors(&self, count: usize) -> Vec<ErrorRecord> {
        self.lock_state().errors.recent(count)
    }

    pub fn bridge_stats(&self) -> BridgeStatsSnapshot {
        self.bridge.stats()
    }
}

impl SyncTarget for CacheCore {
    fn flush_bank(&self, key: &BankKey) -> bool {
        self.flush(key)
    }

    fn is_pending(&self, key: &BankKey) -> bool {
        CacheCore::is_pending(self, key)
    }

    fn pending_banks(&self) -> Vec<BankKey> {
        CacheCore::pending_banks(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::content::RuleBasedProcessor;
    use crate::cache::storage::FileBankStore;
    use crate::cache::sync_wrapper::ExecutionContext;
    use crate::cache::traits::{ProcessCall, ProcessorError, StoreError};
    use std::sync::atomic::{AtomicBool, Ordering};
    use tempfile::TempDir;

    /// File store whose writes fail while `failing` is set
    struct FlakyStore {
        inner: FileBankStore,
        failing: AtomicBool,
    }

    impl BankStore for FlakyStore {
        fn load(&self, key: &BankKey) -> Result<Option<BankContent>, StoreError> {
            self.inner.load(key)
        }

        fn create(&self, key: &BankKey) -> Result<BankContent, StoreError> {
            self.inner.create(key)
        }

        fn write(&self, key: &BankKey, content: &BankContent) -> Result<(), StoreError> {
            if self.failing.load(Ordering::SeqCst) {
                return Err(StoreError::Backend("disk unavailable".into()));
            }
            self.inner.write(key, content)
        }
    }

    /// File store whose first write parks until released
    struct GatedStore {
        inner: FileBankStore,
        gated: AtomicBool,
        entered: crossbeam_channel::Sender<()>,
        release: crossbeam_channel::Receiver<()>,
    }

    impl BankStore for GatedStore {
        fn load(&self, key: &BankKey) -> Result<Option<BankContent>, StoreError> {
            self.inner.load(key)
        }

        fn create(&self, key: &BankKey) -> Result<BankContent, StoreError> {
            self.inner.create(key)
        }

        fn write(&self, key: &BankKey, content: &BankContent) -> Result<(), StoreError> {
            if self.gated.swap(false, Ordering::SeqCst) {
                self.entered.send(()).unwrap();
                self.release.recv().unwrap();
            }
            self.inner.write(key, content)
        }
    }

    struct FailingProcessor;

    impl ContentProcessor for FailingProcessor {
        fn name(&self) -> &str {
            "failing"
        }

        fn process(&self, _request: ProcessRequest) -> ProcessCall {
            ProcessCall::Ready(Err(ProcessorError::new("failing", "model offline")))
        }
    }

    fn config(dir: &TempDir) -> CacheConfig {
        let mut config = CacheConfig::with_storage_root(dir.path().join("memory"));
        config.diagnostics.diagnostics_dir = Some(dir.path().join("diag"));
        config.diagnostics.debug_dump_path = Some(dir.path().join("dump.json"));
        config
    }

    fn core_with(
        config: CacheConfig,
        store: Arc<dyn BankStore>,
        processor: Arc<dyn ContentProcessor>,
    ) -> CacheCore {
        CacheCore::new(CacheParts {
            config,
            store,
            processor,
            bridge: ExecutionBridge::new(ExecutionContext::Detached, Duration::from_secs(5)),
        })
    }

    fn core(dir: &TempDir) -> CacheCore {
        let config = config(dir);
        let store = Arc::new(FileBankStore::new(&config.storage_root));
        core_with(config, store, Arc::new(RuleBasedProcessor::new()))
    }

    #[test]
    fn first_access_misses_then_hits() {
        let dir = TempDir::new().unwrap();
        let core = core(&dir);
        let key = BankKey::new(BankType::Project, "demo");

        assert!(core.get_bank(&key).is_empty());
        assert!(core.has_bank(&key));
        assert!(core.last_sync_time(&key).is_some());
        assert!(dir.path().join("memory/projects/demo").is_dir());
        core.get_bank(&key);

        let counts = core.diagnostics().operation_counts;
        assert_eq!(counts.cache_misses, 1);
        assert_eq!(counts.cache_hits, 1);
        assert_eq!(counts.load_operations, 1);
    }

    #[test]
    fn update_marks_pending_until_flushed() {
        let dir = TempDir::new().unwrap();
        let core = core(&dir);
        let key = BankKey::new(BankType::Project, "demo");

        let applied = core
            .apply_update(&key, "We decided to use PostgreSQL as the primary database.")
            .unwrap();
        assert_eq!(applied.target_file, "doc/architecture.md");
        assert_eq!(applied.operation, WriteOperation::Append);
        assert!(core.is_pending(&key));
        assert_eq!(core.pending_banks(), vec![key.clone()]);

        assert!(core.flush(&key));
        assert!(!core.is_pending(&key));
        let on_disk =
            std::fs::read_to_string(dir.path().join("memory/projects/demo/doc/architecture.md"))
                .unwrap();
        assert!(on_disk.contains("PostgreSQL"));
    }

    #[test]
    fn failed_flush_keeps_bank_pending_and_records_error() {
        let dir = TempDir::new().unwrap();
        let config = config(&dir);
        let store = Arc::new(FlakyStore {
            inner: FileBankStore::new(&config.storage_root),
            failing: AtomicBool::new(true),
        });
        let core = core_with(config, store.clone(), Arc::new(RuleBasedProcessor::new()));
        let key = BankKey::new(BankType::Global, "default");

        core.apply_update(&key, "I prefer tabs over spaces").unwrap();
        assert!(!core.flush(&key));
        assert!(core.is_pending(&key));

        let errors = core.recent_errors(10);
        let last = errors.last().unwrap();
        assert_eq!(last.severity, Severity::Error);
        assert!(last.description.starts_with("Failed to sync bank global:default to disk"));
        assert_eq!(core.diagnostics().operation_counts.sync_failures, 1);

        store.failing.store(false, Ordering::SeqCst);
        assert_eq!(core.sync_all_pending().get(&key), Some(&true));
        assert!(core.pending_banks().is_empty());
    }

    #[test]
    fn processor_failure_leaves_bank_untouched() {
        let dir = TempDir::new().unwrap();
        let config = config(&dir);
        let store = Arc::new(FileBankStore::new(&config.storage_root));
        let core = core_with(config, store, Arc::new(FailingProcessor));
        let key = BankKey::new(BankType::Code, "repo");

        let err = core.apply_update(&key, "anything").unwrap_err();
        assert!(matches!(err, CacheOperationError::ProcessError(_)));
        assert!(core.get_bank(&key).is_empty());
        assert!(!core.is_pending(&key));
        assert!(core.recent_errors(1)[0].description.starts_with("Failed to update bank code:repo"));
    }

    #[test]
    fn fallback_rules_take_over_when_enabled() {
        let dir = TempDir::new().unwrap();
        let mut config = config(&dir);
        config.bridge.fallback_to_rules = true;
        let store = Arc::new(FileBankStore::new(&config.storage_root));
        let core = core_with(config, store, Arc::new(FailingProcessor));
        let key = BankKey::new(BankType::Code, "repo");

        let applied = core.apply_update(&key, "Sprint tasks: fix the build").unwrap();
        assert!(applied.bytes_written > 0);
        assert!(core.is_pending(&key));
        assert_eq!(core.recent_errors(1)[0].severity, Severity::Warning);
    }

    #[test]
    fn consistency_check_filters_and_reports_drift() {
        let dir = TempDir::new().unwrap();
        let core = core(&dir);
        let demo = BankKey::new(BankType::Project, "demo");
        let other = BankKey::new(BankType::Project, "other");
        let global = BankKey::new(BankType::Global, "default");

        for key in [&demo, &other, &global] {
            core.apply_update(key, "Meeting notes from the weekly sync").unwrap();
        }
        core.flush(&demo);
        core.flush(&global);

        let report = core.perform_consistency_check(None, None);
        assert_eq!(report.banks_checked, 3);
        assert_eq!(report.banks_inconsistent, 1);

        let projects = core.perform_consistency_check(Some(BankType::Project), None);
        assert_eq!(projects.banks_checked, 2);

        let single = core.perform_consistency_check(Some(BankType::Project), Some("demo"));
        assert_eq!(single.banks_checked, 1);
        assert_eq!(single.banks_consistent, 1);
        assert!(single.details[&demo].consistent);
    }

    #[test]
    fn export_respects_diagnostics_flag() {
        let dir = TempDir::new().unwrap();
        let core = core(&dir);
        let path = dir.path().join("out/report.json");
        core.get_bank(&BankKey::new(BankType::Global, "default"));

        assert!(core.export_diagnostics(Some(path.as_path())));
        let report: DiagnosticsReport =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(report.cache_size.banks_count, 1);

        let mut disabled = config(&dir);
        disabled.diagnostics.enabled = false;
        let store = Arc::new(FileBankStore::new(&disabled.storage_root));
        let quiet = core_with(disabled, store, Arc::new(RuleBasedProcessor::new()));
        assert!(!quiet.export_diagnostics(None));
    }

    #[test]
    fn debug_dump_writes_snapshot() {
        let dir = TempDir::new().unwrap();
        let core = core(&dir);
        let key = BankKey::new(BankType::Project, "demo");
        core.apply_update(&key, "Release v1.2 is done").unwrap();

        assert!(core.dump_debug_memory());
        let dump: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(dir.path().join("dump.json")).unwrap())
                .unwrap();
        assert!(dump["cache"]["project:demo"].is_object());
        assert!(dump["metrics"]["total_tokens"].as_u64().unwrap() > 0);
    }

    #[test]
    fn merge_during_flush_keeps_bank_pending() {
        let dir = TempDir::new().unwrap();
        let config = config(&dir);
        let (entered_tx, entered_rx) = crossbeam_channel::bounded(1);
        let (release_tx, release_rx) = crossbeam_channel::bounded(1);
        let store = Arc::new(GatedStore {
            inner: FileBankStore::new(&config.storage_root),
            gated: AtomicBool::new(true),
            entered: entered_tx,
            release: release_rx,
        });
        let core = Arc::new(core_with(config, store, Arc::new(RuleBasedProcessor::new())));
        let key = BankKey::new(BankType::Project, "demo");
        core.apply_update(&key, "Task list for the sprint").unwrap();

        let flusher = {
            let core = Arc::clone(&core);
            let key = key.clone();
            std::thread::spawn(move || core.flush(&key))
        };
        entered_rx.recv().unwrap();
        core.apply_update(&key, "Task list: write the migration guide").unwrap();
        release_tx.send(()).unwrap();

        let tasks = dir.path().join("memory/projects/demo/tasks.md");
        assert!(flusher.join().unwrap());
        assert!(core.is_pending(&key));
        assert!(!std::fs::read_to_string(&tasks).unwrap().contains("migration guide"));

        assert!(core.flush(&key));
        assert!(!core.is_pending(&key));
        assert!(std::fs::read_to_string(&tasks).unwrap().contains("migration guide"));
    }
}
