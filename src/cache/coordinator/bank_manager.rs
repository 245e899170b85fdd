//! Bank cache manager
//!
//! Owns the shared [`CacheCore`] and the [`SyncWorker`] that flushes it, and
//! decides per update whether to write through immediately.
//!
//! Updates hold a shared lifecycle guard until they return; `close` takes it
//! exclusively, so every update that got in is drained before shutdown.

use std::sync::{Arc, Mutex, PoisonError, RwLock};

use super::cache_core::{AppliedUpdate, CacheCore, CacheParts};
use crate::cache::config::CacheConfig;
use crate::cache::sync_wrapper::ExecutionBridge;
use crate::cache::traits::{BankStore, CacheOperationError, ContentProcessor};
use crate::cache::types::BankKey;
use crate::cache::worker::{
    StopOutcome, SyncRequest, SyncTarget, SyncWorker, WorkerStatsSnapshot, WorkerTiming,
};

/// Result of a successful update
#[derive(Debug, Clone, PartialEq)]
pub struct UpdateOutcome {
    pub applied: AppliedUpdate,
    /// Whether a write-through was attempted
    pub priority: bool,
    /// Whether the bank was clean on disk when the update returned
    pub flushed: bool,
}

#[derive(Debug)]
pub struct BankCacheManager {
    core: Arc<CacheCore>,
    worker: Mutex<SyncWorker>,
    /// `true` once closed; read-held by in-flight updates
    closed: RwLock<bool>,
}

impl BankCacheManager {
    pub fn new(
        config: CacheConfig,
        store: Arc<dyn BankStore>,
        processor: Arc<dyn ContentProcessor>,
        bridge: ExecutionBridge,
    ) -> Result<Self, CacheOperationError> {
        config.validate()?;
        let timing = WorkerTiming {
            sync_interval: config.worker.sync_interval(),
            poll_interval: config.worker.poll_interval(),
            shutdown_timeout: config.worker.shutdown_timeout(),
        };
        let start_worker = config.worker.start_on_build;

        let core = Arc::new(CacheCore::new(CacheParts {
            config,
            store,
            processor,
            bridge,
        }));
        let mut worker = SyncWorker::new(timing);
        if start_worker {
            worker.start(Arc::clone(&core) as Arc<dyn SyncTarget>)?;
        }

        log::info!(
            "Memory bank cache ready at {}",
            core.config().storage_root.display()
        );
        Ok(Self {
            core,
            worker: Mutex::new(worker),
            closed: RwLock::new(false),
        })
    }

    pub fn core(&self) -> &CacheCore {
        &self.core
    }

    pub fn is_closed(&self) -> bool {
        *self.closed.read().unwrap_or_else(PoisonError::into_inner)
    }

    /// Start the background worker if it is not already running
    pub fn start_worker(&self) -> Result<(), CacheOperationError> {
        if self.is_closed() {
            return Err(CacheOperationError::WorkerUnavailable);
        }
        let mut worker = self.worker.lock().unwrap_or_else(PoisonError::into_inner);
        worker.start(Arc::clone(&self.core) as Arc<dyn SyncTarget>)
    }

    pub fn worker_running(&self) -> bool {
        self.worker
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_running()
    }

    pub fn worker_stats(&self) -> WorkerStatsSnapshot {
        self.worker
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .stats()
    }

    pub fn get_bank(&self, key: &BankKey) -> crate::cache::types::BankContent {
        self.core.get_bank(key)
    }

    /// Merge `text` into a bank and schedule it for writing.
    ///
    /// Immediate updates, and updates whose new content exceeds the
    /// large-update threshold, are flushed before returning. A failed
    /// flush leaves the bank pending for the worker to retry.
    pub fn update_bank(
        &self,
        key: &BankKey,
        text: &str,
        immediate: bool,
    ) -> Result<UpdateOutcome, CacheOperationError> {
        key.validate()?;
        let closed = self.closed.read().unwrap_or_else(PoisonError::into_inner);
        if *closed {
            return Err(CacheOperationError::WorkerUnavailable);
        }

        let applied = self.core.apply_update(key, text)?;
        let priority =
            immediate || applied.bytes_written > self.core.config().large_update_threshold_bytes;

        let request = SyncRequest {
            key: key.clone(),
            priority,
        };
        if let Err(e) = self
            .worker
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .submit(request)
        {
            log::debug!("Sync of bank {} not queued: {}", key, e);
        }

        let flushed = if priority {
            self.core.flush(key)
        } else {
            false
        };
        self.core.dump_if_enabled();
        drop(closed);

        Ok(UpdateOutcome {
            applied,
            priority,
            flushed,
        })
    }

    /// Flush everything pending and stop the worker. Safe to call repeatedly.
    pub fn close(&self) {
        {
            // Waits for in-flight updates to finish merging.
            let mut closed = self.closed.write().unwrap_or_else(PoisonError::into_inner);
            if *closed {
                return;
            }
            *closed = true;
        }

        let results = self.core.sync_all_pending();
        let failed = results.values().filter(|ok| !**ok).count();
        if failed > 0 {
            log::warn!("{} banks could not be synced on close", failed);
        }

        let mut worker = self.worker.lock().unwrap_or_else(PoisonError::into_inner);
        match worker.stop() {
            Ok(StopOutcome::Forced) => {
                log::warn!("Sync worker was detached during close");
            }
            Ok(_) => {}
            Err(e) => log::error!("Error stopping sync worker: {}", e),
        }
        log::info!("Memory bank cache closed");
    }
}

impl Drop for BankCacheManager {
    fn drop(&mut self) {
        self.close();
    }
}
