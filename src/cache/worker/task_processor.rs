//! Request processing and periodic sync for the worker thread

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::atomic::Ordering;

use super::types::{SyncRequest, SyncTarget, WorkerStats};
use crate::cache::types::BankKey;

/// Flush one bank, treating a panic in the store as a failed flush
fn flush_guarded(target: &dyn SyncTarget, key: &BankKey) -> bool {
    match catch_unwind(AssertUnwindSafe(|| target.flush_bank(key))) {
        Ok(succeeded) => succeeded,
        Err(_) => {
            log::error!("Flush of bank {} panicked; it stays pending", key);
            false
        }
    }
}

/// Handle one dequeued sync request
pub fn process_request(target: &dyn SyncTarget, request: SyncRequest, stats: &WorkerStats) {
    stats.requests_processed.fetch_add(1, Ordering::Relaxed);

    // Already flushed by a priority update or an earlier tick.
    if !target.is_pending(&request.key) {
        stats.requests_skipped.fetch_add(1, Ordering::Relaxed);
        return;
    }

    let succeeded = flush_guarded(target, &request.key);
    stats.record_flush(succeeded);
    if !succeeded {
        log::warn!(
            "Queued sync of bank {} failed; retrying on the next periodic run",
            request.key
        );
    }
}

/// Flush every pending bank; returns the number that failed
pub fn perform_periodic_sync(target: &dyn SyncTarget, stats: &WorkerStats) -> usize {
    stats.mark_periodic_run();
    let pending = target.pending_banks();
    if pending.is_empty() {
        return 0;
    }

    log::info!("Periodic sync of {} pending banks", pending.len());
    let mut failures = 0;
    for key in pending {
        let succeeded = flush_guarded(target, &key);
        stats.record_flush(succeeded);
        if !succeeded {
            failures += 1;
        }
    }
    if failures > 0 {
        log::warn!("Periodic sync left {} banks pending", failures);
    }
    failures
}
