//! Sync worker lifecycle
//!
//! Start, submit, and bounded stop of the background sync thread.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Instant;

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, bounded, unbounded};

use super::task_processor::{perform_periodic_sync, process_request};
use super::types::{
    SyncRequest, SyncTarget, SyncWorker, WorkerMessage, WorkerStats, WorkerStatsSnapshot,
    WorkerTiming,
};
use crate::cache::traits::CacheOperationError;

/// How the worker came to a stop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopOutcome {
    /// Worker was not running
    NotRunning,
    /// Worker exited within the shutdown timeout and was joined
    Joined,
    /// Worker did not exit in time and was detached
    Forced,
}

impl SyncWorker {
    pub fn new(timing: WorkerTiming) -> Self {
        let (request_sender, request_receiver) = unbounded();
        let (exit_sender, exit_receiver) = bounded(1);
        Self {
            worker_handle: None,
            shutdown: Arc::new(AtomicBool::new(false)),
            request_sender,
            request_receiver: Some(request_receiver),
            exit_sender,
            exit_receiver,
            stats: Arc::new(WorkerStats::default()),
            timing,
        }
    }

    pub fn is_running(&self) -> bool {
        self.worker_handle.is_some()
    }

    pub fn stats(&self) -> WorkerStatsSnapshot {
        self.stats.snapshot()
    }

    /// Start the worker thread. A worker runs at most once.
    pub fn start(&mut self, target: Arc<dyn SyncTarget>) -> Result<(), CacheOperationError> {
        if self.worker_handle.is_some() {
            return Ok(());
        }
        let request_receiver = self.request_receiver.take().ok_or_else(|| {
            CacheOperationError::invalid_configuration("sync worker cannot be restarted")
        })?;

        self.shutdown.store(false, Ordering::Release);
        let handle = Self::spawn_worker(
            Arc::clone(&self.shutdown),
            request_receiver,
            self.exit_sender.clone(),
            target,
            Arc::clone(&self.stats),
            self.timing,
        )?;
        self.worker_handle = Some(handle);
        log::info!(
            "Sync worker started (interval {:?}, poll {:?})",
            self.timing.sync_interval,
            self.timing.poll_interval
        );
        Ok(())
    }

    /// Queue a bank for flushing
    pub fn submit(&self, request: SyncRequest) -> Result<(), CacheOperationError> {
        if !self.is_running() || self.shutdown.load(Ordering::Acquire) {
            return Err(CacheOperationError::WorkerUnavailable);
        }
        self.request_sender
            .send(WorkerMessage::Sync(request))
            .map_err(|_| CacheOperationError::WorkerUnavailable)
    }

    /// Signal shutdown and wait up to the shutdown timeout for the thread to exit
    pub fn stop(&mut self) -> Result<StopOutcome, CacheOperationError> {
        let Some(handle) = self.worker_handle.take() else {
            return Ok(StopOutcome::NotRunning);
        };

        self.shutdown.store(true, Ordering::Release);
        let _ = self.request_sender.send(WorkerMessage::Wake);

        match self.exit_receiver.recv_timeout(self.timing.shutdown_timeout) {
            Ok(()) | Err(RecvTimeoutError::Disconnected) => {
                handle.join().map_err(|_| {
                    CacheOperationError::invalid_configuration("sync worker thread panicked")
                })?;
                log::info!("Sync worker stopped");
                Ok(StopOutcome::Joined)
            }
            Err(RecvTimeoutError::Timeout) => {
                log::warn!(
                    "Sync worker did not stop within {:?}; detaching it",
                    self.timing.shutdown_timeout
                );
                Ok(StopOutcome::Forced)
            }
        }
    }

    fn spawn_worker(
        shutdown: Arc<AtomicBool>,
        request_receiver: Receiver<WorkerMessage>,
        exit_sender: Sender<()>,
        target: Arc<dyn SyncTarget>,
        stats: Arc<WorkerStats>,
        timing: WorkerTiming,
    ) -> Result<JoinHandle<()>, CacheOperationError> {
        thread::Builder::new()
            .name("bank-sync-worker".to_string())
            .spawn(move || {
                let mut next_periodic = Instant::now() + timing.sync_interval;

                while !shutdown.load(Ordering::Acquire) {
                    match request_receiver.recv_timeout(timing.poll_interval) {
                        Ok(WorkerMessage::Sync(request)) => {
                            process_request(target.as_ref(), request, &stats);
                        }
                        Ok(WorkerMessage::Wake) | Err(RecvTimeoutError::Timeout) => {}
                        Err(RecvTimeoutError::Disconnected) => break,
                    }

                    if shutdown.load(Ordering::Acquire) {
                        break;
                    }
                    if Instant::now() >= next_periodic {
                        perform_periodic_sync(target.as_ref(), &stats);
                        next_periodic = Instant::now() + timing.sync_interval;
                    }
                }

                let _ = exit_sender.send(());
            })
            .map_err(|e| CacheOperationError::io_failed(format!("spawning sync worker: {}", e)))
    }
}

impl Drop for SyncWorker {
    fn drop(&mut self) {
        let _ = self.stop();
    }
}
