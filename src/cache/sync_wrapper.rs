//! Execution bridge: run asynchronous processor work from synchronous code
//!
//! The cache API is blocking, but content processors may hand back futures.
//! The bridge drives such a future to completion under a timeout, choosing
//! one of three strategies from the caller's [`ExecutionContext`]:
//!
//! - **Detached**: no runtime on this thread. A transient current-thread
//!   runtime is built for the call and dropped afterwards. A detached caller
//!   that turns out to be inside a runtime is handled as busy.
//! - **Idle**: the caller owns a runtime that is not currently driving
//!   anything on this thread. The runtime is driven with `block_on`.
//! - **Busy**: the caller is already inside a running runtime, where blocking
//!   on it would deadlock. The work runs on an isolated thread with its own
//!   runtime and the caller waits on a channel.
//!
//! When the timeout fires the caller gets [`BridgeError::TimedOut`]. Work on
//! an isolated thread is left to finish and its result is discarded.
//!
//! ## Example
//!
//! ```rust,ignore
//! use membank_cache::cache::sync_wrapper::{ExecutionBridge, ExecutionContext};
//! use std::time::Duration;
//!
//! let bridge = ExecutionBridge::new(ExecutionContext::Auto, Duration::from_secs(10));
//! let answer = bridge.run_async_safely(async { 6 * 7 })?;
//! ```

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use crossbeam_channel::RecvTimeoutError;
use crossbeam_utils::CachePadded;
use serde::{Deserialize, Serialize};
use tokio::runtime::{Builder, Handle, Runtime};

use crate::cache::storage::layout::{BANK_FILE_EXTENSION, validate_bank_file};
use crate::cache::traits::{CacheOperationError, ProcessCall, ProcessedContent, WriteOperation};

/// Where the calling thread stands with respect to an async scheduler
#[derive(Clone, Default)]
pub enum ExecutionContext {
    /// Decide per call: busy if a tokio runtime is current, detached otherwise
    #[default]
    Auto,
    /// No scheduler available
    Detached,
    /// A runtime owned by the caller and idle on this thread
    Idle(Arc<Runtime>),
    /// Caller is inside a running scheduler
    Busy,
}

impl std::fmt::Debug for ExecutionContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExecutionContext::Auto => f.write_str("Auto"),
            ExecutionContext::Detached => f.write_str("Detached"),
            ExecutionContext::Idle(_) => f.write_str("Idle(..)"),
            ExecutionContext::Busy => f.write_str("Busy"),
        }
    }
}

/// Concrete strategy used for one call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BridgeStrategy {
    TransientRuntime,
    DriveIdleRuntime,
    IsolatedThread,
}

impl ExecutionContext {
    pub fn strategy(&self) -> BridgeStrategy {
        let inside_runtime = Handle::try_current().is_ok();
        match self {
            // block_on from inside a runtime panics, so any context observed
            // from async code is treated as busy.
            _ if inside_runtime => BridgeStrategy::IsolatedThread,
            ExecutionContext::Auto | ExecutionContext::Detached => BridgeStrategy::TransientRuntime,
            ExecutionContext::Idle(_) => BridgeStrategy::DriveIdleRuntime,
            ExecutionContext::Busy => BridgeStrategy::IsolatedThread,
        }
    }
}

/// Lifecycle of a single bridged call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallState {
    Pending,
    Running,
    Completed,
    Failed,
    TimedOut,
}

impl CallState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, CallState::Completed | CallState::Failed | CallState::TimedOut)
    }
}

#[derive(Debug)]
struct BridgeCall {
    id: u64,
    strategy: BridgeStrategy,
    state: CallState,
    started: Instant,
}

impl BridgeCall {
    fn new(id: u64, strategy: BridgeStrategy) -> Self {
        Self {
            id,
            strategy,
            state: CallState::Pending,
            started: Instant::now(),
        }
    }

    fn transition(&mut self, next: CallState) {
        debug_assert!(!self.state.is_terminal(), "bridge call already finished");
        log::debug!(
            "Bridge call {} ({:?}): {:?} -> {:?} after {:?}",
            self.id,
            self.strategy,
            self.state,
            next,
            self.started.elapsed()
        );
        self.state = next;
    }
}

/// Execution bridge failure
#[derive(Debug, Clone, PartialEq)]
pub enum BridgeError {
    TimedOut {
        after: Duration,
        strategy: BridgeStrategy,
    },
    Failed(String),
    Validation(String),
    Runtime(String),
}

impl std::fmt::Display for BridgeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BridgeError::TimedOut { after, strategy } => {
                write!(f, "async work timed out after {:?} ({:?})", after, strategy)
            }
            BridgeError::Failed(msg) => write!(f, "async work failed: {}", msg),
            BridgeError::Validation(msg) => write!(f, "invalid processor output: {}", msg),
            BridgeError::Runtime(msg) => write!(f, "runtime unavailable: {}", msg),
        }
    }
}

impl std::error::Error for BridgeError {}

impl From<BridgeError> for CacheOperationError {
    fn from(err: BridgeError) -> Self {
        match err {
            BridgeError::TimedOut { after, .. } => CacheOperationError::BridgeTimeout(after),
            BridgeError::Validation(msg) => CacheOperationError::ValidationError(msg),
            other => CacheOperationError::ProcessError(other.to_string()),
        }
    }
}

/// Terminal-state counters for bridged calls
#[derive(Debug, Default)]
pub struct BridgeStats {
    started: CachePadded<AtomicU64>,
    completed: CachePadded<AtomicU64>,
    failed: CachePadded<AtomicU64>,
    timed_out: CachePadded<AtomicU64>,
    isolated: CachePadded<AtomicU64>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BridgeStatsSnapshot {
    pub started: u64,
    pub completed: u64,
    pub failed: u64,
    pub timed_out: u64,
    /// Calls that ran on an isolated thread
    pub isolated: u64,
}

impl BridgeStats {
    fn record(&self, state: CallState) {
        let counter = match state {
            CallState::Completed => &self.completed,
            CallState::Failed => &self.failed,
            CallState::TimedOut => &self.timed_out,
            CallState::Pending | CallState::Running => return,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> BridgeStatsSnapshot {
        BridgeStatsSnapshot {
            started: self.started.load(Ordering::Relaxed),
            completed: self.completed.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            timed_out: self.timed_out.load(Ordering::Relaxed),
            isolated: self.isolated.load(Ordering::Relaxed),
        }
    }
}

/// Drives async work from synchronous callers
#[derive(Debug)]
pub struct ExecutionBridge {
    context: ExecutionContext,
    timeout: Duration,
    next_call_id: AtomicU64,
    stats: BridgeStats,
}

impl ExecutionBridge {
    pub fn new(context: ExecutionContext, timeout: Duration) -> Self {
        Self {
            context,
            timeout,
            next_call_id: AtomicU64::new(1),
            stats: BridgeStats::default(),
        }
    }

    pub fn context(&self) -> &ExecutionContext {
        &self.context
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn stats(&self) -> BridgeStatsSnapshot {
        self.stats.snapshot()
    }

    /// Run `work` to completion with the configured timeout
    pub fn run_async_safely<F, T>(&self, work: F) -> Result<T, BridgeError>
    where
        F: Future<Output = T> + Send + 'static,
        T: Send + 'static,
    {
        self.run_with_timeout(work, self.timeout)
    }

    /// Run `work` to completion, giving up after `timeout`
    pub fn run_with_timeout<F, T>(&self, work: F, timeout: Duration) -> Result<T, BridgeError>
    where
        F: Future<Output = T> + Send + 'static,
        T: Send + 'static,
    {
        let strategy = self.context.strategy();
        let mut call = BridgeCall::new(self.next_call_id.fetch_add(1, Ordering::Relaxed), strategy);
        self.stats.started.fetch_add(1, Ordering::Relaxed);
        call.transition(CallState::Running);

        let outcome = match (&self.context, strategy) {
            (ExecutionContext::Idle(runtime), BridgeStrategy::DriveIdleRuntime) => {
                drive_idle_runtime(runtime, work, timeout)
            }
            (_, BridgeStrategy::IsolatedThread) => {
                self.stats.isolated.fetch_add(1, Ordering::Relaxed);
                run_isolated(call.id, work, timeout)
            }
            _ => run_transient(work, timeout),
        };

        let terminal = match &outcome {
            Ok(_) => CallState::Completed,
            Err(BridgeError::TimedOut { .. }) => CallState::TimedOut,
            Err(_) => CallState::Failed,
        };
        call.transition(terminal);
        self.stats.record(terminal);

        if terminal == CallState::TimedOut {
            log::warn!(
                "Bridge call {} timed out after {:?} using {:?}",
                call.id,
                timeout,
                strategy
            );
        }
        outcome.map_err(|e| match e {
            BridgeError::TimedOut { after, .. } => BridgeError::TimedOut { after, strategy },
            other => other,
        })
    }

    /// Resolve a processor call and validate its output
    pub fn process_content_sync(&self, call: ProcessCall) -> Result<ProcessedContent, BridgeError> {
        let result = match call {
            ProcessCall::Ready(result) => result,
            ProcessCall::Deferred(work) => self.run_async_safely(work)?,
        };
        let processed = result.map_err(|e| BridgeError::Failed(e.to_string()))?;
        validate_processed(&processed)?;
        Ok(processed)
    }
}

fn timed_out(after: Duration) -> BridgeError {
    // Strategy is filled in by the caller.
    BridgeError::TimedOut {
        after,
        strategy: BridgeStrategy::TransientRuntime,
    }
}

fn run_transient<F, T>(work: F, timeout: Duration) -> Result<T, BridgeError>
where
    F: Future<Output = T>,
{
    let runtime = Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|e| BridgeError::Runtime(e.to_string()))?;
    runtime
        .block_on(async { tokio::time::timeout(timeout, work).await })
        .map_err(|_| timed_out(timeout))
}

fn drive_idle_runtime<F, T>(runtime: &Runtime, work: F, timeout: Duration) -> Result<T, BridgeError>
where
    F: Future<Output = T>,
{
    runtime
        .block_on(async { tokio::time::timeout(timeout, work).await })
        .map_err(|_| timed_out(timeout))
}

fn run_isolated<F, T>(call_id: u64, work: F, timeout: Duration) -> Result<T, BridgeError>
where
    F: Future<Output = T> + Send + 'static,
    T: Send + 'static,
{
    let (result_tx, result_rx) = crossbeam_channel::bounded(1);

    std::thread::Builder::new()
        .name(format!("bank-bridge-{}", call_id))
        .spawn(move || {
            let outcome = Builder::new_current_thread()
                .enable_all()
                .build()
                .map(|runtime| runtime.block_on(work))
                .map_err(|e| BridgeError::Runtime(e.to_string()));
            // Receiver is gone if the caller already timed out.
            let _ = result_tx.send(outcome);
        })
        .map_err(|e| BridgeError::Runtime(format!("failed to spawn bridge thread: {}", e)))?;

    match result_rx.recv_timeout(timeout) {
        Ok(outcome) => outcome,
        Err(RecvTimeoutError::Timeout) => Err(timed_out(timeout)),
        Err(RecvTimeoutError::Disconnected) => Err(BridgeError::Failed(
            "bridge thread exited without a result".to_string(),
        )),
    }
}

/// Shape checks applied to every processor result before merging
pub fn validate_processed(processed: &ProcessedContent) -> Result<(), BridgeError> {
    validate_bank_file(&processed.target_file).map_err(|_| {
        BridgeError::Validation(format!(
            "target_file '{}' must be a relative .{} path inside the bank",
            processed.target_file, BANK_FILE_EXTENSION
        ))
    })?;
    match &processed.operation {
        WriteOperation::Insert { position } if position.trim().is_empty() => Err(
            BridgeError::Validation("insert operation requires a position".to_string()),
        ),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::traits::{ProcessingMetadata, ProcessorError};

    fn bridge(context: ExecutionContext) -> ExecutionBridge {
        ExecutionBridge::new(context, Duration::from_secs(5))
    }

    async fn slow_answer() -> u32 {
        tokio::time::sleep(Duration::from_millis(10)).await;
        42
    }

    fn processed(target_file: &str, operation: WriteOperation) -> ProcessedContent {
        ProcessedContent {
            target_file: target_file.to_string(),
            operation,
            content: "text".to_string(),
            metadata: ProcessingMetadata::new("default", "test"),
        }
    }

    #[test]
    fn detached_context_uses_transient_runtime() {
        let bridge = bridge(ExecutionContext::Detached);
        assert_eq!(bridge.context().strategy(), BridgeStrategy::TransientRuntime);
        assert_eq!(bridge.run_async_safely(slow_answer()).unwrap(), 42);
        assert_eq!(bridge.stats().completed, 1);
    }

    #[test]
    fn idle_context_drives_callers_runtime() {
        let runtime = Arc::new(
            Builder::new_multi_thread()
                .worker_threads(1)
                .enable_all()
                .build()
                .unwrap(),
        );
        let bridge = bridge(ExecutionContext::Idle(runtime));
        assert_eq!(bridge.context().strategy(), BridgeStrategy::DriveIdleRuntime);
        assert_eq!(bridge.run_async_safely(slow_answer()).unwrap(), 42);
    }

    #[test]
    fn busy_context_runs_on_isolated_thread() {
        let bridge = bridge(ExecutionContext::Busy);
        assert_eq!(bridge.run_async_safely(slow_answer()).unwrap(), 42);
        assert_eq!(bridge.stats().isolated, 1);
    }

    #[tokio::test]
    async fn auto_inside_runtime_does_not_deadlock() {
        let bridge = bridge(ExecutionContext::Auto);
        assert_eq!(bridge.context().strategy(), BridgeStrategy::IsolatedThread);
        assert_eq!(bridge.run_async_safely(slow_answer()).unwrap(), 42);
    }

    #[tokio::test]
    async fn detached_inside_runtime_falls_back_to_isolated_thread() {
        let bridge = bridge(ExecutionContext::Detached);
        assert_eq!(bridge.context().strategy(), BridgeStrategy::IsolatedThread);
        assert_eq!(bridge.run_async_safely(slow_answer()).unwrap(), 42);
        assert_eq!(bridge.stats().isolated, 1);
    }

    #[test]
    fn auto_outside_runtime_is_detached() {
        assert_eq!(ExecutionContext::Auto.strategy(), BridgeStrategy::TransientRuntime);
    }

    #[test]
    fn transient_timeout_reports_timed_out() {
        let bridge = ExecutionBridge::new(ExecutionContext::Detached, Duration::from_millis(20));
        let err = bridge
            .run_async_safely(async {
                tokio::time::sleep(Duration::from_secs(5)).await;
            })
            .unwrap_err();

        assert!(matches!(
            err,
            BridgeError::TimedOut {
                strategy: BridgeStrategy::TransientRuntime,
                ..
            }
        ));
        assert_eq!(bridge.stats().timed_out, 1);
    }

    #[test]
    fn isolated_timeout_returns_without_waiting_for_work() {
        let bridge = ExecutionBridge::new(ExecutionContext::Busy, Duration::from_millis(20));
        let started = Instant::now();
        let err = bridge
            .run_async_safely(async {
                tokio::time::sleep(Duration::from_secs(2)).await;
            })
            .unwrap_err();

        assert!(started.elapsed() < Duration::from_secs(1));
        assert_eq!(
            CacheOperationError::from(err),
            CacheOperationError::BridgeTimeout(Duration::from_millis(20))
        );
    }

    #[test]
    fn deferred_processor_output_is_validated() {
        let bridge = bridge(ExecutionContext::Detached);
        let call = ProcessCall::Deferred(Box::pin(async {
            Ok::<_, ProcessorError>(processed("../outside.md", WriteOperation::Append))
        }));
        assert!(matches!(
            bridge.process_content_sync(call),
            Err(BridgeError::Validation(_))
        ));
    }

    #[test]
    fn processor_failure_maps_to_failed() {
        let bridge = bridge(ExecutionContext::Detached);
        let call = ProcessCall::Ready(Err(ProcessorError::new("llm", "quota exceeded")));
        let err = bridge.process_content_sync(call).unwrap_err();
        assert_eq!(
            err,
            BridgeError::Failed("llm processor failed: quota exceeded".to_string())
        );
    }

    #[test]
    fn validation_rules() {
        assert!(validate_processed(&processed("readme.md", WriteOperation::Replace)).is_ok());
        assert!(validate_processed(&processed("", WriteOperation::Append)).is_err());
        assert!(validate_processed(&processed("/abs.md", WriteOperation::Append)).is_err());
        assert!(validate_processed(&processed("notes.txt", WriteOperation::Append)).is_err());
        let empty_insert = WriteOperation::Insert {
            position: String::new(),
        };
        assert!(validate_processed(&processed("readme.md", empty_insert)).is_err());
    }
}
