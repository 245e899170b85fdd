//! Content processing seam
//!
//! A [`ContentProcessor`] turns free text into a single write against one
//! file of a bank. Processors may answer immediately or hand back a future
//! that the execution bridge drives to completion.

use std::collections::BTreeMap;
use std::future::Future;
use std::pin::Pin;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::cache::traits::CacheOperationError;
use crate::cache::types::{BankContent, BankType};

/// How processed content is combined with the target file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "operation", rename_all = "lowercase")]
pub enum WriteOperation {
    /// Overwrite the file
    Replace,
    /// Add after existing text, separated by a blank line
    Append,
    /// Place inside the `## {position}` section, creating it if missing
    Insert { position: String },
}

impl WriteOperation {
    pub fn name(&self) -> &'static str {
        match self {
            WriteOperation::Replace => "replace",
            WriteOperation::Append => "append",
            WriteOperation::Insert { .. } => "insert",
        }
    }
}

/// Provenance of a processing result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessingMetadata {
    pub category: String,
    pub confidence: f32,
    pub processing_method: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub concepts: BTreeMap<String, Vec<String>>,
    #[serde(default)]
    pub related_files: Vec<String>,
}

impl ProcessingMetadata {
    pub fn new(category: impl Into<String>, processing_method: impl Into<String>) -> Self {
        Self {
            category: category.into(),
            confidence: 0.0,
            processing_method: processing_method.into(),
            timestamp: Utc::now(),
            concepts: BTreeMap::new(),
            related_files: Vec::new(),
        }
    }
}

/// A single write decided by a processor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessedContent {
    /// Path relative to the bank root
    pub target_file: String,
    pub operation: WriteOperation,
    pub content: String,
    pub metadata: ProcessingMetadata,
}

/// Input handed to a processor; owned so deferred work can outlive the caller's borrow
#[derive(Debug, Clone)]
pub struct ProcessRequest {
    pub text: String,
    pub existing: BankContent,
    pub bank_type: BankType,
}

/// Processor failure
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessorError {
    pub processor: String,
    pub message: String,
}

impl ProcessorError {
    pub fn new(processor: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            processor: processor.into(),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for ProcessorError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} processor failed: {}", self.processor, self.message)
    }
}

impl std::error::Error for ProcessorError {}

impl From<ProcessorError> for CacheOperationError {
    fn from(err: ProcessorError) -> Self {
        CacheOperationError::ProcessError(err.to_string())
    }
}

pub type ProcessResult = Result<ProcessedContent, ProcessorError>;

/// Boxed asynchronous processing work
pub type ProcessFuture = Pin<Box<dyn Future<Output = ProcessResult> + Send + 'static>>;

/// Outcome of invoking a processor
pub enum ProcessCall {
    /// Result computed synchronously
    Ready(ProcessResult),
    /// Work that must be driven to completion by the execution bridge
    Deferred(ProcessFuture),
}

impl std::fmt::Debug for ProcessCall {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProcessCall::Ready(result) => f.debug_tuple("Ready").field(result).finish(),
            ProcessCall::Deferred(_) => f.write_str("Deferred(..)"),
        }
    }
}

/// Decides how free text becomes a bank write
pub trait ContentProcessor: Send + Sync {
    fn name(&self) -> &str;

    fn process(&self, request: ProcessRequest) -> ProcessCall;
}
