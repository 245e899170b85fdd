//! Bounded error history
//!
//! Recoverable failures are appended to a ring buffer that keeps only the most
//! recent entries, so long-running caches never grow their error history.

use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::cache::traits::Severity;

/// Maximum number of error records retained
pub const ERROR_LOG_CAPACITY: usize = 100;

/// One recorded failure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorRecord {
    pub timestamp: DateTime<Utc>,
    pub description: String,
    pub severity: Severity,
    /// Underlying cause chain, kept when diagnostics are enabled
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl ErrorRecord {
    pub fn new(description: impl Into<String>, severity: Severity) -> Self {
        Self {
            timestamp: Utc::now(),
            description: description.into(),
            severity,
            detail: None,
        }
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }
}

/// Ring buffer of [`ErrorRecord`]s; the oldest entry is dropped when full
#[derive(Debug, Clone)]
pub struct ErrorLog {
    records: VecDeque<ErrorRecord>,
    capacity: usize,
    total_recorded: u64,
}

impl Default for ErrorLog {
    fn default() -> Self {
        Self::with_capacity(ERROR_LOG_CAPACITY)
    }
}

impl ErrorLog {
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            records: VecDeque::with_capacity(capacity),
            capacity,
            total_recorded: 0,
        }
    }

    /// Append a record, evicting the oldest one at capacity
    pub fn record(&mut self, record: ErrorRecord) {
        match record.severity {
            Severity::Error => log::error!("{}", record.description),
            Severity::Warning => log::warn!("{}", record.description),
            Severity::Info => log::info!("{}", record.description),
        }

        if self.records.len() >= self.capacity {
            self.records.pop_front();
        }
        self.records.push_back(record);
        self.total_recorded += 1;
    }

    /// Most recent `count` records, oldest first
    pub fn recent(&self, count: usize) -> Vec<ErrorRecord> {
        let skip = self.records.len().saturating_sub(count);
        self.records.iter().skip(skip).cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Records ever appended, including evicted ones
    pub fn total_recorded(&self) -> u64 {
        self.total_recorded
    }

    pub fn iter(&self) -> impl Iterator<Item = &ErrorRecord> {
        self.records.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_recording() {
        let mut log = ErrorLog::default();
        log.record(ErrorRecord::new("Failed to sync bank project:demo", Severity::Error));

        assert_eq!(log.len(), 1);
        assert_eq!(log.total_recorded(), 1);
        assert_eq!(log.recent(10)[0].severity, Severity::Error);
    }

    #[test]
    fn test_capacity_drops_oldest() {
        let mut log = ErrorLog::default();
        for i in 0..(ERROR_LOG_CAPACITY + 5) {
            log.record(ErrorRecord::new(format!("error {}", i), Severity::Warning));
        }

        assert_eq!(log.len(), ERROR_LOG_CAPACITY);
        assert_eq!(log.total_recorded(), (ERROR_LOG_CAPACITY + 5) as u64);
        assert_eq!(log.iter().next().unwrap().description, "error 5");
    }

    #[test]
    fn test_recent_returns_tail_in_order() {
        let mut log = ErrorLog::with_capacity(4);
        for i in 0..4 {
            log.record(ErrorRecord::new(format!("e{}", i), Severity::Info));
        }

        let recent: Vec<_> = log.recent(2).into_iter().map(|r| r.description).collect();
        assert_eq!(recent, vec!["e2", "e3"]);
        assert_eq!(log.recent(10).len(), 4);
    }

    #[test]
    fn test_detail_is_omitted_when_absent() {
        let record = ErrorRecord::new("x", Severity::Error);
        let json = serde_json::to_value(&record).unwrap();
        assert!(json.get("detail").is_none());
        assert_eq!(json["severity"], "error");
    }
}
