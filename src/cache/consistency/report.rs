//! Consistency findings and report shapes

use std::collections::BTreeMap;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::cache::types::BankKey;

/// One discrepancy between the cache and disk
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsistencyIssue {
    BankMissing(BankKey),
    FileMissing(String),
    ContentMismatch(String),
    ReadError { path: String, message: String },
}

impl std::fmt::Display for ConsistencyIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConsistencyIssue::BankMissing(key) => write!(
                f,
                "Bank {}:{} doesn't exist on disk",
                key.bank_type, key.bank_id
            ),
            ConsistencyIssue::FileMissing(path) => {
                write!(f, "File {} exists in cache but not on disk", path)
            }
            ConsistencyIssue::ContentMismatch(path) => {
                write!(f, "File {} has different content in cache vs disk", path)
            }
            ConsistencyIssue::ReadError { path, message } => {
                write!(f, "Error reading file {} from disk: {}", path, message)
            }
        }
    }
}

/// Outcome for one bank
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BankConsistency {
    pub consistent: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub issues: Vec<String>,
}

/// Result of checking one or more cached banks
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsistencyReport {
    pub timestamp: DateTime<Utc>,
    pub banks_checked: usize,
    pub banks_consistent: usize,
    pub banks_inconsistent: usize,
    pub details: BTreeMap<BankKey, BankConsistency>,
}

impl Default for ConsistencyReport {
    fn default() -> Self {
        Self {
            timestamp: Utc::now(),
            banks_checked: 0,
            banks_consistent: 0,
            banks_inconsistent: 0,
            details: BTreeMap::new(),
        }
    }
}

impl ConsistencyReport {
    pub fn record(&mut self, key: BankKey, issues: &[ConsistencyIssue]) {
        let consistent = issues.is_empty();
        self.banks_checked += 1;
        if consistent {
            self.banks_consistent += 1;
        } else {
            self.banks_inconsistent += 1;
        }
        self.details.insert(
            key,
            BankConsistency {
                consistent,
                issues: issues.iter().map(ToString::to_string).collect(),
            },
        );
    }
}

/// File entry of a [`DiagnosticSnapshot`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiagnosticFile {
    pub path: String,
    pub size: u64,
    pub mtime: Option<DateTime<Utc>>,
}

/// On-disk state of a bank captured when an issue is detected
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiagnosticSnapshot {
    pub timestamp: DateTime<Utc>,
    pub bank_type: String,
    pub bank_id: String,
    pub issue: String,
    pub bank_path: PathBuf,
    pub bank_exists: bool,
    pub files: Vec<DiagnosticFile>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::types::BankType;

    #[test]
    fn issue_messages() {
        let key = BankKey::new(BankType::Project, "demo");
        assert_eq!(
            ConsistencyIssue::BankMissing(key).to_string(),
            "Bank project:demo doesn't exist on disk"
        );
        assert_eq!(
            ConsistencyIssue::ContentMismatch("readme.md".into()).to_string(),
            "File readme.md has different content in cache vs disk"
        );
    }

    #[test]
    fn report_tallies_banks() {
        let mut report = ConsistencyReport::default();
        report.record(BankKey::new(BankType::Global, "default"), &[]);
        report.record(
            BankKey::new(BankType::Code, "repo"),
            &[ConsistencyIssue::FileMissing("snippets.md".into())],
        );

        assert_eq!(report.banks_checked, 2);
        assert_eq!(report.banks_consistent, 1);
        assert_eq!(report.banks_inconsistent, 1);
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["details"]["global:default"]["consistent"], true);
        assert!(json["details"]["global:default"].get("issues").is_none());
        assert_eq!(
            json["details"]["code:repo"]["issues"][0],
            "File snippets.md exists in cache but not on disk"
        );
    }
}
