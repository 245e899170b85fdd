//! Compares cached banks with their on-disk files

use std::fs;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use walkdir::WalkDir;

use super::report::{ConsistencyIssue, DiagnosticFile, DiagnosticSnapshot};
use crate::cache::storage::BankLayout;
use crate::cache::types::{BankContent, BankKey};

/// Read-only checker over the storage layout
#[derive(Debug, Clone)]
pub struct ConsistencyChecker {
    layout: BankLayout,
    diagnostics_dir: PathBuf,
}

impl ConsistencyChecker {
    pub fn new(layout: BankLayout, diagnostics_dir: impl Into<PathBuf>) -> Self {
        Self {
            layout,
            diagnostics_dir: diagnostics_dir.into(),
        }
    }

    pub fn diagnostics_dir(&self) -> &std::path::Path {
        &self.diagnostics_dir
    }

    /// Compare every cached file of a bank byte-for-byte with disk.
    ///
    /// Files present on disk but absent from the cache are not reported.
    pub fn check_bank_consistency(
        &self,
        key: &BankKey,
        content: &BankContent,
    ) -> (bool, Vec<ConsistencyIssue>) {
        let root = match self.layout.checked_bank_root(key) {
            Ok(root) => root,
            Err(e) => {
                log::warn!("Bank {} has no place on disk: {}", key, e);
                return (false, vec![ConsistencyIssue::BankMissing(key.clone())]);
            }
        };
        if !root.exists() {
            log::warn!("Bank {} doesn't exist on disk", key);
            return (false, vec![ConsistencyIssue::BankMissing(key.clone())]);
        }

        let mut issues = Vec::new();
        for (relative, cached) in content {
            let disk_path = root.join(relative);
            if !disk_path.exists() {
                log::warn!("File {} exists in cache but not on disk for bank {}", relative, key);
                issues.push(ConsistencyIssue::FileMissing(relative.clone()));
                continue;
            }
            match fs::read(&disk_path) {
                Ok(bytes) if bytes == cached.as_bytes() => {}
                Ok(_) => {
                    log::warn!(
                        "File {} has different content in cache vs disk for bank {}",
                        relative,
                        key
                    );
                    issues.push(ConsistencyIssue::ContentMismatch(relative.clone()));
                }
                Err(e) => {
                    log::error!("Error reading file {} from disk for bank {}: {}", relative, key, e);
                    issues.push(ConsistencyIssue::ReadError {
                        path: relative.clone(),
                        message: e.to_string(),
                    });
                }
            }
        }

        (issues.is_empty(), issues)
    }

    /// Capture the on-disk state of a bank
    pub fn snapshot(&self, key: &BankKey, issue: &str) -> DiagnosticSnapshot {
        let root = self.layout.bank_root(key);
        let bank_exists = root.exists();
        let mut files = Vec::new();

        if bank_exists {
            for entry in WalkDir::new(&root).sort_by_file_name().into_iter().flatten() {
                if !entry.file_type().is_file() {
                    continue;
                }
                let Ok(relative) = entry.path().strip_prefix(&root) else {
                    continue;
                };
                let metadata = entry.metadata().ok();
                files.push(DiagnosticFile {
                    path: relative.to_string_lossy().replace('\\', "/"),
                    size: metadata.as_ref().map_or(0, |m| m.len()),
                    mtime: metadata
                        .and_then(|m| m.modified().ok())
                        .map(DateTime::<Utc>::from),
                });
            }
        }

        DiagnosticSnapshot {
            timestamp: Utc::now(),
            bank_type: key.bank_type.to_string(),
            bank_id: key.bank_id.clone(),
            issue: issue.to_string(),
            bank_path: root,
            bank_exists,
            files,
        }
    }

    /// Write a diagnostic snapshot file. Failures are logged and swallowed.
    pub fn log_diagnostic_info(&self, key: &BankKey, issue: &str) -> Option<PathBuf> {
        let snapshot = self.snapshot(key, issue);
        let json = match serde_json::to_string_pretty(&snapshot) {
            Ok(json) => json,
            Err(e) => {
                log::error!("Error logging diagnostic information for bank {}: {}", key, e);
                return None;
            }
        };
        log::info!("Diagnostic information for bank {}: {}", key, issue);

        let file_name = format!(
            "{}_{}_{}_diag.json",
            key.bank_type,
            sanitize(&key.bank_id),
            snapshot.timestamp.format("%Y%m%d_%H%M%S")
        );
        let path = self.diagnostics_dir.join(file_name);
        let written = fs::create_dir_all(&self.diagnostics_dir).and_then(|_| fs::write(&path, json));
        match written {
            Ok(()) => {
                log::info!("Wrote diagnostic information to {}", path.display());
                Some(path)
            }
            Err(e) => {
                log::error!("Error logging diagnostic information for bank {}: {}", key, e);
                None
            }
        }
    }
}

fn sanitize(bank_id: &str) -> String {
    bank_id
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '.' { c } else { '_' })
        .collect()
}
