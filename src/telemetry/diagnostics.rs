//! Diagnostics report
//!
//! Point-in-time view of cache activity, sizes, and recent errors, exported
//! as pretty-printed JSON for operators.

use std::collections::BTreeMap;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::cache::traits::CacheOperationError;
use crate::cache::types::statistics::{ErrorRecord, OperationCounts};
use crate::cache::types::{BankContent, BankKey, content_size, estimate_tokens};

/// Errors included in `recent_errors`
pub const RECENT_ERROR_LIMIT: usize = 10;

/// Size of one cached bank
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BankSize {
    pub files_count: usize,
    pub character_size: usize,
    pub estimated_tokens: usize,
}

/// Aggregate size of everything cached
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheSizeReport {
    pub banks_count: usize,
    pub total_files: usize,
    pub total_character_size: usize,
    pub estimated_total_tokens: usize,
    pub banks: BTreeMap<String, BankSize>,
}

impl CacheSizeReport {
    pub fn measure<'a>(banks: impl IntoIterator<Item = (&'a BankKey, &'a BankContent)>) -> Self {
        let mut report = CacheSizeReport::default();
        for (key, content) in banks {
            let character_size = content_size(content);
            let size = BankSize {
                files_count: content.len(),
                character_size,
                estimated_tokens: estimate_tokens(character_size),
            };
            report.banks_count += 1;
            report.total_files += size.files_count;
            report.total_character_size += character_size;
            report.banks.insert(key.to_string(), size);
        }
        report.estimated_total_tokens = estimate_tokens(report.total_character_size);
        report
    }
}

/// Full diagnostics document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiagnosticsReport {
    pub timestamp: DateTime<Utc>,
    pub uptime_seconds: u64,
    pub operation_counts: OperationCounts,
    pub cache_hit_rate_percent: f64,
    pub average_timings_ms: BTreeMap<String, f64>,
    pub cache_size: CacheSizeReport,
    pub pending_updates: usize,
    /// Errors currently retained in the bounded error log
    pub error_count: usize,
    pub recent_errors: Vec<ErrorRecord>,
}

/// Serialize `value` as pretty JSON to `path`, creating parent directories.
pub fn write_json_file<T: Serialize>(path: &Path, value: &T) -> Result<(), CacheOperationError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_string_pretty(value)?;
    std::fs::write(path, json)?;
    Ok(())
}

/// Default export location: `{dir}/cache_diagnostics_{YYYYMMDD_HHMMSS}.json`
pub fn default_export_path(diagnostics_dir: &Path, at: DateTime<Utc>) -> std::path::PathBuf {
    diagnostics_dir.join(format!("cache_diagnostics_{}.json", at.format("%Y%m%d_%H%M%S")))
}
