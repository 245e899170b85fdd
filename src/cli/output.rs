//! Output formatting for CLI commands
//!
//! Human-readable, JSON, and quiet renderings of cache results.

use clap::ValueEnum;
use serde::Serialize;

use crate::cache::consistency::ConsistencyReport;
use crate::cache::types::statistics::ErrorRecord;
use crate::cache::types::{BankContent, BankKey};
use crate::membank::UpdateResponse;
use crate::telemetry::DiagnosticsReport;

/// Output format options
#[derive(Clone, Debug, PartialEq, ValueEnum, Default)]
pub enum OutputFormat {
    /// Human-readable output (default)
    #[default]
    Human,
    /// JSON output
    Json,
    /// Quiet mode (minimal output)
    Quiet,
}

fn to_json<T: Serialize>(value: &T) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| "null".to_string())
}

/// Format the files of a bank
pub fn format_bank(key: &BankKey, content: &BankContent, format: &OutputFormat) -> String {
    match format {
        OutputFormat::Human => {
            if content.is_empty() {
                return format!("Bank {} is empty", key);
            }
            content
                .iter()
                .map(|(path, text)| format!("=== {} ===\n{}", path, text.trim_end()))
                .collect::<Vec<_>>()
                .join("\n\n")
        }
        OutputFormat::Json => to_json(content),
        OutputFormat::Quiet => content.keys().cloned().collect::<Vec<_>>().join("\n"),
    }
}

/// Format an update response
pub fn format_update(key: &BankKey, response: &UpdateResponse, format: &OutputFormat) -> String {
    match format {
        OutputFormat::Human => match &response.error {
            None => format!("✓ Updated bank {}", key),
            Some(error) => format!("✗ Update of bank {} failed: {}", key, error),
        },
        OutputFormat::Json => to_json(response),
        OutputFormat::Quiet => response.status.clone(),
    }
}

/// Format per-bank sync results
pub fn format_sync_results(
    results: &std::collections::BTreeMap<BankKey, bool>,
    format: &OutputFormat,
) -> String {
    match format {
        OutputFormat::Human => {
            if results.is_empty() {
                return "No pending banks".to_string();
            }
            results
                .iter()
                .map(|(key, ok)| format!("{} {}", if *ok { "✓" } else { "✗" }, key))
                .collect::<Vec<_>>()
                .join("\n")
        }
        OutputFormat::Json => to_json(results),
        OutputFormat::Quiet => {
            let synced = results.values().filter(|ok| **ok).count();
            format!("{}/{}", synced, results.len())
        }
    }
}

/// Format a consistency report
pub fn format_consistency(report: &ConsistencyReport, format: &OutputFormat) -> String {
    match format {
        OutputFormat::Human => {
            let mut lines = vec![format!(
                "Checked {} banks: {} consistent, {} inconsistent",
                report.banks_checked, report.banks_consistent, report.banks_inconsistent
            )];
            for (key, bank) in &report.details {
                if bank.consistent {
                    continue;
                }
                lines.push(format!("✗ {}", key));
                lines.extend(bank.issues.iter().map(|issue| format!("    {}", issue)));
            }
            lines.join("\n")
        }
        OutputFormat::Json => to_json(report),
        OutputFormat::Quiet => report.banks_inconsistent.to_string(),
    }
}

/// Format the diagnostics report
pub fn format_diagnostics(report: &DiagnosticsReport, format: &OutputFormat) -> String {
    match format {
        OutputFormat::Human => {
            let counts = &report.operation_counts;
            let mut lines = vec![
                format!("Uptime: {}s", report.uptime_seconds),
                format!(
                    "Hits: {}  Misses: {}  Hit rate: {:.1}%",
                    counts.cache_hits, counts.cache_misses, report.cache_hit_rate_percent
                ),
                format!(
                    "Loads: {}  Updates: {}  Syncs: {} ({} failed)",
                    counts.load_operations,
                    counts.update_operations,
                    counts.sync_operations,
                    counts.sync_failures
                ),
                format!(
                    "Banks: {}  Files: {}  Estimated tokens: {}",
                    report.cache_size.banks_count,
                    report.cache_size.total_files,
                    report.cache_size.estimated_total_tokens
                ),
                format!(
                    "Pending: {}  Errors: {}",
                    report.pending_updates, report.error_count
                ),
            ];
            for (operation, average) in &report.average_timings_ms {
                lines.push(format!("{}: {:.2}", operation, average));
            }
            lines.join("\n")
        }
        OutputFormat::Json => to_json(report),
        OutputFormat::Quiet => report.error_count.to_string(),
    }
}

/// Format recorded errors
pub fn format_errors(errors: &[ErrorRecord], format: &OutputFormat) -> String {
    match format {
        OutputFormat::Human => {
            if errors.is_empty() {
                return "No errors recorded".to_string();
            }
            errors
                .iter()
                .map(|record| {
                    format!(
                        "[{}] {}: {}",
                        record.timestamp.format("%Y-%m-%d %H:%M:%S"),
                        record.severity,
                        record.description
                    )
                })
                .collect::<Vec<_>>()
                .join("\n")
        }
        OutputFormat::Json => to_json(&errors),
        OutputFormat::Quiet => errors.len().to_string(),
    }
}

/// Print output based on format and quiet mode
pub fn print_output(content: &str, format: &OutputFormat, quiet: bool) {
    if quiet && !matches!(format, OutputFormat::Quiet) {
        return;
    }
    println!("{}", content);
}

/// Print error message
pub fn print_error(message: &str, quiet: bool) {
    if !quiet {
        eprintln!("Error: {}", message);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::types::BankType;
    use std::collections::BTreeMap;

    #[test]
    fn bank_rendering_per_format() {
        let key = BankKey::new(BankType::Project, "demo");
        let mut content = BankContent::new();
        content.insert("readme.md".into(), "# Demo\n".into());

        assert_eq!(
            format_bank(&key, &content, &OutputFormat::Human),
            "=== readme.md ===\n# Demo"
        );
        assert_eq!(format_bank(&key, &content, &OutputFormat::Quiet), "readme.md");
        assert_eq!(
            format_bank(&key, &BankContent::new(), &OutputFormat::Human),
            "Bank project:demo is empty"
        );
    }

    #[test]
    fn sync_results_quiet_counts_successes() {
        let mut results = BTreeMap::new();
        results.insert(BankKey::new(BankType::Global, "default"), true);
        results.insert(BankKey::new(BankType::Code, "repo"), false);
        assert_eq!(format_sync_results(&results, &OutputFormat::Quiet), "1/2");

        let json: serde_json::Value =
            serde_json::from_str(&format_sync_results(&results, &OutputFormat::Json)).unwrap();
        assert_eq!(json["code:repo"], false);
    }
}
