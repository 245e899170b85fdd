//! CLI command implementations
//!
//! Each command builds the cache from the merged configuration, runs one
//! operation, and closes the cache so pending banks reach disk.

use std::path::PathBuf;

use crate::cli::{
    config::CliConfig,
    errors::{CliError, CliResult},
    output::{
        format_bank, format_consistency, format_diagnostics, format_errors, format_sync_results,
        format_update, print_output,
    },
};
use crate::cache::types::BankKey;
use crate::membank::MemoryBankCache;

#[derive(Debug)]
pub enum Commands {
    Show {
        bank_type: String,
        bank_id: String,
    },
    Update {
        bank_type: String,
        bank_id: String,
        text: String,
        immediate: bool,
    },
    Sync,
    Check {
        bank_type: Option<String>,
        bank_id: Option<String>,
    },
    Diagnostics {
        output: Option<PathBuf>,
    },
    Errors {
        limit: usize,
    },
}

/// Execute a CLI command
pub fn execute_command(command: Commands, config: &CliConfig) -> CliResult<()> {
    if let Commands::Check {
        bank_type: None,
        bank_id: Some(_),
    } = &command
    {
        return Err(CliError::ArgumentError(
            "--bank-id requires --bank-type".to_string(),
        ));
    }

    let cache_config = config.cache_config()?;
    let cache = MemoryBankCache::builder().config(cache_config).build()?;
    let result = run(&cache, command, config);
    cache.close();
    result
}

fn run(cache: &MemoryBankCache, command: Commands, config: &CliConfig) -> CliResult<()> {
    let format = &config.output_format;
    match command {
        Commands::Show { bank_type, bank_id } => {
            let key = BankKey::parse(&bank_type, &bank_id)?;
            let content = cache.get_bank(&bank_type, &bank_id)?;
            print_output(&format_bank(&key, &content, format), format, config.quiet);
        }
        Commands::Update {
            bank_type,
            bank_id,
            text,
            immediate,
        } => {
            let key = BankKey::parse(&bank_type, &bank_id)?;
            let response = cache.update_bank(&bank_type, &bank_id, &text, immediate)?;
            print_output(&format_update(&key, &response, format), format, config.quiet);
            if let Some(error) = response.error {
                return Err(CliError::OperationFailed(error));
            }
        }
        Commands::Sync => {
            let results = cache.sync_all_pending();
            print_output(&format_sync_results(&results, format), format, config.quiet);
            let failed = results.values().filter(|ok| !**ok).count();
            if failed > 0 {
                return Err(CliError::OperationFailed(format!(
                    "{} banks failed to sync",
                    failed
                )));
            }
        }
        Commands::Check { bank_type, bank_id } => {
            // A fresh process has nothing cached; load the targeted bank first.
            if let (Some(bank_type), Some(bank_id)) = (&bank_type, &bank_id) {
                cache.get_bank(bank_type, bank_id)?;
            }
            let report =
                cache.perform_consistency_check(bank_type.as_deref(), bank_id.as_deref())?;
            print_output(&format_consistency(&report, format), format, config.quiet);
        }
        Commands::Diagnostics { output } => {
            let report = cache.diagnostics();
            print_output(&format_diagnostics(&report, format), format, config.quiet);
            if !cache.export_diagnostics(output.as_deref()) {
                return Err(CliError::OperationFailed(
                    "diagnostics export failed or diagnostics are disabled".to_string(),
                ));
            }
        }
        Commands::Errors { limit } => {
            let errors = cache.recent_errors(limit);
            print_output(&format_errors(&errors, format), format, config.quiet);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn config(dir: &TempDir) -> CliConfig {
        CliConfig {
            storage_root: Some(dir.path().join("memory")),
            diagnostics_dir: Some(dir.path().join("diag")),
            quiet: true,
            ..CliConfig::default()
        }
    }

    #[test]
    fn update_then_show_persists_across_invocations() {
        let dir = TempDir::new().unwrap();
        let config = config(&dir);

        execute_command(
            Commands::Update {
                bank_type: "project".into(),
                bank_id: "demo".into(),
                text: "Progress update: milestone complete".into(),
                immediate: false,
            },
            &config,
        )
        .unwrap();

        let progress = dir.path().join("memory/projects/demo/doc/progress.md");
        assert!(std::fs::read_to_string(progress).unwrap().contains("milestone"));
    }

    #[test]
    fn unknown_bank_type_fails() {
        let dir = TempDir::new().unwrap();
        let err = execute_command(
            Commands::Show {
                bank_type: "team".into(),
                bank_id: "x".into(),
            },
            &config(&dir),
        )
        .unwrap_err();
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn bank_id_without_type_is_rejected() {
        let dir = TempDir::new().unwrap();
        let err = execute_command(
            Commands::Check {
                bank_type: None,
                bank_id: Some("demo".into()),
            },
            &config(&dir),
        )
        .unwrap_err();
        assert!(matches!(err, CliError::ArgumentError(_)));
    }

    #[test]
    fn diagnostics_export_writes_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("report.json");
        execute_command(
            Commands::Diagnostics {
                output: Some(path.clone()),
            },
            &config(&dir),
        )
        .unwrap();
        assert!(path.is_file());
    }
}
