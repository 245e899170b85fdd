//! CLI configuration
//!
//! Merges command-line options over an optional TOML cache configuration
//! file.

use std::path::PathBuf;

use crate::cache::config::CacheConfig;
use crate::cli::errors::CliResult;
use crate::cli::output::OutputFormat;

/// Options gathered from the command line
#[derive(Debug, Clone, Default)]
pub struct CliConfig {
    /// TOML file holding a [`CacheConfig`]
    pub config_file: Option<PathBuf>,
    /// Overrides `storage_root` from the file
    pub storage_root: Option<PathBuf>,
    /// Overrides `diagnostics.diagnostics_dir` from the file
    pub diagnostics_dir: Option<PathBuf>,
    /// Output format
    pub output_format: OutputFormat,
    /// Verbosity level
    pub verbose: u8,
    /// Quiet mode
    pub quiet: bool,
}

impl CliConfig {
    /// Build the cache configuration for one CLI invocation.
    ///
    /// The worker is never started; each command closes the cache, which
    /// flushes anything still pending.
    pub fn cache_config(&self) -> CliResult<CacheConfig> {
        let mut config = match &self.config_file {
            Some(path) => CacheConfig::from_toml_file(path)?,
            None => CacheConfig::default(),
        };

        if let Some(root) = &self.storage_root {
            config.storage_root = root.clone();
        }
        if let Some(dir) = &self.diagnostics_dir {
            config.diagnostics.diagnostics_dir = Some(dir.clone());
        }
        config.worker.start_on_build = false;

        config.validate()?;
        Ok(config)
    }

    /// Log level implied by `-v` flags and quiet mode
    pub fn log_level(&self) -> log::LevelFilter {
        if self.quiet {
            return log::LevelFilter::Error;
        }
        match self.verbose {
            0 => log::LevelFilter::Warn,
            1 => log::LevelFilter::Info,
            2 => log::LevelFilter::Debug,
            _ => log::LevelFilter::Trace,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn command_line_overrides_file() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("membank.toml");
        std::fs::write(
            &file,
            "storage_root = \"/srv/memory\"\nlarge_update_threshold_bytes = 512\n",
        )
        .unwrap();

        let cli = CliConfig {
            config_file: Some(file),
            storage_root: Some(dir.path().join("override")),
            ..CliConfig::default()
        };
        let config = cli.cache_config().unwrap();
        assert_eq!(config.storage_root, dir.path().join("override"));
        assert_eq!(config.large_update_threshold_bytes, 512);
        assert!(!config.worker.start_on_build);
    }

    #[test]
    fn bad_file_is_a_config_error() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("membank.toml");
        std::fs::write(&file, "[worker]\nsync_interval_secs = 0\n").unwrap();

        let cli = CliConfig {
            config_file: Some(file),
            ..CliConfig::default()
        };
        assert!(matches!(
            cli.cache_config(),
            Err(crate::cli::CliError::ConfigError(_))
        ));
    }

    #[test]
    fn verbosity_maps_to_levels() {
        let mut cli = CliConfig::default();
        assert_eq!(cli.log_level(), log::LevelFilter::Warn);
        cli.verbose = 2;
        assert_eq!(cli.log_level(), log::LevelFilter::Debug);
        cli.quiet = true;
        assert_eq!(cli.log_level(), log::LevelFilter::Error);
    }
}
