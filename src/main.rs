//! `membank` command-line tool

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};

use membank_cache::cli::{CliConfig, Commands, OutputFormat, execute_command, output::print_error};

#[derive(Debug, Parser)]
#[command(name = "membank", version, about = "Inspect and update memory banks")]
struct Cli {
    /// TOML cache configuration file
    #[arg(long, short = 'c', env = "MEMBANK_CONFIG")]
    config: Option<PathBuf>,

    /// Root directory of the memory banks
    #[arg(long, env = "MEMBANK_STORAGE_ROOT")]
    storage_root: Option<PathBuf>,

    /// Directory for diagnostics output
    #[arg(long)]
    diagnostics_dir: Option<PathBuf>,

    /// Output format
    #[arg(long, short = 'f', value_enum, default_value_t = OutputFormat::Human)]
    format: OutputFormat,

    /// Increase logging verbosity
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress output
    #[arg(short, long)]
    quiet: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Print every file of a bank
    Show { bank_type: String, bank_id: String },
    /// Merge text into a bank
    Update {
        bank_type: String,
        bank_id: String,
        text: String,
        /// Write the bank to disk before returning
        #[arg(long)]
        immediate: bool,
    },
    /// Flush pending banks
    Sync,
    /// Compare cached banks with disk
    Check {
        #[arg(long)]
        bank_type: Option<String>,
        #[arg(long)]
        bank_id: Option<String>,
    },
    /// Print and export diagnostics
    Diagnostics {
        /// Export path; defaults to a timestamped file in the diagnostics directory
        #[arg(long, short = 'o')]
        output: Option<PathBuf>,
    },
    /// Show recently recorded errors
    Errors {
        #[arg(long, default_value_t = 10)]
        limit: usize,
    },
}

impl From<Command> for Commands {
    fn from(command: Command) -> Self {
        match command {
            Command::Show { bank_type, bank_id } => Commands::Show { bank_type, bank_id },
            Command::Update {
                bank_type,
                bank_id,
                text,
                immediate,
            } => Commands::Update {
                bank_type,
                bank_id,
                text,
                immediate,
            },
            Command::Sync => Commands::Sync,
            Command::Check { bank_type, bank_id } => Commands::Check { bank_type, bank_id },
            Command::Diagnostics { output } => Commands::Diagnostics { output },
            Command::Errors { limit } => Commands::Errors { limit },
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let config = CliConfig {
        config_file: cli.config,
        storage_root: cli.storage_root,
        diagnostics_dir: cli.diagnostics_dir,
        output_format: cli.format,
        verbose: cli.verbose,
        quiet: cli.quiet,
    };

    env_logger::Builder::new()
        .filter_level(config.log_level())
        .parse_env("MEMBANK_LOG")
        .init();

    match execute_command(cli.command.into(), &config) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            print_error(&e.to_string(), config.quiet);
            ExitCode::from(e.exit_code() as u8)
        }
    }
}
