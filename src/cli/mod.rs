//! Command-line interface for the memory-bank cache
//!
//! Each invocation builds a cache over the configured storage root, runs a
//! single command against it, and closes it.

pub mod commands;
pub mod config;
pub mod errors;
pub mod output;

pub use commands::*;
pub use config::CliConfig;
pub use errors::{CliError, CliResult};
pub use output::OutputFormat;
