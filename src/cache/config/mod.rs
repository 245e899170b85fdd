//! Cache configuration with production defaults
//!
//! Loaded from TOML or assembled through the cache builder.

pub mod types;

pub use types::{BridgeConfig, CacheConfig, DiagnosticsConfig, WorkerConfig};
