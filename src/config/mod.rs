//! Configuration module for Branchmap
//!
//! This module handles loading, parsing, and validating TOML configuration files.
//!
//! # Example
//!
//! ```no_run
//! use branchmap::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("branchmap.toml")).unwrap();
//! println!("Snapshotting scope: {}", config.target.scope_name);
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{
    BackendConfig, BackendKind, Config, CrawlConfig, ExtractionConfig, OutputConfig,
    RetryConfig, SessionConfig, TargetConfig,
};

// Re-export parser functions
pub use parser::{compute_config_hash, load_config, load_config_with_hash, parse_config};
