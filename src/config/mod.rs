//! Configuration module for Portal-Harvest
//!
//! This module handles loading, parsing, and validating TOML configuration files.
//!
//! # Example
//!
//! ```no_run
//! use portal_harvest::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("harvest.toml")).unwrap();
//! for job in &config.jobs {
//!     println!("{} -> {}", job.name, job.sheet_name());
//! }
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{derive_sheet_name, Config, FetchConfig, JobEntry, OutputConfig, ProxyConfig};

// Re-export parser functions
pub use parser::{config_hash, load_config, load_config_with_hash, parse_config};
