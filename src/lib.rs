//! Portal-Harvest: a resilient crawler for government document portals
//!
//! This crate walks the paginated document listings of a government portal,
//! builds a structured record for every document page, and persists each
//! record as a document file plus a row in a tabular index.

pub mod config;
pub mod crawler;
pub mod output;
pub mod sites;
pub mod state;

use thiserror::Error;

/// Main error type for Portal-Harvest operations
#[derive(Debug, Error)]
pub enum HarvestError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Fetch error: {0}")]
    Fetch(#[from] crawler::FetchError),

    #[error("Pagination error for {url}: {source}")]
    Pagination {
        url: String,
        source: crawler::PaginationError,
    },

    #[error("Output error: {0}")]
    Output(#[from] output::OutputError),

    #[error("Field schema error: {0}")]
    Schema(#[from] sites::SchemaError),

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] ::url::ParseError),

    #[error("Invalid job state transition: {from:?} -> {to:?}")]
    InvalidTransition {
        from: state::JobState,
        to: state::JobState,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Worker task failed: {0}")]
    Worker(String),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),
}

/// Result type alias for Portal-Harvest operations
pub type Result<T> = std::result::Result<T, HarvestError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

// Re-export commonly used types
pub use config::Config;
pub use crawler::{Coordinator, CrawlJob, CrawlTarget, PageMarker};
pub use output::{FileSink, JobSummary, Sink};
pub use sites::{Attachment, ItemReference, Record};
pub use state::JobState;
