//! Docket: an incremental crawl and document-versioning engine
//!
//! This crate re-crawls slow-changing listing sites and folds every observed
//! (URL, content) pair into a deduplicated corpus where each logical document
//! carries a version lineage ("family") over time.

pub mod change;
pub mod config;
pub mod crawler;
pub mod extract;
pub mod family;
pub mod identity;
pub mod output;
pub mod sites;
pub mod state;
pub mod storage;
pub mod url;

use thiserror::Error;

pub use crawler::FetchError;
pub use extract::ExtractionError;
pub use storage::StorageError;

/// Main error type for Docket operations
#[derive(Debug, Error)]
pub enum DocketError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Fetch error: {0}")]
    Fetch(#[from] FetchError),

    #[error("Parse error for {url}: {message}")]
    Parse { url: String, message: String },

    #[error("Identity lookup failed: {0}")]
    IdentityLookup(String),

    #[error("Persistence error: {0}")]
    Persistence(#[from] StorageError),

    #[error("Extraction error: {0}")]
    Extraction(#[from] ExtractionError),

    #[error("URL error: {0}")]
    Url(#[from] UrlError),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] ::url::ParseError),

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
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

/// URL-specific errors
#[derive(Debug, Error)]
pub enum UrlError {
    #[error("Failed to parse URL: {0}")]
    Parse(String),

    #[error("Invalid URL scheme: {0}")]
    InvalidScheme(String),

    #[error("Missing domain in URL")]
    MissingDomain,

    #[error("Malformed URL: {0}")]
    Malformed(String),
}

/// Result type alias for Docket operations
pub type Result<T> = std::result::Result<T, DocketError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Result type alias for URL operations
pub type UrlResult<T> = std::result::Result<T, UrlError>;

// Re-export commonly used types
pub use config::{Config, SourceConfig};
pub use crawler::{run_crawl_cycle, Orchestrator};
pub use identity::AdmissionAction;
pub use output::CycleStats;
pub use url::{identity_key, normalize_url};
