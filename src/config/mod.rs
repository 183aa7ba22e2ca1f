//! Configuration module for Docket
//!
//! This module handles loading, parsing, and validating TOML configuration files.
//!
//! # Example
//!
//! ```no_run
//! use docket::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("docket.toml")).unwrap();
//! println!("Re-scan window: {}", config.crawler.window_size);
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{
    Config, CrawlerConfig, FamilyConfig, IdentityConfig, OutputConfig, RetryConfig, SourceConfig,
    UserAgentConfig,
};

// Re-export parser functions
pub use parser::{compute_config_hash, load_config, load_config_with_hash, parse_config};
pub use validation::validate;
