//! Configuration module for Sanctions-Harvest
//!
//! This module handles loading, parsing, and validating TOML configuration files.
//!
//! # Example
//!
//! ```no_run
//! use sanctions_harvest::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("harvest.toml")).unwrap();
//! println!("Backfill starts at: {}", config.crawler.epoch_year);
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{
    Config, CrawlerConfig, LogSink, LoggingConfig, SiteConfig, StorageConfig, UserAgentConfig,
    YearPolicy, YEAR_PLACEHOLDER,
};

// Re-export parser functions
pub use parser::{hash_content, load_config, load_config_with_hash, parse_config};
