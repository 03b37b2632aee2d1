//! Sanctions-Harvest: an incremental sanctions-circular ingester
//!
//! This crate discovers a regulator's year-indexed circular PDFs, extracts
//! sanctioned-person records from their text, and stores them in SQLite
//! with processed-file gating so repeated runs only ingest new documents.

pub mod config;
pub mod crawler;
pub mod extract;
pub mod query;
pub mod state;
pub mod storage;

use thiserror::Error;

/// Main error type for Sanctions-Harvest operations
#[derive(Debug, Error)]
pub enum HarvestError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("HTTP error for {url}: {source}")]
    Http { url: String, source: reqwest::Error },

    #[error("HTTP status {status} for {url}")]
    HttpStatus { url: String, status: u16 },

    #[error("Request timeout for {url}")]
    Timeout { url: String },

    #[error("PDF parse error for {source_document}: {source}")]
    Pdf {
        source_document: String,
        source: lopdf::Error,
    },

    #[error("Storage error: {0}")]
    Storage(#[from] storage::StorageError),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] ::url::ParseError),

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("Invalid state transition for {year}: {from:?} -> {to:?}")]
    InvalidTransition {
        year: i32,
        from: state::YearState,
        to: state::YearState,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl HarvestError {
    /// Classifies a reqwest failure against the URL it was issued for
    pub fn from_transport(url: &str, error: reqwest::Error) -> Self {
        if error.is_timeout() {
            Self::Timeout {
                url: url.to_string(),
            }
        } else {
            Self::Http {
                url: url.to_string(),
                source: error,
            }
        }
    }

    /// Returns true for failures that only abandon a unit of work for this run
    ///
    /// Transport, status and parse failures are retried naturally on the next
    /// invocation. Storage and IO failures are fatal to the current operation.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::Http { .. }
                | Self::HttpStatus { .. }
                | Self::Timeout { .. }
                | Self::Pdf { .. }
                | Self::UrlParse(_)
                | Self::Reqwest(_)
        )
    }
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

/// Result type alias for Sanctions-Harvest operations
pub type Result<T> = std::result::Result<T, HarvestError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

// Re-export commonly used types
pub use config::Config;
pub use crawler::{run_crawl, CrawlSummary};
pub use extract::{extract_entries, CandidateEntry};
pub use state::YearState;
pub use storage::{NewProfile, SanctionedProfile};
