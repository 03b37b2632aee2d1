//! Storage traits and error types
//!
//! This module defines the trait interface for storage backends and
//! associated error types.

use crate::storage::{NewProfile, RunRecord, RunStatus, SanctionedProfile};
use std::collections::BTreeSet;
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Migration {version} ({description}) failed: {source}")]
    Migration {
        version: u32,
        description: &'static str,
        source: rusqlite::Error,
    },

    #[error("Backing store error for {location}: {source}")]
    Backing {
        location: String,
        source: std::io::Error,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Trait for storage backend implementations
///
/// Profiles and processed-file markers are append-only through this
/// interface. Writes join an implicit batch that becomes durable on
/// [`Storage::commit`].
pub trait Storage {
    // ===== Ingestion =====

    /// Returns true if the document has been fully parsed before
    fn is_processed(&self, source_document: &str) -> StorageResult<bool>;

    /// Appends one profile row
    ///
    /// No uniqueness check is made across rows; repeated crawls may add
    /// near-identical profiles.
    ///
    /// # Returns
    ///
    /// The row ID of the new profile
    fn append_profile(&mut self, profile: &NewProfile) -> StorageResult<i64>;

    /// Records that a document's full page range has been ingested
    ///
    /// Also clears any page watermark held for the document.
    fn mark_processed(&mut self, source_document: &str) -> StorageResult<()>;

    /// Every year with at least one profile
    fn distinct_years(&self) -> StorageResult<BTreeSet<i32>>;

    // ===== Partial Document Progress =====

    /// Last page whose profiles were committed for an unfinished document
    fn page_watermark(&self, source_document: &str) -> StorageResult<Option<u32>>;

    /// Records the last ingested page; durable with the next commit
    fn record_watermark(&mut self, source_document: &str, last_page: u32) -> StorageResult<()>;

    // ===== Batches =====

    /// Makes every write since the last commit durable
    fn commit(&mut self) -> StorageResult<()>;

    /// Discards every write since the last commit
    fn rollback(&mut self) -> StorageResult<()>;

    // ===== Run Management =====

    /// Creates a crawl run in the running state
    fn create_run(&mut self, config_hash: &str) -> StorageResult<i64>;

    /// Closes a run with its final status and counters
    fn finish_run(
        &mut self,
        run_id: i64,
        status: RunStatus,
        documents_processed: u64,
        profiles_added: u64,
    ) -> StorageResult<()>;

    /// Gets the most recent run
    fn get_latest_run(&self) -> StorageResult<Option<RunRecord>>;

    // ===== Queries =====

    /// Profiles whose name contains `fragment`, case-insensitively
    fn search_by_name(&self, fragment: &str) -> StorageResult<Vec<SanctionedProfile>>;

    /// Counts profiles, optionally restricted to one nationality
    fn count_profiles(&self, nationality: Option<&str>) -> StorageResult<u64>;

    /// One page of profiles ordered by year (newest first) then name
    fn list_profiles(
        &self,
        nationality: Option<&str>,
        limit: u32,
        offset: u64,
    ) -> StorageResult<Vec<SanctionedProfile>>;

    /// Profile counts per year, newest first; legacy rows have no year
    fn count_by_year(&self) -> StorageResult<Vec<(Option<i32>, u64)>>;

    /// The most frequent nationalities with their counts
    fn top_nationalities(&self, limit: u32) -> StorageResult<Vec<(String, u64)>>;

    /// Number of processed-file markers
    fn count_processed(&self) -> StorageResult<u64>;

    /// Number of profiles sourced from one document
    fn count_profiles_for_document(&self, source_document: &str) -> StorageResult<u64>;
}
