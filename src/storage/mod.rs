//! Storage module for persisting sanctioned profiles
//!
//! This module owns the SQLite database, including:
//! - Versioned schema migrations, tolerant of stores written by older versions
//! - Append-only profile rows and processed-file markers
//! - Page watermarks for partially ingested documents
//! - Crawl run tracking
//! - Restoring and backing up the database file

mod backing;
mod schema;
mod sqlite;
mod traits;

pub use backing::{backing_store_for, BackingStore, LocalBackingStore, NoBackingStore};
pub use schema::{
    apply_migrations, plan_migration, read_snapshot, Migration, SchemaSnapshot, TableInfo,
    MIGRATIONS,
};
pub use sqlite::SqliteStorage;
pub use traits::{Storage, StorageError, StorageResult};

use crate::extract::CandidateEntry;
use crate::HarvestError;
use chrono::Utc;
use serde::Serialize;
use std::path::Path;

/// Initializes or opens a storage database
///
/// # Arguments
///
/// * `path` - Path to the SQLite database file
///
/// # Returns
///
/// * `Ok(SqliteStorage)` - Opened store with the current schema applied
/// * `Err(HarvestError)` - Failed to open or migrate the store
pub fn open_storage(path: &Path) -> Result<SqliteStorage, HarvestError> {
    SqliteStorage::new(path)
}

/// Current UTC time with second precision, e.g. `2026-10-14T08:30:00Z`
pub fn now_timestamp() -> String {
    Utc::now().format("%Y-%m-%dT%H:%M:%SZ").to_string()
}

/// A profile about to be appended; `created_at` is set by the store
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewProfile {
    pub year: i32,
    pub name: String,
    pub nationality: String,
    pub passport_no: String,
    pub source_document: String,
}

impl NewProfile {
    pub fn from_candidate(entry: &CandidateEntry, year: i32, source_document: &str) -> Self {
        Self {
            year,
            name: entry.name.clone(),
            nationality: entry.nationality.clone(),
            passport_no: entry.passport_no.clone(),
            source_document: source_document.to_string(),
        }
    }
}

/// A persisted sanctioned-person record
///
/// Rows migrated from older stores may lack a year; other missing values
/// read back as their placeholders.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SanctionedProfile {
    pub id: i64,
    pub year: Option<i32>,
    pub name: String,
    pub nationality: String,
    pub passport_no: String,
    pub source_document: String,
    pub created_at: String,
}

/// Represents a crawl run
#[derive(Debug, Clone, Serialize)]
pub struct RunRecord {
    pub id: i64,
    pub started_at: String,
    pub finished_at: Option<String>,
    pub status: RunStatus,
    pub config_hash: String,
    pub documents_processed: u64,
    pub profiles_added: u64,
}

/// Status of a crawl run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Running,
    Completed,
    /// Stopped at the time budget; remaining years resume next run
    BudgetExhausted,
    Failed,
}

impl RunStatus {
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Completed => "completed",
            Self::BudgetExhausted => "budget_exhausted",
            Self::Failed => "failed",
        }
    }

    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "running" => Some(Self::Running),
            "completed" => Some(Self::Completed),
            "budget_exhausted" => Some(Self::BudgetExhausted),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }
}
