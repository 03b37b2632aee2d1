//! SQLite storage implementation
//!
//! This module provides a SQLite-based implementation of the Storage trait.
//! Writes open a transaction lazily; it stays open until `commit` or
//! `rollback`, so a batch of pages becomes durable at once.

use crate::storage::schema::apply_migrations;
use crate::storage::traits::{Storage, StorageResult};
use crate::storage::{now_timestamp, NewProfile, RunRecord, RunStatus, SanctionedProfile};
use crate::HarvestError;
use rusqlite::{params, Connection, OpenFlags, OptionalExtension, Row};
use std::collections::BTreeSet;
use std::path::Path;

/// Profile columns with placeholders substituted for legacy NULLs
const PROFILE_SELECT: &str = "SELECT id, year, COALESCE(name, 'Unknown'), \
     COALESCE(nationality, 'Unknown'), COALESCE(passport_no, 'na'), \
     COALESCE(source_document, ''), COALESCE(created_at, '') FROM profiles";

/// SQLite storage backend
pub struct SqliteStorage {
    conn: Connection,
}

impl SqliteStorage {
    /// Creates a new SqliteStorage instance
    ///
    /// The file is created if absent, and the schema is migrated to the
    /// latest version.
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the SQLite database file
    ///
    /// # Returns
    ///
    /// * `Ok(SqliteStorage)` - Successfully opened/created database
    /// * `Err(HarvestError)` - Failed to open or migrate database
    pub fn new(path: &Path) -> Result<Self, HarvestError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;

        // Configure SQLite for better performance
        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA temp_store = MEMORY;
        ",
        )?;

        let mut storage = Self { conn };
        storage.ensure_schema()?;
        Ok(storage)
    }

    /// Opens an existing database file for reading only
    ///
    /// Nothing is created or migrated and the journal mode is left as
    /// found; any write fails.
    pub fn open_query_only(path: &Path) -> Result<Self, HarvestError> {
        let flags = OpenFlags::SQLITE_OPEN_READ_WRITE
            | OpenFlags::SQLITE_OPEN_NO_MUTEX
            | OpenFlags::SQLITE_OPEN_URI;
        let conn = Connection::open_with_flags(path, flags)?;
        conn.execute_batch("PRAGMA query_only = ON;")?;
        Ok(Self { conn })
    }

    /// Creates an in-memory database (for testing)
    #[cfg(test)]
    pub fn new_in_memory() -> Result<Self, HarvestError> {
        let conn = Connection::open_in_memory()?;
        let mut storage = Self { conn };
        storage.ensure_schema()?;
        Ok(storage)
    }

    /// Applies any pending schema migrations
    pub fn ensure_schema(&mut self) -> StorageResult<()> {
        let applied = apply_migrations(&mut self.conn)?;
        if applied > 0 {
            tracing::info!("Applied {} schema migrations", applied);
        }
        Ok(())
    }

    /// Returns true while uncommitted writes are pending
    pub fn in_batch(&self) -> bool {
        !self.conn.is_autocommit()
    }

    /// Commits, then folds the write-ahead log into the main database file
    ///
    /// After a checkpoint the database file alone is a complete copy.
    pub fn checkpoint(&mut self) -> StorageResult<()> {
        self.commit()?;
        self.conn
            .query_row("PRAGMA wal_checkpoint(TRUNCATE)", [], |_| Ok(()))?;
        Ok(())
    }

    /// Asks SQLite to return cached pages to the allocator
    pub fn release_memory(&self) -> StorageResult<()> {
        self.conn.execute_batch("PRAGMA shrink_memory")?;
        Ok(())
    }

    /// Commits pending writes and closes the connection
    pub fn close(mut self) -> StorageResult<()> {
        self.checkpoint()?;
        self.conn.close().map_err(|(_, e)| e)?;
        Ok(())
    }

    fn begin_if_needed(&self) -> StorageResult<()> {
        if self.conn.is_autocommit() {
            self.conn.execute_batch("BEGIN")?;
        }
        Ok(())
    }

    fn query_profiles(
        &self,
        sql: &str,
        params: impl rusqlite::Params,
    ) -> StorageResult<Vec<SanctionedProfile>> {
        let mut stmt = self.conn.prepare(sql)?;
        let profiles = stmt
            .query_map(params, profile_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(profiles)
    }
}

fn profile_from_row(row: &Row<'_>) -> rusqlite::Result<SanctionedProfile> {
    Ok(SanctionedProfile {
        id: row.get(0)?,
        year: row.get(1)?,
        name: row.get(2)?,
        nationality: row.get(3)?,
        passport_no: row.get(4)?,
        source_document: row.get(5)?,
        created_at: row.get(6)?,
    })
}

fn run_from_row(row: &Row<'_>) -> rusqlite::Result<RunRecord> {
    Ok(RunRecord {
        id: row.get(0)?,
        started_at: row.get(1)?,
        finished_at: row.get(2)?,
        status: RunStatus::from_db_string(&row.get::<_, String>(3)?).unwrap_or(RunStatus::Failed),
        config_hash: row.get(4)?,
        documents_processed: row.get::<_, i64>(5)?.max(0) as u64,
        profiles_added: row.get::<_, i64>(6)?.max(0) as u64,
    })
}

/// Escapes LIKE wildcards so user input matches literally
fn like_pattern(fragment: &str) -> String {
    let mut escaped = String::with_capacity(fragment.len() + 2);
    escaped.push('%');
    for c in fragment.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped.push('%');
    escaped
}

impl Storage for SqliteStorage {
    // ===== Ingestion =====

    fn is_processed(&self, source_document: &str) -> StorageResult<bool> {
        let found = self
            .conn
            .query_row(
                "SELECT 1 FROM processed_files WHERE source_document = ?1 LIMIT 1",
                params![source_document],
                |_| Ok(()),
            )
            .optional()?;
        Ok(found.is_some())
    }

    fn append_profile(&mut self, profile: &NewProfile) -> StorageResult<i64> {
        self.begin_if_needed()?;
        self.conn.execute(
            "INSERT INTO profiles (year, name, nationality, passport_no, source_document, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                profile.year,
                profile.name,
                profile.nationality,
                profile.passport_no,
                profile.source_document,
                now_timestamp(),
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn mark_processed(&mut self, source_document: &str) -> StorageResult<()> {
        self.begin_if_needed()?;
        self.conn.execute(
            "INSERT INTO processed_files (source_document, processed_at) VALUES (?1, ?2)",
            params![source_document, now_timestamp()],
        )?;
        self.conn.execute(
            "DELETE FROM page_watermarks WHERE source_document = ?1",
            params![source_document],
        )?;
        Ok(())
    }

    fn distinct_years(&self) -> StorageResult<BTreeSet<i32>> {
        let mut stmt = self
            .conn
            .prepare("SELECT DISTINCT year FROM profiles WHERE year IS NOT NULL")?;
        let years = stmt
            .query_map([], |row| row.get::<_, i32>(0))?
            .collect::<Result<BTreeSet<_>, _>>()?;
        Ok(years)
    }

    // ===== Partial Document Progress =====

    fn page_watermark(&self, source_document: &str) -> StorageResult<Option<u32>> {
        let page = self
            .conn
            .query_row(
                "SELECT last_page FROM page_watermarks WHERE source_document = ?1",
                params![source_document],
                |row| row.get::<_, u32>(0),
            )
            .optional()?;
        Ok(page)
    }

    fn record_watermark(&mut self, source_document: &str, last_page: u32) -> StorageResult<()> {
        self.begin_if_needed()?;
        self.conn.execute(
            "INSERT INTO page_watermarks (source_document, last_page, updated_at)
             VALUES (?1, ?2, ?3)
             ON CONFLICT(source_document) DO UPDATE SET
                last_page = excluded.last_page,
                updated_at = excluded.updated_at",
            params![source_document, last_page, now_timestamp()],
        )?;
        Ok(())
    }

    // ===== Batches =====

    fn commit(&mut self) -> StorageResult<()> {
        if !self.conn.is_autocommit() {
            self.conn.execute_batch("COMMIT")?;
        }
        Ok(())
    }

    fn rollback(&mut self) -> StorageResult<()> {
        if !self.conn.is_autocommit() {
            self.conn.execute_batch("ROLLBACK")?;
        }
        Ok(())
    }

    // ===== Run Management =====

    fn create_run(&mut self, config_hash: &str) -> StorageResult<i64> {
        self.commit()?;
        self.conn.execute(
            "INSERT INTO crawl_runs (started_at, status, config_hash) VALUES (?1, ?2, ?3)",
            params![now_timestamp(), RunStatus::Running.to_db_string(), config_hash],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn finish_run(
        &mut self,
        run_id: i64,
        status: RunStatus,
        documents_processed: u64,
        profiles_added: u64,
    ) -> StorageResult<()> {
        self.commit()?;
        self.conn.execute(
            "UPDATE crawl_runs
             SET status = ?1, finished_at = ?2, documents_processed = ?3, profiles_added = ?4
             WHERE id = ?5",
            params![
                status.to_db_string(),
                now_timestamp(),
                documents_processed as i64,
                profiles_added as i64,
                run_id
            ],
        )?;
        Ok(())
    }

    fn get_latest_run(&self) -> StorageResult<Option<RunRecord>> {
        let run = self
            .conn
            .query_row(
                "SELECT id, started_at, finished_at, status, config_hash,
                        documents_processed, profiles_added
                 FROM crawl_runs ORDER BY id DESC LIMIT 1",
                [],
                run_from_row,
            )
            .optional()?;
        Ok(run)
    }

    // ===== Queries =====

    fn search_by_name(&self, fragment: &str) -> StorageResult<Vec<SanctionedProfile>> {
        self.query_profiles(
            &format!(
                "{PROFILE_SELECT} WHERE name LIKE ?1 ESCAPE '\\' \
                 ORDER BY year DESC, name, id"
            ),
            params![like_pattern(fragment)],
        )
    }

    fn count_profiles(&self, nationality: Option<&str>) -> StorageResult<u64> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM profiles WHERE (?1 IS NULL OR nationality = ?1)",
            params![nationality],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }

    fn list_profiles(
        &self,
        nationality: Option<&str>,
        limit: u32,
        offset: u64,
    ) -> StorageResult<Vec<SanctionedProfile>> {
        self.query_profiles(
            &format!(
                "{PROFILE_SELECT} WHERE (?1 IS NULL OR nationality = ?1) \
                 ORDER BY year DESC, name, id LIMIT ?2 OFFSET ?3"
            ),
            params![nationality, limit, offset as i64],
        )
    }

    fn count_by_year(&self) -> StorageResult<Vec<(Option<i32>, u64)>> {
        let mut stmt = self
            .conn
            .prepare("SELECT year, COUNT(*) FROM profiles GROUP BY year ORDER BY year DESC")?;
        let rows = stmt
            .query_map([], |row| {
                Ok((row.get::<_, Option<i32>>(0)?, row.get::<_, i64>(1)? as u64))
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    fn top_nationalities(&self, limit: u32) -> StorageResult<Vec<(String, u64)>> {
        let mut stmt = self.conn.prepare(
            "SELECT COALESCE(nationality, 'Unknown') AS n, COUNT(*) AS c FROM profiles
             GROUP BY n ORDER BY c DESC, n LIMIT ?1",
        )?;
        let rows = stmt
            .query_map(params![limit], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)? as u64))
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    fn count_processed(&self) -> StorageResult<u64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM processed_files", [], |row| row.get(0))?;
        Ok(count as u64)
    }

    fn count_profiles_for_document(&self, source_document: &str) -> StorageResult<u64> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM profiles WHERE source_document = ?1",
            params![source_document],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }
}
