//! Database schema definitions and migrations
//!
//! The schema version lives in `PRAGMA user_version`. Each migration plans
//! its statements from a snapshot of the live schema, so a store written by
//! an older tool (with legacy `source_url`/`source_pdf` columns, or missing
//! columns altogether) is brought forward without losing rows.

use crate::storage::traits::{StorageError, StorageResult};
use rusqlite::Connection;
use std::collections::BTreeMap;

/// Columns every current `profiles` table carries, with their SQL types
const PROFILE_COLUMNS: [(&str, &str); 6] = [
    ("year", "INTEGER"),
    ("name", "TEXT"),
    ("nationality", "TEXT"),
    ("passport_no", "TEXT"),
    ("source_document", "TEXT"),
    ("created_at", "TEXT"),
];

/// Columns every current `processed_files` table carries
const PROCESSED_COLUMNS: [(&str, &str); 2] = [("source_document", "TEXT"), ("processed_at", "TEXT")];

/// Legacy document-reference columns, in backfill preference order
const LEGACY_DOCUMENT_COLUMNS: [&str; 3] = ["source_url", "source_pdf", "file_path"];

const PROFILES_DDL: &str = "
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    year INTEGER,
    name TEXT NOT NULL,
    nationality TEXT,
    passport_no TEXT,
    source_document TEXT,
    created_at TEXT";

const PROCESSED_FILES_DDL: &str = "
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    source_document TEXT,
    processed_at TEXT";

/// One table as it exists in the live database
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TableInfo {
    pub columns: Vec<String>,
    /// The `CREATE TABLE` text recorded in `sqlite_master`
    pub sql: String,
}

impl TableInfo {
    pub fn has_column(&self, column: &str) -> bool {
        self.columns.iter().any(|c| c.eq_ignore_ascii_case(column))
    }
}

/// The live schema: table name to table info
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SchemaSnapshot {
    pub tables: BTreeMap<String, TableInfo>,
}

impl SchemaSnapshot {
    pub fn table(&self, name: &str) -> Option<&TableInfo> {
        self.tables.get(name)
    }

    pub fn has_table(&self, name: &str) -> bool {
        self.tables.contains_key(name)
    }
}

/// A schema migration
///
/// `plan` inspects the snapshot and returns the statements to run; it
/// touches nothing itself.
pub struct Migration {
    pub version: u32,
    pub description: &'static str,
    pub plan: fn(&SchemaSnapshot) -> Vec<String>,
}

/// All migrations in version order
pub const MIGRATIONS: [Migration; 4] = [
    Migration {
        version: 1,
        description: "create core tables",
        plan: plan_core_tables,
    },
    Migration {
        version: 2,
        description: "add missing columns",
        plan: plan_missing_columns,
    },
    Migration {
        version: 3,
        description: "drop legacy per-document uniqueness on profiles",
        plan: plan_drop_legacy_unique,
    },
    Migration {
        version: 4,
        description: "add watermarks, crawl runs and indexes",
        plan: plan_progress_tables,
    },
];

/// The version a fully migrated store reports
pub fn latest_version() -> u32 {
    MIGRATIONS.last().map(|m| m.version).unwrap_or(0)
}

fn plan_core_tables(snapshot: &SchemaSnapshot) -> Vec<String> {
    let mut statements = Vec::new();
    if !snapshot.has_table("profiles") {
        statements.push(format!("CREATE TABLE profiles ({PROFILES_DDL})"));
    }
    if !snapshot.has_table("processed_files") {
        statements.push(format!("CREATE TABLE processed_files ({PROCESSED_FILES_DDL})"));
    }
    statements
}

fn plan_missing_columns(snapshot: &SchemaSnapshot) -> Vec<String> {
    let mut statements = Vec::new();
    for (table, required) in [
        ("profiles", &PROFILE_COLUMNS[..]),
        ("processed_files", &PROCESSED_COLUMNS[..]),
    ] {
        let Some(info) = snapshot.table(table) else {
            continue;
        };

        for (column, sql_type) in required {
            if !info.has_column(column) {
                statements.push(format!("ALTER TABLE {table} ADD COLUMN {column} {sql_type}"));
            }
        }

        let legacy: Vec<&str> = LEGACY_DOCUMENT_COLUMNS
            .iter()
            .copied()
            .filter(|c| info.has_column(c))
            .collect();
        if !legacy.is_empty() {
            statements.push(format!(
                "UPDATE {table} SET source_document = COALESCE({}) WHERE source_document IS NULL",
                legacy.join(", ")
            ));
        }
    }
    statements
}

/// Older stores declared `source_pdf TEXT UNIQUE` on profiles, which allows a
/// single profile per document. The table is rebuilt without it.
fn plan_drop_legacy_unique(snapshot: &SchemaSnapshot) -> Vec<String> {
    let Some(info) = snapshot.table("profiles") else {
        return Vec::new();
    };

    let normalized = info
        .sql
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_ascii_uppercase();
    if !normalized.contains("SOURCE_PDF TEXT UNIQUE") {
        return Vec::new();
    }

    vec![
        format!("CREATE TABLE profiles_rebuilt ({PROFILES_DDL})"),
        "INSERT INTO profiles_rebuilt \
         (id, year, name, nationality, passport_no, source_document, created_at) \
         SELECT id, year, COALESCE(name, 'Unknown'), nationality, passport_no, \
         source_document, created_at FROM profiles"
            .to_string(),
        "DROP TABLE profiles".to_string(),
        "ALTER TABLE profiles_rebuilt RENAME TO profiles".to_string(),
    ]
}

fn plan_progress_tables(_snapshot: &SchemaSnapshot) -> Vec<String> {
    [
        "CREATE TABLE IF NOT EXISTS page_watermarks (
            source_document TEXT PRIMARY KEY,
            last_page INTEGER NOT NULL,
            updated_at TEXT NOT NULL
        )",
        "CREATE TABLE IF NOT EXISTS crawl_runs (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            started_at TEXT NOT NULL,
            finished_at TEXT,
            status TEXT NOT NULL,
            config_hash TEXT NOT NULL,
            documents_processed INTEGER NOT NULL DEFAULT 0,
            profiles_added INTEGER NOT NULL DEFAULT 0
        )",
        "CREATE INDEX IF NOT EXISTS idx_profiles_year ON profiles(year)",
        "CREATE INDEX IF NOT EXISTS idx_profiles_name ON profiles(name)",
        "CREATE INDEX IF NOT EXISTS idx_processed_source ON processed_files(source_document)",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

/// Reads the live schema
pub fn read_snapshot(conn: &Connection) -> Result<SchemaSnapshot, rusqlite::Error> {
    let mut stmt = conn.prepare(
        "SELECT name, COALESCE(sql, '') FROM sqlite_master \
         WHERE type = 'table' AND name NOT LIKE 'sqlite_%'",
    )?;
    let tables: Vec<(String, String)> = stmt
        .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
        .collect::<Result<_, _>>()?;

    let mut snapshot = SchemaSnapshot::default();
    for (name, sql) in tables {
        let mut info_stmt = conn.prepare(&format!("PRAGMA table_info(\"{name}\")"))?;
        let columns = info_stmt
            .query_map([], |row| row.get::<_, String>(1))?
            .collect::<Result<Vec<_>, _>>()?;
        snapshot.tables.insert(name, TableInfo { columns, sql });
    }
    Ok(snapshot)
}

/// Reads the recorded schema version
pub fn schema_version(conn: &Connection) -> Result<u32, rusqlite::Error> {
    conn.query_row("PRAGMA user_version", [], |row| row.get(0))
}

/// Plans one migration against the live schema without applying it
pub fn plan_migration(conn: &Connection, migration: &Migration) -> Result<Vec<String>, rusqlite::Error> {
    let snapshot = read_snapshot(conn)?;
    Ok((migration.plan)(&snapshot))
}

/// Brings the store up to the latest schema version
///
/// Each migration runs in its own transaction together with the version
/// bump. A store reporting a newer version than this build knows is left
/// untouched.
///
/// # Returns
///
/// The number of migrations applied
pub fn apply_migrations(conn: &mut Connection) -> StorageResult<usize> {
    let current = schema_version(conn)?;
    if current > latest_version() {
        tracing::warn!(
            "Store schema version {} is newer than supported version {}",
            current,
            latest_version()
        );
        return Ok(0);
    }

    let mut applied = 0;
    for migration in MIGRATIONS.iter().filter(|m| m.version > current) {
        let wrap = |source: rusqlite::Error| StorageError::Migration {
            version: migration.version,
            description: migration.description,
            source,
        };

        let tx = conn.transaction().map_err(wrap)?;
        let statements = plan_migration(&tx, migration).map_err(wrap)?;
        for statement in &statements {
            tx.execute_batch(statement).map_err(wrap)?;
        }
        tx.execute_batch(&format!("PRAGMA user_version = {}", migration.version))
            .map_err(wrap)?;
        tx.commit().map_err(wrap)?;

        tracing::debug!(
            "Applied migration {} ({}): {} statements",
            migration.version,
            migration.description,
            statements.len()
        );
        applied += 1;
    }

    Ok(applied)
}
