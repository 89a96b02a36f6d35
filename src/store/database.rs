//! SQLite database holding one persisted collection, with migrations
//!
//! Stores the collection record and every (text, metadata, embedding) entry

use crate::error::{RagError, Result};
use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{params, Connection, OpenFlags};
use std::path::Path;
use std::time::Duration;

/// Database connection pool
pub type DbPool = Pool<SqliteConnectionManager>;

/// Database manager with migration support
pub struct Database {
    pool: DbPool,
    read_only: bool,
}

impl Database {
    /// Create a new database file and bring its schema up to date
    pub fn create(db_path: &Path) -> Result<Self> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                RagError::io(e, format!("Failed to create database directory: {:?}", parent))
            })?;
        }

        let manager = SqliteConnectionManager::file(db_path)
            .with_init(|conn| conn.execute_batch("PRAGMA foreign_keys = ON;"));
        let pool = Self::build_pool(manager, 1)?;

        let db = Self {
            pool,
            read_only: false,
        };

        db.migrate()?;

        Ok(db)
    }

    /// Open an existing database without write access
    ///
    /// Read-only handles may be shared by any number of concurrent readers.
    pub fn open_read_only(db_path: &Path) -> Result<Self> {
        let manager = SqliteConnectionManager::file(db_path).with_flags(
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        );
        let pool = Self::build_pool(manager, 4)?;

        let db = Self {
            pool,
            read_only: true,
        };

        let version = db.schema_version()?;
        if version != MIGRATIONS.len() as i32 {
            return Err(RagError::CorruptStore {
                path: db_path.to_path_buf(),
                message: format!(
                    "schema version {} does not match expected {}",
                    version,
                    MIGRATIONS.len()
                ),
            });
        }

        Ok(db)
    }

    fn build_pool(manager: SqliteConnectionManager, max_size: u32) -> Result<DbPool> {
        Ok(Pool::builder()
            .max_size(max_size)
            .connection_timeout(Duration::from_secs(5))
            .build(manager)?)
    }

    /// Get a connection from the pool
    pub fn get_conn(&self) -> Result<r2d2::PooledConnection<SqliteConnectionManager>> {
        Ok(self.pool.get()?)
    }

    pub fn is_read_only(&self) -> bool {
        self.read_only
    }

    /// Highest applied migration, 0 for a database without the migrations table
    pub fn schema_version(&self) -> Result<i32> {
        let conn = self.get_conn()?;
        read_schema_version(&conn)
    }

    /// Run database migrations
    fn migrate(&self) -> Result<()> {
        let conn = self.get_conn()?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS _migrations (
                version INTEGER PRIMARY KEY,
                applied_at TEXT NOT NULL
            )",
            [],
        )?;

        let current_version = read_schema_version(&conn)?;

        for (version, migration) in MIGRATIONS.iter().enumerate() {
            let version = version as i32 + 1;

            if version > current_version {
                tracing::debug!("Applying migration {}", version);

                conn.execute_batch(migration)?;

                conn.execute(
                    "INSERT INTO _migrations (version, applied_at) VALUES (?1, datetime('now'))",
                    params![version],
                )?;
            }
        }

        Ok(())
    }
}

fn read_schema_version(conn: &Connection) -> Result<i32> {
    let has_table: i32 = conn.query_row(
        "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = '_migrations'",
        [],
        |row| row.get(0),
    )?;
    if has_table == 0 {
        return Ok(0);
    }

    Ok(conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM _migrations",
        [],
        |row| row.get(0),
    )?)
}

/// Database migrations (each string is one migration)
const MIGRATIONS: &[&str] = &[
    // Migration 1: Initial schema
    r#"
    -- One row per persisted collection
    CREATE TABLE collections (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL UNIQUE,
        embedding_model TEXT NOT NULL,
        dimension INTEGER NOT NULL,
        source_hash TEXT,
        created_at TEXT NOT NULL
    );

    -- Embedded chunks; seq preserves document order
    CREATE TABLE entries (
        id TEXT PRIMARY KEY,
        collection_id INTEGER NOT NULL,
        seq INTEGER NOT NULL,
        document TEXT NOT NULL,
        metadata TEXT NOT NULL,  -- JSON metadata
        embedding BLOB NOT NULL, -- little-endian f32
        FOREIGN KEY (collection_id) REFERENCES collections(id) ON DELETE CASCADE
    );

    CREATE UNIQUE INDEX idx_entries_seq ON entries(collection_id, seq);
    "#,
];
