//! Document Registry
//!
//! SQLite-backed metadata store keyed by content hash. Re-ingesting
//! identical bytes is detected here and skipped before any parsing work
//! happens. Uses r2d2 connection pooling and WAL mode.

use std::path::Path;

use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{Connection, OptionalExtension, params};

use crate::types::Result;

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS documents (
    hash        TEXT PRIMARY KEY,
    filename    TEXT NOT NULL,
    size        INTEGER NOT NULL,
    upload_time TEXT NOT NULL,
    status      TEXT NOT NULL DEFAULT 'processed'
);
CREATE INDEX IF NOT EXISTS idx_documents_filename ON documents(filename);
";

/// Stored metadata for one ingested document.
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentRecord {
    pub hash: String,
    pub filename: String,
    pub size: u64,
    pub upload_time: String,
    pub status: String,
}

impl DocumentRecord {
    pub fn processed(hash: String, filename: String, size: u64) -> Self {
        Self {
            hash,
            filename,
            size,
            upload_time: chrono::Utc::now().format("%Y-%m-%d %H:%M:%S").to_string(),
            status: "processed".to_string(),
        }
    }
}

/// Thread-safe document registry with connection pooling.
pub struct DocumentStore {
    pool: Pool<SqliteConnectionManager>,
}

impl DocumentStore {
    /// Open the registry at the given path, creating schema if needed.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        if let Some(parent) = path.as_ref().parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }
        let manager = SqliteConnectionManager::file(path.as_ref()).with_init(Self::configure);
        Self::from_manager(manager)
    }

    /// Open an in-memory registry (tests and ephemeral runs).
    pub fn open_in_memory() -> Result<Self> {
        // Pool size 1: each in-memory connection is its own database
        let manager = SqliteConnectionManager::memory().with_init(Self::configure);
        let pool = Pool::builder().max_size(1).build(manager)?;
        pool.get()?.execute_batch(SCHEMA)?;
        Ok(Self { pool })
    }

    fn from_manager(manager: SqliteConnectionManager) -> Result<Self> {
        let pool = Pool::builder().max_size(4).build(manager)?;
        pool.get()?.execute_batch(SCHEMA)?;
        Ok(Self { pool })
    }

    fn configure(conn: &mut Connection) -> rusqlite::Result<()> {
        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA synchronous = NORMAL;
             PRAGMA foreign_keys = ON;",
        )
    }

    /// Insert or replace a document record.
    pub fn add(&self, record: &DocumentRecord) -> Result<()> {
        let conn = self.pool.get()?;
        conn.execute(
            "INSERT OR REPLACE INTO documents (hash, filename, size, upload_time, status)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                record.hash,
                record.filename,
                record.size as i64,
                record.upload_time,
                record.status
            ],
        )?;
        Ok(())
    }

    /// Look up a document by content hash.
    pub fn get(&self, hash: &str) -> Result<Option<DocumentRecord>> {
        let conn = self.pool.get()?;
        let record = conn
            .query_row(
                "SELECT hash, filename, size, upload_time, status
                 FROM documents WHERE hash = ?1",
                params![hash],
                Self::map_row,
            )
            .optional()?;
        Ok(record)
    }

    /// All documents, most recent first.
    pub fn list_all(&self) -> Result<Vec<DocumentRecord>> {
        let conn = self.pool.get()?;
        let mut stmt = conn.prepare(
            "SELECT hash, filename, size, upload_time, status
             FROM documents ORDER BY upload_time DESC",
        )?;
        let rows = stmt.query_map([], Self::map_row)?;
        let mut records = Vec::new();
        for row in rows {
            records.push(row?);
        }
        Ok(records)
    }

    /// Remove all records for a filename (used by deletion and rollback).
    pub fn delete_by_filename(&self, filename: &str) -> Result<()> {
        let conn = self.pool.get()?;
        conn.execute(
            "DELETE FROM documents WHERE filename = ?1",
            params![filename],
        )?;
        Ok(())
    }

    fn map_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<DocumentRecord> {
        Ok(DocumentRecord {
            hash: row.get(0)?,
            filename: row.get(1)?,
            size: row.get::<_, i64>(2)? as u64,
            upload_time: row.get(3)?,
            status: row.get(4)?,
        })
    }
}
