//! Key-value storage contract and SQLite implementation.
//!
//! # Responsibility
//! - Define the minimal get/put contract the note store persists through.
//! - Keep SQL details inside the core persistence boundary.
//!
//! # Invariants
//! - `put` replaces the whole value for a key in a single statement.
//! - A missing key reads back as `None`, never as an error.

use super::open::{open_db, open_db_in_memory};
use super::{StorageError, StorageResult};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;

/// Durable key-value storage contract.
///
/// The trait is the seam between the note store and its backend; tests
/// substitute failing or recording implementations to exercise the
/// degraded-persistence paths.
pub trait KvStore {
    /// Reads the value stored under `key`, or `None` when absent.
    fn get(&self, key: &str) -> StorageResult<Option<String>>;
    /// Writes `value` under `key`, overwriting any prior value.
    fn put(&mut self, key: &str, value: &str) -> StorageResult<()>;
}

/// SQLite-backed key-value store.
#[derive(Debug)]
pub struct SqliteKvStore {
    conn: Connection,
}

impl SqliteKvStore {
    /// Wraps a migrated/ready connection.
    pub fn try_new(conn: Connection) -> StorageResult<Self> {
        ensure_kv_connection_ready(&conn)?;
        Ok(Self { conn })
    }

    /// Opens a database file, migrates it, and wraps it.
    pub fn open(path: impl AsRef<Path>) -> StorageResult<Self> {
        Self::try_new(open_db(path)?)
    }

    /// Opens an in-memory database, migrates it, and wraps it.
    pub fn open_in_memory() -> StorageResult<Self> {
        Self::try_new(open_db_in_memory()?)
    }
}

impl KvStore for SqliteKvStore {
    fn get(&self, key: &str) -> StorageResult<Option<String>> {
        let value = self
            .conn
            .query_row(
                "SELECT value FROM kv_entries WHERE key = ?1;",
                [key],
                |row| row.get::<_, String>(0),
            )
            .optional()?;
        Ok(value)
    }

    fn put(&mut self, key: &str, value: &str) -> StorageResult<()> {
        self.conn.execute(
            "INSERT INTO kv_entries (key, value, updated_at)
             VALUES (?1, ?2, (strftime('%s', 'now') * 1000))
             ON CONFLICT(key) DO UPDATE SET
                value = excluded.value,
                updated_at = excluded.updated_at;",
            params![key, value],
        )?;
        Ok(())
    }
}

fn ensure_kv_connection_ready(conn: &Connection) -> StorageResult<()> {
    if !table_exists(conn, "kv_entries")? {
        return Err(StorageError::Backend(
            "required table `kv_entries` is missing; connection was not migrated".to_string(),
        ));
    }
    Ok(())
}

fn table_exists(conn: &Connection, table: &str) -> StorageResult<bool> {
    let exists: i64 = conn.query_row(
        "SELECT EXISTS(
            SELECT 1
            FROM sqlite_master
            WHERE type = 'table' AND name = ?1
        );",
        [table],
        |row| row.get(0),
    )?;
    Ok(exists == 1)
}
