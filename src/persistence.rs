//! # SQLite Key-Value Store
//!
//! Durable backing medium for the local cache. One table, one row per key:
//!
//! ```text
//! kv_cache(key TEXT PRIMARY KEY, value TEXT NOT NULL, updated_at INTEGER)
//! ```
//!
//! An optional byte quota caps the total size of stored values. A write that
//! would exceed it fails with a storage error and leaves the previous value
//! in place, the same way a browser's storage quota behaves.

#[cfg(feature = "persistence")]
use std::sync::{Mutex, MutexGuard};

#[cfg(feature = "persistence")]
use log::{debug, info, warn};

#[cfg(feature = "persistence")]
use rusqlite::{params, Connection, OptionalExtension};

#[cfg(feature = "persistence")]
use crate::error::{Result, SyncError};

#[cfg(feature = "persistence")]
use crate::store::KeyValueStore;

/// SQLite-backed [`KeyValueStore`].
///
/// The connection is guarded by a mutex so the store can be shared between
/// the reconciliation layer and the FFI session object.
#[cfg(feature = "persistence")]
pub struct SqliteStore {
    /// Database connection
    db: Mutex<Connection>,

    /// Database path (":memory:" for tests)
    db_path: String,

    /// Maximum total bytes of stored values, if any
    quota_bytes: Option<u64>,
}

#[cfg(feature = "persistence")]
impl SqliteStore {
    /// Open (or create) a store at the given database path.
    pub fn new(db_path: &str) -> Result<Self> {
        let db = Connection::open(db_path)?;
        Self::init_schema(&db)?;
        info!("[SqliteStore] Opened {}", db_path);

        Ok(Self {
            db: Mutex::new(db),
            db_path: db_path.to_string(),
            quota_bytes: None,
        })
    }

    /// Create an in-memory database (for testing).
    pub fn in_memory() -> Result<Self> {
        Self::new(":memory:")
    }

    /// Cap the total size of stored values.
    pub fn with_quota(mut self, quota_bytes: u64) -> Self {
        self.quota_bytes = Some(quota_bytes);
        self
    }

    pub fn db_path(&self) -> &str {
        &self.db_path
    }

    fn init_schema(conn: &Connection) -> Result<()> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS kv_cache (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL,
                updated_at INTEGER DEFAULT (strftime('%s', 'now'))
            );
            "#,
        )?;
        Ok(())
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.db
            .lock()
            .map_err(|_| SyncError::storage("sqlite connection lock poisoned"))
    }

    /// Total bytes stored under every key except `excluding`.
    fn used_bytes(conn: &Connection, excluding: &str) -> Result<u64> {
        let used: i64 = conn.query_row(
            "SELECT COALESCE(SUM(LENGTH(CAST(value AS BLOB))), 0) FROM kv_cache WHERE key != ?",
            params![excluding],
            |row| row.get(0),
        )?;
        Ok(used.max(0) as u64)
    }

    /// Number of stored keys.
    pub fn key_count(&self) -> Result<u32> {
        let conn = self.conn()?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM kv_cache", [], |row| row.get(0))?;
        Ok(count.max(0) as u32)
    }

    /// Remove every key.
    pub fn clear(&self) -> Result<()> {
        self.conn()?.execute("DELETE FROM kv_cache", [])?;
        info!("[SqliteStore] Cleared");
        Ok(())
    }
}

#[cfg(feature = "persistence")]
impl KeyValueStore for SqliteStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let conn = self.conn()?;
        let value = conn
            .query_row(
                "SELECT value FROM kv_cache WHERE key = ?",
                params![key],
                |row| row.get::<_, String>(0),
            )
            .optional()?;
        Ok(value)
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let conn = self.conn()?;

        if let Some(quota) = self.quota_bytes {
            let needed = Self::used_bytes(&conn, key)? + value.len() as u64;
            if needed > quota {
                warn!(
                    "[SqliteStore] Quota exceeded writing '{}': {} > {} bytes",
                    key, needed, quota
                );
                return Err(SyncError::storage(format!(
                    "quota exceeded ({} > {} bytes)",
                    needed, quota
                )));
            }
        }

        conn.execute(
            "INSERT OR REPLACE INTO kv_cache (key, value, updated_at) VALUES (?, ?, strftime('%s', 'now'))",
            params![key, value],
        )?;
        debug!("[SqliteStore] Wrote '{}' ({} bytes)", key, value.len());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.conn()?
            .execute("DELETE FROM kv_cache WHERE key = ?", params![key])?;
        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================
