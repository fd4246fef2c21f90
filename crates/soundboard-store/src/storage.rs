//! Synchronous key-value storage for persisted client state.
//!
//! [`KeyValueStorage`] is the seam between the auth store and wherever its
//! tokens live. Two backends are provided:
//!
//! - [`MemoryStorage`]: a `HashMap`, for tests and ephemeral sessions.
//! - [`SqliteStorage`]: a single `kv` table in a SQLite file, so tokens
//!   survive restarts.

use std::collections::HashMap;
use std::sync::Mutex;

use rusqlite::{Connection, OptionalExtension, params};

use crate::error::{Result, StoreError};

/// One write in a batch passed to [`KeyValueStorage::apply`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageOp<'a> {
    /// Insert or overwrite `key`.
    Set(&'a str, &'a str),
    /// Delete `key`.
    Remove(&'a str),
}

/// A string-to-string store with synchronous access.
pub trait KeyValueStorage: Send + Sync {
    /// Read the value for `key`, if any.
    fn get(&self, key: &str) -> Result<Option<String>>;

    /// Insert or overwrite the value for `key`.
    fn set(&self, key: &str, value: &str) -> Result<()>;

    /// Delete `key`. Removing an absent key is not an error.
    fn remove(&self, key: &str) -> Result<()>;

    /// Apply `ops` in order as one unit.
    ///
    /// The default runs them one by one and stops at the first error, so
    /// earlier writes stay applied. Backends that can do better override it:
    /// both provided backends apply the whole batch or none of it.
    fn apply(&self, ops: &[StorageOp<'_>]) -> Result<()> {
        for op in ops {
            match *op {
                StorageOp::Set(key, value) => self.set(key, value)?,
                StorageOp::Remove(key) => self.remove(key)?,
            }
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// MemoryStorage
// ---------------------------------------------------------------------------

/// In-process storage that forgets everything on drop.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStorage {
    /// Create an empty storage.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a storage pre-filled with `entries`.
    pub fn with_entries<K, V>(entries: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            entries: Mutex::new(
                entries
                    .into_iter()
                    .map(|(k, v)| (k.into(), v.into()))
                    .collect(),
            ),
        }
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, HashMap<String, String>>> {
        self.entries
            .lock()
            .map_err(|_| StoreError::LockPoisoned { what: "memory storage" })
    }
}

impl KeyValueStorage for MemoryStorage {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.lock()?.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.lock()?.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.lock()?.remove(key);
        Ok(())
    }

    fn apply(&self, ops: &[StorageOp<'_>]) -> Result<()> {
        let mut entries = self.lock()?;
        for op in ops {
            match *op {
                StorageOp::Set(key, value) => {
                    entries.insert(key.to_string(), value.to_string());
                }
                StorageOp::Remove(key) => {
                    entries.remove(key);
                }
            }
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// SqliteStorage
// ---------------------------------------------------------------------------

/// Storage backed by a SQLite database file.
///
/// The `Connection` is wrapped in a `Mutex` because it is `!Sync`. Single
/// operations hold the lock for one statement; [`KeyValueStorage::apply`]
/// holds it for one transaction.
pub struct SqliteStorage {
    conn: Mutex<Connection>,
}

impl SqliteStorage {
    /// Open (or create) the storage database at `path`.
    ///
    /// Parent directories are created as needed.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Io`] if the parent directory cannot be created
    /// and [`StoreError::Storage`] if the database cannot be opened.
    pub fn open(path: impl AsRef<std::path::Path>) -> Result<Self> {
        let path = path.as_ref();
        tracing::info!(path = %path.display(), "opening token storage");

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;
        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA synchronous = NORMAL;",
        )?;
        Self::init(conn)
    }

    /// Open a storage that lives only as long as this value.
    pub fn open_in_memory() -> Result<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS kv (
                key        TEXT PRIMARY KEY,
                value      TEXT NOT NULL,
                updated_at INTEGER NOT NULL
            );",
        )?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| StoreError::LockPoisoned { what: "sqlite storage" })
    }
}

impl KeyValueStorage for SqliteStorage {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let conn = self.lock()?;
        let value = conn
            .query_row("SELECT value FROM kv WHERE key = ?1", params![key], |row| {
                row.get(0)
            })
            .optional()?;
        Ok(value)
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let now = chrono::Utc::now().timestamp();
        self.lock()?.execute(
            "INSERT INTO kv (key, value, updated_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
            params![key, value, now],
        )?;
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.lock()?
            .execute("DELETE FROM kv WHERE key = ?1", params![key])?;
        Ok(())
    }

    fn apply(&self, ops: &[StorageOp<'_>]) -> Result<()> {
        let now = chrono::Utc::now().timestamp();
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        for op in ops {
            match *op {
                StorageOp::Set(key, value) => {
                    tx.execute(
                        "INSERT INTO kv (key, value, updated_at) VALUES (?1, ?2, ?3)
                         ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
                        params![key, value, now],
                    )?;
                }
                StorageOp::Remove(key) => {
                    tx.execute("DELETE FROM kv WHERE key = ?1", params![key])?;
                }
            }
        }
        // Dropping `tx` on an early return rolls the batch back.
        tx.commit()?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
