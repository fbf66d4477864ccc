//! SQLite-backed key-value store

use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use async_trait::async_trait;
use rusqlite::Connection;
use serde_json::Value;
use tracing::debug;
use crate::error::{SiteStoreError, Result};
use super::{queries, schema, KeyValueStore, StoredValues};

/// Key-value store persisted in a SQLite database file
pub struct SqliteStore {
    /// Path to the database file, `None` for in-memory databases
    path: Option<PathBuf>,
    /// SQLite connection
    conn: Mutex<Option<Connection>>,
}

impl SqliteStore {
    /// Open (or create) a store at the specified path
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;
        Self::init(&conn)?;
        Ok(Self {
            path: Some(path.to_path_buf()),
            conn: Mutex::new(Some(conn)),
        })
    }

    /// Open a private in-memory store
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Self::init(&conn)?;
        Ok(Self {
            path: None,
            conn: Mutex::new(Some(conn)),
        })
    }

    fn init(conn: &Connection) -> Result<()> {
        for sql in schema::CREATE_ALL_TABLES {
            conn.execute(sql, [])?;
        }
        Ok(())
    }

    fn lock(&self) -> Result<MutexGuard<'_, Option<Connection>>> {
        self.conn
            .lock()
            .map_err(|_| SiteStoreError::Storage("Connection lock poisoned".to_string()))
    }

    /// Get the database path
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Close the database connection
    pub fn close(&self) {
        if let Ok(mut guard) = self.conn.lock() {
            *guard = None;
        }
    }

    /// Check if database is open
    pub fn is_open(&self) -> bool {
        self.conn.lock().map(|g| g.is_some()).unwrap_or(false)
    }
}

fn closed() -> SiteStoreError {
    SiteStoreError::Storage("Database not open".to_string())
}

#[async_trait]
impl KeyValueStore for SqliteStore {
    async fn load(&self, keys: &[&str]) -> Result<StoredValues> {
        let guard = self.lock()?;
        let conn = guard.as_ref().ok_or_else(closed)?;

        let mut values = StoredValues::new();
        for key in keys {
            if let Some(text) = queries::get_value(conn, key)? {
                values.insert(key.to_string(), serde_json::from_str(&text)?);
            }
        }

        debug!(requested = keys.len(), found = values.len(), "sqlite load");
        Ok(values)
    }

    async fn save(&self, values: StoredValues) -> Result<()> {
        let mut guard = self.lock()?;
        let conn = guard.as_mut().ok_or_else(closed)?;

        // Dropping the transaction without commit rolls back every key
        let tx = conn.transaction()?;
        for (key, value) in &values {
            match value {
                Value::Null => {
                    queries::delete_value(&tx, key)?;
                }
                _ => queries::put_value(&tx, key, &serde_json::to_string(value)?)?,
            }
        }
        tx.commit()?;

        debug!(keys = values.len(), "sqlite save");
        Ok(())
    }
}
