//! In-process key-value store

use std::sync::{Mutex, MutexGuard};
use async_trait::async_trait;
use serde_json::Value;
use crate::error::{SiteStoreError, Result};
use super::{KeyValueStore, StoredValues};

/// Key-value store held in memory, mainly for tests and short-lived sessions
#[derive(Debug, Default)]
pub struct MemoryStore {
    values: Mutex<StoredValues>,
}

impl MemoryStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store pre-populated with raw values
    pub fn with_values(values: StoredValues) -> Self {
        Self {
            values: Mutex::new(values),
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, StoredValues>> {
        self.values
            .lock()
            .map_err(|_| SiteStoreError::Storage("Memory store lock poisoned".to_string()))
    }

    /// Copy of everything currently stored
    pub fn snapshot(&self) -> Result<StoredValues> {
        Ok(self.lock()?.clone())
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn load(&self, keys: &[&str]) -> Result<StoredValues> {
        let values = self.lock()?;
        Ok(keys
            .iter()
            .filter_map(|k| values.get(*k).map(|v| (k.to_string(), v.clone())))
            .collect())
    }

    async fn save(&self, values: StoredValues) -> Result<()> {
        let mut stored = self.lock()?;
        for (key, value) in values {
            if value == Value::Null {
                stored.remove(&key);
            } else {
                stored.insert(key, value);
            }
        }
        Ok(())
    }
}
