//! Storage layer for the site store
//!
//! Handles everything below the public `SiteStore` API:
//! - The asynchronous key-value collaborator contract and its backends
//! - Record models and the legacy nested shape
//! - Stored format detection and legacy migration

pub mod models;
pub mod schema;
pub mod connection;
pub mod memory;
pub mod queries;
pub mod format;
pub mod migrations;

use async_trait::async_trait;
use serde_json::{Map, Value};
use crate::error::Result;

pub use connection::SqliteStore;
pub use memory::MemoryStore;
pub use models::*;

/// A partial snapshot of persisted keys
pub type StoredValues = Map<String, Value>;

/// Asynchronous key-value persistence collaborator
///
/// `load` returns only the requested keys that exist. `save` must apply all
/// given keys or none of them. A `null` value removes the key.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Read the given keys
    async fn load(&self, keys: &[&str]) -> Result<StoredValues>;

    /// Write all given keys atomically
    async fn save(&self, values: StoredValues) -> Result<()>;
}
