//! SQL query operations for the key-value table
//!
//! Values are stored as JSON text. For store-level operations use `SqliteStore`.

use rusqlite::{Connection, OptionalExtension, params};
use crate::error::Result;

/// Get the JSON text stored under `key`
pub fn get_value(conn: &Connection, key: &str) -> Result<Option<String>> {
    let value = conn
        .query_row(
            "SELECT value FROM mpw_storage WHERE key = ?",
            [key],
            |row| row.get(0),
        )
        .optional()?;
    Ok(value)
}

/// Insert or replace the JSON text for `key`
pub fn put_value(conn: &Connection, key: &str, value: &str) -> Result<()> {
    conn.execute(
        "INSERT OR REPLACE INTO mpw_storage (key, value) VALUES (?, ?)",
        params![key, value],
    )?;
    Ok(())
}

/// Delete `key`, returns true if a row was removed
pub fn delete_value(conn: &Connection, key: &str) -> Result<bool> {
    let count = conn.execute("DELETE FROM mpw_storage WHERE key = ?", [key])?;
    Ok(count > 0)
}
