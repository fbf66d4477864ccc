//! Error types for the site store

use thiserror::Error;

/// Main error type for site store operations
#[derive(Error, Debug)]
pub enum SiteStoreError {
    /// Stored data is legacy or ambiguous and must be migrated explicitly
    #[error("Data upgrade required: {0}")]
    NeedUpgrade(String),

    /// A record violates a store invariant
    #[error("Invalid site '{sitename}': {field} {reason}")]
    Validation {
        sitename: String,
        field: &'static str,
        reason: String,
    },

    /// Imported data could not be decoded
    #[error("Import failed: {0}")]
    ImportFormat(String),

    /// Password type tag outside the known set
    #[error("Unknown password type: {0}")]
    UnknownPasswordType(String),

    /// Stored format version is newer than this library understands
    #[error("Unsupported storage version: {0}")]
    UnsupportedVersion(u32),

    /// The persistence collaborator failed
    #[error("Storage error: {0}")]
    Storage(String),

    /// Stored or imported JSON did not have the expected shape
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// A conflict resolver declined to pick a record
    #[error("Conflict resolution aborted: {0}")]
    ConflictAborted(String),
}

impl SiteStoreError {
    /// Build a validation error for `field` of `sitename`
    pub fn validation(sitename: &str, field: &'static str, reason: impl Into<String>) -> Self {
        SiteStoreError::Validation {
            sitename: sitename.to_string(),
            field,
            reason: reason.into(),
        }
    }

    /// True for errors that block mutation until the caller migrates
    pub fn is_need_upgrade(&self) -> bool {
        matches!(self, SiteStoreError::NeedUpgrade(_))
    }
}

impl From<rusqlite::Error> for SiteStoreError {
    fn from(err: rusqlite::Error) -> Self {
        SiteStoreError::Storage(err.to_string())
    }
}

impl From<serde_json::Error> for SiteStoreError {
    fn from(err: serde_json::Error) -> Self {
        SiteStoreError::Serialization(err.to_string())
    }
}

/// Result type alias for site store operations
pub type Result<T> = std::result::Result<T, SiteStoreError>;
