//! # mpwcore
//!
//! Site record storage for a Master Password browser extension.
//!
//! ## Features
//!
//! - Flat site record list persisted through an async key-value collaborator
//! - Detection and migration of the legacy per-domain storage format
//! - Upgrade gating that refuses to mutate legacy or partially written data
//! - Import merging with a pluggable async conflict resolver
//! - `.mpsites` and `.mpjson` import/export
//! - SQLite and in-memory storage backends
//!
//! ## Example
//!
//! ```no_run
//! use mpwcore::{MemoryStore, SiteStore, SitePatch};
//!
//! # async fn run() -> mpwcore::Result<()> {
//! let mut store = SiteStore::new(MemoryStore::new());
//! store
//!     .update("github.com", &SitePatch::default().with_url(vec!["github.com".into()]))
//!     .await?;
//!
//! for site in store.get(Some("github")).await? {
//!     println!("{}: {:?}", site.sitename, site.url);
//! }
//! # Ok(())
//! # }
//! ```

pub mod database;
pub mod business;
pub mod utils;
pub mod error;
pub mod export;
pub mod config;

// Re-export main types
pub use error::{SiteStoreError, Result};
pub use database::{KeyValueStore, MemoryStore, SqliteStore, StoredValues};
pub use database::models::{LegacySiteConfig, LegacySites, PasswordType, SitePatch, SiteRecord};
pub use database::format::{detect, StoredFormat};
pub use database::migrations::{migrate, LegacyMigration};
pub use business::{
    merge_sites, ConflictResolver, FnResolver, KeepExisting, MergeOutcome, MergeWarning,
    PreferIncoming, RejectConflicts, SitePartition, SiteSession, SiteStore,
};
pub use export::{make_mpsites, read_mpsites, IdentityMismatch, MpsitesDocument, MpsitesHeader};
pub use config::Settings;

/// Storage format version written by [`SiteStore::set`]
pub const CURRENT_FORMAT_VERSION: u32 = 2;

/// Version assumed when none is stored
pub const LEGACY_FORMAT_VERSION: u32 = 1;

/// Newest Master Password algorithm version
pub const ALG_VERSION_CURRENT: u32 = 3;

/// First algorithm version deriving non-ASCII site names correctly
pub const ALG_VERSION_UNICODE_SITENAME_FIX: u32 = 2;

/// Counter for new sites
pub const DEFAULT_GENERATION: u32 = 1;

/// Storage key of the legacy nested mapping
pub const KEY_SITES: &str = "sites";

/// Storage key of the flat record list
pub const KEY_SITEDATA: &str = "sitedata";

/// Storage key of the format version
pub const KEY_VERSION: &str = "version";
