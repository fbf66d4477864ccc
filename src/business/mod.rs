//! Business logic layer for site records
//!
//! This module provides the high-level SiteStore API, the import merge
//! engine and the conflict resolver seam.

pub mod conflict;
pub mod store;
pub mod sites;
pub mod merge;
pub mod import;
pub mod session;

pub use conflict::{ConflictResolver, FnResolver, KeepExisting, PreferIncoming, RejectConflicts};
pub use merge::{merge_sites, MergeOutcome, MergeWarning};
pub use session::SiteSession;
pub use sites::SitePartition;
pub use store::SiteStore;
