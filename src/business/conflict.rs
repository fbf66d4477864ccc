//! Conflict resolution between two records sharing a sitename
//!
//! Used by import merges and by legacy migration when the same sitename was
//! stored with different settings under different domains.

use async_trait::async_trait;
use crate::database::SiteRecord;
use crate::error::{SiteStoreError, Result};

/// Caller-supplied decision between an incoming and an existing record
///
/// May suspend (for example while a user picks in a dialog). The returned
/// record is installed as-is, except that it keeps the shared sitename and
/// its `url` is replaced by the union of both sides. An error aborts the
/// whole batch and nothing is written.
#[async_trait]
pub trait ConflictResolver: Send {
    async fn resolve(&mut self, incoming: &SiteRecord, existing: &SiteRecord) -> Result<SiteRecord>;
}

/// Always keeps the record already stored
#[derive(Debug, Clone, Copy, Default)]
pub struct KeepExisting;

#[async_trait]
impl ConflictResolver for KeepExisting {
    async fn resolve(&mut self, _incoming: &SiteRecord, existing: &SiteRecord) -> Result<SiteRecord> {
        Ok(existing.clone())
    }
}

/// Always takes the incoming record
#[derive(Debug, Clone, Copy, Default)]
pub struct PreferIncoming;

#[async_trait]
impl ConflictResolver for PreferIncoming {
    async fn resolve(&mut self, incoming: &SiteRecord, _existing: &SiteRecord) -> Result<SiteRecord> {
        Ok(incoming.clone())
    }
}

/// Refuses every conflict, turning any disagreement into an error
#[derive(Debug, Clone, Copy, Default)]
pub struct RejectConflicts;

#[async_trait]
impl ConflictResolver for RejectConflicts {
    async fn resolve(&mut self, incoming: &SiteRecord, _existing: &SiteRecord) -> Result<SiteRecord> {
        Err(SiteStoreError::ConflictAborted(format!(
            "conflicting settings for {}",
            incoming.sitename
        )))
    }
}

/// Adapter for synchronous decision functions
pub struct FnResolver<F>(F);

impl<F> FnResolver<F>
where
    F: FnMut(&SiteRecord, &SiteRecord) -> Result<SiteRecord> + Send,
{
    pub fn new(decide: F) -> Self {
        Self(decide)
    }
}

#[async_trait]
impl<F> ConflictResolver for FnResolver<F>
where
    F: FnMut(&SiteRecord, &SiteRecord) -> Result<SiteRecord> + Send,
{
    async fn resolve(&mut self, incoming: &SiteRecord, existing: &SiteRecord) -> Result<SiteRecord> {
        (self.0)(incoming, existing)
    }
}
