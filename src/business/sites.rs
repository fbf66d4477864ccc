//! Site operations
//!
//! This module provides per-site read-modify-write operations for the SiteStore.

use tracing::debug;
use crate::database::{KeyValueStore, SitePatch, SiteRecord};
use crate::error::Result;
use super::store::SiteStore;

/// Records split by whether they are stored for a given domain
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SitePartition {
    /// Records listing the domain in `url`
    pub related: Vec<SiteRecord>,
    /// Everything else
    pub other: Vec<SiteRecord>,
}

impl SitePartition {
    /// Partition by exact domain membership
    pub fn new(domain: &str, records: Vec<SiteRecord>) -> Self {
        let (related, other) = records.into_iter().partition(|r| r.has_url(domain));
        Self { related, other }
    }
}

impl<S: KeyValueStore> SiteStore<S> {
    /// Get a site by name
    pub async fn get_site(&mut self, sitename: &str) -> Result<Option<SiteRecord>> {
        let records = self.get(None).await?;
        Ok(records.into_iter().find(|r| r.sitename == sitename))
    }

    /// Sites stored for `domain` and all other sites
    pub async fn partition(&mut self, domain: &str) -> Result<SitePartition> {
        let records = self.get(None).await?;
        Ok(SitePartition::new(domain, records))
    }

    /// Create or patch the site named `sitename` and persist the list
    ///
    /// New sites start from generation 1, the default type, an empty login
    /// name and no domains, with the patch applied on top. Returns the stored
    /// record.
    pub async fn update(&mut self, sitename: &str, patch: &SitePatch) -> Result<SiteRecord> {
        let mut records = self.load_current().await?;

        let record = match records.iter_mut().find(|r| r.sitename == sitename) {
            Some(existing) => {
                patch.apply_to(existing);
                existing.clone()
            }
            None => {
                let created = patch.clone().into_record(sitename);
                records.push(created.clone());
                created
            }
        };

        self.set(&records).await?;
        debug!(%sitename, "site updated");
        Ok(record)
    }

    /// Remove the site named `sitename`; absent sites are not an error
    ///
    /// Returns true if a record was removed.
    pub async fn remove(&mut self, sitename: &str) -> Result<bool> {
        let mut records = self.load_current().await?;
        let before = records.len();
        records.retain(|r| r.sitename != sitename);

        if records.len() == before {
            return Ok(false);
        }

        self.set(&records).await?;
        debug!(%sitename, "site removed");
        Ok(true)
    }
}
