//! Import and export through the SiteStore

use tracing::info;
use crate::database::{KeyValueStore, SiteRecord};
use crate::error::Result;
use crate::export::{make_mpsites, read_mpsites, MpsitesHeader};
use super::conflict::ConflictResolver;
use super::merge::{merge_sites, MergeOutcome};
use super::store::SiteStore;

impl<S: KeyValueStore> SiteStore<S> {
    /// Merge `incoming` into the stored sites and persist the result
    ///
    /// Fails with `NeedUpgrade` before loading anything when an upgrade is
    /// already known to be pending. A resolver error abandons the whole batch
    /// and nothing is written.
    pub async fn import_sites<R>(
        &mut self,
        incoming: Vec<SiteRecord>,
        resolver: &mut R,
    ) -> Result<MergeOutcome>
    where
        R: ConflictResolver + ?Sized,
    {
        self.ensure_upgraded()?;
        let existing = self.load_current().await?;
        let count = incoming.len();

        let outcome = merge_sites(existing, incoming, resolver).await?;
        self.set(&outcome.sites).await?;

        info!(
            count,
            added = outcome.added,
            conflicts = outcome.conflicts,
            warnings = outcome.warnings.len(),
            "sites imported"
        );
        Ok(outcome)
    }

    /// Decode an `.mpsites`/`.mpjson` document and import its sites
    ///
    /// Callers wanting to confirm a header identity mismatch first should use
    /// [`read_mpsites`] and [`SiteStore::import_sites`] directly.
    pub async fn import_mpsites<R>(&mut self, data: &str, resolver: &mut R) -> Result<MergeOutcome>
    where
        R: ConflictResolver + ?Sized,
    {
        self.ensure_upgraded()?;
        let document = read_mpsites(data)?;
        self.import_sites(document.sites, resolver).await
    }

    /// Encode every stored site as `.mpjson` (`json`) or `.mpsites` text
    pub async fn export_mpsites(
        &mut self,
        header: &MpsitesHeader,
        alg_min_version: u32,
        json: bool,
    ) -> Result<String> {
        let sites = self.get(None).await?;
        make_mpsites(header, &sites, alg_min_version, json)
    }
}
