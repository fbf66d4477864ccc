//! Per-domain site session
//!
//! Holds the sites partitioned for the page currently in use so lookups and
//! saves don't go back to storage for every keystroke.

use tracing::debug;
use crate::database::{KeyValueStore, PasswordType, SitePatch, SiteRecord};
use crate::error::Result;
use crate::utils::union_urls;
use super::sites::SitePartition;
use super::store::SiteStore;

/// Sites loaded for one domain
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SiteSession {
    domain: String,
    related: Vec<SiteRecord>,
    other: Vec<SiteRecord>,
}

impl SiteSession {
    /// Build a session from already loaded records
    pub fn from_records(domain: &str, records: Vec<SiteRecord>) -> Self {
        let SitePartition { related, other } = SitePartition::new(domain, records);
        Self {
            domain: domain.to_string(),
            related,
            other,
        }
    }

    /// Load and partition every stored site for `domain`
    pub async fn load<S: KeyValueStore>(store: &mut SiteStore<S>, domain: &str) -> Result<Self> {
        let records = store.get(None).await?;
        let session = Self::from_records(domain, records);
        debug!(
            domain,
            related = session.related.len(),
            other = session.other.len(),
            "site session loaded"
        );
        Ok(session)
    }

    pub fn domain(&self) -> &str {
        &self.domain
    }

    /// Sites stored for this domain
    pub fn related(&self) -> &[SiteRecord] {
        &self.related
    }

    pub fn other(&self) -> &[SiteRecord] {
        &self.other
    }

    /// Find a site by name, related sites first
    pub fn lookup(&self, sitename: &str) -> Option<&SiteRecord> {
        self.related
            .iter()
            .chain(self.other.iter())
            .find(|s| s.sitename == sitename)
    }

    /// Site to show first: the first related one, else a fresh one for the domain
    pub fn initial_site(&self, default_type: PasswordType) -> SiteRecord {
        match self.related.first() {
            Some(site) => site.clone(),
            None => {
                let mut site = SiteRecord::new(&self.domain, &self.domain);
                site.password_type = default_type;
                site
            }
        }
    }

    /// Apply `patch` to `sitename` and persist it with this domain attached
    ///
    /// Without a domain the change stays in the session only. A site found
    /// among the other sites moves to the related ones once saved.
    pub async fn save_site<S: KeyValueStore>(
        &mut self,
        store: &mut SiteStore<S>,
        sitename: &str,
        patch: SitePatch,
    ) -> Result<SiteRecord> {
        let (mut site, was_other) = self.take(sitename);
        patch.apply_to(&mut site);

        if self.domain.is_empty() {
            debug!(%sitename, "no domain, site not persisted");
            self.put_back(site.clone(), was_other);
            return Ok(site);
        }

        let url = union_urls(&site.url, std::slice::from_ref(&self.domain));
        let stored = match store.update(sitename, &patch.with_url(url)).await {
            Ok(stored) => stored,
            Err(e) => {
                self.put_back(site, was_other);
                return Err(e);
            }
        };

        self.related.push(stored.clone());
        Ok(stored)
    }

    /// Remove `sitename` from the session, or start a new site for it
    fn take(&mut self, sitename: &str) -> (SiteRecord, bool) {
        if let Some(i) = self.related.iter().position(|s| s.sitename == sitename) {
            return (self.related.remove(i), false);
        }
        if let Some(i) = self.other.iter().position(|s| s.sitename == sitename) {
            return (self.other.remove(i), true);
        }
        (SiteRecord::new(sitename, &self.domain), false)
    }

    fn put_back(&mut self, site: SiteRecord, was_other: bool) {
        if was_other {
            self.other.push(site);
        } else {
            self.related.push(site);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::business::store::tests::record;
    use crate::database::MemoryStore;

    fn sample() -> Vec<SiteRecord> {
        vec![
            record("shop", &["shop.com"]),
            record("bob@shop.com", &["shop.com"]),
            record("bank", &["bank.no"]),
        ]
    }

    #[test]
    fn test_from_records_partitions() {
        let session = SiteSession::from_records("shop.com", sample());
        assert_eq!(session.domain(), "shop.com");
        assert_eq!(session.related().len(), 2);
        assert_eq!(session.other().len(), 1);
        assert_eq!(session.lookup("bank").unwrap().url, vec!["bank.no"]);
        assert!(session.lookup("missing").is_none());
    }

    #[test]
    fn test_initial_site() {
        let session = SiteSession::from_records("shop.com", sample());
        assert_eq!(session.initial_site(PasswordType::Pin).sitename, "shop");

        let session = SiteSession::from_records("new.org", sample());
        let fresh = session.initial_site(PasswordType::Pin);
        assert_eq!(fresh.sitename, "new.org");
        assert_eq!(fresh.url, vec!["new.org"]);
        assert_eq!(fresh.password_type, PasswordType::Pin);
    }

    #[tokio::test]
    async fn test_save_site_attaches_domain() {
        let mut store = SiteStore::new(MemoryStore::new());
        store.set(&sample()).await.unwrap();

        let mut session = SiteSession::load(&mut store, "bank.se").await.unwrap();
        assert!(session.related().is_empty());

        let saved = session
            .save_site(&mut store, "bank", SitePatch::default().with_generation(2))
            .await
            .unwrap();
        assert_eq!(saved.url, vec!["bank.no", "bank.se"]);
        assert_eq!(saved.generation, 2);
        assert_eq!(session.related().len(), 1);
        assert!(session.other().iter().all(|s| s.sitename != "bank"));

        let stored = store.get_site("bank").await.unwrap().unwrap();
        assert_eq!(stored, saved);
    }

    #[tokio::test]
    async fn test_save_new_site() {
        let mut store = SiteStore::new(MemoryStore::new());
        let mut session = SiteSession::load(&mut store, "fresh.io").await.unwrap();

        let saved = session
            .save_site(&mut store, "fresh.io", SitePatch::default().with_username("eve"))
            .await
            .unwrap();
        assert_eq!(saved.url, vec!["fresh.io"]);
        assert_eq!(store.get(None).await.unwrap(), vec![saved]);
    }

    #[tokio::test]
    async fn test_save_without_domain_stays_local() {
        let mut store = SiteStore::new(MemoryStore::new());
        let mut session = SiteSession::from_records("", Vec::new());

        let saved = session
            .save_site(&mut store, "local", SitePatch::default().with_generation(3))
            .await
            .unwrap();
        assert_eq!(saved.generation, 3);
        assert_eq!(session.lookup("local").unwrap().generation, 3);
        assert!(store.get(None).await.unwrap().is_empty());
    }
}
