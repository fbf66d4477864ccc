//! Main SiteStore API
//!
//! This module provides the primary interface for reading and writing the
//! flat site record list through a key-value collaborator.

use std::collections::HashSet;
use serde_json::json;
use tracing::{debug, info, warn};
use crate::database::format::{detect, StoredFormat, STORAGE_KEYS};
use crate::database::migrations::LegacyMigration;
use crate::database::{KeyValueStore, SiteRecord, StoredValues};
use crate::error::{SiteStoreError, Result};
use crate::{CURRENT_FORMAT_VERSION, KEY_SITEDATA, KEY_VERSION};
use super::conflict::ConflictResolver;
use super::merge::merge_sites;

/// Message used when legacy data blocks a mutation
const LEGACY_PENDING: &str = "site data is stored in the legacy format and must be upgraded first";

/// Caller-held handle over the persisted site records
///
/// Holds the upgrade-required state between calls instead of a process-wide
/// cache. Operations load, change in memory and write back; concurrent
/// writers through separate handles are not coordinated.
pub struct SiteStore<S: KeyValueStore> {
    /// Persistence collaborator
    pub(crate) backend: S,
    /// Reason the last round-trip found legacy or ambiguous data
    pub(crate) upgrade_reason: Option<String>,
}

impl<S: KeyValueStore> SiteStore<S> {
    /// Create a store over a key-value backend
    pub fn new(backend: S) -> Self {
        Self {
            backend,
            upgrade_reason: None,
        }
    }

    /// Borrow the backend
    pub fn backend(&self) -> &S {
        &self.backend
    }

    /// Release the backend
    pub fn into_backend(self) -> S {
        self.backend
    }

    /// True when the last round-trip found data that must be migrated first
    pub fn need_upgrade(&self) -> bool {
        self.upgrade_reason.is_some()
    }

    /// Why an upgrade is needed, if it is
    pub fn upgrade_reason(&self) -> Option<&str> {
        self.upgrade_reason.as_deref()
    }

    /// Refuse destructive work while an upgrade is pending
    pub fn ensure_upgraded(&self) -> Result<()> {
        match &self.upgrade_reason {
            Some(reason) => Err(SiteStoreError::NeedUpgrade(reason.clone())),
            None => Ok(()),
        }
    }

    /// Load raw data and classify it, updating the upgrade state
    pub(crate) async fn load_format(&mut self) -> Result<StoredFormat> {
        let raw = self.backend.load(&STORAGE_KEYS).await?;
        let format = detect(&raw)?;

        self.upgrade_reason = match &format {
            StoredFormat::Legacy(legacy) => {
                let migration = LegacyMigration::from_legacy(legacy);
                Some(if migration.is_ambiguous() {
                    migration.describe_ambiguity()
                } else {
                    LEGACY_PENDING.to_string()
                })
            }
            StoredFormat::UpgradeRequired { reason, .. } => Some(reason.clone()),
            StoredFormat::Empty | StoredFormat::Current(_) => None,
        };

        if let Some(reason) = &self.upgrade_reason {
            warn!(format = format.kind(), %reason, "site data needs upgrade");
        }
        Ok(format)
    }

    /// Records for a read-modify-write cycle; fails while an upgrade is pending
    pub(crate) async fn load_current(&mut self) -> Result<Vec<SiteRecord>> {
        match self.load_format().await? {
            StoredFormat::Empty => Ok(Vec::new()),
            StoredFormat::Current(records) => Ok(records),
            StoredFormat::Legacy(_) | StoredFormat::UpgradeRequired { .. } => {
                Err(SiteStoreError::NeedUpgrade(
                    self.upgrade_reason.clone().unwrap_or_else(|| LEGACY_PENDING.to_string()),
                ))
            }
        }
    }

    /// Get stored sites, optionally only those with a domain containing `filter`
    ///
    /// Legacy data is migrated in memory and returned without being persisted;
    /// `need_upgrade()` stays true until a successful `set`. Ambiguous legacy
    /// data and partially written data fail with `NeedUpgrade`.
    pub async fn get(&mut self, filter: Option<&str>) -> Result<Vec<SiteRecord>> {
        let records = match self.load_format().await? {
            StoredFormat::Empty => Vec::new(),
            StoredFormat::Current(records) => records,
            StoredFormat::Legacy(legacy) => LegacyMigration::from_legacy(&legacy).into_records()?,
            StoredFormat::UpgradeRequired { reason, .. } => {
                return Err(SiteStoreError::NeedUpgrade(reason));
            }
        };

        let records = filter_records(records, filter);
        debug!(count = records.len(), filter = ?filter, "sites loaded");
        Ok(records)
    }

    /// Validate and persist the full record list in one write
    ///
    /// Nothing is written when validation fails. A successful write clears
    /// the upgrade-required state.
    pub async fn set(&mut self, records: &[SiteRecord]) -> Result<()> {
        validate(records)?;

        let mut values = StoredValues::new();
        values.insert(KEY_VERSION.to_string(), json!(CURRENT_FORMAT_VERSION));
        values.insert(KEY_SITEDATA.to_string(), serde_json::to_value(records)?);
        self.backend.save(values).await?;

        if self.upgrade_reason.take().is_some() {
            info!("site data upgraded");
        }
        debug!(count = records.len(), "sites saved");
        Ok(())
    }

    /// Explicitly migrate legacy or partially written data and persist it
    ///
    /// Disagreeing legacy settings and records from a partial write are
    /// settled through `resolver`. Returns the records now stored.
    pub async fn upgrade<R>(&mut self, resolver: &mut R) -> Result<Vec<SiteRecord>>
    where
        R: ConflictResolver + ?Sized,
    {
        let records = match self.load_format().await? {
            StoredFormat::Empty => return Ok(Vec::new()),
            StoredFormat::Current(records) => return Ok(records),
            StoredFormat::Legacy(legacy) => {
                LegacyMigration::from_legacy(&legacy).resolve(resolver).await?
            }
            StoredFormat::UpgradeRequired { legacy, partial, .. } => {
                let migrated = LegacyMigration::from_legacy(&legacy).resolve(resolver).await?;
                merge_sites(partial, migrated, resolver).await?.sites
            }
        };

        self.set(&records).await?;
        Ok(records)
    }
}

/// Keep records with at least one domain containing `filter`, ignoring case
pub fn filter_records(records: Vec<SiteRecord>, filter: Option<&str>) -> Vec<SiteRecord> {
    match filter.filter(|f| !f.is_empty()) {
        Some(needle) => records.into_iter().filter(|r| r.url_matches(needle)).collect(),
        None => records,
    }
}

/// Check every store invariant, failing on the first violation
pub fn validate(records: &[SiteRecord]) -> Result<()> {
    let mut names = HashSet::with_capacity(records.len());

    for record in records {
        let name = record.sitename.as_str();
        if name.is_empty() {
            return Err(SiteStoreError::validation(name, "sitename", "must not be empty"));
        }
        if !names.insert(name) {
            return Err(SiteStoreError::validation(name, "sitename", "is not unique"));
        }
        if record.url.is_empty() {
            return Err(SiteStoreError::validation(name, "url", "must contain at least one domain"));
        }
        let mut domains = HashSet::with_capacity(record.url.len());
        for domain in &record.url {
            if domain.is_empty() {
                return Err(SiteStoreError::validation(name, "url", "contains an empty domain"));
            }
            if !domains.insert(domain.as_str()) {
                return Err(SiteStoreError::validation(
                    name,
                    "url",
                    format!("lists {domain} more than once"),
                ));
            }
        }
        if record.generation < 1 {
            return Err(SiteStoreError::validation(name, "generation", "must be at least 1"));
        }
    }

    Ok(())
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::business::conflict::{KeepExisting, PreferIncoming};
    use crate::database::{MemoryStore, PasswordType};
    use serde_json::Value;

    pub fn record(sitename: &str, urls: &[&str]) -> SiteRecord {
        let mut r = SiteRecord::new(sitename, "");
        r.url = urls.iter().map(|u| u.to_string()).collect();
        r
    }

    pub fn store_with(raw: Value) -> SiteStore<MemoryStore> {
        let values = match raw {
            Value::Object(map) => map,
            _ => panic!("expected object"),
        };
        SiteStore::new(MemoryStore::with_values(values))
    }

    fn legacy_store() -> SiteStore<MemoryStore> {
        store_with(json!({
            "sites": {
                "url1.com": {"urla.no": {"generation": 1, "type": "l", "username": ""}},
                "url2.co.uk": {"urlb.com": {"generation": 1, "type": "l", "username": ""}},
                "url2.de": {"urlb.com": {"generation": 1, "type": "l", "username": ""}}
            }
        }))
    }

    #[tokio::test]
    async fn test_get_empty() {
        let mut store = SiteStore::new(MemoryStore::new());
        assert!(store.get(None).await.unwrap().is_empty());
        assert!(!store.need_upgrade());
    }

    #[tokio::test]
    async fn test_set_then_get() {
        let mut store = SiteStore::new(MemoryStore::new());
        let mut a = record("a.com", &["a.com"]);
        a.password_type = PasswordType::Pin;
        a.username = "bob".to_string();
        let records = vec![a, record("b.com", &["b.com", "www.b.com"])];

        store.set(&records).await.unwrap();
        assert_eq!(store.get(None).await.unwrap(), records);

        let raw = store.backend().snapshot().unwrap();
        assert_eq!(raw[KEY_VERSION], json!(CURRENT_FORMAT_VERSION));
    }

    #[tokio::test]
    async fn test_get_filter_case_insensitive() {
        let mut store = SiteStore::new(MemoryStore::new());
        store
            .set(&[record("a", &["Shop.Example.com"]), record("b", &["other.org"])])
            .await
            .unwrap();

        let found = store.get(Some("example")).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].sitename, "a");
        assert_eq!(store.get(Some("")).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_get_legacy_migrates_without_persisting() {
        let mut store = legacy_store();
        let records = store.get(None).await.unwrap();
        assert_eq!(records.len(), 2);
        assert!(store.need_upgrade());

        let raw = store.backend().snapshot().unwrap();
        assert!(!raw.contains_key(KEY_SITEDATA));
    }

    #[tokio::test]
    async fn test_set_clears_need_upgrade() {
        let mut store = legacy_store();
        let records = store.get(None).await.unwrap();
        assert!(store.need_upgrade());

        store.set(&records).await.unwrap();
        assert!(!store.need_upgrade());

        // Leftover legacy key no longer triggers an upgrade
        let again = store.get(None).await.unwrap();
        assert_eq!(again, records);
        assert!(!store.need_upgrade());
    }

    #[tokio::test]
    async fn test_get_ambiguous_legacy_fails() {
        let mut store = store_with(json!({
            "sites": {
                "a.com": {"shared": {"generation": 1, "type": "l", "username": ""}},
                "b.com": {"shared": {"generation": 1, "type": "x", "username": ""}}
            }
        }));
        match store.get(None).await {
            Err(SiteStoreError::NeedUpgrade(msg)) => assert!(msg.contains("shared")),
            other => panic!("expected NeedUpgrade, got {other:?}"),
        }
        assert!(store.need_upgrade());
        assert!(store.upgrade_reason().unwrap().contains("a.com, b.com"));
    }

    #[tokio::test]
    async fn test_upgrade_resolves_ambiguity() {
        let mut store = store_with(json!({
            "sites": {
                "a.com": {"shared": {"generation": 1, "type": "l", "username": ""}},
                "b.com": {"shared": {"generation": 1, "type": "x", "username": ""}}
            }
        }));
        let records = store.upgrade(&mut PreferIncoming).await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].password_type, PasswordType::Maximum);
        assert_eq!(records[0].url, vec!["a.com", "b.com"]);
        assert!(!store.need_upgrade());
        assert_eq!(store.get(None).await.unwrap(), records);
    }

    #[tokio::test]
    async fn test_upgrade_partial_write_merges() {
        let mut store = store_with(json!({
            "sites": {
                "a.com": {"a.com": {"generation": 1, "type": "l", "username": ""}},
                "b.com": {"b.com": {"generation": 2, "type": "l", "username": ""}}
            },
            "sitedata": [{"sitename": "a.com", "url": ["a.com"], "generation": 5, "type": "l", "username": ""}]
        }));
        assert!(store.get(None).await.unwrap_err().is_need_upgrade());

        let records = store.upgrade(&mut KeepExisting).await.unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].sitename, "a.com");
        assert_eq!(records[0].generation, 5);
        assert_eq!(records[1].sitename, "b.com");
        assert!(!store.need_upgrade());
    }

    #[tokio::test]
    async fn test_upgrade_noop_on_current() {
        let mut store = SiteStore::new(MemoryStore::new());
        assert!(store.upgrade(&mut KeepExisting).await.unwrap().is_empty());
        store.set(&[record("a", &["a.com"])]).await.unwrap();
        assert_eq!(store.upgrade(&mut KeepExisting).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_set_validation_leaves_store_unchanged() {
        let mut store = SiteStore::new(MemoryStore::new());
        store.set(&[record("a", &["a.com"])]).await.unwrap();

        let err = store
            .set(&[record("b", &["b.com"]), record("b", &["c.com"])])
            .await
            .unwrap_err();
        match err {
            SiteStoreError::Validation { sitename, field, .. } => {
                assert_eq!(sitename, "b");
                assert_eq!(field, "sitename");
            }
            other => panic!("expected Validation, got {other:?}"),
        }

        let stored = store.get(None).await.unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].sitename, "a");
    }

    #[test]
    fn test_validate_rules() {
        assert!(validate(&[]).is_ok());
        assert!(validate(&[record("a", &["a.com"])]).is_ok());

        fn field_of(records: &[SiteRecord]) -> &'static str {
            match validate(records) {
                Err(SiteStoreError::Validation { field, .. }) => field,
                other => panic!("expected Validation, got {other:?}"),
            }
        }

        assert_eq!(field_of(&[record("", &["a.com"])]), "sitename");
        assert_eq!(field_of(&[record("a", &[])]), "url");
        assert_eq!(field_of(&[record("a", &["a.com", "a.com"])]), "url");
        assert_eq!(field_of(&[record("a", &[""])]), "url");

        let mut zero = record("a", &["a.com"]);
        zero.generation = 0;
        assert_eq!(field_of(&[zero]), "generation");
    }
}
