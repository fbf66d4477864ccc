//! Legacy nested format migration
//!
//! The legacy shape stores settings per `domain -> sitename`. Each pairing
//! becomes a candidate record with a single domain; candidates sharing a
//! sitename are then coalesced into one record whose `url` is the union of
//! their domains. Candidates that disagree on settings cannot be coalesced
//! without a choice and are reported as ambiguous.

use std::collections::HashMap;
use tracing::{debug, info};
use crate::business::conflict::ConflictResolver;
use crate::error::{SiteStoreError, Result};
use crate::utils::union_urls;
use super::{LegacySites, SiteRecord};

/// All candidates sharing one sitename, in legacy iteration order
#[derive(Debug, Clone, PartialEq)]
pub struct CandidateGroup {
    pub sitename: String,
    pub candidates: Vec<SiteRecord>,
}

impl CandidateGroup {
    /// True if any candidate's settings differ from the first one's
    pub fn is_ambiguous(&self) -> bool {
        match self.candidates.split_first() {
            Some((first, rest)) => rest.iter().any(|c| !c.same_settings(first)),
            None => false,
        }
    }

    /// Every domain contributing to this sitename
    pub fn domains(&self) -> Vec<String> {
        self.candidates
            .iter()
            .fold(Vec::new(), |acc, c| union_urls(&acc, &c.url))
    }

    /// Merge agreeing candidates into one record
    fn coalesce(&self) -> Option<SiteRecord> {
        let mut record = self.candidates.first()?.clone();
        record.url = self.domains();
        Some(record)
    }

    /// Fold candidates through `resolver` wherever they disagree
    async fn resolve<R>(&self, resolver: &mut R) -> Result<Option<SiteRecord>>
    where
        R: ConflictResolver + ?Sized,
    {
        let Some((first, rest)) = self.candidates.split_first() else {
            return Ok(None);
        };

        let mut chosen = first.clone();
        for candidate in rest {
            if !candidate.same_settings(&chosen) {
                debug!(sitename = %self.sitename, domain = ?candidate.url, "resolving legacy conflict");
                chosen = resolver.resolve(candidate, &chosen).await?;
            }
        }
        chosen.sitename = self.sitename.clone();
        chosen.url = self.domains();
        Ok(Some(chosen))
    }
}

/// Result of inverting and grouping legacy data
#[derive(Debug, Clone, PartialEq, Default)]
pub struct LegacyMigration {
    groups: Vec<CandidateGroup>,
}

impl LegacyMigration {
    /// Build candidate groups from legacy data
    pub fn from_legacy(legacy: &LegacySites) -> Self {
        let mut groups: Vec<CandidateGroup> = Vec::new();
        let mut index: HashMap<String, usize> = HashMap::new();

        for candidate in candidates(legacy) {
            match index.get(&candidate.sitename).copied() {
                Some(i) => groups[i].candidates.push(candidate),
                None => {
                    index.insert(candidate.sitename.clone(), groups.len());
                    groups.push(CandidateGroup {
                        sitename: candidate.sitename.clone(),
                        candidates: vec![candidate],
                    });
                }
            }
        }

        Self { groups }
    }

    /// All candidate groups in first-seen order
    pub fn groups(&self) -> &[CandidateGroup] {
        &self.groups
    }

    /// Groups whose candidates disagree
    pub fn ambiguous(&self) -> impl Iterator<Item = &CandidateGroup> {
        self.groups.iter().filter(|g| g.is_ambiguous())
    }

    pub fn is_ambiguous(&self) -> bool {
        self.ambiguous().next().is_some()
    }

    /// Human-readable list of ambiguous sitenames and their domains
    pub fn describe_ambiguity(&self) -> String {
        let parts: Vec<String> = self
            .ambiguous()
            .map(|g| format!("{} ({})", g.sitename, g.domains().join(", ")))
            .collect();
        format!("different settings stored per domain for: {}", parts.join("; "))
    }

    /// Coalesced records, failing if any group needs a decision
    pub fn into_records(self) -> Result<Vec<SiteRecord>> {
        if self.is_ambiguous() {
            return Err(SiteStoreError::NeedUpgrade(self.describe_ambiguity()));
        }
        Ok(self.groups.iter().filter_map(CandidateGroup::coalesce).collect())
    }

    /// Coalesced records, asking `resolver` for every disagreement
    pub async fn resolve<R>(self, resolver: &mut R) -> Result<Vec<SiteRecord>>
    where
        R: ConflictResolver + ?Sized,
    {
        let mut records = Vec::with_capacity(self.groups.len());
        for group in &self.groups {
            if let Some(record) = group.resolve(resolver).await? {
                records.push(record);
            }
        }
        info!(count = records.len(), "legacy sites migrated");
        Ok(records)
    }
}

/// One single-domain record per legacy `domain/sitename` pairing
pub fn candidates(legacy: &LegacySites) -> Vec<SiteRecord> {
    legacy
        .iter()
        .flat_map(|(domain, sites)| {
            sites.iter().map(move |(sitename, cfg)| {
                let mut record = SiteRecord::new(sitename, domain);
                record.generation = cfg.generation;
                record.password_type = cfg.password_type;
                record.username = cfg.username.clone();
                record
            })
        })
        .collect()
}

/// Convert legacy data to flat records without user interaction
///
/// Never persists anything. Fails with `NeedUpgrade` when the same sitename
/// carries different settings under different domains.
pub fn migrate(legacy: &LegacySites) -> Result<Vec<SiteRecord>> {
    LegacyMigration::from_legacy(legacy).into_records()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::business::conflict::{FnResolver, KeepExisting, PreferIncoming};
    use crate::database::PasswordType;
    use serde_json::json;

    fn legacy(value: serde_json::Value) -> LegacySites {
        serde_json::from_value(value).unwrap()
    }

    fn sample() -> LegacySites {
        legacy(json!({
            "url1.com": {"urla.no": {"generation": 1, "type": "l", "username": ""}},
            "url2.co.uk": {"urlb.com": {"generation": 1, "type": "l", "username": ""}},
            "url2.de": {"urlb.com": {"generation": 1, "type": "l", "username": ""}}
        }))
    }

    #[test]
    fn test_candidates_one_per_pairing() {
        let c = candidates(&sample());
        assert_eq!(c.len(), 3);
        assert!(c.iter().all(|r| r.url.len() == 1));
    }

    #[test]
    fn test_migrate_coalesces_identical_sites() {
        let records = migrate(&sample()).unwrap();
        assert_eq!(records.len(), 2);

        let a = records.iter().find(|r| r.sitename == "urla.no").unwrap();
        assert_eq!(a.url, vec!["url1.com"]);

        let b = records.iter().find(|r| r.sitename == "urlb.com").unwrap();
        assert_eq!(b.url, vec!["url2.co.uk", "url2.de"]);
        assert_eq!(b.generation, 1);
        assert_eq!(b.password_type, PasswordType::Long);
        assert_eq!(b.username, "");
    }

    #[test]
    fn test_migrate_empty() {
        assert!(migrate(&LegacySites::new()).unwrap().is_empty());
        let only_domains = legacy(json!({"a.com": {}}));
        assert!(migrate(&only_domains).unwrap().is_empty());
    }

    #[test]
    fn test_migrate_missing_username_defaults_empty() {
        let data = legacy(json!({"a.com": {"a.com": {"generation": 2, "type": "x"}}}));
        let records = migrate(&data).unwrap();
        assert_eq!(records[0].username, "");
        assert_eq!(records[0].generation, 2);
    }

    #[test]
    fn test_migrate_ambiguous_fails() {
        let data = legacy(json!({
            "a.com": {"shared": {"generation": 1, "type": "l", "username": ""}},
            "b.com": {"shared": {"generation": 4, "type": "l", "username": ""}}
        }));
        let migration = LegacyMigration::from_legacy(&data);
        assert!(migration.is_ambiguous());
        assert!(migration.describe_ambiguity().contains("shared (a.com, b.com)"));

        match migrate(&data) {
            Err(SiteStoreError::NeedUpgrade(msg)) => assert!(msg.contains("shared")),
            other => panic!("expected NeedUpgrade, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_resolve_ambiguous_with_resolver() {
        let data = legacy(json!({
            "a.com": {"shared": {"generation": 1, "type": "l", "username": ""}},
            "b.com": {"shared": {"generation": 4, "type": "l", "username": ""}},
            "c.com": {"other": {"generation": 1, "type": "p", "username": "x"}}
        }));

        let records = LegacyMigration::from_legacy(&data)
            .resolve(&mut PreferIncoming)
            .await
            .unwrap();
        assert_eq!(records.len(), 2);
        let shared = records.iter().find(|r| r.sitename == "shared").unwrap();
        assert_eq!(shared.generation, 4);
        assert_eq!(shared.url, vec!["a.com", "b.com"]);

        let records = LegacyMigration::from_legacy(&data)
            .resolve(&mut KeepExisting)
            .await
            .unwrap();
        let shared = records.iter().find(|r| r.sitename == "shared").unwrap();
        assert_eq!(shared.generation, 1);
    }

    #[tokio::test]
    async fn test_resolver_called_only_for_disagreements() {
        let mut calls = 0;
        let records = {
            let mut resolver = FnResolver::new(|i, _e| {
                calls += 1;
                Ok(i.clone())
            });
            LegacyMigration::from_legacy(&sample())
                .resolve(&mut resolver)
                .await
                .unwrap()
        };
        assert_eq!(calls, 0);
        assert_eq!(records.len(), 2);
    }

    #[tokio::test]
    async fn test_resolved_site_keeps_its_sitename() {
        let data = legacy(json!({
            "a.com": {"shared": {"generation": 1, "type": "l", "username": ""}},
            "b.com": {"shared": {"generation": 3, "type": "l", "username": ""}}
        }));
        let mut resolver = FnResolver::new(|i, _e| {
            let mut renamed = i.clone();
            renamed.sitename = "renamed".to_string();
            Ok(renamed)
        });

        let records = LegacyMigration::from_legacy(&data)
            .resolve(&mut resolver)
            .await
            .unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].sitename, "shared");
        assert_eq!(records[0].generation, 3);
        assert_eq!(records[0].url, vec!["a.com", "b.com"]);
    }
}
