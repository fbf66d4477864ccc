//! Property-based tests for the site store.
//!
//! Uses proptest to verify that:
//! - Any valid record list survives `set` then `get` unchanged
//! - Lists repeating a sitename are rejected
//! - Legacy data migrates to one record per sitename carrying every domain
//! - Imports that only add domains never reach the conflict resolver

use std::collections::{BTreeMap, BTreeSet};
use std::future::Future;

use proptest::prelude::*;
use tracing::info;

use mpwcore::business::store::validate;
use mpwcore::utils::union_urls;
use mpwcore::{
    merge_sites, migrate, FnResolver, LegacySiteConfig, LegacySites, MemoryStore, PasswordType,
    SiteRecord, SiteStore, SiteStoreError,
};

/// Initialize test logging for proptest
fn init_test_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("info")
        .with_test_writer()
        .try_init();
}

fn block_on<F: Future>(future: F) -> F::Output {
    tokio::runtime::Builder::new_current_thread()
        .build()
        .unwrap()
        .block_on(future)
}

fn sitename() -> impl Strategy<Value = String> {
    prop_oneof![
        "[a-z]{1,8}\\.(com|no|de)",
        "[a-z]{1,5}@[a-z]{1,8}\\.(com|org)",
        "[a-zæøå]{1,6}",
    ]
}

fn domains() -> impl Strategy<Value = Vec<String>> {
    prop::collection::btree_set("[a-z]{1,6}\\.(com|org|co\\.uk)", 1..4)
        .prop_map(|set| set.into_iter().collect())
}

fn password_type() -> impl Strategy<Value = PasswordType> {
    prop::sample::select(PasswordType::ALL.to_vec())
}

/// Generation, type and login name
fn settings() -> impl Strategy<Value = (u32, PasswordType, String)> {
    (1u32..6, password_type(), "[a-z]{0,6}")
}

/// Valid record lists: unique sitenames, non-empty unique domains
fn site_list() -> impl Strategy<Value = Vec<SiteRecord>> {
    prop::collection::btree_map(sitename(), (settings(), domains(), 0u32..=3), 0..12).prop_map(
        |sites| {
            sites
                .into_iter()
                .map(|(name, ((generation, password_type, username), url, passalgo))| {
                    let mut site = SiteRecord::new(&name, "");
                    site.url = url;
                    site.generation = generation;
                    site.password_type = password_type;
                    site.username = username;
                    site.passalgo = passalgo;
                    site
                })
                .collect()
        },
    )
}

/// Legacy data where every sitename has one config shared by all its domains
fn legacy_sites() -> impl Strategy<Value = BTreeMap<String, (LegacySiteConfig, Vec<String>)>> {
    prop::collection::btree_map(sitename(), (settings(), domains()), 0..8).prop_map(|sites| {
        sites
            .into_iter()
            .map(|(name, ((generation, password_type, username), url))| {
                let config = LegacySiteConfig {
                    generation,
                    password_type,
                    username,
                };
                (name, (config, url))
            })
            .collect()
    })
}

fn to_legacy(sites: &BTreeMap<String, (LegacySiteConfig, Vec<String>)>) -> LegacySites {
    let mut legacy = LegacySites::new();
    for (name, (config, url)) in sites {
        for domain in url {
            legacy
                .entry(domain.clone())
                .or_default()
                .insert(name.clone(), config.clone());
        }
    }
    legacy
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 64,
        ..Default::default()
    })]

    /// Property: set then get returns the same list
    #[test]
    fn set_then_get_roundtrips(sites in site_list()) {
        init_test_logging();
        info!("proptest_roundtrip: count={count}", count = sites.len());

        let loaded = block_on(async {
            let mut store = SiteStore::new(MemoryStore::new());
            store.set(&sites).await.unwrap();
            store.get(None).await.unwrap()
        });

        prop_assert_eq!(loaded, sites);
    }

    /// Property: a repeated sitename fails validation and writes nothing
    #[test]
    fn duplicate_sitename_rejected(sites in site_list(), extra in domains()) {
        prop_assume!(!sites.is_empty());

        let mut duplicate = sites[0].clone();
        duplicate.url = extra;
        let mut with_duplicate = sites.clone();
        with_duplicate.push(duplicate);

        let result = validate(&with_duplicate);
        let is_sitename_error = matches!(
            result,
            Err(SiteStoreError::Validation { field: "sitename", .. })
        );
        prop_assert!(is_sitename_error, "expected sitename error, got {:?}", result);

        let (rejected, stored) = block_on(async {
            let mut store = SiteStore::new(MemoryStore::new());
            let rejected = store.set(&with_duplicate).await.is_err();
            (rejected, store.get(None).await.unwrap())
        });
        prop_assert!(rejected);
        prop_assert!(stored.is_empty());
    }

    /// Property: migration yields one record per sitename with all its domains
    #[test]
    fn legacy_migration_complete(sites in legacy_sites()) {
        init_test_logging();
        let legacy = to_legacy(&sites);
        info!("proptest_migration: domains={count}", count = legacy.len());

        let records = migrate(&legacy).unwrap();
        prop_assert_eq!(records.len(), sites.len());

        for record in &records {
            let (config, url) = &sites[&record.sitename];
            let expected: BTreeSet<&String> = url.iter().collect();
            let actual: BTreeSet<&String> = record.url.iter().collect();
            prop_assert_eq!(actual, expected);
            prop_assert_eq!(record.url.len(), url.len());
            prop_assert_eq!(record.generation, config.generation);
            prop_assert_eq!(record.password_type, config.password_type);
            prop_assert_eq!(&record.username, &config.username);
        }
    }

    /// Property: field-identical imports converge without the resolver
    #[test]
    fn identical_imports_never_conflict(
        sites in site_list(),
        extras in prop::collection::vec(domains(), 12),
    ) {
        let incoming: Vec<SiteRecord> = sites
            .iter()
            .zip(&extras)
            .map(|(site, extra)| {
                let mut copy = site.clone();
                copy.url = extra.clone();
                copy
            })
            .collect();

        let mut calls = 0;
        let outcome = block_on(async {
            let mut resolver = FnResolver::new(|i, _e| {
                calls += 1;
                Ok(i.clone())
            });
            merge_sites(sites.clone(), incoming, &mut resolver).await.unwrap()
        });

        prop_assert_eq!(calls, 0);
        prop_assert_eq!(outcome.conflicts, 0);
        prop_assert_eq!(outcome.sites.len(), sites.len());
        for ((merged, site), extra) in outcome.sites.iter().zip(&sites).zip(&extras) {
            prop_assert_eq!(&merged.url, &union_urls(&site.url, extra));
        }
    }
}
