//! Import merge engine
//!
//! Reconciles imported records against the current list by sitename:
//! - unknown sitenames are appended, with a domain guessed from the name
//!   when the import carries none
//! - records agreeing on generation, type and login name converge by
//!   unioning their domains
//! - disagreeing records go to the conflict resolver, and the chosen record
//!   is installed under the shared sitename with the unioned domains

use std::collections::HashMap;
use std::fmt;
use tracing::{debug, warn};
use crate::database::SiteRecord;
use crate::error::Result;
use crate::utils::{sitesearch, union_urls};
use super::conflict::ConflictResolver;

/// Non-fatal finding about a merged record
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MergeWarning {
    /// Non-ASCII sitename from an algorithm version older derivations can't reproduce
    LegacyUnicodeSitename { sitename: String, passalgo: u32 },
}

impl fmt::Display for MergeWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MergeWarning::LegacyUnicodeSitename { sitename, passalgo } => write!(
                f,
                "site '{sitename}' uses non-ASCII characters with algorithm version {passalgo}; \
                 its password cannot be reproduced"
            ),
        }
    }
}

/// Result of a merge
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MergeOutcome {
    /// Reconciled list: existing positions kept, new sites appended
    pub sites: Vec<SiteRecord>,
    pub warnings: Vec<MergeWarning>,
    /// Incoming records appended as new sites
    pub added: usize,
    /// Incoming records equal to an existing one apart from domains
    pub converged: usize,
    /// Incoming records settled by the resolver
    pub conflicts: usize,
}

/// Merge `incoming` into `existing`, asking `resolver` for every real conflict
///
/// Records are processed in order. A resolver error stops the merge and is
/// returned as-is; nothing is persisted here.
pub async fn merge_sites<R>(
    existing: Vec<SiteRecord>,
    incoming: Vec<SiteRecord>,
    resolver: &mut R,
) -> Result<MergeOutcome>
where
    R: ConflictResolver + ?Sized,
{
    let mut outcome = MergeOutcome {
        sites: existing,
        ..MergeOutcome::default()
    };
    let mut index: HashMap<String, usize> = outcome
        .sites
        .iter()
        .enumerate()
        .map(|(i, s)| (s.sitename.clone(), i))
        .collect();

    for mut site in incoming {
        let position = match index.get(&site.sitename).copied() {
            None => {
                if site.url.is_empty() {
                    site.url = vec![sitesearch(&site.sitename).to_string()];
                }
                index.insert(site.sitename.clone(), outcome.sites.len());
                outcome.sites.push(site);
                outcome.added += 1;
                outcome.sites.len() - 1
            }
            Some(i) => {
                let current = &mut outcome.sites[i];
                if current.same_settings(&site) {
                    current.add_urls(&site.url);
                    outcome.converged += 1;
                } else {
                    let url = union_urls(&current.url, &site.url);
                    debug!(sitename = %site.sitename, "import conflict");
                    let mut chosen = resolver.resolve(&site, current).await?;
                    chosen.sitename = site.sitename;
                    chosen.url = url;
                    outcome.sites[i] = chosen;
                    outcome.conflicts += 1;
                }
                i
            }
        };

        let merged = &outcome.sites[position];
        if merged.is_legacy_unicode_site() {
            let warning = MergeWarning::LegacyUnicodeSitename {
                sitename: merged.sitename.clone(),
                passalgo: merged.passalgo,
            };
            if !outcome.warnings.contains(&warning) {
                warn!(%warning, "incompatible imported site");
                outcome.warnings.push(warning);
            }
        }
    }

    debug!(
        added = outcome.added,
        converged = outcome.converged,
        conflicts = outcome.conflicts,
        "merge finished"
    );
    Ok(outcome)
}
