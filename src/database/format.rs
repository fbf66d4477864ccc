//! Stored format detection
//!
//! Classifies the raw values read from the key-value collaborator as empty,
//! legacy nested, flat current, or a state that needs an explicit upgrade.

use serde_json::Value;
use tracing::debug;
use crate::error::{SiteStoreError, Result};
use crate::{CURRENT_FORMAT_VERSION, KEY_SITEDATA, KEY_SITES, KEY_VERSION, LEGACY_FORMAT_VERSION};
use super::{LegacySites, SiteRecord, StoredValues};

/// Every key the site store reads
pub const STORAGE_KEYS: [&str; 3] = [KEY_SITES, KEY_SITEDATA, KEY_VERSION];

/// Classification of the persisted site data
#[derive(Debug, Clone, PartialEq)]
pub enum StoredFormat {
    /// No site data stored yet
    Empty,
    /// Only the nested `sites` mapping exists
    Legacy(LegacySites),
    /// A flat `sitedata` list exists and covers any leftover legacy data
    Current(Vec<SiteRecord>),
    /// Partially written or inconsistent data; never guessed at
    UpgradeRequired {
        legacy: LegacySites,
        partial: Vec<SiteRecord>,
        reason: String,
    },
}

impl StoredFormat {
    /// True for states that block mutation
    pub fn needs_upgrade(&self) -> bool {
        matches!(self, StoredFormat::Legacy(_) | StoredFormat::UpgradeRequired { .. })
    }

    /// Short name for logging
    pub fn kind(&self) -> &'static str {
        match self {
            StoredFormat::Empty => "empty",
            StoredFormat::Legacy(_) => "legacy",
            StoredFormat::Current(_) => "current",
            StoredFormat::UpgradeRequired { .. } => "upgrade-required",
        }
    }
}

/// Classify raw stored values
///
/// Fails on a stored version newer than [`CURRENT_FORMAT_VERSION`], on
/// structurally malformed legacy data and on unknown password type tags.
pub fn detect(raw: &StoredValues) -> Result<StoredFormat> {
    let version = stored_version(raw)?;

    let sites = present(raw, KEY_SITES);
    let sitedata = present(raw, KEY_SITEDATA);

    let format = match (sites, sitedata) {
        (None, None) => StoredFormat::Empty,
        (Some(sites), None) => StoredFormat::Legacy(parse_legacy(sites)?),
        (None, Some(data)) => match parse_sitedata(data)? {
            Some(records) => StoredFormat::Current(records),
            None => StoredFormat::UpgradeRequired {
                legacy: LegacySites::new(),
                partial: Vec::new(),
                reason: "stored sitedata is not a list".to_string(),
            },
        },
        (Some(sites), Some(data)) => {
            let legacy = parse_legacy(sites)?;
            match parse_sitedata(data)? {
                Some(records) => {
                    // A versioned write always completes the flat format; leftover
                    // legacy keys are only checked for unversioned sitedata
                    let missing = if version >= CURRENT_FORMAT_VERSION {
                        Vec::new()
                    } else {
                        uncovered_pairs(&legacy, &records)
                    };
                    if missing.is_empty() {
                        StoredFormat::Current(records)
                    } else {
                        StoredFormat::UpgradeRequired {
                            legacy,
                            partial: records,
                            reason: format!(
                                "sitedata is incomplete, missing legacy entries: {}",
                                missing.join(", ")
                            ),
                        }
                    }
                }
                None => StoredFormat::UpgradeRequired {
                    legacy,
                    partial: Vec::new(),
                    reason: "legacy sites present and sitedata is not a list".to_string(),
                },
            }
        }
    };

    debug!(format = format.kind(), "detected stored format");
    Ok(format)
}

fn present<'a>(raw: &'a StoredValues, key: &str) -> Option<&'a Value> {
    raw.get(key).filter(|v| !v.is_null())
}

/// Stored format version, [`LEGACY_FORMAT_VERSION`] when absent
fn stored_version(raw: &StoredValues) -> Result<u32> {
    let Some(value) = present(raw, KEY_VERSION) else {
        return Ok(LEGACY_FORMAT_VERSION);
    };

    let version = value
        .as_u64()
        .ok_or_else(|| SiteStoreError::Serialization(format!("invalid storage version: {value}")))?;

    if version > u64::from(CURRENT_FORMAT_VERSION) {
        return Err(SiteStoreError::UnsupportedVersion(
            u32::try_from(version).unwrap_or(u32::MAX),
        ));
    }
    // Bounded by CURRENT_FORMAT_VERSION above
    Ok(version as u32)
}

fn parse_legacy(value: &Value) -> Result<LegacySites> {
    Ok(serde_json::from_value(value.clone())?)
}

/// `None` when the value is not a list at all
fn parse_sitedata(value: &Value) -> Result<Option<Vec<SiteRecord>>> {
    if !value.is_array() {
        return Ok(None);
    }
    Ok(Some(serde_json::from_value(value.clone())?))
}

/// Legacy `domain/sitename` pairs with no flat record carrying that domain
fn uncovered_pairs(legacy: &LegacySites, records: &[SiteRecord]) -> Vec<String> {
    let mut missing = Vec::new();
    for (domain, sites) in legacy {
        for sitename in sites.keys() {
            let covered = records
                .iter()
                .any(|r| &r.sitename == sitename && r.has_url(domain));
            if !covered {
                missing.push(format!("{domain}/{sitename}"));
            }
        }
    }
    missing
}
