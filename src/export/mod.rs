//! Site export encodings
//!
//! This module reads and writes the Master Password site export formats:
//! the line-oriented `.mpsites` text format and the `.mpjson` document.
//! Decoded sites conform to the [`SiteRecord`] shape with absent fields
//! defaulted.

mod mpjson;
mod mpsites;

use std::fmt;
use chrono::{DateTime, Utc};
use crate::database::{PasswordType, SiteRecord};
use crate::error::Result;
use crate::ALG_VERSION_CURRENT;

/// Export header shared by both encodings
#[derive(Debug, Clone, PartialEq)]
pub struct MpsitesHeader {
    /// Export format revision (0 or 1 for text, 1 for JSON)
    pub format: u32,
    /// Export timestamp; the current time is used when writing `None`
    pub date: Option<DateTime<Utc>>,
    pub username: String,
    pub key_id: String,
    /// Highest algorithm version of the exporting user
    pub algorithm: u32,
    pub default_type: PasswordType,
}

impl MpsitesHeader {
    /// Create a header for the current format and algorithm
    pub fn new(username: &str, key_id: &str) -> Self {
        Self {
            format: 1,
            date: None,
            username: username.to_string(),
            key_id: key_id.to_string(),
            algorithm: ALG_VERSION_CURRENT,
            default_type: PasswordType::default(),
        }
    }

    pub fn with_date(mut self, date: DateTime<Utc>) -> Self {
        self.date = Some(date);
        self
    }

    pub fn with_algorithm(mut self, algorithm: u32) -> Self {
        self.algorithm = algorithm;
        self
    }

    pub fn with_default_type(mut self, default_type: PasswordType) -> Self {
        self.default_type = default_type;
        self
    }

    fn date_or_now(&self) -> DateTime<Utc> {
        self.date.unwrap_or_else(Utc::now)
    }
}

impl Default for MpsitesHeader {
    fn default() -> Self {
        Self::new("", "")
    }
}

/// Header identity differing from the configured user
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IdentityMismatch {
    Username { expected: String, found: String },
    KeyId { expected: String, found: String },
}

impl fmt::Display for IdentityMismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IdentityMismatch::Username { expected, found } => {
                write!(f, "file is for user '{found}', not '{expected}'")
            }
            IdentityMismatch::KeyId { expected, found } => {
                write!(f, "file key id {found} does not match {expected}")
            }
        }
    }
}

/// A decoded export
#[derive(Debug, Clone, PartialEq)]
pub struct MpsitesDocument {
    pub header: MpsitesHeader,
    pub sites: Vec<SiteRecord>,
}

impl MpsitesDocument {
    /// Header fields that disagree with the configured identity
    ///
    /// Empty values on either side are not compared. Key ids compare
    /// case-insensitively.
    pub fn identity_mismatches(&self, username: &str, key_id: &str) -> Vec<IdentityMismatch> {
        let mut mismatches = Vec::new();

        if !username.is_empty() && !self.header.username.is_empty() && self.header.username != username {
            mismatches.push(IdentityMismatch::Username {
                expected: username.to_string(),
                found: self.header.username.clone(),
            });
        }
        if !key_id.is_empty()
            && !self.header.key_id.is_empty()
            && !self.header.key_id.eq_ignore_ascii_case(key_id)
        {
            mismatches.push(IdentityMismatch::KeyId {
                expected: key_id.to_string(),
                found: self.header.key_id.clone(),
            });
        }

        mismatches
    }
}

/// Decode an export, detecting JSON by its leading brace
pub fn read_mpsites(data: &str) -> Result<MpsitesDocument> {
    if data.trim_start().starts_with('{') {
        mpjson::read(data)
    } else {
        mpsites::read(data)
    }
}

/// Encode `sites` as `.mpjson` (`json`) or `.mpsites` text
///
/// Each site's algorithm is [`SiteRecord::required_alg_version`] of
/// `alg_min_version`. Only the JSON encoding keeps domains and the stored
/// algorithm version.
pub fn make_mpsites(
    header: &MpsitesHeader,
    sites: &[SiteRecord],
    alg_min_version: u32,
    json: bool,
) -> Result<String> {
    if json {
        mpjson::write(header, sites, alg_min_version)
    } else {
        Ok(mpsites::write(header, sites, alg_min_version))
    }
}
