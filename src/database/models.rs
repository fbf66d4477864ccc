//! Data models for stored site records

use std::collections::BTreeMap;
use std::fmt;
use serde::{Deserialize, Deserializer, Serialize};
use crate::error::SiteStoreError;
use crate::utils::{dedup_urls, is_plain_ascii, union_urls};
use crate::{ALG_VERSION_CURRENT, ALG_VERSION_UNICODE_SITENAME_FIX, DEFAULT_GENERATION};

/// Password template class
///
/// Serialized as the single-letter tag used in storage (`x`, `l`, `m`, ...).
/// An unknown tag is rejected rather than mapped to a default.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum PasswordType {
    Maximum,
    #[default]
    Long,
    Medium,
    Basic,
    Short,
    Pin,
    Name,
    Phrase,
}

impl PasswordType {
    /// All password types in template-code order
    pub const ALL: [PasswordType; 8] = [
        PasswordType::Maximum,
        PasswordType::Long,
        PasswordType::Medium,
        PasswordType::Basic,
        PasswordType::Short,
        PasswordType::Pin,
        PasswordType::Name,
        PasswordType::Phrase,
    ];

    /// Storage tag
    pub fn tag(self) -> &'static str {
        match self {
            PasswordType::Maximum => "x",
            PasswordType::Long => "l",
            PasswordType::Medium => "m",
            PasswordType::Basic => "b",
            PasswordType::Short => "s",
            PasswordType::Pin => "i",
            PasswordType::Name => "n",
            PasswordType::Phrase => "p",
        }
    }

    /// Parse a storage tag
    pub fn from_tag(tag: &str) -> Result<Self, SiteStoreError> {
        PasswordType::ALL
            .into_iter()
            .find(|t| t.tag() == tag)
            .ok_or_else(|| SiteStoreError::UnknownPasswordType(tag.to_string()))
    }

    /// Human readable name
    pub fn name(self) -> &'static str {
        match self {
            PasswordType::Maximum => "Maximum",
            PasswordType::Long => "Long",
            PasswordType::Medium => "Medium",
            PasswordType::Basic => "Basic",
            PasswordType::Short => "Short",
            PasswordType::Pin => "Pin",
            PasswordType::Name => "Name",
            PasswordType::Phrase => "Phrase",
        }
    }

    /// Numeric template code used by Master Password site exports
    pub fn template_code(self) -> u32 {
        match self {
            PasswordType::Maximum => 16,
            PasswordType::Long => 17,
            PasswordType::Medium => 18,
            PasswordType::Basic => 19,
            PasswordType::Short => 20,
            PasswordType::Pin => 21,
            PasswordType::Name => 30,
            PasswordType::Phrase => 31,
        }
    }

    /// Reverse of [`PasswordType::template_code`]
    pub fn from_template_code(code: u32) -> Result<Self, SiteStoreError> {
        PasswordType::ALL
            .into_iter()
            .find(|t| t.template_code() == code)
            .ok_or_else(|| SiteStoreError::UnknownPasswordType(code.to_string()))
    }
}

impl fmt::Display for PasswordType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl TryFrom<String> for PasswordType {
    type Error = SiteStoreError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        PasswordType::from_tag(&value)
    }
}

impl From<PasswordType> for String {
    fn from(value: PasswordType) -> Self {
        value.tag().to_string()
    }
}

/// One persisted configuration per logical site
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SiteRecord {
    /// Name fed to the password derivation (may be `user@site`)
    pub sitename: String,
    /// Origin domains resolving to this record, ordered and unique
    #[serde(default, deserialize_with = "deserialize_url_set")]
    pub url: Vec<String>,
    /// Password counter
    #[serde(default = "default_generation")]
    pub generation: u32,
    /// Password template class
    #[serde(rename = "type", default)]
    pub password_type: PasswordType,
    /// Login name, empty when unknown
    #[serde(default, deserialize_with = "deserialize_null_as_empty")]
    pub username: String,
    /// Derivation algorithm version the record was created under
    #[serde(default = "default_passalgo")]
    pub passalgo: u32,
}

fn default_generation() -> u32 {
    DEFAULT_GENERATION
}

fn default_passalgo() -> u32 {
    ALG_VERSION_CURRENT
}

/// Accept either a single domain string (older saves) or a list of domains
fn deserialize_url_set<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum UrlField {
        One(String),
        Many(Vec<String>),
    }

    Ok(match Option::<UrlField>::deserialize(deserializer)? {
        None => Vec::new(),
        Some(UrlField::One(s)) if s.is_empty() => Vec::new(),
        Some(UrlField::One(s)) => vec![s],
        Some(UrlField::Many(v)) => dedup_urls(v),
    })
}

fn deserialize_null_as_empty<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

impl SiteRecord {
    /// Create a record with default settings for a single domain
    pub fn new(sitename: &str, domain: &str) -> Self {
        let url = if domain.is_empty() { Vec::new() } else { vec![domain.to_string()] };
        Self {
            sitename: sitename.to_string(),
            url,
            generation: DEFAULT_GENERATION,
            password_type: PasswordType::default(),
            username: String::new(),
            passalgo: ALG_VERSION_CURRENT,
        }
    }

    /// True when generation, type and username match; `url` and `passalgo` are ignored
    pub fn same_settings(&self, other: &SiteRecord) -> bool {
        self.generation == other.generation
            && self.password_type == other.password_type
            && self.username == other.username
    }

    /// Add domains not yet present, keeping existing order
    pub fn add_urls(&mut self, urls: &[String]) {
        self.url = union_urls(&self.url, urls);
    }

    /// True if `domain` is one of this record's origins
    pub fn has_url(&self, domain: &str) -> bool {
        self.url.iter().any(|u| u == domain)
    }

    /// True if any origin contains `needle`, ignoring case
    pub fn url_matches(&self, needle: &str) -> bool {
        let needle = needle.to_lowercase();
        self.url.iter().any(|u| u.to_lowercase().contains(&needle))
    }

    /// True if the sitename can be derived identically by every algorithm version
    pub fn has_plain_ascii_sitename(&self) -> bool {
        is_plain_ascii(&self.sitename)
    }

    /// Algorithm version needed to reproduce this site's password
    ///
    /// Sites created before the unicode sitename fix with a non-ASCII name are
    /// pinned to their original version.
    pub fn required_alg_version(&self, alg_min_version: u32) -> u32 {
        if self.passalgo < ALG_VERSION_UNICODE_SITENAME_FIX && !self.has_plain_ascii_sitename() {
            self.passalgo
        } else {
            alg_min_version
        }
    }

    /// True if older derivation versions cannot reproduce this site
    pub fn is_legacy_unicode_site(&self) -> bool {
        self.passalgo < ALG_VERSION_UNICODE_SITENAME_FIX && !self.has_plain_ascii_sitename()
    }
}

/// Partial update for a site record; `None` keeps the current value
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SitePatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generation: Option<u32>,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub password_type: Option<PasswordType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub passalgo: Option<u32>,
}

impl SitePatch {
    pub fn with_url(mut self, url: Vec<String>) -> Self {
        self.url = Some(url);
        self
    }

    pub fn with_generation(mut self, generation: u32) -> Self {
        self.generation = Some(generation);
        self
    }

    pub fn with_type(mut self, password_type: PasswordType) -> Self {
        self.password_type = Some(password_type);
        self
    }

    pub fn with_username(mut self, username: &str) -> Self {
        self.username = Some(username.to_string());
        self
    }

    /// Overwrite the fields present in the patch
    pub fn apply_to(&self, record: &mut SiteRecord) {
        if let Some(url) = &self.url {
            record.url = dedup_urls(url.clone());
        }
        if let Some(generation) = self.generation {
            record.generation = generation;
        }
        if let Some(password_type) = self.password_type {
            record.password_type = password_type;
        }
        if let Some(username) = &self.username {
            record.username = username.clone();
        }
        if let Some(passalgo) = self.passalgo {
            record.passalgo = passalgo;
        }
    }

    /// Build a new record from the patch, defaulting absent fields
    pub fn into_record(self, sitename: &str) -> SiteRecord {
        let mut record = SiteRecord::new(sitename, "");
        self.apply_to(&mut record);
        record
    }
}

/// Per-site settings in the legacy nested format (domain is the outer key)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LegacySiteConfig {
    #[serde(default = "default_generation")]
    pub generation: u32,
    #[serde(rename = "type", default)]
    pub password_type: PasswordType,
    #[serde(default, deserialize_with = "deserialize_null_as_empty")]
    pub username: String,
}

/// Legacy storage: domain -> sitename -> settings
pub type LegacySites = BTreeMap<String, BTreeMap<String, LegacySiteConfig>>;
