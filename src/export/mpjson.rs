//! `.mpjson` encoding
//!
//! Sites are an object keyed by site name. Domains and the stored algorithm
//! version travel in the `_ext_mpw` extension object of each site, which
//! other Master Password clients ignore.

use std::collections::BTreeMap;
use serde::{Deserialize, Serialize};
use crate::database::{PasswordType, SiteRecord};
use crate::error::{SiteStoreError, Result};
use crate::utils::{dedup_urls, format_export_date, parse_export_date};
use crate::{ALG_VERSION_CURRENT, DEFAULT_GENERATION};
use super::{MpsitesDocument, MpsitesHeader};

#[derive(Debug, Serialize, Deserialize)]
struct JsonDocument {
    export: JsonExport,
    #[serde(default)]
    user: JsonUser,
    #[serde(default)]
    sites: BTreeMap<String, JsonSite>,
}

#[derive(Debug, Serialize, Deserialize)]
struct JsonExport {
    format: u32,
    #[serde(default)]
    redacted: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    date: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
struct JsonUser {
    #[serde(default)]
    avatar: u32,
    #[serde(default)]
    full_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    last_used: Option<String>,
    #[serde(default)]
    key_id: String,
    #[serde(default = "default_algorithm")]
    algorithm: u32,
    #[serde(default = "default_template")]
    default_type: u32,
}

impl Default for JsonUser {
    fn default() -> Self {
        Self {
            avatar: 0,
            full_name: String::new(),
            last_used: None,
            key_id: String::new(),
            algorithm: default_algorithm(),
            default_type: default_template(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct JsonSite {
    #[serde(rename = "type", default = "default_template")]
    template: u32,
    #[serde(default = "default_counter")]
    counter: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    algorithm: Option<u32>,
    #[serde(default)]
    login_name: String,
    #[serde(default)]
    uses: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    last_used: Option<String>,
    #[serde(rename = "_ext_mpw", default, skip_serializing_if = "Option::is_none")]
    ext: Option<JsonSiteExt>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct JsonSiteExt {
    #[serde(default)]
    url: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    passalgo: Option<u32>,
}

fn default_algorithm() -> u32 {
    ALG_VERSION_CURRENT
}

fn default_template() -> u32 {
    PasswordType::default().template_code()
}

fn default_counter() -> u32 {
    DEFAULT_GENERATION
}

pub(super) fn write(header: &MpsitesHeader, sites: &[SiteRecord], alg_min_version: u32) -> Result<String> {
    let date = format_export_date(&header.date_or_now());

    let document = JsonDocument {
        export: JsonExport {
            format: 1,
            redacted: true,
            date: Some(date.clone()),
        },
        user: JsonUser {
            avatar: 0,
            full_name: header.username.clone(),
            last_used: Some(date.clone()),
            key_id: header.key_id.clone(),
            algorithm: header.algorithm,
            default_type: header.default_type.template_code(),
        },
        sites: sites
            .iter()
            .map(|site| {
                let entry = JsonSite {
                    template: site.password_type.template_code(),
                    counter: site.generation,
                    algorithm: Some(site.required_alg_version(alg_min_version)),
                    login_name: site.username.clone(),
                    uses: 0,
                    last_used: Some(date.clone()),
                    ext: Some(JsonSiteExt {
                        url: site.url.clone(),
                        passalgo: Some(site.passalgo),
                    }),
                };
                (site.sitename.clone(), entry)
            })
            .collect(),
    };

    Ok(serde_json::to_string_pretty(&document)?)
}

pub(super) fn read(data: &str) -> Result<MpsitesDocument> {
    let document: JsonDocument = serde_json::from_str(data)
        .map_err(|e| SiteStoreError::ImportFormat(format!("invalid mpjson document: {e}")))?;

    let header = MpsitesHeader {
        format: document.export.format,
        date: document.export.date.as_deref().and_then(parse_export_date),
        username: document.user.full_name,
        key_id: document.user.key_id,
        algorithm: document.user.algorithm,
        default_type: template(document.user.default_type)?,
    };

    let mut sites = Vec::with_capacity(document.sites.len());
    for (sitename, entry) in document.sites {
        if sitename.is_empty() {
            return Err(SiteStoreError::ImportFormat("site with empty name".to_string()));
        }
        let ext = entry.ext.unwrap_or_default();

        let mut site = SiteRecord::new(&sitename, "");
        site.url = dedup_urls(ext.url);
        site.password_type = template(entry.template)?;
        site.generation = entry.counter;
        site.username = entry.login_name;
        site.passalgo = ext
            .passalgo
            .or(entry.algorithm)
            .unwrap_or(header.algorithm);
        sites.push(site);
    }

    Ok(MpsitesDocument { header, sites })
}

fn template(code: u32) -> Result<PasswordType> {
    PasswordType::from_template_code(code)
        .map_err(|_| SiteStoreError::ImportFormat(format!("unsupported password type {code}")))
}
