//! User settings
//!
//! Options stored beside the site data in the same key-value collaborator.
//! Absent keys take their defaults.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;
use crate::database::{KeyValueStore, PasswordType};
use crate::error::{SiteStoreError, Result};
use crate::export::MpsitesHeader;
use crate::utils::is_plain_ascii;
use crate::ALG_VERSION_CURRENT;

/// Every key [`Settings`] reads and writes
pub const SETTINGS_KEYS: [&str; 9] = [
    "defaulttype",
    "passwdtimeout",
    "pass_to_clipboard",
    "auto_submit_pass",
    "auto_submit_username",
    "pass_store",
    "username",
    "key_id",
    "max_alg_version",
];

/// Persisted user options
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Password type for new sites
    #[serde(rename = "defaulttype")]
    pub default_type: PasswordType,
    /// Seconds before the master key is forgotten, 0 for never
    #[serde(rename = "passwdtimeout")]
    pub password_timeout: u32,
    pub pass_to_clipboard: bool,
    pub auto_submit_pass: bool,
    pub auto_submit_username: bool,
    /// Keep the master key in the OS keyring
    pub pass_store: bool,
    pub username: String,
    pub key_id: String,
    /// Highest algorithm version the user's key was created with
    pub max_alg_version: u32,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            default_type: PasswordType::Long,
            password_timeout: 0,
            pass_to_clipboard: true,
            auto_submit_pass: false,
            auto_submit_username: false,
            pass_store: false,
            username: String::new(),
            key_id: String::new(),
            max_alg_version: ALG_VERSION_CURRENT,
        }
    }
}

impl Settings {
    /// Load settings, defaulting absent or null keys
    pub async fn load<S: KeyValueStore + ?Sized>(store: &S) -> Result<Self> {
        let mut values = store.load(&SETTINGS_KEYS).await?;
        values.retain(|_, v| !v.is_null());
        let settings = serde_json::from_value(Value::Object(values))?;
        debug!("settings loaded");
        Ok(settings)
    }

    /// Persist every setting in one write
    pub async fn save<S: KeyValueStore + ?Sized>(&self, store: &S) -> Result<()> {
        let Value::Object(values) = serde_json::to_value(self)? else {
            return Err(SiteStoreError::Serialization(
                "settings did not serialize to an object".to_string(),
            ));
        };
        store.save(values).await?;
        debug!("settings saved");
        Ok(())
    }

    /// Lowest algorithm version sites of this user can be exported with
    ///
    /// Non-ASCII user names only derive correctly from version 3 on.
    pub fn min_alg_version(&self) -> u32 {
        if is_plain_ascii(&self.username) {
            1
        } else {
            self.max_alg_version.min(ALG_VERSION_CURRENT)
        }
    }

    /// Export header for this user
    pub fn export_header(&self) -> MpsitesHeader {
        MpsitesHeader::new(&self.username, &self.key_id)
            .with_algorithm(self.max_alg_version)
            .with_default_type(self.default_type)
    }
}
