//! Configuration types.

use serde::{Deserialize, Serialize};

/// Keys that must never live in a config file.
pub const SECRET_KEYS: &[&str] = &["password", "refresh_token", "access_token"];

/// Defaults for the `lidl-plus` tool. Every field is optional; unset fields
/// fall back to a prompt or the built-in default.
///
/// ```toml
/// country = "DE"
/// language = "de"
/// user = "+4915112345678"
/// two_factor = "email"
/// headless = true
/// accept_legal_terms = false
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LidlConfig {
    /// Country code (DE, AT, NL, ...).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
    /// Language tag (de, en, fr, ...).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    /// Login username (phone number or email).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
    /// Two-factor channel, "phone" or "email".
    #[serde(skip_serializing_if = "Option::is_none")]
    pub two_factor: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub headless: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub accept_legal_terms: Option<bool>,
}

impl LidlConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a config from TOML. Unknown keys are ignored.
    pub fn from_toml(toml_str: &str) -> crate::Result<Self> {
        Ok(toml::from_str(toml_str)?)
    }

    /// Merge another config on top of this one (set fields of `other` win).
    pub fn merge(&mut self, other: LidlConfig) {
        if other.country.is_some() {
            self.country = other.country;
        }
        if other.language.is_some() {
            self.language = other.language;
        }
        if other.user.is_some() {
            self.user = other.user;
        }
        if other.two_factor.is_some() {
            self.two_factor = other.two_factor;
        }
        if other.headless.is_some() {
            self.headless = other.headless;
        }
        if other.accept_legal_terms.is_some() {
            self.accept_legal_terms = other.accept_legal_terms;
        }
    }
}

/// Secret keys present at the top level of a TOML document.
pub fn secret_keys_in(toml_str: &str) -> Vec<&'static str> {
    let Ok(table) = toml_str.parse::<toml::Table>() else {
        return Vec::new();
    };
    SECRET_KEYS
        .iter()
        .copied()
        .filter(|key| table.contains_key(*key))
        .collect()
}
