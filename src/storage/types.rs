use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

pub const DEFAULT_API_URL: &str = "https://api.bitwarden.com";

/// Top-level config file (no secrets). Stored as config.toml.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_api_url")]
    pub api_url: String,
    pub default_organization: Option<String>,
    /// Item kinds organization policy forbids importing, e.g. `["card"]`.
    #[serde(default)]
    pub restricted_types: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_url: default_api_url(),
            default_organization: None,
            restricted_types: Vec::new(),
        }
    }
}

fn default_api_url() -> String {
    DEFAULT_API_URL.to_string()
}

/// Top-level credentials file. Stored as credentials.json with 0600 perms.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CredentialsFile {
    pub access_token: Option<String>,
    /// Base64 of the 64-byte user key.
    pub user_key: Option<String>,
    /// Organization id -> base64 of the 64-byte organization key.
    #[serde(default)]
    pub organization_keys: BTreeMap<String, String>,
}
