use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use super::types::*;
use crate::models::CipherType;

const CONFIG_FILE: &str = "config.toml";
const CREDENTIALS_FILE: &str = "credentials.json";

/// Keys accepted by [`ConfigStore::set`]. `organization_key.<org id>` is
/// accepted as well.
pub const SETTABLE_KEYS: [&str; 5] = [
    "api_url",
    "default_organization",
    "restricted_types",
    "access_token",
    "user_key",
];

pub struct ConfigStore {
    config_path: PathBuf,
    credentials_path: PathBuf,
}

impl ConfigStore {
    pub fn new() -> Result<Self> {
        let config_dir = dirs::config_dir()
            .context("Could not determine config directory")?
            .join("vault-import");
        Self::at(config_dir)
    }

    /// Store rooted at an explicit directory.
    pub fn at(config_dir: impl AsRef<Path>) -> Result<Self> {
        let config_dir = config_dir.as_ref();
        fs::create_dir_all(config_dir)
            .with_context(|| format!("Could not create {}", config_dir.display()))?;

        Ok(Self {
            config_path: config_dir.join(CONFIG_FILE),
            credentials_path: config_dir.join(CREDENTIALS_FILE),
        })
    }

    // -- Config (no secrets) --------------------------------------------------

    pub fn load_config(&self) -> Result<Config> {
        if !self.config_path.exists() {
            return Ok(Config::default());
        }
        let contents = fs::read_to_string(&self.config_path)?;
        let config: Config = toml::from_str(&contents)
            .with_context(|| format!("Invalid {}", self.config_path.display()))?;
        Ok(config)
    }

    pub fn save_config(&self, config: &Config) -> Result<()> {
        let contents = toml::to_string_pretty(config)?;
        fs::write(&self.config_path, contents)?;
        Ok(())
    }

    // -- Credentials (secrets, 0600) ------------------------------------------

    pub fn load_credentials(&self) -> Result<CredentialsFile> {
        if !self.credentials_path.exists() {
            return Ok(CredentialsFile::default());
        }
        let contents = fs::read_to_string(&self.credentials_path)?;
        let creds: CredentialsFile = serde_json::from_str(&contents)
            .with_context(|| format!("Invalid {}", self.credentials_path.display()))?;
        Ok(creds)
    }

    pub fn save_credentials(&self, creds: &CredentialsFile) -> Result<()> {
        let contents = serde_json::to_string_pretty(creds)?;
        fs::write(&self.credentials_path, &contents)?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&self.credentials_path, fs::Permissions::from_mode(0o600))?;
        }

        Ok(())
    }

    // -- High-level operations ------------------------------------------------

    /// Update one setting. Secrets go to credentials.json, the rest to config.toml.
    pub fn set(&self, key: &str, value: &str) -> Result<()> {
        if let Some(org) = key.strip_prefix("organization_key.") {
            if org.is_empty() {
                anyhow::bail!("Missing organization id in '{}'", key);
            }
            let mut creds = self.load_credentials()?;
            creds.organization_keys.insert(org.to_string(), value.to_string());
            return self.save_credentials(&creds);
        }

        match key {
            "access_token" | "user_key" => {
                let mut creds = self.load_credentials()?;
                let slot = if key == "access_token" {
                    &mut creds.access_token
                } else {
                    &mut creds.user_key
                };
                *slot = Some(value.to_string()).filter(|v| !v.is_empty());
                self.save_credentials(&creds)
            }
            "api_url" | "default_organization" | "restricted_types" => {
                let mut config = self.load_config()?;
                match key {
                    "api_url" => {
                        url::Url::parse(value).with_context(|| format!("Invalid URL '{}'", value))?;
                        config.api_url = value.trim_end_matches('/').to_string();
                    }
                    "default_organization" => {
                        config.default_organization = Some(value.to_string()).filter(|v| !v.is_empty())
                    }
                    _ => config.restricted_types = parse_restricted_types(value)?,
                }
                self.save_config(&config)
            }
            _ => anyhow::bail!(
                "Unknown setting '{}' (expected one of: {}, organization_key.<id>)",
                key,
                SETTABLE_KEYS.join(", ")
            ),
        }
    }

    /// Organization to import into when none is given on the command line.
    pub fn resolve_organization(&self, organization: Option<&str>) -> Result<Option<String>> {
        match organization {
            Some(org) => Ok(Some(org.to_string())),
            None => Ok(self.load_config()?.default_organization),
        }
    }
}

/// Comma separated kind names, normalised to their canonical spelling.
fn parse_restricted_types(value: &str) -> Result<Vec<String>> {
    value
        .split(',')
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(|name| {
            CipherType::from_name(name)
                .map(|kind| kind.display_name().to_string())
                .with_context(|| format!("Unknown item type '{}'", name))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_files_load_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let store = ConfigStore::at(dir.path()).unwrap();
        assert_eq!(store.load_config().unwrap(), Config::default());
        assert_eq!(store.load_config().unwrap().api_url, DEFAULT_API_URL);
        assert!(store.load_credentials().unwrap().access_token.is_none());
    }

    #[test]
    fn set_routes_secrets_to_credentials() {
        let dir = tempfile::tempdir().unwrap();
        let store = ConfigStore::at(dir.path()).unwrap();
        store.set("api_url", "https://vault.example.com/api/").unwrap();
        store.set("restricted_types", "card, secure note").unwrap();
        store.set("access_token", "tok").unwrap();
        store.set("organization_key.org-1", "a2V5").unwrap();

        let config = store.load_config().unwrap();
        assert_eq!(config.api_url, "https://vault.example.com/api");
        assert_eq!(config.restricted_types, ["Card", "Secure Note"]);

        let creds = store.load_credentials().unwrap();
        assert_eq!(creds.access_token.as_deref(), Some("tok"));
        assert_eq!(creds.organization_keys["org-1"], "a2V5");
        let on_disk = fs::read_to_string(dir.path().join(CONFIG_FILE)).unwrap();
        assert!(!on_disk.contains("tok"));
    }

    #[cfg(unix)]
    #[test]
    fn credentials_are_private() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let store = ConfigStore::at(dir.path()).unwrap();
        store.set("user_key", "secret").unwrap();
        let mode = fs::metadata(dir.path().join(CREDENTIALS_FILE)).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[test]
    fn rejects_bad_settings() {
        let dir = tempfile::tempdir().unwrap();
        let store = ConfigStore::at(dir.path()).unwrap();
        assert!(store.set("colour", "blue").is_err());
        assert!(store.set("api_url", "not a url").is_err());
        assert!(store.set("restricted_types", "spaceship").is_err());
        assert!(store.set("organization_key.", "x").is_err());
    }

    #[test]
    fn default_organization_fallback() {
        let dir = tempfile::tempdir().unwrap();
        let store = ConfigStore::at(dir.path()).unwrap();
        assert_eq!(store.resolve_organization(None).unwrap(), None);
        store.set("default_organization", "org-9").unwrap();
        assert_eq!(store.resolve_organization(None).unwrap().as_deref(), Some("org-9"));
        assert_eq!(store.resolve_organization(Some("x")).unwrap().as_deref(), Some("x"));
    }
}
