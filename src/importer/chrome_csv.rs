use tracing::debug;

use crate::models::{ImportResult, LoginUri};

use super::base;
use super::Importer;

/// Chromium-family password CSV (`name,url,username,password,note`).
/// Edge, Opera, Vivaldi and Brave export the same layout.
pub struct ChromeCsvImporter {
    organization_id: Option<String>,
}

impl ChromeCsvImporter {
    pub fn new(organization_id: Option<String>) -> Self {
        Self { organization_id }
    }
}

impl Importer for ChromeCsvImporter {
    fn parse(&self, data: &str) -> ImportResult {
        let Some(rows) = base::parse_csv_with_columns(data, &["url", "username", "password"]) else {
            return ImportResult::new();
        };
        let mut result = ImportResult::new();

        for row in &rows {
            let mut cipher = base::init_login_cipher();
            let url = row.value("url").unwrap_or_default();
            let mut name = row.value("name");

            if let Some(login) = cipher.login_mut() {
                login.username = row.value("username");
                login.password = row.value("password");
                login.uris = match android_package(&url) {
                    Some(package) => {
                        if name.is_none() {
                            name = Some(package.rsplit('.').collect::<Vec<_>>().join("."));
                        }
                        vec![LoginUri {
                            uri: Some(format!("androidapp://{}", package)),
                            match_type: None,
                        }]
                    }
                    None => base::make_uris([url.as_str()]),
                };
            }
            cipher.name = name.unwrap_or_default();
            cipher.notes = row.value("note").or_else(|| row.value("notes"));

            base::cleanup_cipher(&mut cipher);
            result.ciphers.push(cipher);
        }

        debug!(items = result.ciphers.len(), "parsed chromium csv");
        base::finish(result, self.organization_id.as_deref())
    }
}

/// `android://<hash>@com.example.app/` -> `com.example.app`
fn android_package(url: &str) -> Option<&str> {
    let rest = url.strip_prefix("android://")?;
    let (_, package) = rest.rsplit_once('@')?;
    let package = package.split('/').next()?;
    (!package.is_empty()).then_some(package)
}
