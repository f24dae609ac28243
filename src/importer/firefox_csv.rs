use chrono::{DateTime, SecondsFormat};
use tracing::debug;

use crate::models::ImportResult;

use super::base;
use super::Importer;

/// Firefox `about:logins` export.
pub struct FirefoxCsvImporter {
    organization_id: Option<String>,
}

impl FirefoxCsvImporter {
    pub fn new(organization_id: Option<String>) -> Self {
        Self { organization_id }
    }
}

impl Importer for FirefoxCsvImporter {
    fn parse(&self, data: &str) -> ImportResult {
        let Some(table) = base::parse_csv(data) else {
            return ImportResult::new();
        };
        // Older exports call the url column `hostname`.
        let has_url = table.has_column("url") || table.has_column("hostname");
        if !has_url || !table.has_columns(&["username", "password"]) {
            return ImportResult::new();
        }
        let rows = table.rows;
        let mut result = ImportResult::new();

        // Firefox Sync keeps its own account in the login store.
        for row in rows.iter().filter(|r| r.get("url") != Some("chrome://FirefoxAccounts")) {
            let mut cipher = base::init_login_cipher();
            let url = row.value("url").or_else(|| row.value("hostname")).unwrap_or_default();

            cipher.name = base::name_from_url(&url).unwrap_or_default();
            cipher.creation_date = row.get("timeCreated").and_then(millis_to_rfc3339);
            if let Some(login) = cipher.login_mut() {
                login.username = row.value("username");
                login.password = row.value("password");
                login.uris = base::make_uris([url.as_str()]);
                login.password_revision_date =
                    row.get("timePasswordChanged").and_then(millis_to_rfc3339);
            }

            base::cleanup_cipher(&mut cipher);
            result.ciphers.push(cipher);
        }

        debug!(items = result.ciphers.len(), "parsed firefox csv");
        base::finish(result, self.organization_id.as_deref())
    }
}

fn millis_to_rfc3339(value: &str) -> Option<String> {
    let millis: i64 = value.trim().parse().ok()?;
    DateTime::from_timestamp_millis(millis).map(|d| d.to_rfc3339_opts(SecondsFormat::Millis, true))
}
