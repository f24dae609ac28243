use tracing::debug;

use crate::models::{CipherRecord, CipherType, Field, ImportResult};

use super::base::{self, CsvRow};
use super::Importer;

/// Bitwarden's own CSV export.
///
/// Personal exports carry a `folder` column, organization exports a
/// comma-separated `collections` column.
pub struct BitwardenCsvImporter {
    organization_id: Option<String>,
}

impl BitwardenCsvImporter {
    pub fn new(organization_id: Option<String>) -> Self {
        Self { organization_id }
    }
}

impl Importer for BitwardenCsvImporter {
    fn parse(&self, data: &str) -> ImportResult {
        let Some(rows) = base::parse_csv_with_columns(data, &["type", "name"]) else {
            return ImportResult::new();
        };
        let mut result = ImportResult::new();
        let is_org = self.organization_id.is_some();

        for row in &rows {
            if is_org {
                if let Some(collections) = row.value("collections") {
                    for name in collections.split(',') {
                        base::process_collection(&mut result, name);
                    }
                }
            } else if let Some(folder) = row.value("folder") {
                base::process_folder(&mut result, &folder);
            }

            let cipher = parse_row(row, is_org);
            result.ciphers.push(cipher);
        }

        debug!(items = result.ciphers.len(), "parsed bitwarden csv");
        // Collections were filled directly, so no folder move is needed.
        result.prune_relationships();
        result.success = true;
        result
    }
}

fn parse_row(row: &CsvRow, is_org: bool) -> CipherRecord {
    let kind = match row.get("type").map(|t| t.trim().to_ascii_lowercase()) {
        Some(t) if t == "note" => CipherType::SecureNote,
        _ => CipherType::Login,
    };
    let mut cipher = CipherRecord::new(kind);

    cipher.favorite = !is_org
        && row
            .get("favorite")
            .is_some_and(|f| !f.trim().is_empty() && f.trim() != "0");
    cipher.reprompt = row.get("reprompt").is_some_and(|r| r.trim() == "1");
    cipher.notes = row.value("notes");
    cipher.name = row.value("name").unwrap_or_default();

    if let Some(fields) = row.value("fields") {
        for line in base::split_newlines(&fields) {
            if line.trim().is_empty() {
                continue;
            }
            let Some(pos) = line.rfind(": ") else {
                continue;
            };
            let value = &line[pos + 2..];
            cipher.fields.push(Field {
                name: Some(line[..pos].to_string()),
                value: (!value.is_empty()).then(|| value.to_string()),
                ..Field::default()
            });
        }
    }

    if let Some(login) = cipher.login_mut() {
        login.totp = row.value("login_totp").or_else(|| row.value("totp"));
        login.username = row.value("login_username").or_else(|| row.value("username"));
        login.password = row.value("login_password").or_else(|| row.value("password"));
        if let Some(uris) = row.value("login_uri").or_else(|| row.value("uri")) {
            login.uris = base::make_uris(uris.split(','));
        }
    }

    base::cleanup_cipher(&mut cipher);
    cipher
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::FieldType;

    const PERSONAL: &str = "folder,favorite,type,name,notes,fields,reprompt,login_uri,login_username,login_password,login_totp
Social,1,login,Twitter,,\"pin: 1234\nrecovery: \",0,twitter.com,alice,secret,
,,note,Shopping list,eggs,,,,,,
Social,,login,,,,,,,,
";

    #[test]
    fn personal_export() {
        let result = BitwardenCsvImporter::new(None).parse(PERSONAL);
        assert!(result.success);
        assert_eq!(result.ciphers.len(), 3);
        assert_eq!(result.folders.len(), 1);
        assert_eq!(result.folder_relationships(), &[(0, 0), (2, 0)]);

        let twitter = &result.ciphers[0];
        assert!(twitter.favorite);
        let login = twitter.login().unwrap();
        assert_eq!(login.username.as_deref(), Some("alice"));
        assert_eq!(login.uris[0].uri.as_deref(), Some("http://twitter.com"));
        assert_eq!(twitter.fields.len(), 2);
        assert_eq!(twitter.fields[0].value.as_deref(), Some("1234"));
        assert_eq!(twitter.fields[1].value, None);
        assert_eq!(twitter.fields[1].field_type, FieldType::Text);

        assert_eq!(result.ciphers[1].cipher_type(), CipherType::SecureNote);
        assert_eq!(result.ciphers[2].name, "--");
    }

    #[test]
    fn organization_export_uses_collections() {
        let data = "collections,type,name,login_username,login_password\n\"Eng,Ops\",login,Server,root,pw\n";
        let result = BitwardenCsvImporter::new(Some("org-1".to_string())).parse(data);
        assert!(result.success);
        assert!(result.folders.is_empty());
        let names: Vec<&str> = result.collections.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, ["Eng", "Ops"]);
        assert_eq!(result.collection_relationships(), &[(0, 0), (0, 1)]);
    }

    #[test]
    fn other_csv_layouts_are_not_bitwarden() {
        let chrome = "name,url,username,password,note\nx,https://x.com,a,b,\n";
        assert!(!BitwardenCsvImporter::new(None).parse(chrome).success);
    }
}
