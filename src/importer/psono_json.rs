use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::models::{CipherRecord, CipherType, FieldType, ImportResult};

use super::base;
use super::Importer;

/// Keys that describe the item itself rather than its contents.
const IGNORED_KEYS: [&str; 4] = ["id", "type", "name", "deleted"];

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Folder {
    name: String,
    items: Vec<Map<String, Value>>,
    folders: Vec<Folder>,
}

#[derive(Debug, Deserialize)]
struct Export {
    items: Option<Vec<Map<String, Value>>>,
    folders: Option<Vec<Folder>>,
}

/// Psono datastore export. Item properties are prefixed with the item type
/// (`website_password_url`, `totp_code`, ...).
pub struct PsonoJsonImporter {
    organization_id: Option<String>,
}

impl PsonoJsonImporter {
    pub fn new(organization_id: Option<String>) -> Self {
        Self { organization_id }
    }
}

impl Importer for PsonoJsonImporter {
    fn parse(&self, data: &str) -> ImportResult {
        let export: Export = match serde_json::from_str(data) {
            Ok(export) => export,
            Err(e) => {
                debug!(error = %e, "not a psono export");
                return ImportResult::new();
            }
        };
        if export.items.is_none() && export.folders.is_none() {
            debug!("json has neither items nor folders");
            return ImportResult::new();
        }
        let mut result = ImportResult::new();

        for item in export.items.iter().flatten() {
            push_item(&mut result, item, None);
        }
        for folder in export.folders.iter().flatten() {
            walk_folder(&mut result, folder, None);
        }

        debug!(items = result.ciphers.len(), "parsed psono json");
        base::finish(result, self.organization_id.as_deref())
    }
}

fn walk_folder(result: &mut ImportResult, folder: &Folder, parent: Option<&str>) {
    let path = match parent {
        Some(parent) => format!("{}/{}", parent, folder.name.trim()),
        None => folder.name.trim().to_string(),
    };
    for item in &folder.items {
        push_item(result, item, Some(&path));
    }
    for child in &folder.folders {
        walk_folder(result, child, Some(&path));
    }
}

fn push_item(result: &mut ImportResult, item: &Map<String, Value>, folder: Option<&str>) {
    let Some(cipher) = parse_item(item) else {
        return;
    };
    if let Some(folder) = folder {
        base::process_folder(result, folder);
    }
    base::push_cipher(result, cipher);
}

fn parse_item(item: &Map<String, Value>) -> Option<CipherRecord> {
    let item_type = item.get("type").and_then(Value::as_str).unwrap_or_default();
    let kind = match item_type {
        "website_password" | "application_password" | "bookmark" | "totp" => CipherType::Login,
        "note" | "environment_variables" | "mail_gpg_own_key" => CipherType::SecureNote,
        other => {
            warn!(item_type = other, "skipping unsupported psono item");
            return None;
        }
    };
    let mut cipher = CipherRecord::new(kind);
    let text = |key: &str| item.get(&format!("{}_{}", item_type, key)).and_then(as_text);

    cipher.name = text("title")
        .or_else(|| item.get("name").and_then(as_text))
        .unwrap_or_default();
    cipher.notes = text("notes");

    let mut handled = vec!["title", "notes"];
    match item_type {
        "website_password" | "application_password" | "bookmark" => {
            if let Some(login) = cipher.login_mut() {
                login.username = text("username");
                login.password = text("password");
                login.uris = base::make_uris(text("url"));
            }
            handled.extend(["username", "password", "url"]);
        }
        "totp" => {
            if let Some(login) = cipher.login_mut() {
                login.totp = text("code");
            }
            handled.push("code");
        }
        "environment_variables" => {
            let variables = item
                .get("environment_variables_variables")
                .and_then(Value::as_array)
                .map(Vec::as_slice)
                .unwrap_or_default();
            for variable in variables {
                let key = variable.get("key").and_then(Value::as_str).unwrap_or_default();
                let value = variable.get("value").and_then(as_text).unwrap_or_default();
                base::process_kvp(&mut cipher, key, &value, FieldType::Text);
            }
            handled.push("variables");
        }
        "mail_gpg_own_key" => {
            // The public key is the readable part of the item.
            cipher.notes = text("public");
            if let Some(private) = text("private") {
                base::process_kvp(&mut cipher, "mail_gpg_own_key_private", &private, FieldType::Hidden);
            }
            handled.extend(["public", "private", "notes"]);
        }
        _ => {}
    }

    let handled: Vec<String> = handled.iter().map(|k| format!("{}_{}", item_type, k)).collect();
    for (key, value) in item {
        if IGNORED_KEYS.contains(&key.as_str()) || handled.contains(key) {
            continue;
        }
        let field_type = if value.is_boolean() {
            FieldType::Boolean
        } else {
            FieldType::Text
        };
        if let Some(value) = as_text(value) {
            base::process_kvp(&mut cipher, key, &value, field_type);
        }
    }
    Some(cipher)
}

fn as_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => base::non_blank(s),
        Value::Bool(b) => Some(b.to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}
