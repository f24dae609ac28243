use std::collections::{HashMap, HashSet};

use serde::Deserialize;
use tracing::debug;

use crate::models::{CipherRecord, CipherType, FieldType, ImportResult};
use crate::normalize;

use super::base;
use super::Importer;

/// `items` is the one key every Enpass export has.
#[derive(Debug, Deserialize)]
struct Export {
    #[serde(default)]
    folders: Vec<Folder>,
    items: Vec<Item>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Folder {
    uuid: String,
    title: String,
    parent_uuid: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Item {
    title: String,
    note: String,
    template_type: String,
    favorite: u8,
    trashed: u8,
    fields: Vec<ItemField>,
    folders: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ItemField {
    label: String,
    #[serde(rename = "type")]
    field_type: String,
    value: String,
    sensitive: u8,
}

/// Enpass 6 JSON export.
pub struct EnpassJsonImporter {
    organization_id: Option<String>,
}

impl EnpassJsonImporter {
    pub fn new(organization_id: Option<String>) -> Self {
        Self { organization_id }
    }
}

impl Importer for EnpassJsonImporter {
    fn parse(&self, data: &str) -> ImportResult {
        let export: Export = match serde_json::from_str(data) {
            Ok(export) => export,
            Err(e) => {
                debug!(error = %e, "not an enpass export");
                return ImportResult::new();
            }
        };
        let paths = folder_paths(&export.folders);
        let mut result = ImportResult::new();

        for item in export.items.iter().filter(|i| i.trashed == 0) {
            let mut cipher = match item_kind(item) {
                CipherType::Login => parse_login(item),
                CipherType::Card => parse_card(item),
                _ => parse_note(item),
            };
            cipher.name = item.title.clone();
            cipher.notes = base::non_blank(&item.note);
            cipher.favorite = item.favorite > 0;

            if let Some(path) = item.folders.first().and_then(|uuid| paths.get(uuid)) {
                base::process_folder(&mut result, path);
            }
            base::push_cipher(&mut result, cipher);
        }

        debug!(items = result.ciphers.len(), "parsed enpass json");
        base::finish(result, self.organization_id.as_deref())
    }
}

/// Full `parent/child` path for every folder uuid. A folder whose parent is
/// missing, or whose ancestry loops back on itself, sits at the root.
fn folder_paths(folders: &[Folder]) -> HashMap<String, String> {
    let by_uuid: HashMap<&str, &Folder> = folders.iter().map(|f| (f.uuid.as_str(), f)).collect();
    let mut paths = HashMap::new();

    for folder in folders {
        let mut titles = vec![folder.title.trim()];
        let mut seen = HashSet::from([folder.uuid.as_str()]);
        let mut parent = folder.parent_uuid.as_str();
        while !parent.is_empty() {
            let Some(next) = by_uuid.get(parent) else {
                break;
            };
            if !seen.insert(next.uuid.as_str()) {
                titles.truncate(1);
                break;
            }
            titles.push(next.title.trim());
            parent = next.parent_uuid.as_str();
        }
        titles.reverse();
        paths.insert(folder.uuid.clone(), titles.join("/"));
    }
    paths
}

fn item_kind(item: &Item) -> CipherType {
    let template = item.template_type.as_str();
    if template.starts_with("login.") || template.starts_with("password.") {
        CipherType::Login
    } else if template.starts_with("creditcard.") {
        CipherType::Card
    } else if !template.starts_with("identity.")
        && item.fields.iter().any(|f| f.field_type == "url" && !f.value.trim().is_empty())
    {
        CipherType::Login
    } else {
        CipherType::SecureNote
    }
}

fn parse_login(item: &Item) -> CipherRecord {
    let mut cipher = base::init_login_cipher();
    let mut uris = Vec::new();
    for field in item.fields.iter().filter(|f| !f.value.trim().is_empty()) {
        let Some(login) = cipher.login_mut() else {
            break;
        };
        let value = Some(field.value.clone());
        match field.field_type.as_str() {
            "username" if login.username.is_none() => login.username = value,
            "email" if login.username.is_none() => login.username = value,
            "password" if login.password.is_none() => login.password = value,
            "totp" if login.totp.is_none() => login.totp = value,
            "url" => uris.push(field.value.clone()),
            _ => process_field(&mut cipher, field),
        }
    }
    if let Some(login) = cipher.login_mut() {
        login.uris = base::make_uris(uris);
    }
    cipher
}

fn parse_card(item: &Item) -> CipherRecord {
    let mut cipher = CipherRecord::new(CipherType::Card);
    for field in item.fields.iter().filter(|f| !f.value.trim().is_empty()) {
        if field.field_type == "ccExpiry" && base::set_card_expiration(&mut cipher, &field.value) {
            continue;
        }
        let Some(card) = cipher.card_mut() else {
            break;
        };
        let value = Some(field.value.clone());
        match field.field_type.as_str() {
            "ccName" if card.cardholder_name.is_none() => card.cardholder_name = value,
            "ccNumber" if card.number.is_none() => {
                card.brand = normalize::card_brand(&field.value).map(str::to_string);
                card.number = value;
            }
            "ccCvc" if card.code.is_none() => card.code = value,
            "ccType" if card.brand.is_none() => card.brand = value,
            _ => process_field(&mut cipher, field),
        }
    }
    cipher
}

fn parse_note(item: &Item) -> CipherRecord {
    let mut cipher = CipherRecord::new(CipherType::SecureNote);
    for field in &item.fields {
        process_field(&mut cipher, field);
    }
    cipher
}

fn process_field(cipher: &mut CipherRecord, field: &ItemField) {
    if field.field_type == "section" {
        return;
    }
    let field_type = if field.sensitive > 0 {
        FieldType::Hidden
    } else {
        FieldType::Text
    };
    base::process_kvp(cipher, &field.label, &field.value, field_type);
}
