//! Bitwarden JSON exports, plain and password-protected.

use std::collections::HashMap;

use serde::Deserialize;
use tracing::{debug, warn};

use crate::crypto::{EncString, SymmetricKey};
use crate::models::{
    Card, CipherData, CipherRecord, CipherType, Field, FieldType, Identity, ImportResult, Login,
    LoginUri, PasswordHistory, SecureNote, SshKey,
};

use super::base;
use super::Importer;

pub const INVALID_FILE_PASSWORD: &str =
    "Invalid file password, please use the password you entered when you created the export file.";
const ACCOUNT_ENCRYPTED: &str =
    "This export is encrypted with an account key. Export it again with a file password.";
const UNSUPPORTED_KDF: &str = "This export uses a key derivation function that is not supported.";

// -- Export document ------------------------------------------------------------

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct ExportDocument {
    encrypted: bool,
    password_protected: bool,
    salt: Option<String>,
    kdf_type: Option<u32>,
    kdf_iterations: Option<u32>,
    #[serde(rename = "encKeyValidation_DO_NOT_EDIT")]
    enc_key_validation: Option<String>,
    data: Option<String>,
    folders: Vec<ExportFolder>,
    collections: Vec<ExportCollection>,
    items: Option<Vec<ExportItem>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ExportFolder {
    id: Option<String>,
    name: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ExportCollection {
    id: Option<String>,
    name: String,
    external_id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct ExportItem {
    folder_id: Option<String>,
    collection_ids: Option<Vec<String>>,
    #[serde(rename = "type")]
    item_type: u64,
    reprompt: u8,
    name: Option<String>,
    notes: Option<String>,
    favorite: bool,
    fields: Option<Vec<ExportField>>,
    login: Option<ExportLogin>,
    card: Option<Card>,
    identity: Option<Identity>,
    ssh_key: Option<SshKey>,
    password_history: Option<Vec<PasswordHistory>>,
    creation_date: Option<String>,
    revision_date: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ExportField {
    name: Option<String>,
    value: Option<String>,
    #[serde(rename = "type", default)]
    field_type: u64,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct ExportLogin {
    uris: Option<Vec<LoginUri>>,
    username: Option<String>,
    password: Option<String>,
    totp: Option<String>,
    password_revision_date: Option<String>,
}

// -- Plain export ---------------------------------------------------------------

pub struct BitwardenJsonImporter {
    organization_id: Option<String>,
}

impl BitwardenJsonImporter {
    pub fn new(organization_id: Option<String>) -> Self {
        Self { organization_id }
    }

    fn parse_document(&self, doc: ExportDocument) -> ImportResult {
        if doc.encrypted {
            return if doc.password_protected {
                ImportResult::password_required()
            } else {
                ImportResult::failure(ACCOUNT_ENCRYPTED)
            };
        }
        let Some(items) = doc.items else {
            return ImportResult::new();
        };

        let mut result = ImportResult::new();
        let is_org = self.organization_id.is_some();
        let use_collections = is_org && !doc.collections.is_empty();

        // Ids only mean something inside this one file.
        let mut groupings: HashMap<String, usize> = HashMap::new();
        if use_collections {
            for collection in doc.collections {
                let index = result.add_collection(collection.name);
                result.collections[index].external_id = collection.external_id;
                if let Some(id) = collection.id {
                    groupings.insert(id, index);
                }
            }
        } else {
            for folder in doc.folders {
                let index = result.add_folder(folder.name);
                if let Some(id) = folder.id {
                    groupings.insert(id, index);
                }
            }
        }

        for mut item in items {
            let folder_id = item.folder_id.take();
            let collection_ids = item.collection_ids.take().unwrap_or_default();
            let Some(mut cipher) = convert_item(item) else {
                continue;
            };

            let cipher_index = result.ciphers.len();
            if use_collections {
                for id in &collection_ids {
                    if let Some(&index) = groupings.get(id) {
                        result.link_collection(cipher_index, index);
                    }
                }
            } else if let Some(&index) = folder_id.as_ref().and_then(|id| groupings.get(id)) {
                result.link_folder(cipher_index, index);
            }
            if is_org {
                cipher.favorite = false;
            }
            base::cleanup_cipher(&mut cipher);
            result.ciphers.push(cipher);
        }

        debug!(
            items = result.ciphers.len(),
            folders = result.folders.len(),
            collections = result.collections.len(),
            "parsed bitwarden json"
        );
        base::finish(result, self.organization_id.as_deref())
    }
}

impl Importer for BitwardenJsonImporter {
    fn parse(&self, data: &str) -> ImportResult {
        match serde_json::from_str::<ExportDocument>(data) {
            Ok(doc) => self.parse_document(doc),
            Err(e) => {
                debug!(error = %e, "not a bitwarden json export");
                ImportResult::new()
            }
        }
    }
}

fn convert_item(item: ExportItem) -> Option<CipherRecord> {
    let Some(kind) = CipherType::from_code(item.item_type) else {
        warn!(item_type = item.item_type, "skipping item of unknown type");
        return None;
    };
    let data = match kind {
        CipherType::Login => {
            let login = item.login.unwrap_or_default();
            CipherData::Login(Login {
                username: login.username,
                password: login.password,
                totp: login.totp,
                uris: login.uris.unwrap_or_default(),
                password_revision_date: login.password_revision_date,
            })
        }
        CipherType::SecureNote => CipherData::SecureNote(SecureNote::default()),
        CipherType::Card => CipherData::Card(item.card.unwrap_or_default()),
        CipherType::Identity => CipherData::Identity(item.identity.unwrap_or_default()),
        CipherType::SshKey => CipherData::SshKey(item.ssh_key.unwrap_or_default()),
    };

    let mut cipher = CipherRecord::new(kind);
    cipher.data = data;
    cipher.name = item.name.unwrap_or_default();
    cipher.notes = item.notes;
    cipher.favorite = item.favorite;
    cipher.reprompt = item.reprompt == 1;
    cipher.creation_date = item.creation_date;
    cipher.revision_date = item.revision_date;
    cipher.fields = item
        .fields
        .unwrap_or_default()
        .into_iter()
        .map(|f| Field {
            name: f.name,
            value: f.value,
            field_type: FieldType::from_code(f.field_type),
        })
        .collect();
    for entry in item.password_history.unwrap_or_default() {
        cipher.add_password_history(entry);
    }
    Some(cipher)
}

// -- Password-protected export --------------------------------------------------

/// An export encrypted with a file password. The decrypted payload is a
/// plain export and is handed to [`BitwardenJsonImporter`].
pub struct BitwardenPasswordProtectedImporter {
    inner: BitwardenJsonImporter,
    password: String,
}

impl BitwardenPasswordProtectedImporter {
    pub fn new(organization_id: Option<String>, password: &str) -> Self {
        Self {
            inner: BitwardenJsonImporter::new(organization_id),
            password: password.to_string(),
        }
    }

    fn file_key(&self, doc: &ExportDocument) -> Result<SymmetricKey, ImportResult> {
        if doc.kdf_type.unwrap_or(0) != 0 {
            return Err(ImportResult::failure(UNSUPPORTED_KDF));
        }
        let (Some(salt), Some(iterations)) = (doc.salt.as_deref(), doc.kdf_iterations) else {
            return Err(ImportResult::new());
        };
        let key = SymmetricKey::derive_from_password(&self.password, salt, iterations)
            .map_err(|e| ImportResult::failure(e.to_string()))?;

        let valid = doc
            .enc_key_validation
            .as_deref()
            .and_then(|v| v.parse::<EncString>().ok())
            .is_some_and(|v| v.decrypt(&key).is_ok());
        if !valid {
            return Err(ImportResult::failure(INVALID_FILE_PASSWORD));
        }
        Ok(key)
    }
}

impl Importer for BitwardenPasswordProtectedImporter {
    fn parse(&self, data: &str) -> ImportResult {
        let doc: ExportDocument = match serde_json::from_str(data) {
            Ok(doc) => doc,
            Err(e) => {
                debug!(error = %e, "not a bitwarden json export");
                return ImportResult::new();
            }
        };
        if !(doc.encrypted && doc.password_protected) {
            return self.inner.parse_document(doc);
        }

        let key = match self.file_key(&doc) {
            Ok(key) => key,
            Err(result) => return result,
        };
        let clear = doc
            .data
            .as_deref()
            .and_then(|d| d.parse::<EncString>().ok())
            .and_then(|d| d.decrypt_to_string(&key).ok());
        match clear {
            Some(clear) => self.inner.parse(&clear),
            None => ImportResult::new(),
        }
    }
}
