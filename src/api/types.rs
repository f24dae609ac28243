//! Request bodies for the bulk import endpoints and the server's error body.
//! Every string inside a cipher, folder or collection request is an
//! encrypted string; dates and numeric tags are sent in the clear.

use serde::Serialize;
use serde_json::Value;

use crate::models::{Card, Identity, Login, PasswordHistory, SecureNote, SshKey};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CipherRequest {
    #[serde(rename = "type")]
    pub cipher_type: u8,
    pub organization_id: Option<String>,
    pub name: String,
    pub notes: Option<String>,
    pub favorite: bool,
    /// 0 none, 1 master password re-prompt.
    pub reprompt: u8,
    pub login: Option<Login>,
    pub card: Option<Card>,
    pub identity: Option<Identity>,
    pub secure_note: Option<SecureNote>,
    pub ssh_key: Option<SshKey>,
    pub fields: Vec<FieldRequest>,
    pub password_history: Vec<PasswordHistory>,
    pub creation_date: Option<String>,
    pub last_known_revision_date: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldRequest {
    pub name: Option<String>,
    pub value: Option<String>,
    #[serde(rename = "type")]
    pub field_type: u8,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FolderRequest {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectionRequest {
    pub name: String,
    pub external_id: Option<String>,
}

/// One positional edge: `key` is the cipher index, `value` the folder or
/// collection index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RelationshipRequest {
    pub key: usize,
    pub value: usize,
}

impl From<(usize, usize)> for RelationshipRequest {
    fn from((key, value): (usize, usize)) -> Self {
        Self { key, value }
    }
}

/// `POST /ciphers/import`
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportCiphersRequest {
    pub ciphers: Vec<CipherRequest>,
    pub folders: Vec<FolderRequest>,
    pub folder_relationships: Vec<RelationshipRequest>,
}

/// `POST /ciphers/import-organization?organizationId=...`
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportOrganizationCiphersRequest {
    pub ciphers: Vec<CipherRequest>,
    pub collections: Vec<CollectionRequest>,
    pub collection_relationships: Vec<RelationshipRequest>,
}

// -- Errors -------------------------------------------------------------------

/// Body of a rejected request. Validation errors keep the order the server
/// sent them in.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ErrorResponse {
    pub message: String,
    pub validation_errors: Vec<(String, Vec<String>)>,
}

impl ErrorResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            validation_errors: Vec::new(),
        }
    }

    pub fn with_validation_error(mut self, key: impl Into<String>, messages: &[&str]) -> Self {
        self.validation_errors
            .push((key.into(), messages.iter().map(|m| m.to_string()).collect()));
        self
    }

    /// Parse a server error body. Older servers use PascalCase keys.
    /// `None` when the body is not a JSON object.
    pub fn parse(body: &str) -> Option<Self> {
        let value: Value = serde_json::from_str(body).ok()?;
        let object = value.as_object()?;
        let field = |camel: &str, pascal: &str| object.get(camel).or_else(|| object.get(pascal));

        let message = field("message", "Message")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        let validation_errors = field("validationErrors", "ValidationErrors")
            .and_then(Value::as_object)
            .map(|errors| {
                errors
                    .iter()
                    .map(|(key, messages)| (key.clone(), messages_of(messages)))
                    .collect()
            })
            .unwrap_or_default();

        Some(Self {
            message,
            validation_errors,
        })
    }

    pub fn has_validation_errors(&self) -> bool {
        !self.validation_errors.is_empty()
    }
}

fn messages_of(value: &Value) -> Vec<String> {
    match value {
        Value::Array(items) => items.iter().filter_map(Value::as_str).map(str::to_string).collect(),
        Value::String(s) => vec![s.clone()],
        _ => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relationships_serialize_as_key_value() {
        let request = ImportCiphersRequest {
            folder_relationships: vec![(0, 1).into()],
            ..Default::default()
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["folderRelationships"][0]["key"], 0);
        assert_eq!(json["folderRelationships"][0]["value"], 1);
        assert!(json["ciphers"].as_array().unwrap().is_empty());
    }

    #[test]
    fn error_body_keeps_server_order() {
        let body = r#"{
            "message": "The model state is invalid.",
            "validationErrors": {
                "Ciphers[3].Name": ["The field Name exceeds the maximum length."],
                "Ciphers[1].Notes": ["Too long.", "Really."],
                "Folders[0].Name": "Required."
            }
        }"#;
        let response = ErrorResponse::parse(body).unwrap();
        assert_eq!(response.message, "The model state is invalid.");
        let keys: Vec<&str> = response.validation_errors.iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(keys, ["Ciphers[3].Name", "Ciphers[1].Notes", "Folders[0].Name"]);
        assert_eq!(response.validation_errors[1].1, ["Too long.", "Really."]);
        assert_eq!(response.validation_errors[2].1, ["Required."]);
    }

    #[test]
    fn pascal_case_body() {
        let response =
            ErrorResponse::parse(r#"{"Message":"Bad","ValidationErrors":{"Ciphers0":["x"]}}"#).unwrap();
        assert_eq!(response.message, "Bad");
        assert!(response.has_validation_errors());
        assert!(ErrorResponse::parse("<html>").is_none());
    }
}
