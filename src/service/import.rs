use serde::Serialize;
use tracing::{debug, info, instrument, warn};

use crate::api::{
    ApiError, ErrorResponse, ImportApi, ImportCiphersRequest, ImportOrganizationCiphersRequest,
};
use crate::error::ImportError;
use crate::importer::Importer;
use crate::models::{CipherRecord, CipherType, ImportResult};

use super::encryptor::VaultEncryptor;

/// Existing folder or collection to import into.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImportTarget {
    Folder(String),
    Collection(String),
}

#[derive(Debug, Clone, Default)]
pub struct ImportOptions {
    pub target: Option<ImportTarget>,
    /// Item kinds the organization policy keeps out of the vault.
    pub restricted_types: Vec<CipherType>,
    /// Whether the caller may import items that end up in no collection.
    pub can_manage_import: bool,
}

/// What was sent to the server.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ImportSummary {
    pub ciphers: usize,
    pub folders: usize,
    pub collections: usize,
}

// -- Validation ---------------------------------------------------------------

/// Parse `contents` and run every check that happens before encryption.
///
/// The returned result is exactly what would be uploaded: restricted kinds
/// removed, the import target applied, organization ids stamped.
pub fn prepare(
    importer: &dyn Importer,
    contents: &str,
    organization_id: Option<&str>,
    options: &ImportOptions,
) -> Result<ImportResult, ImportError> {
    let mut result = importer.parse(contents);

    let message = result
        .error_message
        .as_deref()
        .map(str::trim)
        .filter(|m| !m.is_empty());
    if !result.success && (message.is_some() || result.missing_password) {
        return Err(ImportError::Parse {
            message: message
                .unwrap_or(crate::error::FORMAT_ERROR)
                .to_string(),
            missing_password: result.missing_password,
        });
    }
    if result.is_empty() {
        return Err(ImportError::NothingToImport);
    }
    if !result.success {
        return Err(ImportError::format_error());
    }
    if looks_degenerate(&result.ciphers) {
        warn!(
            ciphers = result.ciphers.len(),
            "sampled items are all unnamed empty logins, treating as wrong format"
        );
        return Err(ImportError::format_error());
    }

    if !options.restricted_types.is_empty() {
        let removed = result.retain_ciphers(|c| !options.restricted_types.contains(&c.cipher_type()));
        if removed > 0 {
            info!(removed, "dropped items restricted by organization policy");
        }
        if result.is_empty() {
            return Err(ImportError::NothingToImport);
        }
    }

    if organization_id.is_some() && !result.folders.is_empty() {
        result.move_folders_to_collections();
    }

    match (organization_id, &options.target) {
        (Some(_), Some(ImportTarget::Folder(name))) => {
            return Err(ImportError::InvalidTarget(format!(
                "organization imports go into a collection, not folder \"{}\"",
                name
            )));
        }
        (None, Some(ImportTarget::Collection(name))) => {
            return Err(ImportError::InvalidTarget(format!(
                "personal imports go into a folder, not collection \"{}\"",
                name
            )));
        }
        _ => {}
    }

    if organization_id.is_some() && options.target.is_none() && !options.can_manage_import {
        let assigned = result.collection_relationships();
        let unassigned = (0..result.ciphers.len()).any(|i| !assigned.iter().any(|&(c, _)| c == i));
        if unassigned {
            return Err(ImportError::UnassignedItems);
        }
    }

    match &options.target {
        Some(ImportTarget::Folder(name)) => result.nest_folders_under(name),
        Some(ImportTarget::Collection(name)) => result.nest_collections_under(name),
        None => {}
    }

    if let Some(org) = organization_id {
        for cipher in &mut result.ciphers {
            cipher.organization_id = Some(org.to_string());
        }
        for collection in &mut result.collections {
            collection.organization_id = Some(org.to_string());
        }
    }

    Ok(result)
}

/// Corruption heuristic: the first, middle and last items are all unnamed
/// logins without a password. Mixed batches can slip through either way.
fn looks_degenerate(ciphers: &[CipherRecord]) -> bool {
    let (Some(first), Some(last)) = (ciphers.first(), ciphers.last()) else {
        return false;
    };
    let middle = &ciphers[ciphers.len() / 2];
    first.is_degenerate() && middle.is_degenerate() && last.is_degenerate()
}

// -- Service ------------------------------------------------------------------

/// Parses, checks, encrypts and uploads one export file.
pub struct ImportService<E, A> {
    encryptor: E,
    api: A,
}

impl<E: VaultEncryptor, A: ImportApi> ImportService<E, A> {
    pub fn new(encryptor: E, api: A) -> Self {
        Self { encryptor, api }
    }

    pub fn api(&self) -> &A {
        &self.api
    }

    /// Run one import. The server call is made at most once and never retried.
    #[instrument(skip(self, importer, contents, options), fields(bytes = contents.len()))]
    pub fn import(
        &self,
        importer: &dyn Importer,
        contents: &str,
        organization_id: Option<&str>,
        options: &ImportOptions,
    ) -> Result<ImportSummary, ImportError> {
        let result = prepare(importer, contents, organization_id, options)?;

        let (summary, outcome) = match organization_id {
            Some(org) => {
                let request = ImportOrganizationCiphersRequest {
                    ciphers: self.encrypt_ciphers(&result),
                    collections: result
                        .collections
                        .iter()
                        .map(|c| self.encryptor.encrypt_collection(c))
                        .collect(),
                    collection_relationships: result
                        .collection_relationships()
                        .iter()
                        .map(|&rel| rel.into())
                        .collect(),
                };
                let summary = ImportSummary {
                    ciphers: request.ciphers.len(),
                    folders: 0,
                    collections: request.collections.len(),
                };
                (summary, self.api.post_import_organization_ciphers(org, &request))
            }
            None => {
                let request = ImportCiphersRequest {
                    ciphers: self.encrypt_ciphers(&result),
                    folders: result
                        .folders
                        .iter()
                        .map(|f| self.encryptor.encrypt_folder(f))
                        .collect(),
                    folder_relationships: result
                        .folder_relationships()
                        .iter()
                        .map(|&rel| rel.into())
                        .collect(),
                };
                let summary = ImportSummary {
                    ciphers: request.ciphers.len(),
                    folders: request.folders.len(),
                    collections: 0,
                };
                (summary, self.api.post_import_ciphers(&request))
            }
        };

        match outcome {
            Ok(()) => {
                info!(
                    ciphers = summary.ciphers,
                    folders = summary.folders,
                    collections = summary.collections,
                    "import accepted"
                );
                Ok(summary)
            }
            Err(ApiError::Rejected(response)) => Err(map_server_error(&response, &result)),
            Err(e) => Err(ImportError::Transport(e)),
        }
    }

    fn encrypt_ciphers(&self, result: &ImportResult) -> Vec<crate::api::CipherRequest> {
        result
            .ciphers
            .iter()
            .map(|c| self.encryptor.encrypt_cipher(c))
            .collect()
    }
}

// -- Server errors ------------------------------------------------------------

/// Resolve a rejected upload back to the records the server complained about.
///
/// Keys look like `Ciphers3` or `Ciphers[3].Name`: leading letters name the
/// list, the first digit run is the position. Ciphers get a 1-based position
/// prefix and their kind; folders and collections only their name.
pub fn map_server_error(response: &ErrorResponse, result: &ImportResult) -> ImportError {
    if !response.has_validation_errors() {
        return ImportError::Server(response.message.clone());
    }

    let mut paragraphs = Vec::new();
    for (key, messages) in &response.validation_errors {
        let Some((entity, index)) = parse_error_key(key) else {
            debug!(%key, "skipping validation error with unrecognised key");
            continue;
        };
        let detail = messages.join(", ");
        let line = match entity {
            "Ciphers" => result.ciphers.get(index).map(|c| {
                format!(
                    "[{}] [{}] \"{}\": {}",
                    index + 1,
                    c.cipher_type().display_name(),
                    c.name,
                    detail
                )
            }),
            "Folders" => result
                .folders
                .get(index)
                .map(|f| format!("[Folder] \"{}\": {}", f.name, detail)),
            "Collections" => result
                .collections
                .get(index)
                .map(|c| format!("[Collection] \"{}\": {}", c.name, detail)),
            _ => None,
        };
        match line {
            Some(line) => paragraphs.push(line),
            None => debug!(%key, "validation error does not match an uploaded record"),
        }
    }

    if paragraphs.is_empty() {
        return ImportError::Server(response.message.clone());
    }
    ImportError::Validation(paragraphs.join("\n\n"))
}

fn parse_error_key(key: &str) -> Option<(&str, usize)> {
    let letters = key
        .find(|c: char| !c.is_ascii_alphabetic())
        .unwrap_or(key.len());
    if letters == 0 {
        return None;
    }
    let rest = &key[letters..];
    let start = rest.find(|c: char| c.is_ascii_digit())?;
    let digits = &rest[start..];
    let end = digits
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(digits.len());
    let index = digits[..end].parse().ok()?;
    Some((&key[..letters], index))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CollectionRecord, FolderRecord};

    struct Fixed(fn() -> ImportResult);

    impl Importer for Fixed {
        fn parse(&self, _data: &str) -> ImportResult {
            (self.0)()
        }
    }

    fn named_login(name: &str, password: Option<&str>) -> CipherRecord {
        let mut cipher = CipherRecord::new(CipherType::Login);
        cipher.name = name.to_string();
        if let Some(login) = cipher.login_mut() {
            login.password = password.map(str::to_string);
        }
        cipher
    }

    fn ok(ciphers: Vec<CipherRecord>) -> ImportResult {
        let mut result = ImportResult::new();
        result.success = true;
        result.ciphers = ciphers;
        result
    }

    #[test]
    fn error_key_parsing() {
        assert_eq!(parse_error_key("Ciphers1"), Some(("Ciphers", 1)));
        assert_eq!(parse_error_key("Ciphers[12].Login.Uris"), Some(("Ciphers", 12)));
        assert_eq!(parse_error_key("Folders0"), Some(("Folders", 0)));
        assert_eq!(parse_error_key("Name"), None);
        assert_eq!(parse_error_key("[3]"), None);
    }

    #[test]
    fn parser_message_wins_over_format_error() {
        let importer = Fixed(|| ImportResult::failure("Unsupported version"));
        let err = prepare(&importer, "", None, &ImportOptions::default()).unwrap_err();
        assert_eq!(err.to_string(), "Unsupported version");
        assert!(!err.is_missing_password());

        let importer = Fixed(ImportResult::password_required);
        let err = prepare(&importer, "", None, &ImportOptions::default()).unwrap_err();
        assert!(err.is_missing_password());
        assert_eq!(err.to_string(), crate::error::FORMAT_ERROR);
    }

    #[test]
    fn failed_non_empty_parse_is_a_format_error() {
        let importer = Fixed(|| {
            let mut result = ok(vec![named_login("a", Some("b"))]);
            result.success = false;
            result
        });
        let err = prepare(&importer, "", None, &ImportOptions::default()).unwrap_err();
        assert_eq!(err.to_string(), crate::error::FORMAT_ERROR);
    }

    #[test]
    fn one_good_sample_passes_the_degenerate_check() {
        let importer = Fixed(|| {
            ok(vec![
                named_login("", None),
                named_login("Real", None),
                named_login("--", Some(" ")),
            ])
        });
        let result = prepare(&importer, "", None, &ImportOptions::default()).unwrap();
        assert_eq!(result.ciphers.len(), 3);
    }

    #[test]
    fn every_restricted_item_removed_is_nothing_to_import() {
        let importer = Fixed(|| ok(vec![CipherRecord::new(CipherType::Card)]));
        let options = ImportOptions {
            restricted_types: vec![CipherType::Card],
            ..Default::default()
        };
        let err = prepare(&importer, "", None, &options).unwrap_err();
        assert!(matches!(err, ImportError::NothingToImport));
    }

    #[test]
    fn mismatched_target_kind() {
        let importer = Fixed(|| ok(vec![named_login("a", Some("b"))]));
        let folder = ImportOptions {
            target: Some(ImportTarget::Folder("Work".into())),
            ..Default::default()
        };
        let err = prepare(&importer, "", Some("org"), &folder).unwrap_err();
        assert!(matches!(err, ImportError::InvalidTarget(_)));

        let collection = ImportOptions {
            target: Some(ImportTarget::Collection("Work".into())),
            ..Default::default()
        };
        let err = prepare(&importer, "", None, &collection).unwrap_err();
        assert!(matches!(err, ImportError::InvalidTarget(_)));
    }

    #[test]
    fn organization_stamp_covers_collections() {
        let importer = Fixed(|| {
            let mut result = ok(vec![named_login("a", Some("b"))]);
            result.folders.push(FolderRecord { name: "Shared".into() });
            result.link_folder(0, 0);
            result
        });
        let options = ImportOptions {
            can_manage_import: true,
            ..Default::default()
        };
        let result = prepare(&importer, "", Some("org-1"), &options).unwrap();
        assert!(result.folders.is_empty());
        assert_eq!(result.collections[0].organization_id.as_deref(), Some("org-1"));
        assert_eq!(result.ciphers[0].organization_id.as_deref(), Some("org-1"));
        assert_eq!(result.collection_relationships(), &[(0, 0)]);
    }

    #[test]
    fn server_error_without_records_keeps_message() {
        let result = ok(vec![named_login("a", Some("b"))]);
        let err = map_server_error(&ErrorResponse::new("Upgrade required"), &result);
        assert!(matches!(&err, ImportError::Server(m) if m == "Upgrade required"));

        let stray = ErrorResponse::new("Bad").with_validation_error("Ciphers9", &["nope"]);
        assert!(matches!(map_server_error(&stray, &result), ImportError::Server(_)));
    }

    #[test]
    fn folders_and_collections_have_no_position() {
        let mut result = ok(vec![named_login("a", Some("b"))]);
        result.folders.push(FolderRecord { name: "Work".into() });
        result.collections.push(CollectionRecord::new("Team"));
        let response = ErrorResponse::new("invalid")
            .with_validation_error("Folders0", &["Name is too long."])
            .with_validation_error("Collections0", &["Bad.", "Worse."]);
        let err = map_server_error(&response, &result);
        assert_eq!(
            err.to_string(),
            "[Folder] \"Work\": Name is too long.\n\n[Collection] \"Team\": Bad., Worse."
        );
    }
}
