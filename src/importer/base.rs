//! Helpers every importer builds on: CSV reading, URI cleanup, folder
//! bookkeeping and the final tidy-up of each item.

use csv::ReaderBuilder;
use tracing::debug;

use crate::models::{
    CipherRecord, CipherType, Field, FieldType, ImportResult, LoginUri, DEFAULT_NAME,
};
use crate::normalize;

/// Longest URI kept on a login.
const MAX_URI_LEN: usize = 1000;
/// Values longer than this go to notes instead of a custom field.
const MAX_FIELD_VALUE_LEN: usize = 200;

// -- CSV ----------------------------------------------------------------------

/// One data row, keyed by the trimmed header of each column.
#[derive(Debug, Clone)]
pub struct CsvRow {
    cells: Vec<(String, String)>,
}

impl CsvRow {
    /// Raw cell value for `header` (case-insensitive).
    pub fn get(&self, header: &str) -> Option<&str> {
        self.cells
            .iter()
            .find(|(h, _)| h.eq_ignore_ascii_case(header))
            .map(|(_, v)| v.as_str())
    }

    /// Cell value, or `None` when missing or blank.
    pub fn value(&self, header: &str) -> Option<String> {
        self.get(header).and_then(non_blank)
    }

    /// Columns in file order.
    pub fn cells(&self) -> impl Iterator<Item = (&str, &str)> {
        self.cells.iter().map(|(h, v)| (h.as_str(), v.as_str()))
    }
}

/// A parsed CSV file: trimmed header plus data rows.
#[derive(Debug, Clone)]
pub struct CsvTable {
    headers: Vec<String>,
    pub rows: Vec<CsvRow>,
}

impl CsvTable {
    /// Whether the header names `column` (case-insensitive).
    pub fn has_column(&self, column: &str) -> bool {
        self.headers.iter().any(|h| h.eq_ignore_ascii_case(column))
    }

    pub fn has_columns(&self, columns: &[&str]) -> bool {
        columns.iter().all(|c| self.has_column(c))
    }
}

/// Parse CSV with a header row. Blank rows are skipped and ragged rows are
/// tolerated. `None` when the text is not CSV at all.
pub fn parse_csv(data: &str) -> Option<CsvTable> {
    let data = data.strip_prefix('\u{feff}').unwrap_or(data);
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(data.as_bytes());

    let headers: Vec<String> = match reader.headers() {
        Ok(h) => h.iter().map(|h| h.trim().to_string()).collect(),
        Err(e) => {
            debug!(error = %e, "could not read csv header");
            return None;
        }
    };

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = match record {
            Ok(r) => r,
            Err(e) => {
                debug!(error = %e, "could not read csv record");
                return None;
            }
        };
        let cells: Vec<(String, String)> = record
            .iter()
            .enumerate()
            .filter_map(|(i, value)| headers.get(i).map(|h| (h.clone(), value.to_string())))
            .collect();
        if cells.iter().all(|(_, v)| v.trim().is_empty()) {
            continue;
        }
        rows.push(CsvRow { cells });
    }
    Some(CsvTable { headers, rows })
}

/// [`parse_csv`] for a format whose header always names `required`.
/// `None` for any other CSV, so a wrong format fails at parse time.
pub fn parse_csv_with_columns(data: &str, required: &[&str]) -> Option<Vec<CsvRow>> {
    let table = parse_csv(data)?;
    if !table.has_columns(required) {
        debug!(?required, "csv header lacks expected columns");
        return None;
    }
    Some(table.rows)
}

// -- Values -------------------------------------------------------------------

pub fn is_blank(value: Option<&str>) -> bool {
    value.map_or(true, |v| v.trim().is_empty())
}

/// `Some(value)` unless it is blank.
pub fn non_blank(value: &str) -> Option<String> {
    if value.trim().is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

pub fn split_newlines(value: &str) -> Vec<&str> {
    value.split("\r\n").flat_map(|l| l.split(['\n', '\r'])).collect()
}

// -- Logins -------------------------------------------------------------------

pub fn init_login_cipher() -> CipherRecord {
    CipherRecord::new(CipherType::Login)
}

/// Trim, add a scheme to bare domains, cap the length.
pub fn fix_uri(uri: &str) -> Option<String> {
    let uri = uri.trim();
    if uri.is_empty() {
        return None;
    }
    let mut fixed = if !uri.contains("://") && uri.contains('.') {
        format!("http://{}", uri)
    } else {
        uri.to_string()
    };
    if fixed.chars().count() > MAX_URI_LEN {
        fixed = fixed.chars().take(MAX_URI_LEN).collect();
    }
    Some(fixed)
}

pub fn make_uris<I, S>(values: I) -> Vec<LoginUri>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    values
        .into_iter()
        .filter_map(|v| fix_uri(v.as_ref()))
        .map(|uri| LoginUri {
            uri: Some(uri),
            match_type: None,
        })
        .collect()
}

/// Name for an item that only has a URL.
pub fn name_from_url(uri: &str) -> Option<String> {
    normalize::name_from_url(uri)
}

// -- Custom fields ------------------------------------------------------------

/// Keep a value that has no typed slot. Long or multi-line values are
/// appended to the notes instead of becoming a field.
pub fn process_kvp(cipher: &mut CipherRecord, key: &str, value: &str, field_type: FieldType) {
    if value.trim().is_empty() {
        return;
    }
    if value.chars().count() > MAX_FIELD_VALUE_LEN || value.contains('\n') || value.contains('\r') {
        let notes = cipher.notes.get_or_insert_with(String::new);
        notes.push_str(&format!("{}: {}\n", key, split_newlines(value).join("\n")));
        return;
    }
    let key = if key.trim().is_empty() { "" } else { key };
    cipher.fields.push(Field::new(key, value, field_type));
}

// -- Item kinds ---------------------------------------------------------------

/// A login with nothing to log in with is kept as a note.
pub fn convert_to_note_if_needed(cipher: &mut CipherRecord) {
    let Some(login) = cipher.login() else {
        return;
    };
    if is_blank(login.username.as_deref())
        && is_blank(login.password.as_deref())
        && is_blank(login.totp.as_deref())
        && !login.has_uris()
    {
        cipher.set_type(CipherType::SecureNote);
    }
}

pub fn cleanup_cipher(cipher: &mut CipherRecord) {
    if cipher.name.trim().is_empty() {
        cipher.name = DEFAULT_NAME.to_string();
    }
    cipher.notes = cipher
        .notes
        .take()
        .map(|n| n.trim().to_string())
        .filter(|n| !n.is_empty());
}

/// Fill expiry month/year from a combined value. False when nothing was found
/// or the item is not a card.
pub fn set_card_expiration(cipher: &mut CipherRecord, expiration: &str) -> bool {
    let Some(card) = cipher.card_mut() else {
        return false;
    };
    let (year, month) = normalize::parse_year_month_expiry(expiration);
    if year.is_none() && month.is_none() {
        return false;
    }
    card.exp_year = year;
    card.exp_month = month;
    true
}

/// Split "First Middle Last" over an identity.
pub fn process_full_name(cipher: &mut CipherRecord, full_name: &str) {
    let Some(identity) = cipher.identity_mut() else {
        return;
    };
    let parts: Vec<&str> = full_name.split_whitespace().collect();
    match parts.as_slice() {
        [] => {}
        [first] => identity.first_name = Some(first.to_string()),
        [first, last] => {
            identity.first_name = Some(first.to_string());
            identity.last_name = Some(last.to_string());
        }
        [first, middle @ .., last] => {
            identity.first_name = Some(first.to_string());
            identity.middle_name = Some(middle.join(" "));
            identity.last_name = Some(last.to_string());
        }
    }
}

// -- Folders ------------------------------------------------------------------

/// Put the next cipher (the one about to be pushed) into `folder_name`,
/// creating the folder on first sight.
pub fn process_folder(result: &mut ImportResult, folder_name: &str) {
    let name = folder_name.trim().replace('\\', "/");
    if name.is_empty() || name == "(none)" {
        return;
    }
    let index = match result.folder_index(&name) {
        Some(i) => i,
        None => result.add_folder(name),
    };
    let cipher_index = result.ciphers.len();
    result.link_folder(cipher_index, index);
}

/// Same as [`process_folder`] for organization collections.
pub fn process_collection(result: &mut ImportResult, collection_name: &str) {
    let name = collection_name.trim().replace('\\', "/");
    if name.is_empty() {
        return;
    }
    let index = match result.collection_index(&name) {
        Some(i) => i,
        None => result.add_collection(name),
    };
    let cipher_index = result.ciphers.len();
    result.link_collection(cipher_index, index);
}

/// Tidy and append one item.
pub fn push_cipher(result: &mut ImportResult, mut cipher: CipherRecord) {
    convert_to_note_if_needed(&mut cipher);
    cleanup_cipher(&mut cipher);
    result.ciphers.push(cipher);
}

/// Mark a parse as done. Organization imports get collections in place of folders.
pub fn finish(mut result: ImportResult, organization_id: Option<&str>) -> ImportResult {
    result.prune_relationships();
    if organization_id.is_some() {
        result.move_folders_to_collections();
    }
    result.success = true;
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn csv_skips_blank_rows_and_trims_headers() {
        let table = parse_csv("\u{feff} name , url\nGitHub,github.com\n,\n\nLast,x.org,extra\n").unwrap();
        assert!(table.has_columns(&["NAME", "url"]));
        let rows = table.rows;
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].get("NAME"), Some("GitHub"));
        assert_eq!(rows[1].get("url"), Some("x.org"));
        assert_eq!(rows[1].cells().count(), 2);
    }

    #[test]
    fn required_columns_gate_the_format() {
        let data = "name,url,username,password\nGitHub,github.com,octo,pw\n";
        assert_eq!(parse_csv_with_columns(data, &["url", "Password"]).unwrap().len(), 1);
        assert!(parse_csv_with_columns(data, &["url", "login_password"]).is_none());
        assert!(parse_csv_with_columns("url,password\n", &["url"]).unwrap().is_empty());
    }

    #[test]
    fn fix_uri_adds_scheme_and_caps_length() {
        assert_eq!(fix_uri(" example.com "), Some("http://example.com".to_string()));
        assert_eq!(fix_uri("https://a.b"), Some("https://a.b".to_string()));
        assert_eq!(fix_uri("androidapp://x"), Some("androidapp://x".to_string()));
        assert_eq!(fix_uri("intranet"), Some("intranet".to_string()));
        assert_eq!(fix_uri("   "), None);
        let long = format!("https://x.com/{}", "a".repeat(2000));
        assert_eq!(fix_uri(&long).unwrap().len(), MAX_URI_LEN);
    }

    #[test]
    fn kvp_goes_to_notes_when_long_or_multiline() {
        let mut cipher = init_login_cipher();
        process_kvp(&mut cipher, "pin", "1234", FieldType::Hidden);
        process_kvp(&mut cipher, "empty", "  ", FieldType::Text);
        process_kvp(&mut cipher, "address", "1 Main St\nSpringfield", FieldType::Text);
        process_kvp(&mut cipher, "blob", &"x".repeat(201), FieldType::Text);

        assert_eq!(cipher.fields, vec![Field::hidden("pin", "1234")]);
        let notes = cipher.notes.unwrap();
        assert!(notes.starts_with("address: 1 Main St\nSpringfield\n"));
        assert!(notes.contains("blob: xxx"));
    }

    #[test]
    fn empty_login_becomes_note_but_totp_only_stays() {
        let mut cipher = init_login_cipher();
        cipher.notes = Some("  remember me  ".to_string());
        convert_to_note_if_needed(&mut cipher);
        cleanup_cipher(&mut cipher);
        assert_eq!(cipher.cipher_type(), CipherType::SecureNote);
        assert_eq!(cipher.name, DEFAULT_NAME);
        assert_eq!(cipher.notes.as_deref(), Some("remember me"));

        let mut totp = init_login_cipher();
        totp.login_mut().unwrap().totp = Some("JBSWY3DPEHPK3PXP".to_string());
        convert_to_note_if_needed(&mut totp);
        assert_eq!(totp.cipher_type(), CipherType::Login);
    }

    #[test]
    fn folders_are_reused_and_indexed_before_push() {
        let mut result = ImportResult::new();
        process_folder(&mut result, "Work\\Servers");
        push_cipher(&mut result, init_login_cipher());
        process_folder(&mut result, "Work/Servers");
        push_cipher(&mut result, init_login_cipher());
        process_folder(&mut result, "");
        push_cipher(&mut result, init_login_cipher());

        assert_eq!(result.folders.len(), 1);
        assert_eq!(result.folders[0].name, "Work/Servers");
        assert_eq!(result.folder_relationships(), &[(0, 0), (1, 0)]);
    }

    #[test]
    fn full_name_split() {
        let mut cipher = CipherRecord::new(CipherType::Identity);
        process_full_name(&mut cipher, "Mary Ann Jo Smith");
        let identity = cipher.identity().unwrap();
        assert_eq!(identity.first_name.as_deref(), Some("Mary"));
        assert_eq!(identity.middle_name.as_deref(), Some("Ann Jo"));
        assert_eq!(identity.last_name.as_deref(), Some("Smith"));
    }

    #[test]
    fn card_expiration_from_combined_value() {
        let mut cipher = CipherRecord::new(CipherType::Card);
        assert!(set_card_expiration(&mut cipher, "05/2031"));
        let card = cipher.card().unwrap();
        assert_eq!(card.exp_month.as_deref(), Some("5"));
        assert_eq!(card.exp_year.as_deref(), Some("2031"));
        assert!(!set_card_expiration(&mut cipher, "n/a"));
    }
}
