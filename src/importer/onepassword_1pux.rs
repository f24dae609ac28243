//! 1Password Unencrypted Export (the `export.data` JSON inside a `.1pux` archive).

use chrono::{DateTime, SecondsFormat};
use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::debug;

use crate::models::{CipherRecord, CipherType, FieldType, ImportResult, PasswordHistory};
use crate::normalize;

use super::base;
use super::Importer;

// -- Export document ------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct ExportData {
    accounts: Vec<Account>,
}

#[derive(Debug, Deserialize)]
struct Account {
    #[serde(default)]
    vaults: Vec<Vault>,
}

#[derive(Debug, Deserialize)]
struct Vault {
    #[serde(default)]
    items: Vec<Item>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct Item {
    fav_index: i64,
    created_at: Option<i64>,
    updated_at: Option<i64>,
    state: Option<String>,
    category_uuid: String,
    details: Details,
    overview: Option<Overview>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct Details {
    login_fields: Vec<LoginField>,
    notes_plain: Option<String>,
    sections: Vec<Section>,
    password_history: Vec<HistoryEntry>,
    password: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct LoginField {
    value: String,
    name: String,
    field_type: String,
    designation: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Section {
    title: Option<String>,
    fields: Vec<SectionField>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct SectionField {
    title: Option<String>,
    id: Option<String>,
    value: Map<String, Value>,
    guarded: bool,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct HistoryEntry {
    value: Option<String>,
    time: Option<i64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Overview {
    title: Option<String>,
    url: Option<String>,
    urls: Vec<UrlEntry>,
    tags: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct UrlEntry {
    url: Option<String>,
}

// -- Categories -----------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Category {
    Login,
    CreditCard,
    SecureNote,
    Identity,
    Password,
    Document,
    SoftwareLicense,
    BankAccount,
    Database,
    DriversLicense,
    OutdoorLicense,
    Membership,
    Passport,
    RewardsProgram,
    SocialSecurityNumber,
    WirelessRouter,
    Server,
    EmailAccount,
    ApiCredential,
    MedicalRecord,
    SshKey,
    Unknown,
}

impl Category {
    fn from_uuid(uuid: &str) -> Self {
        match uuid {
            "001" => Category::Login,
            "002" => Category::CreditCard,
            "003" => Category::SecureNote,
            "004" => Category::Identity,
            "005" => Category::Password,
            "006" => Category::Document,
            "100" => Category::SoftwareLicense,
            "101" => Category::BankAccount,
            "102" => Category::Database,
            "103" => Category::DriversLicense,
            "104" => Category::OutdoorLicense,
            "105" => Category::Membership,
            "106" => Category::Passport,
            "107" => Category::RewardsProgram,
            "108" => Category::SocialSecurityNumber,
            "109" => Category::WirelessRouter,
            "110" => Category::Server,
            "111" => Category::EmailAccount,
            "112" => Category::ApiCredential,
            "113" => Category::MedicalRecord,
            "114" => Category::SshKey,
            _ => Category::Unknown,
        }
    }

    fn cipher_type(self) -> CipherType {
        match self {
            Category::CreditCard | Category::BankAccount => CipherType::Card,
            Category::SecureNote
            | Category::SoftwareLicense
            | Category::EmailAccount
            | Category::MedicalRecord
            | Category::Document => CipherType::SecureNote,
            Category::Identity
            | Category::DriversLicense
            | Category::OutdoorLicense
            | Category::Membership
            | Category::Passport
            | Category::RewardsProgram
            | Category::SocialSecurityNumber => CipherType::Identity,
            Category::SshKey => CipherType::SshKey,
            _ => CipherType::Login,
        }
    }
}

// -- Importer -------------------------------------------------------------------

pub struct OnePassword1PuxImporter {
    organization_id: Option<String>,
}

impl OnePassword1PuxImporter {
    pub fn new(organization_id: Option<String>) -> Self {
        Self { organization_id }
    }
}

impl Importer for OnePassword1PuxImporter {
    fn parse(&self, data: &str) -> ImportResult {
        let export: ExportData = match serde_json::from_str(data) {
            Ok(export) => export,
            Err(e) => {
                debug!(error = %e, "not a 1pux export");
                return ImportResult::new();
            }
        };
        let mut result = ImportResult::new();

        let items = export
            .accounts
            .iter()
            .flat_map(|a| &a.vaults)
            .flat_map(|v| &v.items)
            .filter(|item| item.state.as_deref() != Some("archived"));
        for item in items {
            let category = Category::from_uuid(&item.category_uuid);
            let mut cipher = CipherRecord::new(category.cipher_type());
            cipher.favorite = item.fav_index == 1;
            cipher.creation_date = item.created_at.and_then(seconds_to_rfc3339);
            cipher.revision_date = item.updated_at.and_then(seconds_to_rfc3339);

            if let Some(overview) = &item.overview {
                process_overview(&mut result, overview, &mut cipher);
            }
            process_login_fields(&item.details, &mut cipher);
            if category == Category::Password {
                if let Some(login) = cipher.login_mut() {
                    login.password = item.details.password.clone();
                }
            }
            process_password_history(&item.details.password_history, &mut cipher);
            for section in &item.details.sections {
                for field in &section.fields {
                    process_section_field(category, field, section.title.as_deref(), &mut cipher);
                }
            }
            if let Some(notes) = item.details.notes_plain.as_deref().and_then(base::non_blank) {
                cipher.notes = Some(base::split_newlines(&notes).join("\n"));
            }

            base::push_cipher(&mut result, cipher);
        }

        debug!(items = result.ciphers.len(), "parsed 1pux export");
        base::finish(result, self.organization_id.as_deref())
    }
}

fn process_overview(result: &mut ImportResult, overview: &Overview, cipher: &mut CipherRecord) {
    cipher.name = overview.title.clone().unwrap_or_default();

    let mut urls: Vec<&str> = overview
        .urls
        .iter()
        .filter_map(|u| u.url.as_deref())
        .filter(|u| !u.trim().is_empty())
        .collect();
    if urls.is_empty() {
        urls.extend(overview.url.as_deref().filter(|u| !u.trim().is_empty()));
    }
    if let Some(login) = cipher.login_mut() {
        login.uris = base::make_uris(urls);
    }

    if let Some(tag) = overview.tags.first() {
        base::process_folder(result, &capitalize(tag));
    }
}

fn capitalize(value: &str) -> String {
    value
        .trim()
        .split(' ')
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

fn process_login_fields(details: &Details, cipher: &mut CipherRecord) {
    for field in &details.login_fields {
        if let Some(login) = cipher.login_mut() {
            match field.designation.as_deref() {
                Some("username") if !field.value.is_empty() => {
                    login.username = Some(field.value.clone());
                    continue;
                }
                Some("password") if !field.value.is_empty() => {
                    login.password = Some(field.value.clone());
                    continue;
                }
                _ => {}
            }
        }
        let (value, field_type) = match field.field_type.as_str() {
            "P" => (field.value.clone(), FieldType::Hidden),
            "C" => {
                let checked = if field.value.is_empty() { "false" } else { "true" };
                (checked.to_string(), FieldType::Boolean)
            }
            _ => (field.value.clone(), FieldType::Text),
        };
        base::process_kvp(cipher, &field.name, &value, field_type);
    }
}

fn process_password_history(entries: &[HistoryEntry], cipher: &mut CipherRecord) {
    let mut entries: Vec<(&str, i64)> = entries
        .iter()
        .filter_map(|h| {
            let value = h.value.as_deref().filter(|v| !v.trim().is_empty())?;
            let time = h.time?;
            // Older exports use seconds, newer ones milliseconds.
            let millis = if time.to_string().len() >= 13 { time } else { time * 1000 };
            Some((value, millis))
        })
        .collect();
    entries.sort_by(|a, b| b.1.cmp(&a.1));
    for (password, millis) in entries {
        let Some(date) = DateTime::from_timestamp_millis(millis) else {
            continue;
        };
        cipher.add_password_history(PasswordHistory {
            password: password.to_string(),
            last_used_date: date.to_rfc3339_opts(SecondsFormat::Millis, true),
        });
    }
}

fn process_section_field(
    category: Category,
    field: &SectionField,
    section_title: Option<&str>,
    cipher: &mut CipherRecord,
) {
    let Some((value_key, raw)) = field.value.iter().next() else {
        return;
    };
    if raw.is_null() || raw.as_str() == Some("") {
        return;
    }
    let id = field.id.as_deref().unwrap_or_default();
    let title = field.title.as_deref().filter(|t| !t.trim().is_empty());
    let name = title.or(section_title.filter(|t| !t.trim().is_empty())).unwrap_or_default();
    let value = extract_value(value_key, raw);

    let filled = match cipher.cipher_type() {
        CipherType::Login => fill_login(category, id, title, value_key, &value, cipher),
        CipherType::Card => fill_card(category, id, &value, cipher),
        CipherType::Identity => fill_identity(category, id, value_key, raw, &value, cipher),
        CipherType::SshKey => fill_ssh_key(value_key, raw, cipher),
        CipherType::SecureNote => false,
    };
    if filled {
        return;
    }

    if value_key == "email" {
        let address = raw.get("email_address").and_then(Value::as_str).unwrap_or_default();
        let provider = raw.get("provider").and_then(Value::as_str).unwrap_or_default();
        base::process_kvp(cipher, name, address, FieldType::Text);
        base::process_kvp(cipher, "provider", provider, FieldType::Text);
        return;
    }
    if title == Some("password") && cipher.password_history.iter().any(|h| h.password == value) {
        return;
    }
    if field.guarded {
        cipher.reprompt = true;
    }
    let field_type = if value_key == "concealed" {
        FieldType::Hidden
    } else {
        FieldType::Text
    };
    base::process_kvp(cipher, name, &value, field_type);
}

fn extract_value(value_key: &str, raw: &Value) -> String {
    match (value_key, raw) {
        ("date", Value::Number(n)) => n
            .as_i64()
            .and_then(|secs| DateTime::from_timestamp(secs, 0))
            .map(|d| d.format("%a, %d %b %Y %H:%M:%S GMT").to_string())
            .unwrap_or_else(|| n.to_string()),
        (_, Value::String(s)) => s.clone(),
        (_, other) => other.to_string(),
    }
}

fn fill_login(
    category: Category,
    id: &str,
    title: Option<&str>,
    value_key: &str,
    value: &str,
    cipher: &mut CipherRecord,
) -> bool {
    let Some(login) = cipher.login_mut() else {
        return false;
    };
    let value = Some(value.to_string());
    if login.username.is_none() && title == Some("username") {
        login.username = value;
        return true;
    }
    if login.password.is_none() && title == Some("password") {
        login.password = value;
        return true;
    }
    if login.totp.is_none() && (id.starts_with("TOTP_") || value_key == "totp") {
        login.totp = value;
        return true;
    }
    match category {
        Category::Server if login.uris.is_empty() && id == "url" => {
            login.uris = base::make_uris(value);
            true
        }
        Category::ApiCredential if login.password.is_none() && title == Some("credential") => {
            login.password = value;
            true
        }
        Category::ApiCredential if login.uris.is_empty() && title == Some("hostname") => {
            login.uris = base::make_uris(value);
            true
        }
        _ => false,
    }
}

fn fill_card(category: Category, id: &str, value: &str, cipher: &mut CipherRecord) -> bool {
    let Some(card) = cipher.card_mut() else {
        return false;
    };
    match id {
        "ccnum" if card.number.is_none() => {
            card.brand = normalize::card_brand(value).map(str::to_string);
            card.number = Some(value.to_string());
        }
        "cvv" if card.code.is_none() => card.code = Some(value.to_string()),
        "cardholder" if card.cardholder_name.is_none() => {
            card.cardholder_name = Some(value.to_string())
        }
        "owner" if category == Category::BankAccount && card.cardholder_name.is_none() => {
            card.cardholder_name = Some(value.to_string())
        }
        // monthYear arrives as YYYYMM.
        "expiry" if card.exp_year.is_none() && value.len() >= 6 => {
            let month = value[4..6].trim_start_matches('0');
            card.exp_year = Some(value[..4].to_string());
            card.exp_month = (!month.is_empty()).then(|| month.to_string());
        }
        // Brand is derived from the number.
        "type" => {}
        _ => return false,
    }
    true
}

fn fill_identity(
    category: Category,
    id: &str,
    value_key: &str,
    raw: &Value,
    value: &str,
    cipher: &mut CipherRecord,
) -> bool {
    let full_name_id = match category {
        Category::DriversLicense | Category::Passport => Some("fullname"),
        Category::OutdoorLicense | Category::SocialSecurityNumber => Some("name"),
        Category::Membership | Category::RewardsProgram => Some("member_name"),
        _ => None,
    };
    let first_name_empty = cipher.identity().is_some_and(|i| i.first_name.is_none());
    if first_name_empty && full_name_id == Some(id) {
        base::process_full_name(cipher, value);
        return true;
    }

    let Some(identity) = cipher.identity_mut() else {
        return false;
    };
    let text = |v: &str| base::non_blank(v);

    if value_key == "address" {
        let part = |key: &str| raw.get(key).and_then(Value::as_str).and_then(text);
        identity.address1 = part("street");
        identity.city = part("city");
        identity.country = part("country").map(|c| c.to_uppercase());
        identity.postal_code = part("zip");
        identity.state = part("state");
        return true;
    }
    if value_key == "email" && identity.email.is_none() {
        identity.email = raw.get("email_address").and_then(Value::as_str).and_then(text);
        return true;
    }

    let slot = match (category, id) {
        (_, "firstname") => &mut identity.first_name,
        (_, "lastname") => &mut identity.last_name,
        (_, "initial") => &mut identity.middle_name,
        (_, "defphone") => &mut identity.phone,
        (_, "company") => &mut identity.company,
        (_, "email") => &mut identity.email,
        (_, "username") => &mut identity.username,
        (Category::DriversLicense, "address") => &mut identity.address1,
        (Category::DriversLicense | Category::OutdoorLicense, "country") => &mut identity.country,
        (Category::DriversLicense | Category::OutdoorLicense, "state") => &mut identity.state,
        (Category::DriversLicense, "number") => &mut identity.license_number,
        (Category::Membership, "org_name") => &mut identity.company,
        (Category::Membership, "phone") => &mut identity.phone,
        (Category::Passport, "issuing_country") => &mut identity.country,
        (Category::Passport, "number") => &mut identity.passport_number,
        (Category::RewardsProgram, "company_name") => &mut identity.company,
        (Category::SocialSecurityNumber, "number") => &mut identity.ssn,
        _ => return false,
    };
    if slot.is_some() {
        return false;
    }
    *slot = Some(value.to_string());
    true
}

fn fill_ssh_key(value_key: &str, raw: &Value, cipher: &mut CipherRecord) -> bool {
    if value_key != "sshKey" {
        return false;
    }
    let Some(key) = cipher.ssh_key_mut() else {
        return false;
    };
    let text = |v: Option<&Value>| v.and_then(Value::as_str).map(str::to_string);
    key.private_key = text(raw.get("privateKey"));
    let metadata = raw.get("metadata");
    key.public_key = text(metadata.and_then(|m| m.get("publicKey")));
    key.key_fingerprint = text(metadata.and_then(|m| m.get("fingerprint")));
    true
}

fn seconds_to_rfc3339(secs: i64) -> Option<String> {
    DateTime::from_timestamp(secs, 0).map(|d| d.to_rfc3339_opts(SecondsFormat::Millis, true))
}
