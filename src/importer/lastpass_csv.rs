use tracing::debug;

use crate::models::{CipherRecord, CipherType, FieldType, ImportResult};
use crate::normalize;

use super::base::{self, CsvRow};
use super::Importer;

/// URL LastPass puts on secure notes.
const SECURE_NOTE_URL: &str = "http://sn";

/// LastPass CSV (`url,username,password,totp,extra,name,grouping,fav`).
/// Passbolt exports the same columns.
pub struct LastPassCsvImporter {
    organization_id: Option<String>,
}

impl LastPassCsvImporter {
    pub fn new(organization_id: Option<String>) -> Self {
        Self { organization_id }
    }
}

impl Importer for LastPassCsvImporter {
    fn parse(&self, data: &str) -> ImportResult {
        let Some(rows) = base::parse_csv_with_columns(data, &["url", "name"]) else {
            return ImportResult::new();
        };
        let mut result = ImportResult::new();

        for row in &rows {
            if let Some(grouping) = row.value("grouping") {
                base::process_folder(&mut result, &grouping);
            }
            let mut cipher = if row.get("url").map(str::trim) == Some(SECURE_NOTE_URL) {
                parse_secure_note(row)
            } else {
                parse_login(row)
            };
            cipher.name = row.value("name").unwrap_or_default();
            cipher.favorite =
                self.organization_id.is_none() && row.get("fav").map(str::trim) == Some("1");
            base::push_cipher(&mut result, cipher);
        }

        debug!(items = result.ciphers.len(), "parsed lastpass csv");
        base::finish(result, self.organization_id.as_deref())
    }
}

fn parse_login(row: &CsvRow) -> CipherRecord {
    let mut cipher = base::init_login_cipher();
    cipher.notes = row.value("extra");
    if let Some(login) = cipher.login_mut() {
        login.username = row.value("username");
        login.password = row.value("password");
        login.totp = row.value("totp");
        login.uris = base::make_uris(row.value("url"));
    }
    cipher
}

/// Secure notes may carry a typed payload: a `NoteType:` line followed by
/// `Key:Value` lines, with `Notes:` running to the end of the text.
fn parse_secure_note(row: &CsvRow) -> CipherRecord {
    let extra = row.value("extra").unwrap_or_default();
    let Some(props) = parse_note_props(&extra) else {
        let mut cipher = CipherRecord::new(CipherType::SecureNote);
        cipher.notes = base::non_blank(&extra);
        return cipher;
    };

    let note_type = props
        .iter()
        .find(|(k, _)| k == "NoteType")
        .map(|(_, v)| v.as_str())
        .unwrap_or_default();
    let kind = match note_type {
        "Credit Card" => CipherType::Card,
        "Address" => CipherType::Identity,
        _ => CipherType::SecureNote,
    };
    let mut cipher = CipherRecord::new(kind);

    for (key, value) in &props {
        if key == "NoteType" || key == "Language" || value.trim().is_empty() {
            continue;
        }
        if key == "Notes" {
            cipher.notes = Some(value.clone());
            continue;
        }
        if !fill_typed_slot(&mut cipher, key, value) {
            let field_type = if key.contains("Password") || key == "Security Code" || key == "PIN" {
                FieldType::Hidden
            } else {
                FieldType::Text
            };
            base::process_kvp(&mut cipher, key, value, field_type);
        }
    }
    cipher
}

fn parse_note_props(extra: &str) -> Option<Vec<(String, String)>> {
    if !extra.starts_with("NoteType:") {
        return None;
    }
    let mut props: Vec<(String, String)> = Vec::new();
    let lines = base::split_newlines(extra);
    let mut iter = lines.iter();
    while let Some(line) = iter.next() {
        let Some((key, value)) = line.split_once(':') else {
            continue;
        };
        if key == "Notes" {
            let rest: Vec<&str> = std::iter::once(value).chain(iter.by_ref().copied()).collect();
            props.push((key.to_string(), rest.join("\n")));
            break;
        }
        props.push((key.to_string(), value.to_string()));
    }
    Some(props)
}

fn fill_typed_slot(cipher: &mut CipherRecord, key: &str, value: &str) -> bool {
    let value = Some(value.to_string());
    if let Some(card) = cipher.card_mut() {
        match key {
            "Name on Card" => card.cardholder_name = value,
            "Number" => {
                card.brand = value
                    .as_deref()
                    .and_then(normalize::card_brand)
                    .map(str::to_string)
                    .or(card.brand.take());
                card.number = value;
            }
            "Security Code" => card.code = value,
            "Type" => {
                if card.brand.is_none() {
                    card.brand = value;
                }
            }
            "Expiration Date" => {
                // Anything unreadable is kept verbatim as a custom field.
                let Some((month, year)) = value.as_deref().and_then(|v| v.split_once(',')) else {
                    return false;
                };
                let (Some(month), Some(year)) =
                    (month_number(month), normalize::normalize_expiry_year(year.trim()))
                else {
                    return false;
                };
                card.exp_month = Some(month.to_string());
                card.exp_year = Some(year);
            }
            _ => return false,
        }
        return true;
    }
    if let Some(identity) = cipher.identity_mut() {
        match key {
            "Title" => identity.title = value,
            "First Name" => identity.first_name = value,
            "Middle Name" => identity.middle_name = value,
            "Last Name" => identity.last_name = value,
            "Username" => identity.username = value,
            "Company" => identity.company = value,
            "Address 1" => identity.address1 = value,
            "Address 2" => identity.address2 = value,
            "Address 3" => identity.address3 = value,
            "City / Town" => identity.city = value,
            "State" => identity.state = value,
            "Zip / Postal Code" => identity.postal_code = value,
            "Country" => identity.country = value,
            "Email Address" => identity.email = value,
            "Phone" => identity.phone = value,
            _ => return false,
        }
        return true;
    }
    false
}

fn month_number(name: &str) -> Option<u32> {
    const MONTHS: [&str; 12] = [
        "january", "february", "march", "april", "may", "june", "july", "august", "september",
        "october", "november", "december",
    ];
    let name = name.trim().to_ascii_lowercase();
    if let Ok(n) = name.parse::<u32>() {
        return (1..=12).contains(&n).then_some(n);
    }
    MONTHS
        .iter()
        .position(|m| *m == name)
        .map(|i| i as u32 + 1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Field;

    const EXPORT: &str = "url,username,password,totp,extra,name,grouping,fav
https://github.com,octo,pw,JBSWY3DPEHPK3PXP,,GitHub,Dev\\Code,1
http://sn,,,,\"NoteType:Credit Card
Language:en-US
Name on Card:Jane Doe
Type:Visa
Number:4111111111111111
Security Code:123
Start Date:,
Expiration Date:June,2030
Notes:first line
second line\",My Visa,(none),0
http://sn,,,,just a note,Plain,,0
";

    #[test]
    fn logins_and_typed_notes() {
        let result = LastPassCsvImporter::new(None).parse(EXPORT);
        assert!(result.success);
        assert_eq!(result.ciphers.len(), 3);
        assert_eq!(result.folders.len(), 1);
        assert_eq!(result.folders[0].name, "Dev/Code");
        assert_eq!(result.folder_relationships(), &[(0, 0)]);

        let github = &result.ciphers[0];
        assert!(github.favorite);
        assert_eq!(github.login().unwrap().totp.as_deref(), Some("JBSWY3DPEHPK3PXP"));

        let visa = &result.ciphers[1];
        let card = visa.card().unwrap();
        assert_eq!(card.cardholder_name.as_deref(), Some("Jane Doe"));
        assert_eq!(card.brand.as_deref(), Some("Visa"));
        assert_eq!(card.exp_month.as_deref(), Some("6"));
        assert_eq!(card.exp_year.as_deref(), Some("2030"));
        assert_eq!(visa.notes.as_deref(), Some("first line\nsecond line"));
        // "Start Date:," survives as a custom field.
        assert_eq!(visa.fields.len(), 1);
        assert_eq!(visa.fields[0].name.as_deref(), Some("Start Date"));

        let plain = &result.ciphers[2];
        assert_eq!(plain.cipher_type(), CipherType::SecureNote);
        assert_eq!(plain.notes.as_deref(), Some("just a note"));
    }

    #[test]
    fn unknown_expiry_month_is_kept_as_a_field() {
        let data = "url,username,password,totp,extra,name,grouping,fav
http://sn,,,,\"NoteType:Credit Card
Name on Card:Jean Dupont
Number:4111111111111111
Expiration Date:Juin,2030\",Carte,,0
";
        let result = LastPassCsvImporter::new(None).parse(data);
        let carte = &result.ciphers[0];
        let card = carte.card().unwrap();
        assert!(card.exp_month.is_none());
        assert!(card.exp_year.is_none());
        assert_eq!(carte.fields, vec![Field::text("Expiration Date", "Juin,2030")]);
    }

    #[test]
    fn foreign_csv_is_rejected() {
        let result = LastPassCsvImporter::new(None).parse("a,b\n1,2\n");
        assert!(!result.success);
    }

    #[test]
    fn month_names() {
        assert_eq!(month_number("June"), Some(6));
        assert_eq!(month_number("09"), Some(9));
        assert_eq!(month_number("13"), None);
        assert_eq!(month_number(""), None);
    }
}
