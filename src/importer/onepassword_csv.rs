//! 1Password 6 and 7 CSV exports. Both desktop apps write one row per item
//! with lower-cased column titles; only the Mac app names the category.

use tracing::debug;

use crate::models::{CipherRecord, CipherType, FieldType, ImportResult};
use crate::normalize;

use super::base::{self, CsvRow};
use super::Importer;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CsvFlavor {
    /// Has a `type` column naming the category of each row.
    Mac,
    /// No category column; the kind follows from which columns are filled.
    Windows,
}

/// Bookkeeping columns that never carry user data.
const IGNORED_COLUMNS: [&str; 6] = ["uuid", "ainfo", "scope", "createdat", "updatedat", "tags"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Slot {
    Title,
    Notes,
    Url,
    Username,
    Password,
    Totp,
    CardholderName,
    CardNumber,
    CardCode,
    CardExpiry,
    FirstName,
    MiddleName,
    LastName,
    Company,
    Email,
    Phone,
    Address,
    City,
    State,
    PostalCode,
    Country,
    Ssn,
}

impl Slot {
    fn for_column(column: &str) -> Option<Slot> {
        let slot = match column.trim().to_ascii_lowercase().as_str() {
            "title" | "name" => Slot::Title,
            "notes" | "notesplain" => Slot::Notes,
            "url" | "urls" | "website" => Slot::Url,
            "username" => Slot::Username,
            "password" => Slot::Password,
            "one-time password" | "otp" | "totp" => Slot::Totp,
            "cardholder name" | "cardholder" => Slot::CardholderName,
            "number" | "card number" | "ccnum" => Slot::CardNumber,
            "verification number" | "cvv" => Slot::CardCode,
            "expiry date" | "expiration date" | "expiry" => Slot::CardExpiry,
            "first name" => Slot::FirstName,
            "initial" => Slot::MiddleName,
            "last name" => Slot::LastName,
            "company" => Slot::Company,
            "email" => Slot::Email,
            "phone" | "default phone" => Slot::Phone,
            "address" => Slot::Address,
            "city" => Slot::City,
            "state" => Slot::State,
            "zip" | "zip code" => Slot::PostalCode,
            "country" => Slot::Country,
            "social security number" | "ssn" => Slot::Ssn,
            _ => return None,
        };
        Some(slot)
    }

    fn kind(self) -> Option<CipherType> {
        match self {
            Slot::CardholderName | Slot::CardNumber | Slot::CardCode | Slot::CardExpiry => {
                Some(CipherType::Card)
            }
            Slot::FirstName
            | Slot::MiddleName
            | Slot::LastName
            | Slot::Company
            | Slot::Email
            | Slot::Phone
            | Slot::Address
            | Slot::City
            | Slot::State
            | Slot::PostalCode
            | Slot::Country
            | Slot::Ssn => Some(CipherType::Identity),
            _ => None,
        }
    }
}

pub struct OnePasswordCsvImporter {
    organization_id: Option<String>,
    flavor: CsvFlavor,
}

impl OnePasswordCsvImporter {
    pub fn new(organization_id: Option<String>, flavor: CsvFlavor) -> Self {
        Self {
            organization_id,
            flavor,
        }
    }

    fn row_kind(&self, row: &CsvRow) -> CipherType {
        match self.flavor {
            CsvFlavor::Mac => {
                let category = row.value("type").unwrap_or_default().to_ascii_lowercase();
                match category.trim() {
                    "credit card" => CipherType::Card,
                    "identity" => CipherType::Identity,
                    "secure note" => CipherType::SecureNote,
                    _ => CipherType::Login,
                }
            }
            CsvFlavor::Windows => {
                let filled: Vec<CipherType> = row
                    .cells()
                    .filter(|(_, v)| !v.trim().is_empty())
                    .filter_map(|(h, _)| Slot::for_column(h).and_then(Slot::kind))
                    .collect();
                if filled.contains(&CipherType::Card) {
                    CipherType::Card
                } else if filled.contains(&CipherType::Identity) {
                    CipherType::Identity
                } else {
                    CipherType::Login
                }
            }
        }
    }
}

impl Importer for OnePasswordCsvImporter {
    fn parse(&self, data: &str) -> ImportResult {
        let Some(table) = base::parse_csv(data) else {
            return ImportResult::new();
        };
        if !(table.has_column("title") || table.has_column("name")) {
            debug!("1password csv without a title column");
            return ImportResult::new();
        }
        let rows = table.rows;
        let mut result = ImportResult::new();

        for row in &rows {
            let mut cipher = CipherRecord::new(self.row_kind(row));
            for (column, value) in row.cells() {
                let lower = column.to_ascii_lowercase();
                if value.trim().is_empty()
                    || IGNORED_COLUMNS.contains(&lower.as_str())
                    || (self.flavor == CsvFlavor::Mac && lower == "type")
                {
                    continue;
                }
                let filled = Slot::for_column(column).is_some_and(|slot| fill(&mut cipher, slot, value));
                if !filled {
                    let field_type = if lower.contains("password") || lower.contains("pin") {
                        FieldType::Hidden
                    } else {
                        FieldType::Text
                    };
                    base::process_kvp(&mut cipher, column, value, field_type);
                }
            }
            base::push_cipher(&mut result, cipher);
        }

        debug!(items = result.ciphers.len(), flavor = ?self.flavor, "parsed 1password csv");
        base::finish(result, self.organization_id.as_deref())
    }
}

/// Put `value` in its typed slot. False when the item kind has no such slot,
/// or the slot is already taken.
fn fill(cipher: &mut CipherRecord, slot: Slot, value: &str) -> bool {
    match slot {
        Slot::Title => cipher.name = value.trim().to_string(),
        Slot::Notes => cipher.notes = Some(base::split_newlines(value).join("\n")),
        Slot::CardExpiry => return base::set_card_expiration(cipher, value),
        _ => {}
    }
    if matches!(slot, Slot::Title | Slot::Notes) {
        return true;
    }

    let value = Some(value.to_string());
    if let Some(login) = cipher.login_mut() {
        let target = match slot {
            Slot::Url if !login.has_uris() => {
                login.uris = base::make_uris(value);
                return true;
            }
            Slot::Username => &mut login.username,
            Slot::Password => &mut login.password,
            Slot::Totp => &mut login.totp,
            _ => return false,
        };
        return take_slot(target, value);
    }
    if let Some(card) = cipher.card_mut() {
        let target = match slot {
            Slot::CardholderName => &mut card.cardholder_name,
            Slot::CardNumber => {
                if card.number.is_some() {
                    return false;
                }
                card.brand = value.as_deref().and_then(normalize::card_brand).map(str::to_string);
                &mut card.number
            }
            Slot::CardCode => &mut card.code,
            _ => return false,
        };
        return take_slot(target, value);
    }
    if let Some(identity) = cipher.identity_mut() {
        let target = match slot {
            Slot::Username => &mut identity.username,
            Slot::FirstName => &mut identity.first_name,
            Slot::MiddleName => &mut identity.middle_name,
            Slot::LastName => &mut identity.last_name,
            Slot::Company => &mut identity.company,
            Slot::Email => &mut identity.email,
            Slot::Phone => &mut identity.phone,
            Slot::Address => &mut identity.address1,
            Slot::City => &mut identity.city,
            Slot::State => &mut identity.state,
            Slot::PostalCode => &mut identity.postal_code,
            Slot::Country => &mut identity.country,
            Slot::Ssn => &mut identity.ssn,
            _ => return false,
        };
        return take_slot(target, value);
    }
    false
}

fn take_slot(target: &mut Option<String>, value: Option<String>) -> bool {
    if target.is_some() {
        return false;
    }
    *target = value;
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Field;

    #[test]
    fn mac_rows_follow_type_column() {
        let data = "title,type,url,username,password,notes,cardholder name,number,verification number,expiry date,first name,last name,email,member id\n\
            GitHub,Login,github.com,octo,pw,,,,,,,,,\n\
            Visa,Credit Card,,,,spare card,Jane Doe,4111111111111111,123,05/2030,,,,\n\
            Me,Identity,,jdoe,,,,,,,Jane,Doe,jane@example.com,M-42\n";
        let result = OnePasswordCsvImporter::new(None, CsvFlavor::Mac).parse(data);
        assert!(result.success);
        assert_eq!(result.ciphers.len(), 3);

        let login = result.ciphers[0].login().unwrap();
        assert_eq!(login.username.as_deref(), Some("octo"));
        assert_eq!(login.uris[0].uri.as_deref(), Some("http://github.com"));

        let visa = &result.ciphers[1];
        assert_eq!(visa.notes.as_deref(), Some("spare card"));
        let card = visa.card().unwrap();
        assert_eq!(card.brand.as_deref(), Some("Visa"));
        assert_eq!(card.code.as_deref(), Some("123"));
        assert_eq!(card.exp_month.as_deref(), Some("5"));
        assert_eq!(card.exp_year.as_deref(), Some("2030"));

        let me = &result.ciphers[2];
        let identity = me.identity().unwrap();
        assert_eq!(identity.username.as_deref(), Some("jdoe"));
        assert_eq!(identity.email.as_deref(), Some("jane@example.com"));
        assert_eq!(me.fields, vec![Field::text("member id", "M-42")]);
    }

    #[test]
    fn windows_rows_infer_kind() {
        let data = "title,url,username,password,cardholder name,number,first name,pin\n\
            Bank,,,,John Roe,5555555555554444,,9999\n\
            Neighbour,,,,,,Sam,\n\
            Router,192.168.1.1,admin,secret,,,,\n";
        let result = OnePasswordCsvImporter::new(None, CsvFlavor::Windows).parse(data);
        let kinds: Vec<CipherType> = result.ciphers.iter().map(|c| c.cipher_type()).collect();
        assert_eq!(kinds, [CipherType::Card, CipherType::Identity, CipherType::Login]);
        assert_eq!(result.ciphers[0].card().unwrap().brand.as_deref(), Some("Mastercard"));
        assert_eq!(result.ciphers[0].fields, vec![Field::hidden("pin", "9999")]);
    }

    #[test]
    fn file_without_titles_is_not_1password() {
        let data = "url,username,password\nhttps://x.com,a,b\n";
        let result = OnePasswordCsvImporter::new(None, CsvFlavor::Windows).parse(data);
        assert!(!result.success);
    }

    #[test]
    fn second_number_column_keeps_the_first_brand() {
        let data = "title,number,card number\nWallet,4111111111111111,5555555555554444\n";
        let result = OnePasswordCsvImporter::new(None, CsvFlavor::Windows).parse(data);
        let wallet = &result.ciphers[0];
        let card = wallet.card().unwrap();
        assert_eq!(card.number.as_deref(), Some("4111111111111111"));
        assert_eq!(card.brand.as_deref(), Some("Visa"));
        assert_eq!(wallet.fields, vec![Field::text("card number", "5555555555554444")]);
    }
}
