pub mod base;
pub mod bitwarden_csv;
pub mod bitwarden_json;
pub mod chrome_csv;
pub mod enpass_json;
pub mod firefox_csv;
pub mod lastpass_csv;
pub mod onepassword_1pux;
pub mod onepassword_csv;
pub mod password_depot_xml;
pub mod psono_json;

use std::fmt;
use std::str::FromStr;

use crate::models::ImportResult;

use self::bitwarden_csv::BitwardenCsvImporter;
use self::bitwarden_json::{BitwardenJsonImporter, BitwardenPasswordProtectedImporter};
use self::chrome_csv::ChromeCsvImporter;
use self::enpass_json::EnpassJsonImporter;
use self::firefox_csv::FirefoxCsvImporter;
use self::lastpass_csv::LastPassCsvImporter;
use self::onepassword_1pux::OnePassword1PuxImporter;
use self::onepassword_csv::{CsvFlavor, OnePasswordCsvImporter};
use self::password_depot_xml::PasswordDepot17XmlImporter;
use self::psono_json::PsonoJsonImporter;

/// Turns one export file into the canonical model.
///
/// `parse` never fails: problems are reported through
/// [`ImportResult::success`] and [`ImportResult::error_message`]. Each call
/// starts from scratch, so an importer can be reused.
pub trait Importer {
    fn parse(&self, data: &str) -> ImportResult;
}

/// Every export format this crate understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ImportFormat {
    BitwardenCsv,
    BitwardenJson,
    BitwardenPasswordProtected,
    ChromeCsv,
    EdgeCsv,
    OperaCsv,
    VivaldiCsv,
    BraveCsv,
    FirefoxCsv,
    LastPassCsv,
    PassboltCsv,
    OnePassword1Pux,
    OnePasswordMacCsv,
    OnePasswordWinCsv,
    EnpassJson,
    PsonoJson,
    PasswordDepot17Xml,
}

impl ImportFormat {
    pub const ALL: [ImportFormat; 17] = [
        ImportFormat::BitwardenCsv,
        ImportFormat::BitwardenJson,
        ImportFormat::BitwardenPasswordProtected,
        ImportFormat::ChromeCsv,
        ImportFormat::EdgeCsv,
        ImportFormat::OperaCsv,
        ImportFormat::VivaldiCsv,
        ImportFormat::BraveCsv,
        ImportFormat::FirefoxCsv,
        ImportFormat::LastPassCsv,
        ImportFormat::PassboltCsv,
        ImportFormat::OnePassword1Pux,
        ImportFormat::OnePasswordMacCsv,
        ImportFormat::OnePasswordWinCsv,
        ImportFormat::EnpassJson,
        ImportFormat::PsonoJson,
        ImportFormat::PasswordDepot17Xml,
    ];

    pub fn id(self) -> &'static str {
        match self {
            ImportFormat::BitwardenCsv => "bitwardencsv",
            ImportFormat::BitwardenJson => "bitwardenjson",
            ImportFormat::BitwardenPasswordProtected => "bitwardenpasswordprotected",
            ImportFormat::ChromeCsv => "chromecsv",
            ImportFormat::EdgeCsv => "edgecsv",
            ImportFormat::OperaCsv => "operacsv",
            ImportFormat::VivaldiCsv => "vivaldicsv",
            ImportFormat::BraveCsv => "bravecsv",
            ImportFormat::FirefoxCsv => "firefoxcsv",
            ImportFormat::LastPassCsv => "lastpasscsv",
            ImportFormat::PassboltCsv => "passboltcsv",
            ImportFormat::OnePassword1Pux => "1password1pux",
            ImportFormat::OnePasswordMacCsv => "1passwordmaccsv",
            ImportFormat::OnePasswordWinCsv => "1passwordwincsv",
            ImportFormat::EnpassJson => "enpassjson",
            ImportFormat::PsonoJson => "psonojson",
            ImportFormat::PasswordDepot17Xml => "passworddepot17xml",
        }
    }

    pub fn display_name(self) -> &'static str {
        match self {
            ImportFormat::BitwardenCsv => "Bitwarden (csv)",
            ImportFormat::BitwardenJson => "Bitwarden (json)",
            ImportFormat::BitwardenPasswordProtected => "Bitwarden (password protected)",
            ImportFormat::ChromeCsv => "Chrome (csv)",
            ImportFormat::EdgeCsv => "Microsoft Edge (csv)",
            ImportFormat::OperaCsv => "Opera (csv)",
            ImportFormat::VivaldiCsv => "Vivaldi (csv)",
            ImportFormat::BraveCsv => "Brave (csv)",
            ImportFormat::FirefoxCsv => "Firefox (csv)",
            ImportFormat::LastPassCsv => "LastPass (csv)",
            ImportFormat::PassboltCsv => "Passbolt (csv)",
            ImportFormat::OnePassword1Pux => "1Password (1pux/json)",
            ImportFormat::OnePasswordMacCsv => "1Password 6 and 7 Mac (csv)",
            ImportFormat::OnePasswordWinCsv => "1Password 6 and 7 Windows (csv)",
            ImportFormat::EnpassJson => "Enpass (json)",
            ImportFormat::PsonoJson => "Psono (json)",
            ImportFormat::PasswordDepot17Xml => "Password Depot 17 (xml)",
        }
    }

    /// Container formats that cannot be read without a password.
    pub fn requires_password(self) -> bool {
        matches!(self, ImportFormat::BitwardenPasswordProtected)
    }

    /// Build the importer. `None` when a required password is missing.
    /// A Bitwarden JSON file given with a password is read as password protected.
    pub fn importer(
        self,
        organization_id: Option<&str>,
        password: Option<&str>,
    ) -> Option<Box<dyn Importer>> {
        let org = organization_id.map(str::to_string);
        let importer: Box<dyn Importer> = match self {
            ImportFormat::BitwardenCsv => Box::new(BitwardenCsvImporter::new(org)),
            ImportFormat::BitwardenJson => match password.filter(|p| !p.is_empty()) {
                Some(password) => Box::new(BitwardenPasswordProtectedImporter::new(org, password)),
                None => Box::new(BitwardenJsonImporter::new(org)),
            },
            ImportFormat::BitwardenPasswordProtected => {
                let password = password.filter(|p| !p.is_empty())?;
                Box::new(BitwardenPasswordProtectedImporter::new(org, password))
            }
            ImportFormat::ChromeCsv
            | ImportFormat::EdgeCsv
            | ImportFormat::OperaCsv
            | ImportFormat::VivaldiCsv
            | ImportFormat::BraveCsv => Box::new(ChromeCsvImporter::new(org)),
            ImportFormat::FirefoxCsv => Box::new(FirefoxCsvImporter::new(org)),
            ImportFormat::LastPassCsv | ImportFormat::PassboltCsv => {
                Box::new(LastPassCsvImporter::new(org))
            }
            ImportFormat::OnePassword1Pux => Box::new(OnePassword1PuxImporter::new(org)),
            ImportFormat::OnePasswordMacCsv => {
                Box::new(OnePasswordCsvImporter::new(org, CsvFlavor::Mac))
            }
            ImportFormat::OnePasswordWinCsv => {
                Box::new(OnePasswordCsvImporter::new(org, CsvFlavor::Windows))
            }
            ImportFormat::EnpassJson => Box::new(EnpassJsonImporter::new(org)),
            ImportFormat::PsonoJson => Box::new(PsonoJsonImporter::new(org)),
            ImportFormat::PasswordDepot17Xml => Box::new(PasswordDepot17XmlImporter::new(org)),
        };
        Some(importer)
    }
}

impl fmt::Display for ImportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

impl FromStr for ImportFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|f| f.id() == wanted)
            .ok_or_else(|| format!("Unknown format: '{}'", s))
    }
}

/// Look up and construct an importer by format id.
///
/// `None` for an unknown id, or for a container format asked for without its
/// password.
pub fn resolve(
    format_id: &str,
    organization_id: Option<&str>,
    password: Option<&str>,
) -> Option<Box<dyn Importer>> {
    let format: ImportFormat = format_id.parse().ok()?;
    format.importer(organization_id, password)
}
