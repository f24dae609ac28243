use serde::{Deserialize, Serialize};

/// Item kind. The numeric codes are the ones the server and the Bitwarden
/// export formats use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum CipherType {
    Login,
    SecureNote,
    Card,
    Identity,
    SshKey,
}

impl CipherType {
    pub const ALL: [CipherType; 5] = [
        CipherType::Login,
        CipherType::SecureNote,
        CipherType::Card,
        CipherType::Identity,
        CipherType::SshKey,
    ];

    pub fn code(self) -> u8 {
        match self {
            CipherType::Login => 1,
            CipherType::SecureNote => 2,
            CipherType::Card => 3,
            CipherType::Identity => 4,
            CipherType::SshKey => 5,
        }
    }

    pub fn from_code(code: u64) -> Option<Self> {
        Self::ALL.into_iter().find(|t| u64::from(t.code()) == code)
    }

    /// Human-readable name, as shown in aggregated server errors.
    pub fn display_name(self) -> &'static str {
        match self {
            CipherType::Login => "Login",
            CipherType::SecureNote => "Secure Note",
            CipherType::Card => "Card",
            CipherType::Identity => "Identity",
            CipherType::SshKey => "SSH key",
        }
    }

    /// Accepts the loose spellings used in config files (`card`, `secure_note`, `ssh-key`, ...).
    pub fn from_name(name: &str) -> Option<Self> {
        let key: String = name
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .map(|c| c.to_ascii_lowercase())
            .collect();
        match key.as_str() {
            "login" => Some(CipherType::Login),
            "securenote" | "note" => Some(CipherType::SecureNote),
            "card" => Some(CipherType::Card),
            "identity" => Some(CipherType::Identity),
            "sshkey" => Some(CipherType::SshKey),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FieldType {
    #[default]
    Text,
    Hidden,
    Boolean,
    Linked,
}

impl FieldType {
    pub fn code(self) -> u8 {
        match self {
            FieldType::Text => 0,
            FieldType::Hidden => 1,
            FieldType::Boolean => 2,
            FieldType::Linked => 3,
        }
    }

    pub fn from_code(code: u64) -> Self {
        match code {
            1 => FieldType::Hidden,
            2 => FieldType::Boolean,
            3 => FieldType::Linked,
            _ => FieldType::Text,
        }
    }
}

/// Custom field for values with no typed slot on the item.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Field {
    pub name: Option<String>,
    pub value: Option<String>,
    #[serde(rename = "type")]
    pub field_type: FieldType,
}

impl Field {
    pub fn new(name: impl Into<String>, value: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            name: Some(name.into()),
            value: Some(value.into()),
            field_type,
        }
    }

    pub fn text(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self::new(name, value, FieldType::Text)
    }

    pub fn hidden(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self::new(name, value, FieldType::Hidden)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginUri {
    pub uri: Option<String>,
    /// URI match strategy code (0 domain .. 5 never); `None` uses the account default.
    #[serde(rename = "match")]
    pub match_type: Option<u8>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Login {
    pub username: Option<String>,
    pub password: Option<String>,
    pub totp: Option<String>,
    pub uris: Vec<LoginUri>,
    pub password_revision_date: Option<String>,
}

impl Login {
    pub fn has_uris(&self) -> bool {
        self.uris.iter().any(|u| u.uri.as_deref().is_some_and(|s| !s.is_empty()))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Card {
    pub cardholder_name: Option<String>,
    pub brand: Option<String>,
    pub number: Option<String>,
    pub exp_month: Option<String>,
    pub exp_year: Option<String>,
    pub code: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Identity {
    pub title: Option<String>,
    pub first_name: Option<String>,
    pub middle_name: Option<String>,
    pub last_name: Option<String>,
    pub address1: Option<String>,
    pub address2: Option<String>,
    pub address3: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub postal_code: Option<String>,
    pub country: Option<String>,
    pub company: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub ssn: Option<String>,
    pub username: Option<String>,
    pub passport_number: Option<String>,
    pub license_number: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SecureNote {
    /// Only the generic note type (0) exists.
    #[serde(rename = "type")]
    pub note_type: u8,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SshKey {
    pub private_key: Option<String>,
    pub public_key: Option<String>,
    pub key_fingerprint: Option<String>,
}

/// Kind-specific payload. A record is exactly one of these.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum CipherData {
    Login(Login),
    SecureNote(SecureNote),
    Card(Card),
    Identity(Identity),
    SshKey(SshKey),
}

impl CipherData {
    pub fn cipher_type(&self) -> CipherType {
        match self {
            CipherData::Login(_) => CipherType::Login,
            CipherData::SecureNote(_) => CipherType::SecureNote,
            CipherData::Card(_) => CipherType::Card,
            CipherData::Identity(_) => CipherType::Identity,
            CipherData::SshKey(_) => CipherType::SshKey,
        }
    }

    pub fn empty(kind: CipherType) -> Self {
        match kind {
            CipherType::Login => CipherData::Login(Login::default()),
            CipherType::SecureNote => CipherData::SecureNote(SecureNote::default()),
            CipherType::Card => CipherData::Card(Card::default()),
            CipherType::Identity => CipherData::Identity(Identity::default()),
            CipherType::SshKey => CipherData::SshKey(SshKey::default()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PasswordHistory {
    pub password: String,
    pub last_used_date: String,
}

/// Maximum number of password history entries kept per item.
pub const MAX_PASSWORD_HISTORY: usize = 5;

/// Placeholder name given to items the source left unnamed.
pub const DEFAULT_NAME: &str = "--";

/// A single credential item in the canonical model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CipherRecord {
    pub name: String,
    pub notes: Option<String>,
    pub favorite: bool,
    pub reprompt: bool,
    pub organization_id: Option<String>,
    pub fields: Vec<Field>,
    pub password_history: Vec<PasswordHistory>,
    pub creation_date: Option<String>,
    pub revision_date: Option<String>,
    pub data: CipherData,
}

impl CipherRecord {
    pub fn new(kind: CipherType) -> Self {
        Self {
            name: String::new(),
            notes: None,
            favorite: false,
            reprompt: false,
            organization_id: None,
            fields: Vec::new(),
            password_history: Vec::new(),
            creation_date: None,
            revision_date: None,
            data: CipherData::empty(kind),
        }
    }

    pub fn cipher_type(&self) -> CipherType {
        self.data.cipher_type()
    }

    /// Switch kind, discarding the typed payload of the old kind.
    pub fn set_type(&mut self, kind: CipherType) {
        if self.cipher_type() != kind {
            self.data = CipherData::empty(kind);
        }
    }

    pub fn login(&self) -> Option<&Login> {
        match &self.data {
            CipherData::Login(login) => Some(login),
            _ => None,
        }
    }

    pub fn login_mut(&mut self) -> Option<&mut Login> {
        match &mut self.data {
            CipherData::Login(login) => Some(login),
            _ => None,
        }
    }

    pub fn card(&self) -> Option<&Card> {
        match &self.data {
            CipherData::Card(card) => Some(card),
            _ => None,
        }
    }

    pub fn card_mut(&mut self) -> Option<&mut Card> {
        match &mut self.data {
            CipherData::Card(card) => Some(card),
            _ => None,
        }
    }

    pub fn identity(&self) -> Option<&Identity> {
        match &self.data {
            CipherData::Identity(identity) => Some(identity),
            _ => None,
        }
    }

    pub fn identity_mut(&mut self) -> Option<&mut Identity> {
        match &mut self.data {
            CipherData::Identity(identity) => Some(identity),
            _ => None,
        }
    }

    pub fn ssh_key_mut(&mut self) -> Option<&mut SshKey> {
        match &mut self.data {
            CipherData::SshKey(key) => Some(key),
            _ => None,
        }
    }

    /// True for an unnamed login with no password, the shape a mis-detected
    /// format tends to produce for every row.
    pub fn is_degenerate(&self) -> bool {
        let unnamed = self.name.trim().is_empty() || self.name == DEFAULT_NAME;
        let blank_password = self
            .login()
            .map(|l| l.password.as_deref().map_or(true, |p| p.trim().is_empty()));
        unnamed && blank_password == Some(true)
    }

    /// Push a password history entry, keeping the newest entries first.
    pub fn add_password_history(&mut self, entry: PasswordHistory) {
        self.password_history.push(entry);
        self.password_history
            .sort_by(|a, b| b.last_used_date.cmp(&a.last_used_date));
        self.password_history.truncate(MAX_PASSWORD_HISTORY);
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FolderRecord {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectionRecord {
    pub name: String,
    pub organization_id: Option<String>,
    pub external_id: Option<String>,
}

impl CollectionRecord {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            organization_id: None,
            external_id: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn degenerate_needs_unnamed_login_without_password() {
        let mut cipher = CipherRecord::new(CipherType::Login);
        assert!(cipher.is_degenerate());

        cipher.name = DEFAULT_NAME.to_string();
        assert!(cipher.is_degenerate());

        cipher.login_mut().unwrap().password = Some("hunter2".to_string());
        assert!(!cipher.is_degenerate());

        let note = CipherRecord::new(CipherType::SecureNote);
        assert!(!note.is_degenerate());
    }

    #[test]
    fn set_type_discards_old_payload() {
        let mut cipher = CipherRecord::new(CipherType::Login);
        cipher.login_mut().unwrap().username = Some("alice".to_string());
        cipher.set_type(CipherType::Card);
        assert!(cipher.login().is_none());
        assert_eq!(cipher.card(), Some(&Card::default()));
    }

    #[test]
    fn password_history_is_capped_newest_first() {
        let mut cipher = CipherRecord::new(CipherType::Login);
        for day in 1..=7 {
            cipher.add_password_history(PasswordHistory {
                password: format!("pw{}", day),
                last_used_date: format!("2024-01-0{}T00:00:00.000Z", day),
            });
        }
        assert_eq!(cipher.password_history.len(), MAX_PASSWORD_HISTORY);
        assert_eq!(cipher.password_history[0].password, "pw7");
        assert_eq!(cipher.password_history[4].password, "pw3");
    }

    #[test]
    fn type_names_and_codes() {
        assert_eq!(CipherType::from_code(2), Some(CipherType::SecureNote));
        assert_eq!(CipherType::from_code(9), None);
        assert_eq!(CipherType::SshKey.display_name(), "SSH key");
        assert_eq!(CipherType::from_name("Secure_Note"), Some(CipherType::SecureNote));
        assert_eq!(CipherType::from_name("ssh-key"), Some(CipherType::SshKey));
    }
}
