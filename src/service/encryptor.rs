use crate::api::{CipherRequest, CollectionRequest, FieldRequest, FolderRequest};
use crate::crypto::{EncString, SymmetricKey};
use crate::models::{
    Card, CipherData, CipherRecord, CollectionRecord, FolderRecord, Identity, Login, LoginUri,
    PasswordHistory, SshKey,
};

/// Turns canonical records into their encrypted wire shape.
///
/// Implementors supply `encrypt_string`; the record walkers are provided.
/// Only user content is encrypted: type tags, flags and dates stay in the
/// clear.
pub trait VaultEncryptor {
    fn encrypt_string(&self, plaintext: &str) -> String;

    fn encrypt_cipher(&self, cipher: &CipherRecord) -> CipherRequest {
        let enc = |v: &Option<String>| v.as_deref().map(|s| self.encrypt_string(s));

        let mut request = CipherRequest {
            cipher_type: cipher.cipher_type().code(),
            organization_id: cipher.organization_id.clone(),
            name: self.encrypt_string(&cipher.name),
            notes: enc(&cipher.notes),
            favorite: cipher.favorite,
            reprompt: u8::from(cipher.reprompt),
            login: None,
            card: None,
            identity: None,
            secure_note: None,
            ssh_key: None,
            fields: cipher
                .fields
                .iter()
                .map(|f| FieldRequest {
                    name: enc(&f.name),
                    value: enc(&f.value),
                    field_type: f.field_type.code(),
                })
                .collect(),
            password_history: cipher
                .password_history
                .iter()
                .map(|h| PasswordHistory {
                    password: self.encrypt_string(&h.password),
                    last_used_date: h.last_used_date.clone(),
                })
                .collect(),
            creation_date: cipher.creation_date.clone(),
            last_known_revision_date: cipher.revision_date.clone(),
        };

        match &cipher.data {
            CipherData::Login(login) => {
                request.login = Some(Login {
                    username: enc(&login.username),
                    password: enc(&login.password),
                    totp: enc(&login.totp),
                    uris: login
                        .uris
                        .iter()
                        .map(|u| LoginUri {
                            uri: enc(&u.uri),
                            match_type: u.match_type,
                        })
                        .collect(),
                    password_revision_date: login.password_revision_date.clone(),
                })
            }
            CipherData::Card(card) => {
                request.card = Some(Card {
                    cardholder_name: enc(&card.cardholder_name),
                    brand: enc(&card.brand),
                    number: enc(&card.number),
                    exp_month: enc(&card.exp_month),
                    exp_year: enc(&card.exp_year),
                    code: enc(&card.code),
                })
            }
            CipherData::Identity(identity) => {
                request.identity = Some(Identity {
                    title: enc(&identity.title),
                    first_name: enc(&identity.first_name),
                    middle_name: enc(&identity.middle_name),
                    last_name: enc(&identity.last_name),
                    address1: enc(&identity.address1),
                    address2: enc(&identity.address2),
                    address3: enc(&identity.address3),
                    city: enc(&identity.city),
                    state: enc(&identity.state),
                    postal_code: enc(&identity.postal_code),
                    country: enc(&identity.country),
                    company: enc(&identity.company),
                    email: enc(&identity.email),
                    phone: enc(&identity.phone),
                    ssn: enc(&identity.ssn),
                    username: enc(&identity.username),
                    passport_number: enc(&identity.passport_number),
                    license_number: enc(&identity.license_number),
                })
            }
            CipherData::SecureNote(note) => request.secure_note = Some(note.clone()),
            CipherData::SshKey(key) => {
                request.ssh_key = Some(SshKey {
                    private_key: enc(&key.private_key),
                    public_key: enc(&key.public_key),
                    key_fingerprint: enc(&key.key_fingerprint),
                })
            }
        }
        request
    }

    fn encrypt_folder(&self, folder: &FolderRecord) -> FolderRequest {
        FolderRequest {
            name: self.encrypt_string(&folder.name),
        }
    }

    fn encrypt_collection(&self, collection: &CollectionRecord) -> CollectionRequest {
        CollectionRequest {
            name: self.encrypt_string(&collection.name),
            external_id: collection.external_id.clone(),
        }
    }
}

/// Encrypts with a 64-byte user or organization key as type 2 strings.
pub struct SymmetricKeyEncryptor {
    key: SymmetricKey,
}

impl SymmetricKeyEncryptor {
    pub fn new(key: SymmetricKey) -> Self {
        Self { key }
    }
}

impl VaultEncryptor for SymmetricKeyEncryptor {
    fn encrypt_string(&self, plaintext: &str) -> String {
        EncString::encrypt_str(&self.key, plaintext).to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CipherType, Field};

    #[test]
    fn login_strings_are_encrypted_and_tags_are_not() {
        let key = SymmetricKey::generate();
        let encryptor = SymmetricKeyEncryptor::new(key.clone());

        let mut cipher = CipherRecord::new(CipherType::Login);
        cipher.name = "Mail".to_string();
        cipher.favorite = true;
        cipher.fields.push(Field::hidden("pin", "1234"));
        if let Some(login) = cipher.login_mut() {
            login.username = Some("ada".to_string());
            login.uris.push(LoginUri {
                uri: Some("https://mail.example.com".to_string()),
                match_type: Some(0),
            });
        }

        let request = encryptor.encrypt_cipher(&cipher);
        assert_eq!(request.cipher_type, 1);
        assert!(request.favorite);
        assert_eq!(request.fields[0].field_type, 1);

        let decrypt = |s: &str| s.parse::<EncString>().unwrap().decrypt_to_string(&key).unwrap();
        assert_eq!(decrypt(&request.name), "Mail");
        let login = request.login.unwrap();
        assert_eq!(decrypt(login.username.as_deref().unwrap()), "ada");
        assert!(login.password.is_none());
        assert_eq!(login.uris[0].match_type, Some(0));
        assert_eq!(decrypt(request.fields[0].value.as_deref().unwrap()), "1234");
        assert!(request.card.is_none());
    }

    #[test]
    fn collection_keeps_external_id() {
        let encryptor = SymmetricKeyEncryptor::new(SymmetricKey::generate());
        let mut collection = CollectionRecord::new("Team");
        collection.external_id = Some("ext-1".to_string());
        let request = encryptor.encrypt_collection(&collection);
        assert_eq!(request.external_id.as_deref(), Some("ext-1"));
        assert!(request.name.starts_with("2."));
    }
}
