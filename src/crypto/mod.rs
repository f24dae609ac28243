//! Symmetric encryption in the Bitwarden `EncString` format.
//!
//! Only type 2 strings are produced and accepted: `2.<iv>|<ciphertext>|<mac>`,
//! each part base64, AES-256-CBC with PKCS#7 padding, authenticated with
//! HMAC-SHA256 over `iv || ciphertext`.

use std::fmt;
use std::str::FromStr;

use aes::cipher::{block_padding::Pkcs7, BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use base64::{engine::general_purpose::STANDARD, Engine};
use hkdf::Hkdf;
use hmac::digest::{generic_array::GenericArray, KeyInit};
use hmac::{Hmac, Mac};
use pbkdf2::pbkdf2_hmac;
use rand::RngCore;
use sha2::Sha256;
use thiserror::Error;

type Aes256CbcEnc = cbc::Encryptor<aes::Aes256>;
type Aes256CbcDec = cbc::Decryptor<aes::Aes256>;
type HmacSha256 = Hmac<Sha256>;

const ENC_TYPE_AES_CBC_HMAC: &str = "2";

#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("invalid encrypted string")]
    InvalidEncString,
    #[error("invalid base64 key")]
    InvalidBase64,
    #[error("unsupported encryption type {0}")]
    UnsupportedEncType(String),
    #[error("invalid key length {0}, expected 64 bytes")]
    InvalidKeyLength(usize),
    #[error("MAC verification failed")]
    MacMismatch,
    #[error("decryption failed")]
    Decrypt,
    #[error("decrypted data is not valid UTF-8")]
    Utf8,
    #[error("key derivation failed")]
    KeyDerivation,
}

/// 256-bit encryption key plus 256-bit MAC key.
#[derive(Clone)]
pub struct SymmetricKey {
    enc_key: [u8; 32],
    mac_key: [u8; 32],
}

impl fmt::Debug for SymmetricKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SymmetricKey(..)")
    }
}

impl SymmetricKey {
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CryptoError> {
        if bytes.len() != 64 {
            return Err(CryptoError::InvalidKeyLength(bytes.len()));
        }
        let mut enc_key = [0u8; 32];
        let mut mac_key = [0u8; 32];
        enc_key.copy_from_slice(&bytes[..32]);
        mac_key.copy_from_slice(&bytes[32..]);
        Ok(Self { enc_key, mac_key })
    }

    pub fn from_base64(encoded: &str) -> Result<Self, CryptoError> {
        let bytes = STANDARD
            .decode(encoded.trim())
            .map_err(|_| CryptoError::InvalidBase64)?;
        Self::from_bytes(&bytes)
    }

    pub fn generate() -> Self {
        let mut bytes = [0u8; 64];
        rand::thread_rng().fill_bytes(&mut bytes);
        let mut enc_key = [0u8; 32];
        let mut mac_key = [0u8; 32];
        enc_key.copy_from_slice(&bytes[..32]);
        mac_key.copy_from_slice(&bytes[32..]);
        Self { enc_key, mac_key }
    }

    pub fn to_base64(&self) -> String {
        let mut bytes = Vec::with_capacity(64);
        bytes.extend_from_slice(&self.enc_key);
        bytes.extend_from_slice(&self.mac_key);
        STANDARD.encode(bytes)
    }

    /// PBKDF2-SHA256 master key, stretched into enc/mac halves with HKDF-Expand.
    pub fn derive_from_password(
        password: &str,
        salt: &str,
        iterations: u32,
    ) -> Result<Self, CryptoError> {
        let mut master = [0u8; 32];
        pbkdf2_hmac::<Sha256>(password.as_bytes(), salt.as_bytes(), iterations, &mut master);
        let hkdf = Hkdf::<Sha256>::from_prk(&master).map_err(|_| CryptoError::KeyDerivation)?;
        Ok(Self {
            enc_key: expand(&hkdf, b"enc")?,
            mac_key: expand(&hkdf, b"mac")?,
        })
    }
}

fn expand(hkdf: &Hkdf<Sha256>, info: &[u8]) -> Result<[u8; 32], CryptoError> {
    let mut okm = [0u8; 32];
    hkdf.expand(info, &mut okm)
        .map_err(|_| CryptoError::KeyDerivation)?;
    Ok(okm)
}

// HMAC zero-pads short keys to the 64-byte SHA-256 block.
fn hmac_with(key: &[u8; 32]) -> HmacSha256 {
    let mut block = [0u8; 64];
    block[..32].copy_from_slice(key);
    <HmacSha256 as KeyInit>::new(GenericArray::from_slice(&block))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncString {
    iv: Vec<u8>,
    data: Vec<u8>,
    mac: Vec<u8>,
}

impl EncString {
    pub fn encrypt(key: &SymmetricKey, plaintext: &[u8]) -> Self {
        let mut iv = [0u8; 16];
        rand::thread_rng().fill_bytes(&mut iv);
        let data = Aes256CbcEnc::new(&key.enc_key.into(), &iv.into())
            .encrypt_padded_vec_mut::<Pkcs7>(plaintext);

        let mut mac = hmac_with(&key.mac_key);
        mac.update(&iv);
        mac.update(&data);
        Self {
            iv: iv.to_vec(),
            data,
            mac: mac.finalize().into_bytes().to_vec(),
        }
    }

    pub fn encrypt_str(key: &SymmetricKey, plaintext: &str) -> Self {
        Self::encrypt(key, plaintext.as_bytes())
    }

    pub fn decrypt(&self, key: &SymmetricKey) -> Result<Vec<u8>, CryptoError> {
        let mut mac = hmac_with(&key.mac_key);
        mac.update(&self.iv);
        mac.update(&self.data);
        mac.verify_slice(&self.mac)
            .map_err(|_| CryptoError::MacMismatch)?;

        let decryptor = Aes256CbcDec::new_from_slices(&key.enc_key, &self.iv)
            .map_err(|_| CryptoError::InvalidEncString)?;
        decryptor
            .decrypt_padded_vec_mut::<Pkcs7>(&self.data)
            .map_err(|_| CryptoError::Decrypt)
    }

    pub fn decrypt_to_string(&self, key: &SymmetricKey) -> Result<String, CryptoError> {
        String::from_utf8(self.decrypt(key)?).map_err(|_| CryptoError::Utf8)
    }
}

impl FromStr for EncString {
    type Err = CryptoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (enc_type, rest) = s.trim().split_once('.').ok_or(CryptoError::InvalidEncString)?;
        if enc_type != ENC_TYPE_AES_CBC_HMAC {
            return Err(CryptoError::UnsupportedEncType(enc_type.to_string()));
        }
        let parts: Vec<&str> = rest.split('|').collect();
        let &[iv, data, mac] = parts.as_slice() else {
            return Err(CryptoError::InvalidEncString);
        };
        let decode = |part: &str| STANDARD.decode(part).map_err(|_| CryptoError::InvalidEncString);
        let (iv, data, mac) = (decode(iv)?, decode(data)?, decode(mac)?);
        if iv.len() != 16 || mac.len() != 32 || data.is_empty() {
            return Err(CryptoError::InvalidEncString);
        }
        Ok(Self { iv, data, mac })
    }
}

impl fmt::Display for EncString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}.{}|{}|{}",
            ENC_TYPE_AES_CBC_HMAC,
            STANDARD.encode(&self.iv),
            STANDARD.encode(&self.data),
            STANDARD.encode(&self.mac)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encrypt_then_decrypt_through_text_form() {
        let key = SymmetricKey::generate();
        let enc = EncString::encrypt_str(&key, "correct horse battery staple");
        let parsed: EncString = enc.to_string().parse().unwrap();
        assert_eq!(parsed.decrypt_to_string(&key).unwrap(), "correct horse battery staple");
    }

    #[test]
    fn wrong_key_fails_mac() {
        let enc = EncString::encrypt_str(&SymmetricKey::generate(), "secret");
        let err = enc.decrypt(&SymmetricKey::generate()).unwrap_err();
        assert!(matches!(err, CryptoError::MacMismatch));
    }

    fn unhex(s: &str) -> Vec<u8> {
        (0..s.len())
            .step_by(2)
            .map(|i| u8::from_str_radix(&s[i..i + 2], 16).unwrap())
            .collect()
    }

    #[test]
    fn expand_matches_rfc5869_first_block() {
        let prk = unhex("077709362c2e32df0ddc3f0dc47bba6390b6c73bb50f9c3122ec844ad7c2b3e5");
        let hkdf = Hkdf::<Sha256>::from_prk(&prk).unwrap();
        let okm = expand(&hkdf, &unhex("f0f1f2f3f4f5f6f7f8f9")).unwrap();
        assert_eq!(
            okm.to_vec(),
            unhex("3cb25f25faacd57a90434f64d0362f2a2d2d0a90cf1a5a4c5db02d56ecc4c5bf")
        );
    }

    #[test]
    fn padded_mac_key_matches_slice_key() {
        let key = [7u8; 32];
        let mut padded = hmac_with(&key);
        padded.update(b"iv and data");
        let mut plain = <HmacSha256 as Mac>::new_from_slice(&key).unwrap();
        plain.update(b"iv and data");
        assert_eq!(padded.finalize().into_bytes(), plain.finalize().into_bytes());
    }

    #[test]
    fn password_derivation_is_deterministic() {
        let a = SymmetricKey::derive_from_password("pw", "salt", 1000).unwrap();
        let b = SymmetricKey::derive_from_password("pw", "salt", 1000).unwrap();
        let c = SymmetricKey::derive_from_password("pw", "pepper", 1000).unwrap();
        assert_eq!(a.to_base64(), b.to_base64());
        assert_ne!(a.to_base64(), c.to_base64());
        assert_ne!(a.enc_key, a.mac_key);
    }

    #[test]
    fn rejects_malformed_strings() {
        assert!("garbage".parse::<EncString>().is_err());
        assert!(matches!(
            "0.abc|def".parse::<EncString>(),
            Err(CryptoError::UnsupportedEncType(_))
        ));
        assert!("2.AAAA|BBBB".parse::<EncString>().is_err());
    }

    #[test]
    fn key_length_is_checked() {
        assert!(matches!(
            SymmetricKey::from_bytes(&[0u8; 32]),
            Err(CryptoError::InvalidKeyLength(32))
        ));
        let key = SymmetricKey::generate();
        let again = SymmetricKey::from_base64(&key.to_base64()).unwrap();
        assert_eq!(again.to_base64(), key.to_base64());
    }
}
