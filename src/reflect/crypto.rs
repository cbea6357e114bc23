//! Decryption of reflection text stored at rest.
//!
//! Encrypted values look like `enc:v1:<base64(nonce || ciphertext)>` and are
//! sealed with AES-256-GCM. Anything without the prefix is plain text and
//! passes through unchanged.
//!
//! Errors never carry plaintext, ciphertext, or key material.

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Nonce};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use thiserror::Error;

use crate::reflect::util::env_non_empty;

pub const ENCRYPTED_PREFIX: &str = "enc:v1:";

/// Nonce size for AES-256-GCM (96 bits).
const NONCE_SIZE: usize = 12;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DecryptError {
    #[error("encrypted text found but no REFLECT_ENCRYPTION_KEY is configured")]
    MissingKey,
    #[error("invalid key: expected base64 of 32 bytes")]
    InvalidKey,
    #[error("invalid encoding for encrypted text")]
    InvalidEncoding,
    #[error("invalid ciphertext: too short")]
    CiphertextTooShort,
    #[error("decryption failed")]
    DecryptionFailed,
    #[error("decrypted text is not valid utf-8")]
    InvalidUtf8,
}

pub fn is_encrypted(raw: &str) -> bool {
    raw.starts_with(ENCRYPTED_PREFIX)
}

pub trait Decryptor {
    fn decrypt_if_encrypted(&self, raw: &str) -> Result<String, DecryptError>;
}

/// Used when no key is configured: plain text passes, sealed text is refused.
pub struct PassThrough;

impl Decryptor for PassThrough {
    fn decrypt_if_encrypted(&self, raw: &str) -> Result<String, DecryptError> {
        if is_encrypted(raw) {
            return Err(DecryptError::MissingKey);
        }
        Ok(raw.to_string())
    }
}

pub struct AesGcmDecryptor {
    cipher: Aes256Gcm,
}

impl AesGcmDecryptor {
    pub fn new(key: &[u8; 32]) -> Self {
        Self {
            cipher: Aes256Gcm::new(key.into()),
        }
    }

    pub fn from_base64_key(raw: &str) -> Result<Self, DecryptError> {
        let bytes = STANDARD
            .decode(raw.trim())
            .map_err(|_| DecryptError::InvalidKey)?;
        let key: [u8; 32] = bytes
            .as_slice()
            .try_into()
            .map_err(|_| DecryptError::InvalidKey)?;
        Ok(Self::new(&key))
    }
}

impl Decryptor for AesGcmDecryptor {
    fn decrypt_if_encrypted(&self, raw: &str) -> Result<String, DecryptError> {
        let Some(encoded) = raw.strip_prefix(ENCRYPTED_PREFIX) else {
            return Ok(raw.to_string());
        };
        let sealed = STANDARD
            .decode(encoded.trim())
            .map_err(|_| DecryptError::InvalidEncoding)?;
        if sealed.len() <= NONCE_SIZE {
            return Err(DecryptError::CiphertextTooShort);
        }
        let (nonce, ciphertext) = sealed.split_at(NONCE_SIZE);
        let plain = self
            .cipher
            .decrypt(Nonce::from_slice(nonce), ciphertext)
            .map_err(|_| DecryptError::DecryptionFailed)?;
        String::from_utf8(plain).map_err(|_| DecryptError::InvalidUtf8)
    }
}

/// Build the decryptor once at startup from `REFLECT_ENCRYPTION_KEY`.
pub fn decryptor_from_env() -> Result<Box<dyn Decryptor>, DecryptError> {
    match env_non_empty("REFLECT_ENCRYPTION_KEY") {
        Some(key) => Ok(Box::new(AesGcmDecryptor::from_base64_key(&key)?)),
        None => Ok(Box::new(PassThrough)),
    }
}

#[cfg(test)]
pub(crate) fn seal_for_test(key: &[u8; 32], plaintext: &str) -> String {
    let cipher = Aes256Gcm::new(key.into());
    let nonce = [7u8; NONCE_SIZE];
    let mut sealed = nonce.to_vec();
    sealed.extend(
        cipher
            .encrypt(Nonce::from_slice(&nonce), plaintext.as_bytes())
            .expect("encrypt"),
    );
    format!("{ENCRYPTED_PREFIX}{}", STANDARD.encode(sealed))
}

#[cfg(test)]
mod tests {
    use super::*;

    const KEY: [u8; 32] = [42u8; 32];

    #[test]
    fn plain_text_passes_through_both_decryptors() {
        assert_eq!(PassThrough.decrypt_if_encrypted("hello").unwrap(), "hello");
        let dec = AesGcmDecryptor::new(&KEY);
        assert_eq!(dec.decrypt_if_encrypted("hello").unwrap(), "hello");
    }

    #[test]
    fn sealed_text_round_trips_with_matching_key() {
        let sealed = seal_for_test(&KEY, "a quiet walk by the river");
        assert!(is_encrypted(&sealed));
        let dec = AesGcmDecryptor::new(&KEY);
        assert_eq!(
            dec.decrypt_if_encrypted(&sealed).unwrap(),
            "a quiet walk by the river"
        );
    }

    #[test]
    fn wrong_key_fails_without_leaking_text() {
        let sealed = seal_for_test(&KEY, "private");
        let dec = AesGcmDecryptor::new(&[1u8; 32]);
        let err = dec.decrypt_if_encrypted(&sealed).unwrap_err();
        assert_eq!(err, DecryptError::DecryptionFailed);
        assert!(!err.to_string().contains("private"));
    }

    #[test]
    fn pass_through_refuses_sealed_text() {
        let sealed = seal_for_test(&KEY, "private");
        assert_eq!(
            PassThrough.decrypt_if_encrypted(&sealed).unwrap_err(),
            DecryptError::MissingKey
        );
    }

    #[test]
    fn base64_key_must_be_32_bytes() {
        assert!(AesGcmDecryptor::from_base64_key(&STANDARD.encode([0u8; 16])).is_err());
        assert!(AesGcmDecryptor::from_base64_key(&STANDARD.encode(KEY)).is_ok());
    }
}
