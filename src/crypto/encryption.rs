//! Field-level encryption for personally identifying data.
//!
//! Mobile numbers and vehicle plates are stored twice: an AES-256-GCM ciphertext for
//! display after decryption, and a SHA-256 hex digest used for equality lookups and
//! unique constraints. Both halves always come from one `encrypt_and_hash` call.

use std::fmt;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use ring::aead::{self, Aad, LessSafeKey, Nonce, UnboundKey};
use ring::rand::{SecureRandom, SystemRandom};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;
use zeroize::Zeroize;

use crate::config::EncryptionConfig;

/// AES-256-GCM nonce size in bytes.
pub const NONCE_SIZE: usize = 12;

/// AES-256-GCM tag size in bytes.
pub const TAG_SIZE: usize = 16;

/// AES-256 key size in bytes.
pub const KEY_SIZE: usize = 32;

#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("Encryption key must be exactly {expected} bytes, got {actual}")]
    InvalidKeyLength { expected: usize, actual: usize },

    #[error("Encryption failed: {0}")]
    EncryptionFailure(&'static str),

    #[error("Decryption failed: {0}")]
    DecryptionFailure(&'static str),
}

/// Ciphertext and search hash derived from the same plaintext
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptedField {
    /// base64(nonce || ciphertext || tag)
    pub ciphertext: String,
    /// lowercase hex SHA-256 of the plaintext
    pub search_hash: String,
}

pub struct EncryptionEngine {
    key: LessSafeKey,
    rng: SystemRandom,
}

impl EncryptionEngine {
    /// Build the engine from raw key material.
    ///
    /// # Errors
    ///
    /// Returns `InvalidKeyLength` unless exactly 32 bytes are supplied. Meant to be called
    /// once at startup so a bad key stops the process before any request is served.
    pub fn new(key_material: &[u8]) -> Result<Self, CryptoError> {
        if key_material.len() != KEY_SIZE {
            return Err(CryptoError::InvalidKeyLength {
                expected: KEY_SIZE,
                actual: key_material.len(),
            });
        }

        let mut key_bytes = [0u8; KEY_SIZE];
        key_bytes.copy_from_slice(key_material);
        let unbound = UnboundKey::new(&aead::AES_256_GCM, &key_bytes);
        key_bytes.zeroize();

        let unbound =
            unbound.map_err(|_| CryptoError::EncryptionFailure("failed to create encryption key"))?;

        Ok(Self {
            key: LessSafeKey::new(unbound),
            rng: SystemRandom::new(),
        })
    }

    /// Key material is taken as the raw UTF-8 bytes of the configured secret
    pub fn from_config(config: &EncryptionConfig) -> Result<Self, CryptoError> {
        Self::new(config.secret_key.as_bytes())
    }

    /// Encrypt with a fresh random nonce; output is base64(nonce || ciphertext || tag)
    pub fn encrypt(&self, plaintext: &str) -> Result<String, CryptoError> {
        let mut nonce = [0u8; NONCE_SIZE];
        self.rng
            .fill(&mut nonce)
            .map_err(|_| CryptoError::EncryptionFailure("failed to generate random nonce"))?;

        let mut in_out = plaintext.as_bytes().to_vec();
        self.key
            .seal_in_place_append_tag(Nonce::assume_unique_for_key(nonce), Aad::empty(), &mut in_out)
            .map_err(|_| CryptoError::EncryptionFailure("seal failed"))?;

        let mut blob = Vec::with_capacity(NONCE_SIZE + in_out.len());
        blob.extend_from_slice(&nonce);
        blob.extend_from_slice(&in_out);
        Ok(STANDARD.encode(blob))
    }

    pub fn decrypt(&self, ciphertext: &str) -> Result<String, CryptoError> {
        let blob = STANDARD
            .decode(ciphertext)
            .map_err(|_| CryptoError::DecryptionFailure("ciphertext is not valid base64"))?;

        if blob.len() < NONCE_SIZE + TAG_SIZE {
            return Err(CryptoError::DecryptionFailure("ciphertext too short"));
        }

        let (nonce, sealed) = blob.split_at(NONCE_SIZE);
        let nonce = Nonce::try_assume_unique_for_key(nonce)
            .map_err(|_| CryptoError::DecryptionFailure("invalid nonce"))?;

        let mut buffer = sealed.to_vec();
        let plaintext = self
            .key
            .open_in_place(nonce, Aad::empty(), &mut buffer)
            .map_err(|_| CryptoError::DecryptionFailure("authentication tag mismatch"))?;

        String::from_utf8(plaintext.to_vec())
            .map_err(|_| CryptoError::DecryptionFailure("plaintext is not valid UTF-8"))
    }

    /// Deterministic search key: lowercase hex SHA-256 of the plaintext
    pub fn hash(&self, plaintext: &str) -> String {
        hex::encode(Sha256::digest(plaintext.as_bytes()))
    }

    pub fn encrypt_and_hash(&self, plaintext: &str) -> Result<EncryptedField, CryptoError> {
        Ok(EncryptedField {
            ciphertext: self.encrypt(plaintext)?,
            search_hash: self.hash(plaintext),
        })
    }
}

impl fmt::Debug for EncryptionEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EncryptionEngine")
            .field("algorithm", &"AES-256-GCM")
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const KEY: &[u8; KEY_SIZE] = b"0123456789abcdef0123456789abcdef";

    fn engine() -> EncryptionEngine {
        EncryptionEngine::new(KEY).unwrap()
    }

    #[test]
    fn test_encrypt_decrypt_roundtrip() {
        let engine = engine();
        for plaintext in ["9876543210", "KA-01-AB-1234", "", "ಕನ್ನಡ"] {
            let ciphertext = engine.encrypt(plaintext).unwrap();
            assert_eq!(engine.decrypt(&ciphertext).unwrap(), plaintext);
        }
    }

    #[test]
    fn test_ciphertext_layout_is_nonce_prefixed() {
        let ciphertext = engine().encrypt("9876543210").unwrap();
        let blob = STANDARD.decode(ciphertext).unwrap();
        assert_eq!(blob.len(), NONCE_SIZE + "9876543210".len() + TAG_SIZE);
    }

    #[test]
    fn test_encrypt_uses_fresh_nonce() {
        let engine = engine();
        let first = engine.encrypt("9876543210").unwrap();
        let second = engine.encrypt("9876543210").unwrap();
        assert_ne!(first, second);
        assert_eq!(engine.decrypt(&first).unwrap(), "9876543210");
        assert_eq!(engine.decrypt(&second).unwrap(), "9876543210");
    }

    #[test]
    fn test_hash_is_stable_sha256_hex() {
        let engine = engine();
        assert_eq!(
            engine.hash("abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
        assert_eq!(engine.hash("9876543210"), engine.hash("9876543210"));
        assert_eq!(engine.hash("9876543210").len(), 64);
        assert_ne!(engine.hash("9876543210"), engine.hash("9876543211"));
    }

    #[test]
    fn test_hash_does_not_depend_on_key() {
        let other = EncryptionEngine::new(b"fedcba9876543210fedcba9876543210").unwrap();
        assert_eq!(engine().hash("9876543210"), other.hash("9876543210"));
    }

    #[test]
    fn test_encrypt_and_hash_pairs_share_hash() {
        let engine = engine();
        let first = engine.encrypt_and_hash("9876543210").unwrap();
        let second = engine.encrypt_and_hash("9876543210").unwrap();

        assert_eq!(first.search_hash, second.search_hash);
        assert_ne!(first.ciphertext, second.ciphertext);
        assert_eq!(first.search_hash, engine.hash("9876543210"));
        assert_eq!(engine.decrypt(&first.ciphertext).unwrap(), "9876543210");
    }

    #[test]
    fn test_rejects_wrong_key_length() {
        for len in [0usize, 16, 31, 33, 64] {
            let material = vec![7u8; len];
            assert!(matches!(
                EncryptionEngine::new(&material),
                Err(CryptoError::InvalidKeyLength { expected: 32, actual }) if actual == len
            ));
        }
    }

    #[test]
    fn test_tampered_ciphertext_fails() {
        let engine = engine();
        let mut blob = STANDARD.decode(engine.encrypt("9876543210").unwrap()).unwrap();
        let last = blob.len() - 1;
        blob[last] ^= 0x01;
        let tampered = STANDARD.encode(blob);
        assert!(matches!(
            engine.decrypt(&tampered),
            Err(CryptoError::DecryptionFailure(_))
        ));
    }

    #[test]
    fn test_wrong_key_fails() {
        let ciphertext = engine().encrypt("9876543210").unwrap();
        let other = EncryptionEngine::new(b"fedcba9876543210fedcba9876543210").unwrap();
        assert!(matches!(
            other.decrypt(&ciphertext),
            Err(CryptoError::DecryptionFailure(_))
        ));
    }

    #[test]
    fn test_malformed_blobs_fail() {
        let engine = engine();
        assert!(matches!(
            engine.decrypt("not base64!"),
            Err(CryptoError::DecryptionFailure(_))
        ));
        let short = STANDARD.encode([0u8; NONCE_SIZE + TAG_SIZE - 1]);
        assert!(matches!(
            engine.decrypt(&short),
            Err(CryptoError::DecryptionFailure(_))
        ));
    }

    #[test]
    fn test_debug_hides_key() {
        let rendered = format!("{:?}", engine());
        assert!(!rendered.contains("0123456789abcdef"));
    }
}
