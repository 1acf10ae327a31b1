//! Sealing of per-agent secrets.
//!
//! Each registered agent gets a random secret that authorizes later
//! deployments. Only the sealed form is persisted on the network:
//! AES-256-GCM under the backend master key, encoded as
//! `base64(nonce):base64(ciphertext)`.

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Nonce};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use rand::RngCore;
use thiserror::Error;

/// Nonce length in bytes (96 bits for AES-GCM)
const NONCE_LENGTH: usize = 12;

/// Key length in bytes (256 bits for AES-256)
const KEY_LENGTH: usize = 32;

#[derive(Debug, Error)]
pub enum SecretError {
    #[error("Master key must be {KEY_LENGTH} bytes of hex")]
    InvalidKey,

    #[error("Encryption failed: {0}")]
    EncryptionFailed(String),

    #[error("Decryption failed: {0}")]
    DecryptionFailed(String),

    #[error("Invalid sealed format: {0}")]
    InvalidFormat(String),

    #[error("Invalid base64: {0}")]
    InvalidBase64(#[from] base64::DecodeError),
}

/// Seals and opens agent secrets under the backend master key
pub struct SecretSealer {
    key: [u8; KEY_LENGTH],
}

impl SecretSealer {
    pub fn from_hex(hex_key: &str) -> Result<Self, SecretError> {
        let bytes = hex::decode(hex_key).map_err(|_| SecretError::InvalidKey)?;
        let key: [u8; KEY_LENGTH] = bytes.try_into().map_err(|_| SecretError::InvalidKey)?;
        Ok(SecretSealer { key })
    }

    pub fn seal(&self, plaintext: &str) -> Result<String, SecretError> {
        let cipher = Aes256Gcm::new(&self.key.into());

        let mut nonce_bytes = [0u8; NONCE_LENGTH];
        rand::thread_rng().fill_bytes(&mut nonce_bytes);
        let nonce = Nonce::from_slice(&nonce_bytes);

        let ciphertext = cipher
            .encrypt(nonce, plaintext.as_bytes())
            .map_err(|e| SecretError::EncryptionFailed(e.to_string()))?;

        Ok(format!(
            "{}:{}",
            BASE64.encode(nonce_bytes),
            BASE64.encode(ciphertext)
        ))
    }

    pub fn open(&self, sealed: &str) -> Result<String, SecretError> {
        let (nonce_part, ciphertext_part) = sealed
            .split_once(':')
            .ok_or_else(|| SecretError::InvalidFormat("missing nonce separator".to_string()))?;

        let nonce_bytes = BASE64.decode(nonce_part)?;
        if nonce_bytes.len() != NONCE_LENGTH {
            return Err(SecretError::InvalidFormat(format!(
                "nonce must be {} bytes",
                NONCE_LENGTH
            )));
        }
        let ciphertext = BASE64.decode(ciphertext_part)?;

        let cipher = Aes256Gcm::new(&self.key.into());
        let plaintext = cipher
            .decrypt(Nonce::from_slice(&nonce_bytes), ciphertext.as_ref())
            .map_err(|e| SecretError::DecryptionFailed(e.to_string()))?;

        String::from_utf8(plaintext)
            .map_err(|e| SecretError::DecryptionFailed(e.to_string()))
    }
}
