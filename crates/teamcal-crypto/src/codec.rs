//! Field encryption codec.
//!
//! AES-256-GCM with a fresh random 96-bit nonce per call. The persisted form
//! is three hex components joined by `:`:
//!
//! ```text
//! <ivHex>:<authTagHex>:<ciphertextHex>
//! ```
//!
//! The ciphertext component may be empty (empty plaintext); the other two
//! have fixed lengths. Structure is checked before any decryption attempt.

use std::fmt;
use std::str::FromStr;

use aes_gcm::{
    aead::{AeadInPlace, KeyInit},
    Aes256Gcm, Nonce, Tag,
};
use rand::RngCore;

use crate::error::{CryptoError, Result};
use crate::keys::KEY_LEN;

/// Nonce length in bytes.
pub const NONCE_LEN: usize = 12;

/// Authentication tag length in bytes.
pub const TAG_LEN: usize = 16;

/// Component separator in the persisted form.
pub const SEPARATOR: char = ':';

/// A parsed `iv:tag:ciphertext` record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SealedRecord {
    pub nonce: [u8; NONCE_LEN],
    pub tag: [u8; TAG_LEN],
    pub ciphertext: Vec<u8>,
}

impl SealedRecord {
    /// Encrypt `plaintext` under `key` with a fresh nonce.
    pub fn seal(plaintext: &[u8], key: &[u8; KEY_LEN]) -> Result<Self> {
        let cipher = Aes256Gcm::new_from_slice(key)
            .map_err(|e| CryptoError::InvalidKey(e.to_string()))?;

        let mut nonce = [0u8; NONCE_LEN];
        rand::rngs::OsRng.fill_bytes(&mut nonce);

        let mut ciphertext = plaintext.to_vec();
        let tag = cipher
            .encrypt_in_place_detached(Nonce::from_slice(&nonce), b"", &mut ciphertext)
            .map_err(|e| CryptoError::Encryption(e.to_string()))?;

        let mut tag_bytes = [0u8; TAG_LEN];
        tag_bytes.copy_from_slice(tag.as_slice());

        Ok(Self {
            nonce,
            tag: tag_bytes,
            ciphertext,
        })
    }

    /// Decrypt with `key`, verifying the tag.
    pub fn open(&self, key: &[u8; KEY_LEN]) -> Result<Vec<u8>> {
        let cipher = Aes256Gcm::new_from_slice(key)
            .map_err(|e| CryptoError::InvalidKey(e.to_string()))?;

        let mut buffer = self.ciphertext.clone();
        cipher
            .decrypt_in_place_detached(
                Nonce::from_slice(&self.nonce),
                b"",
                &mut buffer,
                Tag::from_slice(&self.tag),
            )
            .map_err(|_| CryptoError::Integrity)?;

        Ok(buffer)
    }

    /// Render the persisted `iv:tag:ciphertext` form.
    pub fn encode(&self) -> String {
        format!(
            "{}{sep}{}{sep}{}",
            hex::encode(self.nonce),
            hex::encode(self.tag),
            hex::encode(&self.ciphertext),
            sep = SEPARATOR
        )
    }

    /// Parse the persisted form.
    ///
    /// Fails with [`CryptoError::Format`] unless there are exactly three
    /// hex components with a 12-byte nonce and a 16-byte tag.
    pub fn parse(record: &str) -> Result<Self> {
        let parts: Vec<&str> = record.split(SEPARATOR).collect();
        let [iv_hex, tag_hex, ct_hex] = parts.as_slice() else {
            return Err(CryptoError::Format(format!(
                "expected 3 components, found {}",
                parts.len()
            )));
        };

        let nonce = decode_fixed::<NONCE_LEN>(iv_hex, "iv")?;
        let tag = decode_fixed::<TAG_LEN>(tag_hex, "auth tag")?;
        let ciphertext = hex::decode(ct_hex)
            .map_err(|e| CryptoError::Format(format!("ciphertext: {}", e)))?;

        Ok(Self {
            nonce,
            tag,
            ciphertext,
        })
    }
}

fn decode_fixed<const N: usize>(component: &str, name: &str) -> Result<[u8; N]> {
    let bytes =
        hex::decode(component).map_err(|e| CryptoError::Format(format!("{}: {}", name, e)))?;
    bytes.try_into().map_err(|b: Vec<u8>| {
        CryptoError::Format(format!("{}: expected {} bytes, got {}", name, N, b.len()))
    })
}

impl fmt::Display for SealedRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.encode())
    }
}

impl FromStr for SealedRecord {
    type Err = CryptoError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

/// Seal `plaintext` under `key` and return the persisted form.
pub fn seal(plaintext: &[u8], key: &[u8; KEY_LEN]) -> Result<String> {
    SealedRecord::seal(plaintext, key).map(|record| record.encode())
}

/// Parse a persisted record and decrypt it with `key`.
pub fn open(record: &str, key: &[u8; KEY_LEN]) -> Result<Vec<u8>> {
    SealedRecord::parse(record)?.open(key)
}
