//! Symmetric key material.
//!
//! Both key kinds are 256-bit AES keys, zeroized on drop and redacted in
//! `Debug` output.

use std::fmt;

use rand::RngCore;
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

use crate::error::{CryptoError, Result};

/// Length of every symmetric key, in bytes.
pub const KEY_LEN: usize = 32;

/// Environment variable holding the hex-encoded master key.
pub const MASTER_KEY_ENV: &str = "SYSTEM_MASTER_KEY";

fn decode_key_hex(hex_str: &str) -> Result<[u8; KEY_LEN]> {
    let bytes = Zeroizing::new(
        hex::decode(hex_str.trim()).map_err(|e| CryptoError::InvalidKey(e.to_string()))?,
    );
    if bytes.len() != KEY_LEN {
        return Err(CryptoError::InvalidKey(format!(
            "expected {} bytes, got {}",
            KEY_LEN,
            bytes.len()
        )));
    }
    let mut arr = [0u8; KEY_LEN];
    arr.copy_from_slice(&bytes);
    Ok(arr)
}

fn random_key() -> [u8; KEY_LEN] {
    let mut bytes = [0u8; KEY_LEN];
    rand::rngs::OsRng.fill_bytes(&mut bytes);
    bytes
}

/// The process-wide key that envelopes user keys.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct MasterKey([u8; KEY_LEN]);

impl MasterKey {
    /// Create from raw bytes.
    pub fn from_bytes(bytes: [u8; KEY_LEN]) -> Self {
        Self(bytes)
    }

    /// Parse a 64-character hex string.
    pub fn from_hex(hex_str: &str) -> Result<Self> {
        decode_key_hex(hex_str).map(Self)
    }

    /// Load from [`MASTER_KEY_ENV`].
    pub fn from_env() -> Result<Self> {
        let value = Zeroizing::new(std::env::var(MASTER_KEY_ENV).map_err(|_| {
            CryptoError::InvalidKey(format!("{} is not set", MASTER_KEY_ENV))
        })?);
        Self::from_hex(&value)
    }

    /// Generate a random master key. Intended for tests and first-run setup.
    pub fn generate() -> Self {
        Self(random_key())
    }

    /// Get the raw bytes.
    pub fn as_bytes(&self) -> &[u8; KEY_LEN] {
        &self.0
    }
}

impl fmt::Debug for MasterKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("MasterKey(<redacted>)")
    }
}

/// A user's data key. Seals that user's private event payloads.
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct UserKey([u8; KEY_LEN]);

impl UserKey {
    /// Generate fresh random key material.
    pub fn generate() -> Self {
        Self(random_key())
    }

    /// Create from raw bytes.
    pub fn from_bytes(bytes: [u8; KEY_LEN]) -> Self {
        Self(bytes)
    }

    /// Parse a 64-character hex string.
    pub fn from_hex(hex_str: &str) -> Result<Self> {
        decode_key_hex(hex_str).map(Self)
    }

    /// Lowercase hex form, wiped when dropped.
    pub fn to_hex(&self) -> Zeroizing<String> {
        Zeroizing::new(hex::encode(self.0))
    }

    /// Get the raw bytes.
    pub fn as_bytes(&self) -> &[u8; KEY_LEN] {
        &self.0
    }
}

impl fmt::Debug for UserKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("UserKey(<redacted>)")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_master_key_from_hex() {
        let key = MasterKey::from_hex(&"ab".repeat(32)).unwrap();
        assert_eq!(key.as_bytes(), &[0xab; 32]);
    }

    #[test]
    fn test_master_key_rejects_short_hex() {
        let err = MasterKey::from_hex("abcd").unwrap_err();
        assert!(matches!(err, CryptoError::InvalidKey(_)));
    }

    #[test]
    fn test_master_key_rejects_non_hex() {
        assert!(MasterKey::from_hex(&"zz".repeat(32)).is_err());
    }

    #[test]
    fn test_user_key_hex_roundtrip() {
        let key = UserKey::generate();
        let hex = key.to_hex();
        assert_eq!(hex.len(), 64);
        assert_eq!(UserKey::from_hex(&hex).unwrap(), key);
    }

    #[test]
    fn test_generated_keys_differ() {
        assert_ne!(UserKey::generate(), UserKey::generate());
    }

    #[test]
    fn test_debug_is_redacted() {
        let key = UserKey::from_bytes([0x42; 32]);
        let debug = format!("{:?}", key);
        assert!(!debug.contains("42"));
        assert_eq!(format!("{:?}", MasterKey::generate()), "MasterKey(<redacted>)");
    }
}
