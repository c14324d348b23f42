//! Key envelope service.
//!
//! Wraps user data keys under the process-wide master key. The envelope
//! plaintext is the user key's lowercase hex string, so stored envelopes
//! stay readable by earlier deployments that used the same layout.

use std::fmt;

use zeroize::Zeroizing;

use crate::codec::SealedRecord;
use crate::error::{CryptoError, Result};
use crate::keys::{MasterKey, UserKey};

/// Envelopes and unveils user keys with the master key.
///
/// Constructed once at startup and shared read-only by every request.
pub struct KeyEnvelope {
    master: MasterKey,
}

impl KeyEnvelope {
    /// Create a service around an already-loaded master key.
    pub fn new(master: MasterKey) -> Self {
        Self { master }
    }

    /// Load the master key from the environment.
    pub fn from_env() -> Result<Self> {
        MasterKey::from_env().map(Self::new)
    }

    /// Produce fresh 256-bit key material for a new account.
    pub fn generate_user_key() -> UserKey {
        UserKey::generate()
    }

    /// Encrypt a user key under the master key.
    pub fn envelope(&self, key: &UserKey) -> Result<String> {
        let hex_key = key.to_hex();
        SealedRecord::seal(hex_key.as_bytes(), self.master.as_bytes()).map(|r| r.encode())
    }

    /// Recover a user key from its envelope.
    ///
    /// Fails with [`CryptoError::Integrity`] on tampering or when the
    /// envelope was made under a different master key.
    pub fn unveil(&self, envelope: &str) -> Result<UserKey> {
        let record = SealedRecord::parse(envelope)?;
        let plaintext = Zeroizing::new(record.open(self.master.as_bytes())?);
        let hex_key = std::str::from_utf8(&plaintext)
            .map_err(|_| CryptoError::InvalidKey("enveloped key is not UTF-8".into()))?;
        UserKey::from_hex(hex_key)
    }

    /// Generate a new user key and return it with its envelope.
    pub fn provision(&self) -> Result<(UserKey, String)> {
        let key = Self::generate_user_key();
        let envelope = self.envelope(&key)?;
        Ok((key, envelope))
    }
}

impl fmt::Debug for KeyEnvelope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyEnvelope").finish_non_exhaustive()
    }
}
