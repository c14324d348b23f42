//! The sealed event payload.

use serde::{Deserialize, Serialize};
use teamcal_crypto::{codec, CryptoError, UserKey};

/// Plaintext content of a private event before sealing.
///
/// Serialized as compact JSON with exactly these two fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventPayload {
    pub title: String,
    #[serde(default)]
    pub description: String,
}

impl EventPayload {
    pub fn new(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            description: description.into(),
        }
    }

    /// Serialize and seal under `key`, returning the `iv:tag:ct` record.
    pub fn seal(&self, key: &UserKey) -> Result<String, CryptoError> {
        let json =
            serde_json::to_vec(self).map_err(|e| CryptoError::Serialization(e.to_string()))?;
        codec::seal(&json, key.as_bytes())
    }

    /// Open an `iv:tag:ct` record with `key` and deserialize it.
    pub fn open(record: &str, key: &UserKey) -> Result<Self, CryptoError> {
        let json = codec::open(record, key.as_bytes())?;
        serde_json::from_slice(&json).map_err(|e| CryptoError::Serialization(e.to_string()))
    }
}
