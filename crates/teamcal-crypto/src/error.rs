//! Error types for the crypto module.

use thiserror::Error;

/// Errors that can occur while sealing or opening records.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CryptoError {
    /// The authentication tag did not verify: tampering or wrong key.
    #[error("integrity check failed")]
    Integrity,

    /// The record is not `iv:tag:ciphertext` with well-formed components.
    #[error("malformed sealed record: {0}")]
    Format(String),

    /// Key material is missing or has the wrong shape.
    #[error("invalid key: {0}")]
    InvalidKey(String),

    /// Encryption failed.
    #[error("encryption error: {0}")]
    Encryption(String),

    /// A sealed payload did not (de)serialize.
    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Result type for crypto operations.
pub type Result<T> = std::result::Result<T, CryptoError>;
