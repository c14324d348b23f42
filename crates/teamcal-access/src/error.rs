//! Error types for the access module.

use teamcal_core::UserId;
use teamcal_crypto::CryptoError;
use teamcal_store::StoreError;
use thiserror::Error;

/// Errors that can occur while sealing, revealing or authorizing.
#[derive(Debug, Error)]
pub enum AccessError {
    /// The owner has no usable key envelope, so a private payload cannot
    /// be sealed.
    #[error("no usable data key for user {0}")]
    KeyUnavailable(UserId),

    /// Cryptographic failure outside the degrade-on-read path.
    #[error("crypto error: {0}")]
    Crypto(#[from] CryptoError),

    /// Storage error.
    #[error("storage error: {0}")]
    Store(#[from] StoreError),
}

/// Result type for access operations.
pub type Result<T> = std::result::Result<T, AccessError>;
