//! Error types for the calendar.

use teamcal_access::AccessError;
use teamcal_core::{CoreError, UserId};
use teamcal_crypto::CryptoError;
use teamcal_store::StoreError;
use thiserror::Error;

/// Errors returned by [`Calendar`](crate::Calendar) operations.
#[derive(Debug, Error)]
pub enum CalendarError {
    /// The caller has no identity.
    #[error("unauthorized")]
    Unauthorized,

    /// The caller is known but lacks the capability.
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// The owner's data key cannot be recovered, so private content cannot
    /// be written.
    #[error("data key unavailable for user {0}")]
    KeyUnavailable(UserId),

    /// A referenced record does not exist.
    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    /// Sealing or opening failed outside the degrade-on-read path.
    #[error("crypto error: {0}")]
    Crypto(#[from] CryptoError),

    /// Input failed validation.
    #[error("invalid input: {0}")]
    Invalid(#[from] CoreError),

    /// Another account already uses this email.
    #[error("email already registered: {0}")]
    EmailTaken(String),

    /// Startup configuration is missing or malformed.
    #[error("configuration error: {0}")]
    Config(String),

    /// Storage error.
    #[error("storage error: {0}")]
    Store(#[from] StoreError),
}

impl CalendarError {
    pub(crate) fn not_found(kind: &'static str, id: impl ToString) -> Self {
        CalendarError::NotFound {
            kind,
            id: id.to_string(),
        }
    }

    pub(crate) fn forbidden(reason: impl Into<String>) -> Self {
        CalendarError::Forbidden(reason.into())
    }
}

impl From<AccessError> for CalendarError {
    fn from(err: AccessError) -> Self {
        match err {
            AccessError::KeyUnavailable(user_id) => CalendarError::KeyUnavailable(user_id),
            AccessError::Crypto(e) => CalendarError::Crypto(e),
            AccessError::Store(e) => CalendarError::Store(e),
        }
    }
}

/// Result type for calendar operations.
pub type Result<T> = std::result::Result<T, CalendarError>;
