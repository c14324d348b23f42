//! Error types for the teamcal core.

use thiserror::Error;

/// Errors raised while validating or decoding domain records.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CoreError {
    #[error("event must end after it starts (start {start}, end {end})")]
    InvalidTimeRange { start: i64, end: i64 },

    #[error("event title must not be empty")]
    EmptyTitle,

    #[error("{0} name must not be empty")]
    EmptyName(&'static str),

    #[error("invalid colour code: {0}")]
    InvalidColor(String),

    #[error("invalid email address: {0}")]
    InvalidEmail(String),

    #[error("unknown role: {0}")]
    UnknownRole(String),

    #[error("unknown event type: {0}")]
    UnknownEventType(String),

    #[error("unknown attendee status: {0}")]
    UnknownAttendeeStatus(String),
}

/// Result type for core operations.
pub type Result<T> = std::result::Result<T, CoreError>;
