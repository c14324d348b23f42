//! # teamcal Core
//!
//! Pure domain types for the teamcal scheduling system: identifiers, users,
//! events, groupings, teams, and attendees.
//!
//! This crate contains no I/O, no storage, no cryptography. Storage lives in
//! `teamcal-store`, encryption in `teamcal-crypto`, and the access rules in
//! `teamcal-access`.
//!
//! ## Key Types
//!
//! - [`User`] - An account with a role and an enveloped data key
//! - [`Event`] - A scheduled interval, possibly private (sealed)
//! - [`Grouping`] - A tag that can be attached to events
//! - [`Team`] / [`TeamMember`] - A tree of teams with flat membership
//! - [`EventAttendee`] - An invitation to a public event
//!
//! ## Time
//!
//! All timestamps are Unix milliseconds (`i64`). See [`TimeRange`].

pub mod error;
pub mod model;
pub mod time;
pub mod types;
pub mod validation;

pub use error::{CoreError, Result};
pub use model::{
    ActivityEntry, AttendeeStatus, Event, EventAttendee, EventPermission, EventType, GroupAdmin,
    Grouping, Role, Team, TeamMember, User,
};
pub use time::{now_millis, TimeRange};
pub use types::{ActivityId, EventId, GroupingId, TeamId, UserId};
pub use validation::{
    validate_color, validate_email, validate_event_times, validate_name, validate_title,
};
