//! # teamcal
//!
//! The unified API for teamcal: a team calendar with owner-only private
//! events and layered edit/delete authorization.
//!
//! ## Overview
//!
//! - **Private events**: title and description sealed under the owner's
//!   data key; everyone else sees a placeholder
//! - **Authorization**: ownership, then system role, then grouping admins,
//!   then explicit per-event grants
//! - **Teams**: a tree of teams whose members can be invited to events
//! - **Activity log**: an audit trail of every mutation
//!
//! ## Key Concepts
//!
//! - **Session**: who is calling. Roles are never taken from it; they are
//!   read from storage on every check.
//! - **Private event**: a single-owner secret. Not even a system admin can
//!   read, edit, or delete someone else's.
//! - **Grouping**: a tag. Its admins may edit and delete every public event
//!   it tags.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use teamcal::{Calendar, CalendarConfig, NewEvent, Session};
//! use teamcal::crypto::{KeyEnvelope, MasterKey};
//! use teamcal::store::{SqliteStore, Store};
//!
//! async fn example() {
//!     let store = SqliteStore::open("calendar.db").unwrap();
//!     let envelope = KeyEnvelope::new(MasterKey::from_env().unwrap());
//!     let calendar = Calendar::new(store, envelope, CalendarConfig::default());
//!
//!     let alice = calendar
//!         .register_user("alice@example.com", "Alice", "<argon2 hash>")
//!         .await
//!         .unwrap();
//!     let session = Session::user(alice.id);
//!
//!     let event = calendar
//!         .create_event(&session, NewEvent::new("Dentist", 0, 3_600_000).private())
//!         .await
//!         .unwrap();
//!     assert_eq!(event.title, "Dentist");
//!
//!     let stored = calendar.store().get_event(&event.id).await.unwrap().unwrap();
//!     assert_eq!(stored.title, "Private Event");
//! }
//! ```
//!
//! ## Re-exports
//!
//! This crate re-exports the component crates for convenience:
//!
//! - `teamcal::core` - Domain records and identifiers
//! - `teamcal::crypto` - Field codec and key envelopes
//! - `teamcal::store` - Storage abstraction and SQLite
//! - `teamcal::access` - Confidentiality gate, resolver, team expansion

pub mod activity;
pub mod attendees;
pub mod calendar;
pub mod config;
pub mod error;
pub mod groupings;
pub mod session;
pub mod sharing;
pub mod teams;
pub mod types;

// Re-export component crates
pub use teamcal_access as access;
pub use teamcal_core as core;
pub use teamcal_crypto as crypto;
pub use teamcal_store as store;

// Re-export main types for convenience
pub use calendar::Calendar;
pub use config::CalendarConfig;
pub use error::{CalendarError, Result};
pub use session::Session;
pub use types::{
    ActivityFilter, EventFilter, EventPatch, EventView, NewEvent, OutOfOffice, PermissionGrant,
};

// Re-export commonly used types from the component crates
pub use teamcal_access::{Decision, EventCapabilities};
pub use teamcal_core::{
    AttendeeStatus, Event, EventId, EventType, GroupingId, Role, TeamId, TimeRange, User, UserId,
};
