//! # teamcal Store
//!
//! Storage abstraction for teamcal. Provides a trait-based interface for
//! calendar persistence with SQLite and in-memory implementations.
//!
//! ## Overview
//!
//! The store abstracts users, events, groupings, teams, attendees and the
//! activity log behind the [`Store`] trait, so the access rules and the
//! calendar facade never touch SQL. The primary implementation is
//! [`SqliteStore`], with [`MemoryStore`] for testing.
//!
//! ## Key Types
//!
//! - [`Store`] - The async trait for all storage operations
//! - [`SqliteStore`] - SQLite-based persistent storage
//! - [`MemoryStore`] - In-memory storage for tests
//! - [`EventQuery`] - Range and tag filter for event listings
//! - [`EventUpdate`] - Tag and sharing changes written with an event row
//! - [`InsertResult`] - Result of an insert-if-absent
//!
//! ## Usage
//!
//! ```rust,no_run
//! use teamcal_store::{EventQuery, SqliteStore, Store};
//! use teamcal_core::TimeRange;
//!
//! async fn example() -> teamcal_store::Result<()> {
//!     let store = SqliteStore::open("calendar.db")?;
//!
//!     let week = TimeRange::new(1_700_000_000_000, 1_700_604_800_000);
//!     let events = store.list_events(&EventQuery::in_range(week)).await?;
//!     println!("{} events this week", events.len());
//!     Ok(())
//! }
//! ```
//!
//! ## Design Notes
//!
//! - **Stored, not decided**: the store persists whatever it is given; the
//!   confidentiality and authorization rules live in `teamcal-access`
//! - **Cascades**: deleting a user, event or grouping removes dependent rows
//! - **Atomic event writes**: an event row, its tags and any sharing
//!   cleanup are written together or not at all
//! - **Idempotent membership**: re-adding a member, attendee or group admin
//!   returns `AlreadyExists`

pub mod error;
pub mod memory;
pub mod migration;
pub mod sqlite;
pub mod traits;

pub use error::{Result, StoreError};
pub use memory::MemoryStore;
pub use sqlite::SqliteStore;
pub use traits::{ActivityQuery, EventQuery, EventUpdate, InsertResult, Store};
