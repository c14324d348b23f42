//! # teamcal Testkit
//!
//! Testing utilities for teamcal.
//!
//! ## Overview
//!
//! This crate provides:
//!
//! - **Fixtures**: a calendar over a fresh store with an admin and a few
//!   ordinary users already registered
//! - **Generators**: Proptest strategies for event content, time windows
//!   and key material
//!
//! ## Test Fixtures
//!
//! ```rust
//! use teamcal_testkit::CalendarFixture;
//! use teamcal::NewEvent;
//!
//! # tokio_test_block(async {
//! let fx = CalendarFixture::new(2).await;
//! let event = fx
//!     .calendar
//!     .create_event(&fx.session(0), NewEvent::new("Standup", 0, 900_000))
//!     .await
//!     .unwrap();
//! assert_eq!(event.user_id, fx.users[0].id);
//! # });
//! # fn tokio_test_block<F: std::future::Future>(f: F) -> F::Output {
//! #     tokio::runtime::Builder::new_current_thread().build().unwrap().block_on(f)
//! # }
//! ```
//!
//! ## Property Testing
//!
//! ```rust,ignore
//! use proptest::prelude::*;
//! use teamcal_testkit::generators::{event_text, user_key};
//!
//! proptest! {
//!     #[test]
//!     fn sealed_payload_opens(key in user_key(), text in event_text()) {
//!         // ...
//!     }
//! }
//! ```

pub mod fixtures;
pub mod generators;

pub use fixtures::CalendarFixture;
pub use generators::{
    event_text, event_type, master_key, time_window, user_key, NewEventParams,
};
