//! # teamcal Access
//!
//! Who may see and change what.
//!
//! ## Overview
//!
//! - [`ConfidentialityGate`] seals private event content on write and
//!   reveals it on read, only ever to the owner
//! - [`AuthorizationResolver`] decides edit/delete rights through an
//!   ordered rule list and returns a tagged [`Decision`]
//! - [`expand_teams`] resolves teams (and their descendants) into members
//!   for attendee invitation; [`expand_teams_visible_to`] hides private
//!   teams the viewer does not belong to
//!
//! ## Private events
//!
//! A private event is a single-owner secret. Its title and description are
//! sealed under the owner's data key; everyone else, system admins
//! included, sees the placeholder and cannot edit or delete it.
//!
//! ```rust
//! use std::sync::Arc;
//! use teamcal_access::{ConfidentialityGate, DEFAULT_PLACEHOLDER};
//! use teamcal_crypto::{KeyEnvelope, MasterKey};
//!
//! let gate = ConfidentialityGate::new(Arc::new(KeyEnvelope::new(MasterKey::generate())));
//! assert_eq!(gate.placeholder(), DEFAULT_PLACEHOLDER);
//! ```

pub mod error;
pub mod gate;
pub mod payload;
pub mod resolver;
pub mod teams;

pub use error::{AccessError, Result};
pub use gate::{ConfidentialityGate, StoredFields, DEFAULT_PLACEHOLDER};
pub use payload::EventPayload;
pub use resolver::{
    AllowReason, AuthorizationResolver, Capability, Decision, DenyReason, EventCapabilities, Rule,
    RULES,
};
pub use teams::{expand_team_user_ids, expand_teams, expand_teams_visible_to, ExpandedMember};
