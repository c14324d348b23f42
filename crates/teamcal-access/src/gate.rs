//! Event confidentiality gate.
//!
//! Decides which event fields are sealed on write and who may see them on
//! read. Private events are single-owner secrets: only the owner's data key
//! can open the payload, and nobody else ever receives `encrypted_data`.

use std::sync::Arc;

use teamcal_core::{Event, User, UserId};
use teamcal_crypto::{CryptoError, KeyEnvelope, UserKey};
use teamcal_store::Store;

use crate::error::{AccessError, Result};
use crate::payload::EventPayload;

/// Default decoy title stored in place of a private event's real title.
pub const DEFAULT_PLACEHOLDER: &str = "Private Event";

/// Event fields as they should be persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredFields {
    pub title: String,
    pub description: String,
    pub encrypted_data: Option<String>,
}

/// Applies the sealing policy on writes and the unsealing policy on reads.
#[derive(Debug, Clone)]
pub struct ConfidentialityGate {
    envelope: Arc<KeyEnvelope>,
    placeholder: String,
}

impl ConfidentialityGate {
    pub fn new(envelope: Arc<KeyEnvelope>) -> Self {
        Self::with_placeholder(envelope, DEFAULT_PLACEHOLDER)
    }

    pub fn with_placeholder(envelope: Arc<KeyEnvelope>, placeholder: impl Into<String>) -> Self {
        Self {
            envelope,
            placeholder: placeholder.into(),
        }
    }

    /// The decoy title used for private events.
    pub fn placeholder(&self) -> &str {
        &self.placeholder
    }

    /// Recover `owner`'s data key from their envelope.
    ///
    /// A missing or unreadable envelope means the account cannot hold
    /// private content.
    pub fn owner_key(&self, owner: &User) -> Result<UserKey> {
        let envelope = owner
            .encrypted_private_key
            .as_deref()
            .ok_or(AccessError::KeyUnavailable(owner.id))?;
        self.envelope.unveil(envelope).map_err(|e| {
            tracing::warn!(user_id = %owner.id, error = %e, "user key envelope unreadable");
            AccessError::KeyUnavailable(owner.id)
        })
    }

    /// Write transform.
    ///
    /// Public content passes through. Private content is sealed under the
    /// owner's key and the visible columns are replaced by the placeholder.
    /// Fails with [`AccessError::KeyUnavailable`] rather than ever storing
    /// private content in the clear.
    pub fn seal_fields(
        &self,
        owner: &User,
        title: &str,
        description: &str,
        is_private: bool,
    ) -> Result<StoredFields> {
        if !is_private {
            return Ok(StoredFields {
                title: title.to_string(),
                description: description.to_string(),
                encrypted_data: None,
            });
        }

        let key = self.owner_key(owner)?;
        let sealed = EventPayload::new(title, description).seal(&key)?;
        Ok(StoredFields {
            title: self.placeholder.clone(),
            description: String::new(),
            encrypted_data: Some(sealed),
        })
    }

    /// Decrypt a private event's payload with the owner's key.
    pub fn open_payload(&self, event: &Event, owner: &User) -> Result<EventPayload> {
        let record = event
            .encrypted_data
            .as_deref()
            .ok_or_else(|| CryptoError::Format("private event has no sealed payload".into()))?;
        let key = self.owner_key(owner)?;
        Ok(EventPayload::open(record, &key)?)
    }

    /// Read transform with the owner already loaded.
    ///
    /// `owner` is consulted only when `viewer` owns the event. The returned
    /// event never carries `encrypted_data`. Unreadable payloads degrade to
    /// placeholder content.
    pub fn reveal_with_owner(
        &self,
        mut event: Event,
        viewer: Option<&UserId>,
        owner: Option<&User>,
    ) -> Event {
        if !event.is_private {
            event.encrypted_data = None;
            return event;
        }

        let sealed = event.encrypted_data.take();
        let is_owner = viewer.map_or(false, |v| event.is_owned_by(v));
        if !is_owner {
            return self.mask(event);
        }

        let opened = match (sealed.as_deref(), owner) {
            (Some(record), Some(owner)) => self
                .owner_key(owner)
                .and_then(|key| EventPayload::open(record, &key).map_err(AccessError::from)),
            (None, _) => Err(CryptoError::Format("private event has no sealed payload".into()).into()),
            (_, None) => Err(AccessError::KeyUnavailable(event.user_id)),
        };

        match opened {
            Ok(payload) => {
                event.title = payload.title;
                event.description = payload.description;
                event
            }
            Err(e) => {
                tracing::warn!(
                    event_id = %event.id,
                    error = %e,
                    "private event unreadable, returning placeholder"
                );
                self.mask(event)
            }
        }
    }

    /// Read transform.
    ///
    /// Loads the owner's envelope from `store` only when the viewer owns the
    /// event. Only storage failures are returned as errors.
    pub async fn reveal<S>(&self, store: &S, event: Event, viewer: Option<&UserId>) -> Result<Event>
    where
        S: Store + ?Sized,
    {
        let needs_owner = event.is_private && viewer.map_or(false, |v| event.is_owned_by(v));
        let owner = if needs_owner {
            store.get_user(&event.user_id).await?
        } else {
            None
        };
        Ok(self.reveal_with_owner(event, viewer, owner.as_ref()))
    }

    fn mask(&self, mut event: Event) -> Event {
        event.title = self.placeholder.clone();
        event.description = String::new();
        event.encrypted_data = None;
        event
    }
}
