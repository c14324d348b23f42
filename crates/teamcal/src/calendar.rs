//! The Calendar: unified API for teamcal.
//!
//! Brings together storage, the confidentiality gate and the authorization
//! resolver. Every mutation re-derives the caller's rights from current
//! state before touching storage.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::json;
use teamcal_access::{
    AuthorizationResolver, Capability, ConfidentialityGate, EventCapabilities, EventPayload,
};
use teamcal_core::{
    now_millis, validate_email, validate_event_times, validate_title, Event, EventId, GroupingId,
    Role, TimeRange, User, UserId,
};
use teamcal_crypto::KeyEnvelope;
use teamcal_store::{EventQuery, EventUpdate, Store, StoreError};

use crate::config::CalendarConfig;
use crate::error::{CalendarError, Result};
use crate::session::Session;
use crate::types::{EventFilter, EventPatch, EventView, NewEvent, OutOfOffice};

/// The calendar facade.
///
/// Provides a unified API for:
/// - Registering users and managing roles
/// - Creating, updating, deleting and listing events
/// - Granting per-event permissions and assigning group admins
/// - Managing groupings, teams and attendees
/// - Reading the activity log
pub struct Calendar<S: Store> {
    pub(crate) store: Arc<S>,
    pub(crate) envelope: Arc<KeyEnvelope>,
    pub(crate) gate: ConfidentialityGate,
    pub(crate) resolver: AuthorizationResolver<S>,
    pub(crate) config: CalendarConfig,
}

impl<S: Store> Calendar<S> {
    /// Create a calendar over `store`, sealing with keys from `envelope`.
    pub fn new(store: S, envelope: KeyEnvelope, config: CalendarConfig) -> Self {
        Self::with_shared(Arc::new(store), Arc::new(envelope), config)
    }

    /// Create a calendar sharing an existing store and envelope service.
    pub fn with_shared(store: Arc<S>, envelope: Arc<KeyEnvelope>, config: CalendarConfig) -> Self {
        let gate =
            ConfidentialityGate::with_placeholder(envelope.clone(), config.private_placeholder.clone());
        Self {
            resolver: AuthorizationResolver::new(store.clone()),
            store,
            envelope,
            gate,
            config,
        }
    }

    /// Create a calendar with the master key and settings from the
    /// environment. A missing or malformed master key is fatal.
    pub fn from_env(store: S) -> Result<Self> {
        let envelope = KeyEnvelope::from_env().map_err(|e| CalendarError::Config(e.to_string()))?;
        let config = CalendarConfig::from_env()?;
        Ok(Self::new(store, envelope, config))
    }

    /// Get the store reference.
    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn config(&self) -> &CalendarConfig {
        &self.config
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Shared lookups
    // ─────────────────────────────────────────────────────────────────────────

    pub(crate) async fn load_event(&self, id: &EventId) -> Result<Event> {
        self.store
            .get_event(id)
            .await?
            .ok_or_else(|| CalendarError::not_found("event", id))
    }

    pub(crate) async fn load_user(&self, id: &UserId) -> Result<User> {
        self.store
            .get_user(id)
            .await?
            .ok_or_else(|| CalendarError::not_found("user", id))
    }

    /// Whether `user_id` currently holds the system admin role.
    pub(crate) async fn is_system_admin(&self, user_id: &UserId) -> Result<bool> {
        Ok(self
            .store
            .get_user(user_id)
            .await?
            .map_or(false, |u| u.role.is_admin()))
    }

    pub(crate) async fn require_admin(&self, user_id: &UserId, action: &str) -> Result<()> {
        if self.is_system_admin(user_id).await? {
            Ok(())
        } else {
            Err(CalendarError::forbidden(format!(
                "only system admins can {}",
                action
            )))
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Users
    // ─────────────────────────────────────────────────────────────────────────

    /// Create an account with a fresh enveloped data key.
    ///
    /// Password hashing happens outside the calendar; `password_hash` is
    /// stored as given.
    pub async fn register_user(&self, email: &str, name: &str, password_hash: &str) -> Result<User> {
        let email = email.trim().to_lowercase();
        validate_email(&email)?;

        if self.store.get_user_by_email(&email).await?.is_some() {
            return Err(CalendarError::EmailTaken(email));
        }

        let (_, envelope) = self.envelope.provision()?;
        let now = now_millis();
        let user = User {
            id: UserId::new(),
            email,
            name: name.trim().to_string(),
            password_hash: password_hash.to_string(),
            role: Role::User,
            encrypted_private_key: Some(envelope),
            email_verified: false,
            created_at: now,
            updated_at: now,
        };

        match self.store.insert_user(&user).await {
            Ok(()) => {}
            Err(StoreError::Duplicate(_)) => return Err(CalendarError::EmailTaken(user.email)),
            Err(e) => return Err(e.into()),
        }

        tracing::info!(user_id = %user.id, "registered user");
        self.record(user.id, "register", "user", Some(user.id.to_string()), None)
            .await;
        Ok(user)
    }

    pub async fn get_user(&self, id: &UserId) -> Result<Option<User>> {
        Ok(self.store.get_user(id).await?)
    }

    /// All accounts. System admins only.
    pub async fn list_users(&self, session: &Session) -> Result<Vec<User>> {
        let caller = session.require()?;
        self.require_admin(&caller, "list users").await?;
        Ok(self.store.list_users().await?)
    }

    /// Promote or demote a user. System admins only.
    pub async fn set_user_role(&self, session: &Session, user_id: &UserId, role: Role) -> Result<()> {
        let caller = session.require()?;
        self.require_admin(&caller, "change roles").await?;

        if !self.store.set_user_role(user_id, role, now_millis()).await? {
            return Err(CalendarError::not_found("user", user_id));
        }

        tracing::info!(user_id = %user_id, role = role.as_str(), "changed user role");
        self.record(
            caller,
            "set_user_role",
            "user",
            Some(user_id.to_string()),
            Some(json!({ "role": role.as_str() })),
        )
        .await;
        Ok(())
    }

    /// Remove an account with its events, private groupings, grants,
    /// group-admin assignments, team memberships and invitations. System
    /// admins only, and never their own account.
    pub async fn delete_user(&self, session: &Session, user_id: &UserId) -> Result<()> {
        let caller = session.require()?;
        self.require_admin(&caller, "delete users").await?;
        if caller == *user_id {
            return Err(CalendarError::forbidden("admins cannot delete their own account"));
        }

        if !self.store.delete_user(user_id).await? {
            return Err(CalendarError::not_found("user", user_id));
        }

        tracing::info!(user_id = %user_id, "deleted user");
        self.record(caller, "delete_user", "user", Some(user_id.to_string()), None)
            .await;
        Ok(())
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Events
    // ─────────────────────────────────────────────────────────────────────────

    /// Create an event owned by the caller.
    ///
    /// Private content is sealed under the caller's data key before it is
    /// stored; if that key is unavailable the event is not created. Returns
    /// the event as its owner sees it.
    pub async fn create_event(&self, session: &Session, input: NewEvent) -> Result<Event> {
        let owner_id = session.require()?;
        validate_title(&input.title)?;
        validate_event_times(input.start_time, input.end_time)?;
        self.check_groupings_usable(&input.grouping_ids, &owner_id).await?;

        let fields = if input.is_private {
            let owner = self
                .store
                .get_user(&owner_id)
                .await?
                .ok_or(CalendarError::KeyUnavailable(owner_id))?;
            self.gate
                .seal_fields(&owner, &input.title, &input.description, true)?
        } else {
            teamcal_access::StoredFields {
                title: input.title.clone(),
                description: input.description.clone(),
                encrypted_data: None,
            }
        };

        let now = now_millis();
        let event = Event {
            id: EventId::new(),
            user_id: owner_id,
            title: fields.title,
            description: fields.description,
            start_time: input.start_time,
            end_time: input.end_time,
            is_private: input.is_private,
            is_out_of_office: input.is_out_of_office,
            event_type: input.event_type,
            encrypted_data: fields.encrypted_data,
            created_at: now,
            updated_at: now,
        };

        self.store.insert_event(&event, &input.grouping_ids).await?;

        tracing::debug!(event_id = %event.id, user_id = %owner_id, private = event.is_private, "created event");
        self.record(
            owner_id,
            "create_event",
            "event",
            Some(event.id.to_string()),
            Some(json!({
                "event_type": event.event_type.as_str(),
                "is_private": event.is_private,
            })),
        )
        .await;
        Ok(Event {
            title: input.title,
            description: input.description,
            encrypted_data: None,
            ..event
        })
    }

    /// Apply a partial update.
    ///
    /// Requires edit rights. Only the owner may change `is_private`. A
    /// private event's sealed payload is rebuilt from the merged title and
    /// description and replaced as a whole. Making an event private drops
    /// its explicit permissions and attendees. The row, its tags and that
    /// cleanup are written together. Returns the event as the caller sees
    /// it; an empty patch writes nothing.
    pub async fn update_event(
        &self,
        session: &Session,
        event_id: &EventId,
        patch: EventPatch,
    ) -> Result<Event> {
        let caller = session.require()?;
        let event = self.load_event(event_id).await?;

        let decision = self
            .resolver
            .decide_event(&event, &caller, Capability::Edit)
            .await?;
        if !decision.is_allowed() {
            return Err(CalendarError::forbidden("no permission to edit this event"));
        }
        if patch.is_empty() {
            return Ok(self.gate.reveal(self.store.as_ref(), event, Some(&caller)).await?);
        }

        let is_private = patch.is_private.unwrap_or(event.is_private);
        if is_private != event.is_private && !event.is_owned_by(&caller) {
            return Err(CalendarError::forbidden(
                "only the owner can change whether an event is private",
            ));
        }

        if let Some(ids) = &patch.grouping_ids {
            self.check_groupings_usable(ids, &caller).await?;
        }

        let start_time = patch.start_time.unwrap_or(event.start_time);
        let end_time = patch.end_time.unwrap_or(event.end_time);
        validate_event_times(start_time, end_time)?;

        // Private events are only editable by their owner, so the caller's
        // key is the one that sealed the current payload.
        let owner = if event.is_private || is_private {
            Some(
                self.store
                    .get_user(&event.user_id)
                    .await?
                    .ok_or(CalendarError::KeyUnavailable(event.user_id))?,
            )
        } else {
            None
        };

        let current = match (&owner, event.is_private) {
            (Some(owner), true) => match self.gate.open_payload(&event, owner) {
                Ok(payload) => payload,
                Err(e) if patch.title.is_some() && patch.description.is_some() => {
                    tracing::warn!(event_id = %event.id, error = %e, "replacing unreadable private payload");
                    EventPayload::new("", "")
                }
                Err(e) => return Err(e.into()),
            },
            _ => EventPayload::new(event.title.clone(), event.description.clone()),
        };

        let title = patch.title.unwrap_or(current.title);
        let description = patch.description.unwrap_or(current.description);
        validate_title(&title)?;

        let fields = match &owner {
            Some(owner) if is_private => self.gate.seal_fields(owner, &title, &description, true)?,
            _ => teamcal_access::StoredFields {
                title: title.clone(),
                description: description.clone(),
                encrypted_data: None,
            },
        };

        let updated = Event {
            title: fields.title,
            description: fields.description,
            start_time,
            end_time,
            is_private,
            is_out_of_office: patch.is_out_of_office.unwrap_or(event.is_out_of_office),
            event_type: patch.event_type.unwrap_or(event.event_type),
            encrypted_data: fields.encrypted_data,
            updated_at: now_millis(),
            ..event.clone()
        };

        let update = EventUpdate {
            grouping_ids: patch.grouping_ids,
            clear_sharing: is_private && !event.is_private,
        };
        if !self.store.update_event(&updated, &update).await? {
            return Err(CalendarError::not_found("event", event_id));
        }
        if update.clear_sharing {
            tracing::debug!(event_id = %event_id, "event made private, dropped sharing");
        }

        tracing::debug!(event_id = %event_id, user_id = %caller, ?decision, "updated event");
        self.record(
            caller,
            "update_event",
            "event",
            Some(event_id.to_string()),
            Some(json!({ "is_private": is_private })),
        )
        .await;
        Ok(Event {
            title,
            description,
            encrypted_data: None,
            ..updated
        })
    }

    /// Delete an event with its tags, permissions and attendees.
    pub async fn delete_event(&self, session: &Session, event_id: &EventId) -> Result<()> {
        let caller = session.require()?;
        let event = self.load_event(event_id).await?;

        let decision = self
            .resolver
            .decide_event(&event, &caller, Capability::Delete)
            .await?;
        if !decision.is_allowed() {
            return Err(CalendarError::forbidden("no permission to delete this event"));
        }

        self.store.delete_event(event_id).await?;

        tracing::debug!(event_id = %event_id, user_id = %caller, ?decision, "deleted event");
        self.record(caller, "delete_event", "event", Some(event_id.to_string()), None)
            .await;
        Ok(())
    }

    /// A single event as the caller may see it.
    pub async fn get_event(&self, session: &Session, event_id: &EventId) -> Result<EventView> {
        let event = self.load_event(event_id).await?;
        self.view(event, session.user_id()).await
    }

    /// Events lying entirely inside `range`, each with its tags and the
    /// caller's capability flags.
    ///
    /// Private events are revealed only to their owner. Anonymous callers
    /// get placeholders and no capabilities.
    pub async fn get_events_with_permissions(
        &self,
        session: &Session,
        range: TimeRange,
        filter: &EventFilter,
    ) -> Result<Vec<EventView>> {
        let viewer = session.user_id();
        let mut query = EventQuery::in_range(range).tagged_any(filter.grouping_ids.clone());
        if filter.mine_only {
            match viewer {
                Some(me) => query = query.owned_by(*me),
                None => return Ok(Vec::new()),
            }
        } else if let Some(owner) = filter.owner {
            query = query.owned_by(owner);
        }

        let events = self.store.list_events(&query).await?;
        let mut views = Vec::with_capacity(events.len());
        for event in events {
            views.push(self.view(event, viewer).await?);
        }
        Ok(views)
    }

    pub async fn can_user_edit_event(&self, event_id: &EventId, user_id: &UserId) -> Result<bool> {
        Ok(self.resolver.can_edit(event_id, user_id).await?)
    }

    pub async fn can_user_delete_event(&self, event_id: &EventId, user_id: &UserId) -> Result<bool> {
        Ok(self.resolver.can_delete(event_id, user_id).await?)
    }

    /// Out-of-office events inside `range`, with the owner's name.
    pub async fn whos_out(&self, session: &Session, range: TimeRange) -> Result<Vec<OutOfOffice>> {
        let viewer = session.user_id();
        let events = self
            .store
            .list_events(&EventQuery::in_range(range).out_of_office())
            .await?;

        let mut names: HashMap<UserId, Option<String>> = HashMap::new();
        let mut entries = Vec::with_capacity(events.len());
        for event in events {
            if !names.contains_key(&event.user_id) {
                let name = self.store.get_user(&event.user_id).await?.map(|u| u.name);
                names.insert(event.user_id, name);
            }
            let visible = self.gate.reveal(self.store.as_ref(), event, viewer).await?;
            entries.push(OutOfOffice {
                event_id: visible.id,
                user_id: visible.user_id,
                user_name: names.get(&visible.user_id).cloned().flatten(),
                title: visible.title,
                event_type: visible.event_type,
                start_time: visible.start_time,
                end_time: visible.end_time,
            });
        }
        Ok(entries)
    }

    async fn view(&self, event: Event, viewer: Option<&UserId>) -> Result<EventView> {
        let grouping_ids = self.store.get_event_groupings(&event.id).await?;
        let permissions = match viewer {
            Some(viewer) => self.resolver.capabilities(&event, viewer).await?,
            None => EventCapabilities::default(),
        };
        let event = self.gate.reveal(self.store.as_ref(), event, viewer).await?;
        Ok(EventView {
            event,
            grouping_ids,
            permissions,
        })
    }

    /// Every grouping must exist and be visible to `user_id`. Another
    /// user's private grouping reads as missing.
    async fn check_groupings_usable(&self, ids: &[GroupingId], user_id: &UserId) -> Result<()> {
        for id in ids {
            match self.store.get_grouping(id).await? {
                Some(grouping) if grouping.is_visible_to(user_id) => {}
                _ => return Err(CalendarError::not_found("grouping", id)),
            }
        }
        Ok(())
    }
}
