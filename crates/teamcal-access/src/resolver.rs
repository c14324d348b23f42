//! Authorization resolver.
//!
//! Edit and delete rights are decided by walking an ordered rule list. The
//! first rule that produces a decision wins; if none does, access is denied.
//! Every call reads current state, nothing is cached.
//!
//! Rule order:
//!
//! 1. Private events: only the owner, regardless of role or grants
//! 2. Owner
//! 3. System admin
//! 4. Admin of any grouping the event is tagged with
//! 5. Explicit per-event grant carrying the requested capability

use std::fmt;
use std::sync::Arc;

use teamcal_core::{Event, EventId, GroupingId, UserId};
use teamcal_store::Store;

use crate::error::Result;

/// A capability checked against an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    Edit,
    Delete,
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Capability::Edit => f.write_str("edit"),
            Capability::Delete => f.write_str("delete"),
        }
    }
}

/// Why access was allowed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AllowReason {
    Owner,
    SystemAdmin,
    /// The viewer administers this grouping, which tags the event.
    GroupAdmin(GroupingId),
    ExplicitGrant,
}

/// Why access was denied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DenyReason {
    EventNotFound,
    /// Private events are owner-only.
    PrivateEvent,
    NoMatchingRule,
}

/// Outcome of an authorization check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allowed(AllowReason),
    Denied(DenyReason),
}

impl Decision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Decision::Allowed(_))
    }
}

/// One step of the rule chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rule {
    PrivateOwnerOnly,
    Owner,
    SystemAdmin,
    GroupAdmin,
    ExplicitGrant,
}

/// The rule chain, in evaluation order.
pub const RULES: [Rule; 5] = [
    Rule::PrivateOwnerOnly,
    Rule::Owner,
    Rule::SystemAdmin,
    Rule::GroupAdmin,
    Rule::ExplicitGrant,
];

/// Capability flags for one viewer on one event.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EventCapabilities {
    pub can_edit: bool,
    pub can_delete: bool,
    pub is_owner: bool,
}

/// Answers edit/delete questions against the current store state.
pub struct AuthorizationResolver<S: Store + ?Sized> {
    store: Arc<S>,
}

impl<S: Store + ?Sized> Clone for AuthorizationResolver<S> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
        }
    }
}

impl<S: Store + ?Sized> AuthorizationResolver<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Decide `capability` for `viewer` on the event with id `event_id`.
    ///
    /// A missing event is a denial, not an error.
    pub async fn decide(
        &self,
        event_id: &EventId,
        viewer: &UserId,
        capability: Capability,
    ) -> Result<Decision> {
        match self.store.get_event(event_id).await? {
            Some(event) => self.decide_event(&event, viewer, capability).await,
            None => Ok(Decision::Denied(DenyReason::EventNotFound)),
        }
    }

    /// Decide `capability` for `viewer` on an already-loaded event.
    pub async fn decide_event(
        &self,
        event: &Event,
        viewer: &UserId,
        capability: Capability,
    ) -> Result<Decision> {
        for rule in RULES {
            if let Some(decision) = self.apply(rule, event, viewer, capability).await? {
                tracing::trace!(
                    event_id = %event.id,
                    user_id = %viewer,
                    %capability,
                    ?rule,
                    ?decision,
                    "authorization decided"
                );
                return Ok(decision);
            }
        }
        Ok(Decision::Denied(DenyReason::NoMatchingRule))
    }

    async fn apply(
        &self,
        rule: Rule,
        event: &Event,
        viewer: &UserId,
        capability: Capability,
    ) -> Result<Option<Decision>> {
        let decision = match rule {
            Rule::PrivateOwnerOnly => event.is_private.then(|| {
                if event.is_owned_by(viewer) {
                    Decision::Allowed(AllowReason::Owner)
                } else {
                    Decision::Denied(DenyReason::PrivateEvent)
                }
            }),
            Rule::Owner => event
                .is_owned_by(viewer)
                .then_some(Decision::Allowed(AllowReason::Owner)),
            Rule::SystemAdmin => {
                let is_admin = self
                    .store
                    .get_user(viewer)
                    .await?
                    .map_or(false, |u| u.role.is_admin());
                is_admin.then_some(Decision::Allowed(AllowReason::SystemAdmin))
            }
            Rule::GroupAdmin => {
                let groupings = self.store.get_event_groupings(&event.id).await?;
                if groupings.is_empty() {
                    None
                } else {
                    self.store
                        .find_administered_grouping(viewer, &groupings)
                        .await?
                        .map(|g| Decision::Allowed(AllowReason::GroupAdmin(g)))
                }
            }
            Rule::ExplicitGrant => {
                let granted = self
                    .store
                    .get_event_permission(&event.id, viewer)
                    .await?
                    .map_or(false, |p| match capability {
                        Capability::Edit => p.can_edit,
                        Capability::Delete => p.can_delete,
                    });
                granted.then_some(Decision::Allowed(AllowReason::ExplicitGrant))
            }
        };
        Ok(decision)
    }

    pub async fn can_edit(&self, event_id: &EventId, viewer: &UserId) -> Result<bool> {
        Ok(self.decide(event_id, viewer, Capability::Edit).await?.is_allowed())
    }

    pub async fn can_delete(&self, event_id: &EventId, viewer: &UserId) -> Result<bool> {
        Ok(self
            .decide(event_id, viewer, Capability::Delete)
            .await?
            .is_allowed())
    }

    /// Both capability flags plus ownership, for list views.
    pub async fn capabilities(&self, event: &Event, viewer: &UserId) -> Result<EventCapabilities> {
        Ok(EventCapabilities {
            can_edit: self
                .decide_event(event, viewer, Capability::Edit)
                .await?
                .is_allowed(),
            can_delete: self
                .decide_event(event, viewer, Capability::Delete)
                .await?
                .is_allowed(),
            is_owner: event.is_owned_by(viewer),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use teamcal_core::{EventPermission, EventType, GroupAdmin, Grouping, Role, User};
    use teamcal_store::MemoryStore;

    struct Fixture {
        store: Arc<MemoryStore>,
        resolver: AuthorizationResolver<MemoryStore>,
        owner: UserId,
        viewer: UserId,
    }

    async fn fixture() -> Fixture {
        let store = Arc::new(MemoryStore::new());
        let owner = insert_user(&store, "owner@example.com", Role::User).await;
        let viewer = insert_user(&store, "viewer@example.com", Role::User).await;
        Fixture {
            resolver: AuthorizationResolver::new(store.clone()),
            store,
            owner,
            viewer,
        }
    }

    async fn insert_user(store: &MemoryStore, email: &str, role: Role) -> UserId {
        let user = User {
            id: UserId::new(),
            email: email.into(),
            name: email.into(),
            password_hash: "hash".into(),
            role,
            encrypted_private_key: None,
            email_verified: true,
            created_at: 0,
            updated_at: 0,
        };
        store.insert_user(&user).await.unwrap();
        user.id
    }

    async fn insert_event(store: &MemoryStore, owner: UserId, is_private: bool) -> Event {
        let event = Event {
            id: EventId::new(),
            user_id: owner,
            title: "Review".into(),
            description: String::new(),
            start_time: 0,
            end_time: 10,
            is_private,
            is_out_of_office: false,
            event_type: EventType::WorkMeeting,
            encrypted_data: None,
            created_at: 0,
            updated_at: 0,
        };
        store.insert_event(&event, &[]).await.unwrap();
        event
    }

    async fn insert_grouping(store: &MemoryStore) -> GroupingId {
        let grouping = Grouping {
            id: GroupingId::new(),
            name: "Ops".into(),
            color: None,
            user_id: None,
            created_at: 0,
        };
        store.insert_grouping(&grouping).await.unwrap();
        grouping.id
    }

    async fn make_group_admin(store: &MemoryStore, grouping: GroupingId, user: UserId) {
        store
            .insert_group_admin(&GroupAdmin {
                grouping_id: grouping,
                user_id: user,
                assigned_by: user,
                assigned_at: 0,
            })
            .await
            .unwrap();
    }

    async fn grant(store: &MemoryStore, event: &Event, user: UserId, edit: bool, delete: bool) {
        store
            .upsert_event_permission(&EventPermission {
                event_id: event.id,
                user_id: user,
                can_edit: edit,
                can_delete: delete,
                granted_by: event.user_id,
                granted_at: 0,
            })
            .await
            .unwrap();
    }

    #[test]
    fn test_rule_order() {
        assert_eq!(RULES[0], Rule::PrivateOwnerOnly);
        assert_eq!(RULES[RULES.len() - 1], Rule::ExplicitGrant);
    }

    #[tokio::test]
    async fn test_missing_event_is_denied() {
        let f = fixture().await;
        let decision = f
            .resolver
            .decide(&EventId::new(), &f.owner, Capability::Edit)
            .await
            .unwrap();
        assert_eq!(decision, Decision::Denied(DenyReason::EventNotFound));
    }

    #[tokio::test]
    async fn test_owner_allowed() {
        let f = fixture().await;
        let event = insert_event(&f.store, f.owner, false).await;

        let decision = f
            .resolver
            .decide(&event.id, &f.owner, Capability::Delete)
            .await
            .unwrap();
        assert_eq!(decision, Decision::Allowed(AllowReason::Owner));
    }

    #[tokio::test]
    async fn test_stranger_denied() {
        let f = fixture().await;
        let event = insert_event(&f.store, f.owner, false).await;

        let decision = f
            .resolver
            .decide(&event.id, &f.viewer, Capability::Edit)
            .await
            .unwrap();
        assert_eq!(decision, Decision::Denied(DenyReason::NoMatchingRule));
    }

    #[tokio::test]
    async fn test_system_admin_allowed_on_public() {
        let f = fixture().await;
        let admin = insert_user(&f.store, "admin@example.com", Role::Admin).await;
        let event = insert_event(&f.store, f.owner, false).await;

        let decision = f
            .resolver
            .decide(&event.id, &admin, Capability::Edit)
            .await
            .unwrap();
        assert_eq!(decision, Decision::Allowed(AllowReason::SystemAdmin));
    }

    #[tokio::test]
    async fn test_private_event_is_owner_only() {
        let f = fixture().await;
        let admin = insert_user(&f.store, "admin@example.com", Role::Admin).await;
        let event = insert_event(&f.store, f.owner, true).await;
        let grouping = insert_grouping(&f.store).await;
        f.store.set_event_groupings(&event.id, &[grouping]).await.unwrap();
        make_group_admin(&f.store, grouping, f.viewer).await;
        grant(&f.store, &event, f.viewer, true, true).await;

        for (user, expected) in [(f.owner, true), (admin, false), (f.viewer, false)] {
            for capability in [Capability::Edit, Capability::Delete] {
                let decision = f.resolver.decide(&event.id, &user, capability).await.unwrap();
                assert_eq!(decision.is_allowed(), expected);
            }
        }
        assert_eq!(
            f.resolver
                .decide(&event.id, &admin, Capability::Edit)
                .await
                .unwrap(),
            Decision::Denied(DenyReason::PrivateEvent)
        );
    }

    #[tokio::test]
    async fn test_group_admin_of_any_grouping_suffices() {
        let f = fixture().await;
        let event = insert_event(&f.store, f.owner, false).await;
        let g1 = insert_grouping(&f.store).await;
        let g2 = insert_grouping(&f.store).await;
        f.store.set_event_groupings(&event.id, &[g1, g2]).await.unwrap();
        make_group_admin(&f.store, g2, f.viewer).await;

        let decision = f
            .resolver
            .decide(&event.id, &f.viewer, Capability::Edit)
            .await
            .unwrap();
        assert_eq!(decision, Decision::Allowed(AllowReason::GroupAdmin(g2)));
    }

    #[tokio::test]
    async fn test_group_admin_of_untagged_grouping_denied() {
        let f = fixture().await;
        let event = insert_event(&f.store, f.owner, false).await;
        let other = insert_grouping(&f.store).await;
        make_group_admin(&f.store, other, f.viewer).await;

        assert!(!f.resolver.can_edit(&event.id, &f.viewer).await.unwrap());
    }

    #[tokio::test]
    async fn test_explicit_grant_is_capability_scoped() {
        let f = fixture().await;
        let event = insert_event(&f.store, f.owner, false).await;
        grant(&f.store, &event, f.viewer, true, false).await;

        assert!(f.resolver.can_edit(&event.id, &f.viewer).await.unwrap());
        assert!(!f.resolver.can_delete(&event.id, &f.viewer).await.unwrap());
        assert_eq!(
            f.resolver
                .decide(&event.id, &f.viewer, Capability::Edit)
                .await
                .unwrap(),
            Decision::Allowed(AllowReason::ExplicitGrant)
        );
    }

    #[tokio::test]
    async fn test_role_change_applies_on_next_check() {
        let f = fixture().await;
        let event = insert_event(&f.store, f.owner, false).await;
        assert!(!f.resolver.can_edit(&event.id, &f.viewer).await.unwrap());

        f.store.set_user_role(&f.viewer, Role::Admin, 1).await.unwrap();
        assert!(f.resolver.can_edit(&event.id, &f.viewer).await.unwrap());
    }

    #[tokio::test]
    async fn test_capabilities_flags() {
        let f = fixture().await;
        let event = insert_event(&f.store, f.owner, false).await;
        grant(&f.store, &event, f.viewer, false, true).await;

        let caps = f.resolver.capabilities(&event, &f.viewer).await.unwrap();
        assert_eq!(
            caps,
            EventCapabilities {
                can_edit: false,
                can_delete: true,
                is_owner: false,
            }
        );

        let owner_caps = f.resolver.capabilities(&event, &f.owner).await.unwrap();
        assert!(owner_caps.can_edit && owner_caps.can_delete && owner_caps.is_owner);
    }
}
