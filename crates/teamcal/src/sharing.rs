//! Explicit per-event grants and grouping admins.

use serde_json::json;
use teamcal_core::{now_millis, EventId, EventPermission, GroupAdmin, GroupingId, UserId};
use teamcal_store::Store;

use crate::calendar::Calendar;
use crate::error::{CalendarError, Result};
use crate::session::Session;
use crate::types::PermissionGrant;

impl<S: Store> Calendar<S> {
    // ─────────────────────────────────────────────────────────────────────────
    // Event permissions
    // ─────────────────────────────────────────────────────────────────────────

    /// Grant `target` capabilities on one of the caller's public events.
    ///
    /// Replaces any earlier grant to the same user. Private events cannot be
    /// shared.
    pub async fn grant_event_permission(
        &self,
        session: &Session,
        event_id: &EventId,
        target: &UserId,
        grant: PermissionGrant,
    ) -> Result<EventPermission> {
        let caller = session.require()?;
        let event = self.load_event(event_id).await?;

        if !event.is_owned_by(&caller) {
            return Err(CalendarError::forbidden(
                "only the event owner can grant permissions",
            ));
        }
        if event.is_private {
            return Err(CalendarError::forbidden("private events cannot be shared"));
        }
        self.load_user(target).await?;

        let permission = EventPermission {
            event_id: *event_id,
            user_id: *target,
            can_edit: grant.can_edit,
            can_delete: grant.can_delete,
            granted_by: caller,
            granted_at: now_millis(),
        };
        self.store.upsert_event_permission(&permission).await?;

        tracing::debug!(
            event_id = %event_id,
            user_id = %target,
            can_edit = grant.can_edit,
            can_delete = grant.can_delete,
            "granted event permission"
        );
        self.record(
            caller,
            "grant_permission",
            "event",
            Some(event_id.to_string()),
            Some(json!({
                "user_id": target.to_string(),
                "can_edit": grant.can_edit,
                "can_delete": grant.can_delete,
            })),
        )
        .await;
        Ok(permission)
    }

    /// Withdraw a grant. Returns whether one existed.
    pub async fn revoke_event_permission(
        &self,
        session: &Session,
        event_id: &EventId,
        target: &UserId,
    ) -> Result<bool> {
        let caller = session.require()?;
        let event = self.load_event(event_id).await?;

        if !event.is_owned_by(&caller) {
            return Err(CalendarError::forbidden(
                "only the event owner can revoke permissions",
            ));
        }

        let removed = self.store.delete_event_permission(event_id, target).await?;
        if removed {
            tracing::debug!(event_id = %event_id, user_id = %target, "revoked event permission");
            self.record(
                caller,
                "revoke_permission",
                "event",
                Some(event_id.to_string()),
                Some(json!({ "user_id": target.to_string() })),
            )
            .await;
        }
        Ok(removed)
    }

    /// Grants on one of the caller's events.
    pub async fn list_event_permissions(
        &self,
        session: &Session,
        event_id: &EventId,
    ) -> Result<Vec<EventPermission>> {
        let caller = session.require()?;
        let event = self.load_event(event_id).await?;
        if !event.is_owned_by(&caller) {
            return Err(CalendarError::forbidden(
                "only the event owner can list permissions",
            ));
        }
        Ok(self.store.list_event_permissions(event_id).await?)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Group admins
    // ─────────────────────────────────────────────────────────────────────────

    /// Make `target` an admin of a grouping. System admins only.
    ///
    /// Takes effect on the next authorization check. Returns `false` if the
    /// user already administered the grouping.
    pub async fn assign_group_admin(
        &self,
        session: &Session,
        grouping_id: &GroupingId,
        target: &UserId,
    ) -> Result<bool> {
        let caller = session.require()?;
        self.require_admin(&caller, "assign group admins").await?;

        if self.store.get_grouping(grouping_id).await?.is_none() {
            return Err(CalendarError::not_found("grouping", grouping_id));
        }
        self.load_user(target).await?;

        let admin = GroupAdmin {
            grouping_id: *grouping_id,
            user_id: *target,
            assigned_by: caller,
            assigned_at: now_millis(),
        };
        let inserted = self.store.insert_group_admin(&admin).await?.is_inserted();

        if inserted {
            tracing::info!(grouping_id = %grouping_id, user_id = %target, "assigned group admin");
            self.record(
                caller,
                "assign_group_admin",
                "grouping",
                Some(grouping_id.to_string()),
                Some(json!({ "user_id": target.to_string() })),
            )
            .await;
        }
        Ok(inserted)
    }

    /// Remove a grouping admin. System admins only. Returns whether the
    /// assignment existed.
    pub async fn remove_group_admin(
        &self,
        session: &Session,
        grouping_id: &GroupingId,
        target: &UserId,
    ) -> Result<bool> {
        let caller = session.require()?;
        self.require_admin(&caller, "remove group admins").await?;

        let removed = self.store.delete_group_admin(grouping_id, target).await?;
        if removed {
            tracing::info!(grouping_id = %grouping_id, user_id = %target, "removed group admin");
            self.record(
                caller,
                "remove_group_admin",
                "grouping",
                Some(grouping_id.to_string()),
                Some(json!({ "user_id": target.to_string() })),
            )
            .await;
        }
        Ok(removed)
    }

    /// Admins of a grouping. System admins only.
    pub async fn list_group_admins(
        &self,
        session: &Session,
        grouping_id: &GroupingId,
    ) -> Result<Vec<GroupAdmin>> {
        let caller = session.require()?;
        self.require_admin(&caller, "list group admins").await?;
        Ok(self.store.list_group_admins(grouping_id).await?)
    }

    /// Groupings the caller administers.
    pub async fn list_managed_groupings(&self, session: &Session) -> Result<Vec<GroupAdmin>> {
        let caller = session.require()?;
        Ok(self.store.list_managed_groupings(&caller).await?)
    }
}
