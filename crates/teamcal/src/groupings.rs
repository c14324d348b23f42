//! Event tags.

use serde_json::json;
use teamcal_core::{now_millis, validate_color, validate_name, Grouping, GroupingId};
use teamcal_store::Store;

use crate::calendar::Calendar;
use crate::error::{CalendarError, Result};
use crate::session::Session;

impl<S: Store> Calendar<S> {
    /// Create a grouping. A private grouping is visible only to its creator.
    pub async fn create_grouping(
        &self,
        session: &Session,
        name: &str,
        color: Option<&str>,
        is_private: bool,
    ) -> Result<Grouping> {
        let caller = session.require()?;
        validate_name("grouping", name)?;
        if let Some(color) = color {
            validate_color(color)?;
        }

        let grouping = Grouping {
            id: GroupingId::new(),
            name: name.trim().to_string(),
            color: color.map(str::to_string),
            user_id: is_private.then_some(caller),
            created_at: now_millis(),
        };
        self.store.insert_grouping(&grouping).await?;

        tracing::debug!(grouping_id = %grouping.id, private = is_private, "created grouping");
        self.record(
            caller,
            "create_grouping",
            "grouping",
            Some(grouping.id.to_string()),
            Some(json!({ "name": grouping.name, "is_private": is_private })),
        )
        .await;
        Ok(grouping)
    }

    /// Delete a grouping, untagging its events and dropping its admins.
    ///
    /// System admins may delete any grouping; a private grouping may also be
    /// deleted by its owner.
    pub async fn delete_grouping(&self, session: &Session, grouping_id: &GroupingId) -> Result<()> {
        let caller = session.require()?;
        let grouping = self
            .store
            .get_grouping(grouping_id)
            .await?
            .ok_or_else(|| CalendarError::not_found("grouping", grouping_id))?;

        let owns = grouping.user_id == Some(caller);
        if !owns && !self.is_system_admin(&caller).await? {
            return Err(CalendarError::forbidden("no permission to delete this grouping"));
        }

        self.store.delete_grouping(grouping_id).await?;

        tracing::debug!(grouping_id = %grouping_id, "deleted grouping");
        self.record(
            caller,
            "delete_grouping",
            "grouping",
            Some(grouping_id.to_string()),
            None,
        )
        .await;
        Ok(())
    }

    /// Public groupings plus the caller's private ones.
    pub async fn list_groupings(&self, session: &Session) -> Result<Vec<Grouping>> {
        let groupings = self.store.list_groupings().await?;
        Ok(match session.user_id() {
            Some(viewer) => groupings
                .into_iter()
                .filter(|g| g.is_visible_to(viewer))
                .collect(),
            None => groupings.into_iter().filter(|g| g.user_id.is_none()).collect(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::CalendarConfig;
    use teamcal_core::CoreError;
    use teamcal_crypto::{KeyEnvelope, MasterKey};
    use teamcal_store::MemoryStore;

    fn calendar() -> Calendar<MemoryStore> {
        Calendar::new(
            MemoryStore::new(),
            KeyEnvelope::new(MasterKey::generate()),
            CalendarConfig::default(),
        )
    }

    #[tokio::test]
    async fn test_private_grouping_visibility() {
        let calendar = calendar();
        let alice = calendar.register_user("alice@example.com", "Alice", "h").await.unwrap();
        let bob = calendar.register_user("bob@example.com", "Bob", "h").await.unwrap();

        calendar
            .create_grouping(&Session::user(alice.id), "Mine", Some("#3b82f6"), true)
            .await
            .unwrap();
        calendar
            .create_grouping(&Session::user(bob.id), "Shared", None, false)
            .await
            .unwrap();

        let names = |gs: Vec<Grouping>| gs.into_iter().map(|g| g.name).collect::<Vec<_>>();
        assert_eq!(
            names(calendar.list_groupings(&Session::user(alice.id)).await.unwrap()),
            vec!["Mine", "Shared"]
        );
        assert_eq!(
            names(calendar.list_groupings(&Session::user(bob.id)).await.unwrap()),
            vec!["Shared"]
        );
        assert_eq!(
            names(calendar.list_groupings(&Session::anonymous()).await.unwrap()),
            vec!["Shared"]
        );
    }

    #[tokio::test]
    async fn test_grouping_validation() {
        let calendar = calendar();
        let alice = calendar.register_user("alice@example.com", "Alice", "h").await.unwrap();
        let session = Session::user(alice.id);

        let err = calendar.create_grouping(&session, "  ", None, false).await.unwrap_err();
        assert!(matches!(err, CalendarError::Invalid(CoreError::EmptyName("grouping"))));

        let err = calendar
            .create_grouping(&session, "Ops", Some("blue"), false)
            .await
            .unwrap_err();
        assert!(matches!(err, CalendarError::Invalid(CoreError::InvalidColor(_))));
    }

    #[tokio::test]
    async fn test_delete_rights() {
        let calendar = calendar();
        let alice = calendar.register_user("alice@example.com", "Alice", "h").await.unwrap();
        let bob = calendar.register_user("bob@example.com", "Bob", "h").await.unwrap();

        let private = calendar
            .create_grouping(&Session::user(alice.id), "Mine", None, true)
            .await
            .unwrap();
        let public = calendar
            .create_grouping(&Session::user(alice.id), "Team", None, false)
            .await
            .unwrap();

        let err = calendar
            .delete_grouping(&Session::user(bob.id), &private.id)
            .await
            .unwrap_err();
        assert!(matches!(err, CalendarError::Forbidden(_)));

        // Public groupings belong to nobody; only admins remove them.
        let err = calendar
            .delete_grouping(&Session::user(alice.id), &public.id)
            .await
            .unwrap_err();
        assert!(matches!(err, CalendarError::Forbidden(_)));

        calendar
            .delete_grouping(&Session::user(alice.id), &private.id)
            .await
            .unwrap();
        assert!(calendar.store().get_grouping(&private.id).await.unwrap().is_none());
    }
}
