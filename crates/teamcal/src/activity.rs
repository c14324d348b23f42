//! Audit trail.

use teamcal_core::{now_millis, ActivityEntry, ActivityId, UserId};
use teamcal_store::{ActivityQuery, Store};

use crate::calendar::Calendar;
use crate::error::Result;
use crate::session::Session;
use crate::types::ActivityFilter;

impl<S: Store> Calendar<S> {
    /// Append to the activity log.
    ///
    /// A failed write is logged and otherwise ignored; the mutation it
    /// describes has already happened. Details never include private
    /// titles or descriptions.
    pub(crate) async fn record(
        &self,
        actor: UserId,
        action: &str,
        entity_type: &str,
        entity_id: Option<String>,
        details: Option<serde_json::Value>,
    ) {
        if !self.config.activity_log {
            return;
        }

        let entry = ActivityEntry {
            id: ActivityId::new(),
            user_id: actor,
            action: action.to_string(),
            entity_type: entity_type.to_string(),
            entity_id,
            details: details.map(|d| d.to_string()),
            created_at: now_millis(),
        };

        if let Err(e) = self.store.insert_activity(&entry).await {
            tracing::warn!(action, user_id = %actor, error = %e, "failed to record activity");
        }
    }

    /// Query the activity log, newest first. System admins only.
    pub async fn activity_log(
        &self,
        session: &Session,
        filter: ActivityFilter,
    ) -> Result<Vec<ActivityEntry>> {
        let caller = session.require()?;
        self.require_admin(&caller, "read the activity log").await?;

        let query = ActivityQuery {
            user_id: filter.user_id,
            action: filter.action,
            since: filter.since,
            until: filter.until,
            limit: filter.limit.unwrap_or(self.config.activity_page_size),
        };
        Ok(self.store.list_activity(&query).await?)
    }
}
