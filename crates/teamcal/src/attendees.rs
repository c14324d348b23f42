//! Invitations to public events.

use std::collections::HashSet;

use serde_json::json;
use teamcal_access::{expand_teams_visible_to, Capability};
use teamcal_core::{
    now_millis, AttendeeStatus, Event, EventAttendee, EventId, TeamId, UserId,
};
use teamcal_store::Store;

use crate::calendar::Calendar;
use crate::error::{CalendarError, Result};
use crate::session::Session;

impl<S: Store> Calendar<S> {
    /// Invite every member of `team_ids` and their descendant teams.
    ///
    /// Each new attendee records the team that reached them first. The
    /// event owner and users already invited are skipped. A private team
    /// named directly must include the caller; private descendants the
    /// caller does not belong to add no one. Returns the attendees added.
    pub async fn invite_teams(
        &self,
        session: &Session,
        event_id: &EventId,
        team_ids: &[TeamId],
    ) -> Result<Vec<EventAttendee>> {
        let (caller, event) = self.require_invitable(session, event_id).await?;
        for team_id in team_ids {
            let team = self
                .store
                .get_team(team_id)
                .await?
                .ok_or_else(|| CalendarError::not_found("team", team_id))?;
            if team.is_private && self.store.get_team_member(team_id, &caller).await?.is_none() {
                return Err(CalendarError::forbidden("not a member of this private team"));
            }
        }

        let members = expand_teams_visible_to(self.store.as_ref(), team_ids, &caller).await?;
        let candidates = members
            .into_iter()
            .map(|m| (m.user_id, Some(m.via_team)))
            .collect::<Vec<_>>();
        let added = self.insert_attendees(&event, candidates).await?;

        tracing::debug!(event_id = %event_id, teams = team_ids.len(), added = added.len(), "invited teams");
        self.record(
            caller,
            "invite_teams",
            "event",
            Some(event_id.to_string()),
            Some(json!({
                "team_ids": team_ids.iter().map(ToString::to_string).collect::<Vec<_>>(),
                "added": added.len(),
            })),
        )
        .await;
        Ok(added)
    }

    /// Invite individual users. Fails if any of them does not exist.
    pub async fn invite_users(
        &self,
        session: &Session,
        event_id: &EventId,
        user_ids: &[UserId],
    ) -> Result<Vec<EventAttendee>> {
        let (caller, event) = self.require_invitable(session, event_id).await?;
        for user_id in user_ids {
            self.load_user(user_id).await?;
        }

        let candidates = user_ids.iter().map(|id| (*id, None)).collect::<Vec<_>>();
        let added = self.insert_attendees(&event, candidates).await?;

        tracing::debug!(event_id = %event_id, added = added.len(), "invited users");
        self.record(
            caller,
            "invite_users",
            "event",
            Some(event_id.to_string()),
            Some(json!({ "added": added.len() })),
        )
        .await;
        Ok(added)
    }

    /// Set the caller's own RSVP.
    pub async fn respond_to_invitation(
        &self,
        session: &Session,
        event_id: &EventId,
        status: AttendeeStatus,
    ) -> Result<()> {
        let caller = session.require()?;
        if !self
            .store
            .set_attendee_status(event_id, &caller, status)
            .await?
        {
            return Err(CalendarError::not_found("invitation", event_id));
        }

        tracing::debug!(event_id = %event_id, user_id = %caller, status = status.as_str(), "responded to invitation");
        self.record(
            caller,
            "respond_invitation",
            "event",
            Some(event_id.to_string()),
            Some(json!({ "status": status.as_str() })),
        )
        .await;
        Ok(())
    }

    /// Attendees of an event. Private events never have any.
    pub async fn list_attendees(&self, event_id: &EventId) -> Result<Vec<EventAttendee>> {
        let event = self.load_event(event_id).await?;
        if event.is_private {
            return Ok(Vec::new());
        }
        Ok(self.store.list_attendees(event_id).await?)
    }

    async fn require_invitable(&self, session: &Session, event_id: &EventId) -> Result<(UserId, Event)> {
        let caller = session.require()?;
        let event = self.load_event(event_id).await?;
        if event.is_private {
            return Err(CalendarError::forbidden("private events cannot have attendees"));
        }
        let decision = self
            .resolver
            .decide_event(&event, &caller, Capability::Edit)
            .await?;
        if !decision.is_allowed() {
            return Err(CalendarError::forbidden("no permission to invite to this event"));
        }
        Ok((caller, event))
    }

    async fn insert_attendees(
        &self,
        event: &Event,
        candidates: Vec<(UserId, Option<TeamId>)>,
    ) -> Result<Vec<EventAttendee>> {
        let mut seen: HashSet<UserId> = HashSet::new();
        seen.insert(event.user_id);

        let mut added = Vec::new();
        for (user_id, via_team) in candidates {
            if !seen.insert(user_id) {
                continue;
            }
            let attendee = EventAttendee {
                event_id: event.id,
                user_id,
                status: AttendeeStatus::Pending,
                invited_via_team_id: via_team,
                invited_at: now_millis(),
            };
            if self.store.insert_attendee(&attendee).await?.is_inserted() {
                added.push(attendee);
            }
        }
        Ok(added)
    }
}
