//! Team tree and membership.

use serde_json::json;
use teamcal_core::{now_millis, validate_name, Team, TeamId, TeamMember, UserId};
use teamcal_store::Store;

use crate::calendar::Calendar;
use crate::error::{CalendarError, Result};
use crate::session::Session;

impl<S: Store> Calendar<S> {
    /// Create a team; the creator becomes its first admin.
    ///
    /// Root public teams need a system admin. Public sub-teams need a system
    /// admin or an admin of the parent team. Private teams are open to
    /// anyone.
    pub async fn create_team(
        &self,
        session: &Session,
        name: &str,
        parent: Option<TeamId>,
        is_private: bool,
    ) -> Result<Team> {
        let caller = session.require()?;
        validate_name("team", name)?;

        if let Some(parent_id) = &parent {
            if self.store.get_team(parent_id).await?.is_none() {
                return Err(CalendarError::not_found("team", parent_id));
            }
        }

        if !is_private {
            match &parent {
                None => self.require_admin(&caller, "create root public teams").await?,
                Some(parent_id) => {
                    if !self.can_manage_team(parent_id, &caller).await? {
                        return Err(CalendarError::forbidden(
                            "only admins of the parent team can create a sub-team",
                        ));
                    }
                }
            }
        }

        let now = now_millis();
        let team = Team {
            id: TeamId::new(),
            name: name.trim().to_string(),
            parent_team_id: parent,
            is_private,
            created_by: caller,
            created_at: now,
        };
        self.store.insert_team(&team).await?;
        self.store
            .insert_team_member(&TeamMember {
                team_id: team.id,
                user_id: caller,
                is_admin: true,
                joined_at: now,
            })
            .await?;

        tracing::info!(team_id = %team.id, private = is_private, "created team");
        self.record(
            caller,
            "create_team",
            "team",
            Some(team.id.to_string()),
            Some(json!({ "name": team.name, "is_private": is_private })),
        )
        .await;
        Ok(team)
    }

    /// Public teams plus the private teams the caller belongs to.
    pub async fn list_teams(&self, session: &Session) -> Result<Vec<Team>> {
        let teams = self.store.list_teams().await?;
        let mut visible = Vec::with_capacity(teams.len());
        for team in teams {
            if !team.is_private {
                visible.push(team);
                continue;
            }
            if let Some(viewer) = session.user_id() {
                if self.store.get_team_member(&team.id, viewer).await?.is_some() {
                    visible.push(team);
                }
            }
        }
        Ok(visible)
    }

    /// Add existing users to a team. Unknown users and current members are
    /// skipped. Returns how many were added.
    pub async fn add_team_members(
        &self,
        session: &Session,
        team_id: &TeamId,
        user_ids: &[UserId],
        is_admin: bool,
    ) -> Result<usize> {
        let caller = self.require_team_manager(session, team_id).await?;

        let mut added = 0;
        for user_id in user_ids {
            if self.store.get_user(user_id).await?.is_none() {
                tracing::debug!(team_id = %team_id, user_id = %user_id, "skipping unknown user");
                continue;
            }
            let member = TeamMember {
                team_id: *team_id,
                user_id: *user_id,
                is_admin,
                joined_at: now_millis(),
            };
            if !self.store.insert_team_member(&member).await?.is_inserted() {
                continue;
            }
            added += 1;
            self.record(
                caller,
                "add_team_member",
                "team",
                Some(team_id.to_string()),
                Some(json!({ "member_id": user_id.to_string(), "is_admin": is_admin })),
            )
            .await;
        }

        tracing::debug!(team_id = %team_id, added, "added team members");
        Ok(added)
    }

    /// Returns whether the user was a member.
    pub async fn remove_team_member(
        &self,
        session: &Session,
        team_id: &TeamId,
        user_id: &UserId,
    ) -> Result<bool> {
        let caller = self.require_team_manager(session, team_id).await?;

        let removed = self.store.delete_team_member(team_id, user_id).await?;
        if removed {
            self.record(
                caller,
                "remove_team_member",
                "team",
                Some(team_id.to_string()),
                Some(json!({ "member_id": user_id.to_string() })),
            )
            .await;
        }
        Ok(removed)
    }

    pub async fn set_team_member_admin(
        &self,
        session: &Session,
        team_id: &TeamId,
        user_id: &UserId,
        is_admin: bool,
    ) -> Result<()> {
        let caller = self.require_team_manager(session, team_id).await?;

        if !self
            .store
            .set_team_member_admin(team_id, user_id, is_admin)
            .await?
        {
            return Err(CalendarError::not_found("team member", user_id));
        }

        self.record(
            caller,
            "set_team_member_admin",
            "team",
            Some(team_id.to_string()),
            Some(json!({ "member_id": user_id.to_string(), "is_admin": is_admin })),
        )
        .await;
        Ok(())
    }

    /// Direct members of a team. Private teams list only for their members.
    pub async fn list_team_members(
        &self,
        session: &Session,
        team_id: &TeamId,
    ) -> Result<Vec<TeamMember>> {
        let team = self
            .store
            .get_team(team_id)
            .await?
            .ok_or_else(|| CalendarError::not_found("team", team_id))?;

        if team.is_private {
            let caller = session.require()?;
            if self.store.get_team_member(team_id, &caller).await?.is_none() {
                return Err(CalendarError::forbidden("not a member of this private team"));
            }
        }
        Ok(self.store.list_team_members(team_id).await?)
    }

    /// System admin, or admin member of the team.
    pub(crate) async fn can_manage_team(&self, team_id: &TeamId, user_id: &UserId) -> Result<bool> {
        if self.is_system_admin(user_id).await? {
            return Ok(true);
        }
        Ok(self
            .store
            .get_team_member(team_id, user_id)
            .await?
            .map_or(false, |m| m.is_admin))
    }

    async fn require_team_manager(&self, session: &Session, team_id: &TeamId) -> Result<UserId> {
        let caller = session.require()?;
        if self.store.get_team(team_id).await?.is_none() {
            return Err(CalendarError::not_found("team", team_id));
        }
        if !self.can_manage_team(team_id, &caller).await? {
            return Err(CalendarError::forbidden("insufficient permissions for this team"));
        }
        Ok(caller)
    }
}
