//! In-memory implementation of the Store trait.
//!
//! This is primarily for testing. It has the same semantics as SQLite
//! but keeps everything in memory with no persistence.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;

use teamcal_core::{
    ActivityEntry, AttendeeStatus, Event, EventAttendee, EventId, EventPermission, GroupAdmin,
    Grouping, GroupingId, Role, Team, TeamId, TeamMember, User, UserId,
};

use crate::error::{Result, StoreError};
use crate::traits::{ActivityQuery, EventQuery, EventUpdate, InsertResult, Store};

/// In-memory store implementation.
///
/// All data is lost when the store is dropped. Thread-safe via RwLock.
pub struct MemoryStore {
    inner: RwLock<MemoryStoreInner>,
}

#[derive(Default)]
struct MemoryStoreInner {
    users: HashMap<UserId, User>,
    events: HashMap<EventId, Event>,
    /// Event tags, kept sorted per event.
    event_groupings: HashMap<EventId, BTreeSet<GroupingId>>,
    groupings: HashMap<GroupingId, Grouping>,
    /// Keyed by (grouping, user).
    group_admins: BTreeMap<(GroupingId, UserId), GroupAdmin>,
    /// Keyed by (event, user).
    permissions: BTreeMap<(EventId, UserId), EventPermission>,
    teams: HashMap<TeamId, Team>,
    /// Keyed by (team, user) so iteration is ordered by user within a team.
    team_members: BTreeMap<(TeamId, UserId), TeamMember>,
    attendees: BTreeMap<(EventId, UserId), EventAttendee>,
    activity: Vec<ActivityEntry>,
}

impl MemoryStore {
    /// Create a new empty in-memory store.
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(MemoryStoreInner::default()),
        }
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, MemoryStoreInner>> {
        self.inner
            .read()
            .map_err(|e| StoreError::Poisoned(e.to_string()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, MemoryStoreInner>> {
        self.inner
            .write()
            .map_err(|e| StoreError::Poisoned(e.to_string()))
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStoreInner {
    fn tag_event(&mut self, event_id: EventId, grouping_ids: &[GroupingId]) {
        if grouping_ids.is_empty() {
            self.event_groupings.remove(&event_id);
        } else {
            self.event_groupings
                .insert(event_id, grouping_ids.iter().copied().collect());
        }
    }

    fn remove_event(&mut self, id: &EventId) -> bool {
        let removed = self.events.remove(id).is_some();
        self.event_groupings.remove(id);
        self.permissions.retain(|(event_id, _), _| event_id != id);
        self.attendees.retain(|(event_id, _), _| event_id != id);
        removed
    }

    fn remove_grouping(&mut self, id: &GroupingId) -> bool {
        let removed = self.groupings.remove(id).is_some();
        self.group_admins.retain(|(grouping_id, _), _| grouping_id != id);
        for tags in self.event_groupings.values_mut() {
            tags.remove(id);
        }
        self.event_groupings.retain(|_, tags| !tags.is_empty());
        removed
    }

    fn event_matches(&self, event: &Event, query: &EventQuery) -> bool {
        if !query.range.contains(event.start_time, event.end_time) {
            return false;
        }
        if let Some(owner) = &query.owner {
            if event.user_id != *owner {
                return false;
            }
        }
        if query.out_of_office_only && !event.is_out_of_office {
            return false;
        }
        if !query.grouping_ids.is_empty() {
            let tagged = self
                .event_groupings
                .get(&event.id)
                .map(|tags| query.grouping_ids.iter().any(|g| tags.contains(g)))
                .unwrap_or(false);
            if !tagged {
                return false;
            }
        }
        true
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn insert_user(&self, user: &User) -> Result<()> {
        let mut inner = self.write()?;
        if inner.users.values().any(|u| u.email == user.email) {
            return Err(StoreError::Duplicate(format!("email {}", user.email)));
        }
        if inner.users.contains_key(&user.id) {
            return Err(StoreError::Duplicate(format!("user {}", user.id)));
        }
        inner.users.insert(user.id, user.clone());
        Ok(())
    }

    async fn get_user(&self, id: &UserId) -> Result<Option<User>> {
        Ok(self.read()?.users.get(id).cloned())
    }

    async fn get_user_by_email(&self, email: &str) -> Result<Option<User>> {
        Ok(self
            .read()?
            .users
            .values()
            .find(|u| u.email == email)
            .cloned())
    }

    async fn set_user_role(&self, id: &UserId, role: Role, now: i64) -> Result<bool> {
        let mut inner = self.write()?;
        Ok(match inner.users.get_mut(id) {
            Some(user) => {
                user.role = role;
                user.updated_at = now;
                true
            }
            None => false,
        })
    }

    async fn list_users(&self) -> Result<Vec<User>> {
        let mut users: Vec<User> = self.read()?.users.values().cloned().collect();
        users.sort_by(|a, b| a.email.cmp(&b.email));
        Ok(users)
    }

    async fn delete_user(&self, id: &UserId) -> Result<bool> {
        let mut inner = self.write()?;
        if inner.users.remove(id).is_none() {
            return Ok(false);
        }

        let owned_events: Vec<EventId> = inner
            .events
            .values()
            .filter(|e| e.user_id == *id)
            .map(|e| e.id)
            .collect();
        for event_id in &owned_events {
            inner.remove_event(event_id);
        }
        let owned_groupings: Vec<GroupingId> = inner
            .groupings
            .values()
            .filter(|g| g.user_id == Some(*id))
            .map(|g| g.id)
            .collect();
        for grouping_id in &owned_groupings {
            inner.remove_grouping(grouping_id);
        }

        inner.group_admins.retain(|(_, user_id), _| user_id != id);
        inner.permissions.retain(|(_, user_id), _| user_id != id);
        inner.team_members.retain(|(_, user_id), _| user_id != id);
        inner.attendees.retain(|(_, user_id), _| user_id != id);
        Ok(true)
    }

    async fn insert_event(&self, event: &Event, grouping_ids: &[GroupingId]) -> Result<()> {
        let mut inner = self.write()?;
        if inner.events.contains_key(&event.id) {
            return Err(StoreError::Duplicate(format!("event {}", event.id)));
        }
        inner.events.insert(event.id, event.clone());
        inner.tag_event(event.id, grouping_ids);
        Ok(())
    }

    async fn get_event(&self, id: &EventId) -> Result<Option<Event>> {
        Ok(self.read()?.events.get(id).cloned())
    }

    async fn update_event(&self, event: &Event, update: &EventUpdate) -> Result<bool> {
        let mut inner = self.write()?;
        match inner.events.get_mut(&event.id) {
            Some(stored) => *stored = event.clone(),
            None => return Ok(false),
        }
        if update.clear_sharing {
            inner.permissions.retain(|(event_id, _), _| *event_id != event.id);
            inner.attendees.retain(|(event_id, _), _| *event_id != event.id);
        }
        if let Some(grouping_ids) = &update.grouping_ids {
            inner.tag_event(event.id, grouping_ids);
        }
        Ok(true)
    }

    async fn delete_event(&self, id: &EventId) -> Result<bool> {
        Ok(self.write()?.remove_event(id))
    }

    async fn list_events(&self, query: &EventQuery) -> Result<Vec<Event>> {
        let inner = self.read()?;
        let mut events: Vec<Event> = inner
            .events
            .values()
            .filter(|e| inner.event_matches(e, query))
            .cloned()
            .collect();
        events.sort_by_key(|e| (e.start_time, e.id));
        Ok(events)
    }

    async fn set_event_groupings(
        &self,
        event_id: &EventId,
        grouping_ids: &[GroupingId],
    ) -> Result<()> {
        self.write()?.tag_event(*event_id, grouping_ids);
        Ok(())
    }

    async fn get_event_groupings(&self, event_id: &EventId) -> Result<Vec<GroupingId>> {
        Ok(self
            .read()?
            .event_groupings
            .get(event_id)
            .map(|tags| tags.iter().copied().collect())
            .unwrap_or_default())
    }

    async fn insert_grouping(&self, grouping: &Grouping) -> Result<()> {
        let mut inner = self.write()?;
        if inner.groupings.contains_key(&grouping.id) {
            return Err(StoreError::Duplicate(format!("grouping {}", grouping.id)));
        }
        inner.groupings.insert(grouping.id, grouping.clone());
        Ok(())
    }

    async fn get_grouping(&self, id: &GroupingId) -> Result<Option<Grouping>> {
        Ok(self.read()?.groupings.get(id).cloned())
    }

    async fn delete_grouping(&self, id: &GroupingId) -> Result<bool> {
        Ok(self.write()?.remove_grouping(id))
    }

    async fn list_groupings(&self) -> Result<Vec<Grouping>> {
        let mut groupings: Vec<Grouping> = self.read()?.groupings.values().cloned().collect();
        groupings.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));
        Ok(groupings)
    }

    async fn insert_group_admin(&self, admin: &GroupAdmin) -> Result<InsertResult> {
        let mut inner = self.write()?;
        let key = (admin.grouping_id, admin.user_id);
        if inner.group_admins.contains_key(&key) {
            return Ok(InsertResult::AlreadyExists);
        }
        inner.group_admins.insert(key, admin.clone());
        Ok(InsertResult::Inserted)
    }

    async fn delete_group_admin(
        &self,
        grouping_id: &GroupingId,
        user_id: &UserId,
    ) -> Result<bool> {
        Ok(self
            .write()?
            .group_admins
            .remove(&(*grouping_id, *user_id))
            .is_some())
    }

    async fn list_group_admins(&self, grouping_id: &GroupingId) -> Result<Vec<GroupAdmin>> {
        Ok(self
            .read()?
            .group_admins
            .values()
            .filter(|a| a.grouping_id == *grouping_id)
            .cloned()
            .collect())
    }

    async fn list_managed_groupings(&self, user_id: &UserId) -> Result<Vec<GroupAdmin>> {
        Ok(self
            .read()?
            .group_admins
            .values()
            .filter(|a| a.user_id == *user_id)
            .cloned()
            .collect())
    }

    async fn find_administered_grouping(
        &self,
        user_id: &UserId,
        grouping_ids: &[GroupingId],
    ) -> Result<Option<GroupingId>> {
        let inner = self.read()?;
        let mut candidates: Vec<GroupingId> = grouping_ids
            .iter()
            .filter(|g| inner.group_admins.contains_key(&(**g, *user_id)))
            .copied()
            .collect();
        candidates.sort();
        Ok(candidates.into_iter().next())
    }

    async fn upsert_event_permission(&self, permission: &EventPermission) -> Result<()> {
        self.write()?.permissions.insert(
            (permission.event_id, permission.user_id),
            permission.clone(),
        );
        Ok(())
    }

    async fn get_event_permission(
        &self,
        event_id: &EventId,
        user_id: &UserId,
    ) -> Result<Option<EventPermission>> {
        Ok(self
            .read()?
            .permissions
            .get(&(*event_id, *user_id))
            .cloned())
    }

    async fn delete_event_permission(&self, event_id: &EventId, user_id: &UserId) -> Result<bool> {
        Ok(self
            .write()?
            .permissions
            .remove(&(*event_id, *user_id))
            .is_some())
    }

    async fn list_event_permissions(&self, event_id: &EventId) -> Result<Vec<EventPermission>> {
        Ok(self
            .read()?
            .permissions
            .values()
            .filter(|p| p.event_id == *event_id)
            .cloned()
            .collect())
    }

    async fn insert_team(&self, team: &Team) -> Result<()> {
        let mut inner = self.write()?;
        if inner.teams.contains_key(&team.id) {
            return Err(StoreError::Duplicate(format!("team {}", team.id)));
        }
        inner.teams.insert(team.id, team.clone());
        Ok(())
    }

    async fn get_team(&self, id: &TeamId) -> Result<Option<Team>> {
        Ok(self.read()?.teams.get(id).cloned())
    }

    async fn list_teams(&self) -> Result<Vec<Team>> {
        let mut teams: Vec<Team> = self.read()?.teams.values().cloned().collect();
        teams.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));
        Ok(teams)
    }

    async fn list_child_teams(&self, parent: &TeamId) -> Result<Vec<Team>> {
        let mut children: Vec<Team> = self
            .read()?
            .teams
            .values()
            .filter(|t| t.parent_team_id == Some(*parent))
            .cloned()
            .collect();
        children.sort_by_key(|t| t.id);
        Ok(children)
    }

    async fn insert_team_member(&self, member: &TeamMember) -> Result<InsertResult> {
        let mut inner = self.write()?;
        let key = (member.team_id, member.user_id);
        if inner.team_members.contains_key(&key) {
            return Ok(InsertResult::AlreadyExists);
        }
        inner.team_members.insert(key, member.clone());
        Ok(InsertResult::Inserted)
    }

    async fn get_team_member(
        &self,
        team_id: &TeamId,
        user_id: &UserId,
    ) -> Result<Option<TeamMember>> {
        Ok(self
            .read()?
            .team_members
            .get(&(*team_id, *user_id))
            .cloned())
    }

    async fn delete_team_member(&self, team_id: &TeamId, user_id: &UserId) -> Result<bool> {
        Ok(self
            .write()?
            .team_members
            .remove(&(*team_id, *user_id))
            .is_some())
    }

    async fn set_team_member_admin(
        &self,
        team_id: &TeamId,
        user_id: &UserId,
        is_admin: bool,
    ) -> Result<bool> {
        let mut inner = self.write()?;
        Ok(match inner.team_members.get_mut(&(*team_id, *user_id)) {
            Some(member) => {
                member.is_admin = is_admin;
                true
            }
            None => false,
        })
    }

    async fn list_team_members(&self, team_id: &TeamId) -> Result<Vec<TeamMember>> {
        Ok(self
            .read()?
            .team_members
            .range((*team_id, UserId::from_uuid(uuid::Uuid::nil()))..)
            .take_while(|((t, _), _)| t == team_id)
            .map(|(_, m)| m.clone())
            .collect())
    }

    async fn insert_attendee(&self, attendee: &EventAttendee) -> Result<InsertResult> {
        let mut inner = self.write()?;
        let key = (attendee.event_id, attendee.user_id);
        if inner.attendees.contains_key(&key) {
            return Ok(InsertResult::AlreadyExists);
        }
        inner.attendees.insert(key, attendee.clone());
        Ok(InsertResult::Inserted)
    }

    async fn get_attendee(
        &self,
        event_id: &EventId,
        user_id: &UserId,
    ) -> Result<Option<EventAttendee>> {
        Ok(self.read()?.attendees.get(&(*event_id, *user_id)).cloned())
    }

    async fn set_attendee_status(
        &self,
        event_id: &EventId,
        user_id: &UserId,
        status: AttendeeStatus,
    ) -> Result<bool> {
        let mut inner = self.write()?;
        Ok(match inner.attendees.get_mut(&(*event_id, *user_id)) {
            Some(attendee) => {
                attendee.status = status;
                true
            }
            None => false,
        })
    }

    async fn list_attendees(&self, event_id: &EventId) -> Result<Vec<EventAttendee>> {
        let mut attendees: Vec<EventAttendee> = self
            .read()?
            .attendees
            .values()
            .filter(|a| a.event_id == *event_id)
            .cloned()
            .collect();
        attendees.sort_by_key(|a| (a.invited_at, a.user_id));
        Ok(attendees)
    }

    async fn insert_activity(&self, entry: &ActivityEntry) -> Result<()> {
        self.write()?.activity.push(entry.clone());
        Ok(())
    }

    async fn list_activity(&self, query: &ActivityQuery) -> Result<Vec<ActivityEntry>> {
        let inner = self.read()?;
        let mut entries: Vec<ActivityEntry> = inner
            .activity
            .iter()
            .filter(|e| query.user_id.map_or(true, |u| e.user_id == u))
            .filter(|e| query.action.as_deref().map_or(true, |a| e.action == a))
            .filter(|e| query.since.map_or(true, |t| e.created_at >= t))
            .filter(|e| query.until.map_or(true, |t| e.created_at <= t))
            .cloned()
            .collect();
        // Newest first; insertion order breaks timestamp ties.
        entries.reverse();
        entries.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        entries.truncate(query.limit);
        Ok(entries)
    }
}
