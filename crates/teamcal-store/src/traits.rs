//! Store trait: the abstract interface for calendar persistence.
//!
//! This trait allows the calendar to be storage-agnostic. Implementations
//! include SQLite (primary) and in-memory (for tests).

use async_trait::async_trait;
use teamcal_core::{
    ActivityEntry, AttendeeStatus, Event, EventAttendee, EventId, EventPermission, GroupAdmin,
    Grouping, GroupingId, Role, Team, TeamId, TeamMember, TimeRange, User, UserId,
};

use crate::error::Result;

/// Result of an insert-if-absent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertResult {
    /// Row was inserted.
    Inserted,
    /// An identical key already existed (idempotent - not an error).
    AlreadyExists,
}

impl InsertResult {
    pub fn is_inserted(self) -> bool {
        matches!(self, InsertResult::Inserted)
    }
}

/// Filter for event range queries.
///
/// Events match when they lie entirely inside `range` and satisfy every
/// other populated filter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventQuery {
    pub range: TimeRange,
    /// Only events owned by this user.
    pub owner: Option<UserId>,
    /// Only events tagged with at least one of these groupings.
    /// Empty means no grouping filter.
    pub grouping_ids: Vec<GroupingId>,
    /// Only out-of-office events.
    pub out_of_office_only: bool,
}

impl EventQuery {
    /// All events inside `range`.
    pub fn in_range(range: TimeRange) -> Self {
        Self {
            range,
            owner: None,
            grouping_ids: Vec::new(),
            out_of_office_only: false,
        }
    }

    pub fn owned_by(mut self, owner: UserId) -> Self {
        self.owner = Some(owner);
        self
    }

    pub fn tagged_any(mut self, grouping_ids: Vec<GroupingId>) -> Self {
        self.grouping_ids = grouping_ids;
        self
    }

    pub fn out_of_office(mut self) -> Self {
        self.out_of_office_only = true;
        self
    }
}

/// Filter for the activity log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActivityQuery {
    pub user_id: Option<UserId>,
    pub action: Option<String>,
    pub since: Option<i64>,
    pub until: Option<i64>,
    pub limit: usize,
}

impl Default for ActivityQuery {
    fn default() -> Self {
        Self {
            user_id: None,
            action: None,
            since: None,
            until: None,
            limit: 50,
        }
    }
}

/// The Store trait: async interface for calendar persistence.
///
/// All methods are async to support both sync (SQLite) and async backends.
/// For SQLite, we use `spawn_blocking` internally to avoid blocking the runtime.
///
/// # Design Notes
///
/// - Rows are keyed by opaque UUID identifiers.
/// - Deleting an event or grouping removes the rows that reference it.
/// - List methods return rows in a stable order so callers (and the team
///   expansion in particular) are deterministic.
/// Changes applied in the same write as an event row update.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventUpdate {
    /// Replace the event's groupings. `None` leaves them as they are.
    pub grouping_ids: Option<Vec<GroupingId>>,
    /// Drop every explicit permission and attendee of the event.
    pub clear_sharing: bool,
}

#[async_trait]
pub trait Store: Send + Sync {
    // ─────────────────────────────────────────────────────────────────────────
    // Users
    // ─────────────────────────────────────────────────────────────────────────

    /// Insert a new user. Fails with `Duplicate` if the email is taken.
    async fn insert_user(&self, user: &User) -> Result<()>;

    async fn get_user(&self, id: &UserId) -> Result<Option<User>>;

    async fn get_user_by_email(&self, email: &str) -> Result<Option<User>>;

    /// Change a user's role. Returns `false` if the user does not exist.
    async fn set_user_role(&self, id: &UserId, role: Role, now: i64) -> Result<bool>;

    /// All users, ordered by email.
    async fn list_users(&self) -> Result<Vec<User>>;

    /// Delete a user with everything that belongs to them: their events
    /// (with those events' tags, grants and attendees), their private
    /// groupings, and their group-admin, grant, membership and attendee
    /// rows. Teams they created and the activity log are kept. Returns
    /// `false` if the user does not exist.
    async fn delete_user(&self, id: &UserId) -> Result<bool>;

    // ─────────────────────────────────────────────────────────────────────────
    // Events
    // ─────────────────────────────────────────────────────────────────────────

    /// Insert an event tagged with `grouping_ids`, all or nothing.
    async fn insert_event(&self, event: &Event, grouping_ids: &[GroupingId]) -> Result<()>;

    async fn get_event(&self, id: &EventId) -> Result<Option<Event>>;

    /// Replace a stored event row and apply `update` in the same write.
    /// Returns `false` (and changes nothing) if the event does not exist.
    async fn update_event(&self, event: &Event, update: &EventUpdate) -> Result<bool>;

    /// Delete an event with its groupings, permissions and attendees.
    async fn delete_event(&self, id: &EventId) -> Result<bool>;

    /// Events matching `query`, ordered by start time.
    async fn list_events(&self, query: &EventQuery) -> Result<Vec<Event>>;

    /// Replace the set of groupings an event is tagged with.
    async fn set_event_groupings(&self, event_id: &EventId, grouping_ids: &[GroupingId])
        -> Result<()>;

    /// Groupings an event is tagged with, ordered by id.
    async fn get_event_groupings(&self, event_id: &EventId) -> Result<Vec<GroupingId>>;

    // ─────────────────────────────────────────────────────────────────────────
    // Groupings and group admins
    // ─────────────────────────────────────────────────────────────────────────

    async fn insert_grouping(&self, grouping: &Grouping) -> Result<()>;

    async fn get_grouping(&self, id: &GroupingId) -> Result<Option<Grouping>>;

    /// Delete a grouping, its admin assignments and its event tags.
    async fn delete_grouping(&self, id: &GroupingId) -> Result<bool>;

    /// All groupings, ordered by name.
    async fn list_groupings(&self) -> Result<Vec<Grouping>>;

    async fn insert_group_admin(&self, admin: &GroupAdmin) -> Result<InsertResult>;

    async fn delete_group_admin(&self, grouping_id: &GroupingId, user_id: &UserId)
        -> Result<bool>;

    async fn list_group_admins(&self, grouping_id: &GroupingId) -> Result<Vec<GroupAdmin>>;

    /// Groupings `user_id` administers.
    async fn list_managed_groupings(&self, user_id: &UserId) -> Result<Vec<GroupAdmin>>;

    /// The first (by id) of `grouping_ids` that `user_id` administers.
    async fn find_administered_grouping(
        &self,
        user_id: &UserId,
        grouping_ids: &[GroupingId],
    ) -> Result<Option<GroupingId>>;

    // ─────────────────────────────────────────────────────────────────────────
    // Explicit event permissions
    // ─────────────────────────────────────────────────────────────────────────

    /// Insert or overwrite the `(event, user)` grant.
    async fn upsert_event_permission(&self, permission: &EventPermission) -> Result<()>;

    async fn get_event_permission(
        &self,
        event_id: &EventId,
        user_id: &UserId,
    ) -> Result<Option<EventPermission>>;

    async fn delete_event_permission(&self, event_id: &EventId, user_id: &UserId)
        -> Result<bool>;

    async fn list_event_permissions(&self, event_id: &EventId) -> Result<Vec<EventPermission>>;

    // ─────────────────────────────────────────────────────────────────────────
    // Teams
    // ─────────────────────────────────────────────────────────────────────────

    async fn insert_team(&self, team: &Team) -> Result<()>;

    async fn get_team(&self, id: &TeamId) -> Result<Option<Team>>;

    /// All teams, ordered by name.
    async fn list_teams(&self) -> Result<Vec<Team>>;

    /// Direct children of `parent`, ordered by id.
    async fn list_child_teams(&self, parent: &TeamId) -> Result<Vec<Team>>;

    /// Add a member if not already present.
    async fn insert_team_member(&self, member: &TeamMember) -> Result<InsertResult>;

    async fn get_team_member(&self, team_id: &TeamId, user_id: &UserId)
        -> Result<Option<TeamMember>>;

    async fn delete_team_member(&self, team_id: &TeamId, user_id: &UserId) -> Result<bool>;

    async fn set_team_member_admin(
        &self,
        team_id: &TeamId,
        user_id: &UserId,
        is_admin: bool,
    ) -> Result<bool>;

    /// Members of a team, ordered by user id.
    async fn list_team_members(&self, team_id: &TeamId) -> Result<Vec<TeamMember>>;

    // ─────────────────────────────────────────────────────────────────────────
    // Attendees
    // ─────────────────────────────────────────────────────────────────────────

    /// Add an attendee if not already present.
    async fn insert_attendee(&self, attendee: &EventAttendee) -> Result<InsertResult>;

    async fn get_attendee(&self, event_id: &EventId, user_id: &UserId)
        -> Result<Option<EventAttendee>>;

    async fn set_attendee_status(
        &self,
        event_id: &EventId,
        user_id: &UserId,
        status: AttendeeStatus,
    ) -> Result<bool>;

    /// Attendees of an event, ordered by invitation time then user id.
    async fn list_attendees(&self, event_id: &EventId) -> Result<Vec<EventAttendee>>;

    // ─────────────────────────────────────────────────────────────────────────
    // Activity log
    // ─────────────────────────────────────────────────────────────────────────

    async fn insert_activity(&self, entry: &ActivityEntry) -> Result<()>;

    /// Matching entries, newest first, at most `query.limit`.
    async fn list_activity(&self, query: &ActivityQuery) -> Result<Vec<ActivityEntry>>;
}
