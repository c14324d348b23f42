//! Domain records.
//!
//! These are the rows the store persists. They carry no behaviour beyond
//! small helpers; access rules live in `teamcal-access`.

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::types::{ActivityId, EventId, GroupingId, TeamId, UserId};

/// System-wide role of a user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    #[default]
    User,
    Admin,
}

impl Role {
    /// Stable string form used in storage.
    pub fn as_str(self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Admin => "admin",
        }
    }

    /// Parse the storage form.
    pub fn parse(value: &str) -> Result<Self, CoreError> {
        match value {
            "user" => Ok(Role::User),
            "admin" => Ok(Role::Admin),
            other => Err(CoreError::UnknownRole(other.to_string())),
        }
    }

    pub fn is_admin(self) -> bool {
        matches!(self, Role::Admin)
    }
}

/// A user account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub email: String,
    pub name: String,
    /// Opaque hash produced by the external password hasher.
    pub password_hash: String,
    pub role: Role,
    /// The user's data key, enveloped under the master key (`iv:tag:ct`).
    ///
    /// `None` only for corrupted or legacy accounts; such users cannot
    /// create private events.
    pub encrypted_private_key: Option<String>,
    pub email_verified: bool,
    pub created_at: i64,
    pub updated_at: i64,
}

/// Category of an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    Vacation,
    SickLeave,
    ProjectTravel,
    PersonalTravel,
    PersonalAppointment,
    WorkMeeting,
    WorkGathering,
}

impl EventType {
    pub const ALL: [EventType; 7] = [
        EventType::Vacation,
        EventType::SickLeave,
        EventType::ProjectTravel,
        EventType::PersonalTravel,
        EventType::PersonalAppointment,
        EventType::WorkMeeting,
        EventType::WorkGathering,
    ];

    /// Stable string form used in storage.
    pub fn as_str(self) -> &'static str {
        match self {
            EventType::Vacation => "vacation",
            EventType::SickLeave => "sick_leave",
            EventType::ProjectTravel => "project_travel",
            EventType::PersonalTravel => "personal_travel",
            EventType::PersonalAppointment => "personal_appointment",
            EventType::WorkMeeting => "work_meeting",
            EventType::WorkGathering => "work_gathering",
        }
    }

    /// Parse the storage form.
    pub fn parse(value: &str) -> Result<Self, CoreError> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == value)
            .ok_or_else(|| CoreError::UnknownEventType(value.to_string()))
    }
}

/// A scheduled interval owned by one user.
///
/// When `is_private` is set, `title` and `description` hold placeholder
/// values and the real content lives only in `encrypted_data`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    pub id: EventId,
    /// Owner.
    pub user_id: UserId,
    pub title: String,
    pub description: String,
    pub start_time: i64,
    pub end_time: i64,
    pub is_private: bool,
    pub is_out_of_office: bool,
    pub event_type: EventType,
    /// Sealed `{title, description}` payload (`iv:tag:ct`), private events only.
    pub encrypted_data: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
}

impl Event {
    /// Whether `user` owns this event.
    pub fn is_owned_by(&self, user: &UserId) -> bool {
        self.user_id == *user
    }

    /// Whether the event lies entirely inside `[start, end]`.
    pub fn is_within(&self, start: i64, end: i64) -> bool {
        self.start_time >= start && self.end_time <= end
    }
}

/// A tag attached to events.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Grouping {
    pub id: GroupingId,
    pub name: String,
    /// Hex colour code, e.g. `#3b82f6`.
    pub color: Option<String>,
    /// `None` means visible to everyone; otherwise private to that user.
    pub user_id: Option<UserId>,
    pub created_at: i64,
}

impl Grouping {
    /// Whether `viewer` may see this grouping.
    pub fn is_visible_to(&self, viewer: &UserId) -> bool {
        match &self.user_id {
            None => true,
            Some(owner) => owner == viewer,
        }
    }
}

/// Grants edit/delete authority over every event tagged with a grouping.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupAdmin {
    pub grouping_id: GroupingId,
    pub user_id: UserId,
    pub assigned_by: UserId,
    pub assigned_at: i64,
}

/// Explicit per-event capabilities granted by an event owner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventPermission {
    pub event_id: EventId,
    pub user_id: UserId,
    pub can_edit: bool,
    pub can_delete: bool,
    pub granted_by: UserId,
    pub granted_at: i64,
}

/// A node in the team tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Team {
    pub id: TeamId,
    pub name: String,
    pub parent_team_id: Option<TeamId>,
    pub is_private: bool,
    pub created_by: UserId,
    pub created_at: i64,
}

/// Flat membership of a user in a team.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeamMember {
    pub team_id: TeamId,
    pub user_id: UserId,
    pub is_admin: bool,
    pub joined_at: i64,
}

/// RSVP state of an attendee.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttendeeStatus {
    #[default]
    Pending,
    Accepted,
    Declined,
    Tentative,
}

impl AttendeeStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            AttendeeStatus::Pending => "pending",
            AttendeeStatus::Accepted => "accepted",
            AttendeeStatus::Declined => "declined",
            AttendeeStatus::Tentative => "tentative",
        }
    }

    pub fn parse(value: &str) -> Result<Self, CoreError> {
        match value {
            "pending" => Ok(AttendeeStatus::Pending),
            "accepted" => Ok(AttendeeStatus::Accepted),
            "declined" => Ok(AttendeeStatus::Declined),
            "tentative" => Ok(AttendeeStatus::Tentative),
            other => Err(CoreError::UnknownAttendeeStatus(other.to_string())),
        }
    }
}

/// An invitation of a user to a (public) event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventAttendee {
    pub event_id: EventId,
    pub user_id: UserId,
    pub status: AttendeeStatus,
    /// Team through which the user was invited, if any. Informational only.
    pub invited_via_team_id: Option<TeamId>,
    pub invited_at: i64,
}

/// One line of the audit trail.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivityEntry {
    pub id: ActivityId,
    pub user_id: UserId,
    pub action: String,
    pub entity_type: String,
    pub entity_id: Option<String>,
    /// JSON document with action-specific details.
    pub details: Option<String>,
    pub created_at: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_type_string_roundtrip() {
        for kind in EventType::ALL {
            assert_eq!(EventType::parse(kind.as_str()).unwrap(), kind);
        }
        assert!(EventType::parse("holiday").is_err());
    }

    #[test]
    fn test_event_type_serde_matches_storage_form() {
        let json = serde_json::to_string(&EventType::SickLeave).unwrap();
        assert_eq!(json, "\"sick_leave\"");
    }

    #[test]
    fn test_role_parse() {
        assert_eq!(Role::parse("admin").unwrap(), Role::Admin);
        assert_eq!(Role::parse("user").unwrap(), Role::User);
        assert_eq!(
            Role::parse("root"),
            Err(CoreError::UnknownRole("root".into()))
        );
    }

    #[test]
    fn test_grouping_visibility() {
        let owner = UserId::new();
        let other = UserId::new();
        let mut grouping = Grouping {
            id: GroupingId::new(),
            name: "Platform".into(),
            color: None,
            user_id: None,
            created_at: 0,
        };
        assert!(grouping.is_visible_to(&other));

        grouping.user_id = Some(owner);
        assert!(grouping.is_visible_to(&owner));
        assert!(!grouping.is_visible_to(&other));
    }

    #[test]
    fn test_event_within_range() {
        let event = Event {
            id: EventId::new(),
            user_id: UserId::new(),
            title: "Standup".into(),
            description: String::new(),
            start_time: 100,
            end_time: 200,
            is_private: false,
            is_out_of_office: false,
            event_type: EventType::WorkMeeting,
            encrypted_data: None,
            created_at: 0,
            updated_at: 0,
        };

        assert!(event.is_within(100, 200));
        assert!(event.is_within(0, 300));
        assert!(!event.is_within(150, 300));
        assert!(!event.is_within(0, 199));
    }
}
