//! Request and response shapes of the calendar API.

use serde::{Deserialize, Serialize};
use teamcal_access::EventCapabilities;
use teamcal_core::{Event, EventId, EventType, GroupingId, UserId};

/// Input for creating an event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewEvent {
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub start_time: i64,
    pub end_time: i64,
    #[serde(default)]
    pub is_private: bool,
    #[serde(default)]
    pub is_out_of_office: bool,
    pub event_type: EventType,
    #[serde(default)]
    pub grouping_ids: Vec<GroupingId>,
}

impl NewEvent {
    /// A public work meeting with no description or tags.
    pub fn new(title: impl Into<String>, start_time: i64, end_time: i64) -> Self {
        Self {
            title: title.into(),
            description: String::new(),
            start_time,
            end_time,
            is_private: false,
            is_out_of_office: false,
            event_type: EventType::WorkMeeting,
            grouping_ids: Vec::new(),
        }
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn private(mut self) -> Self {
        self.is_private = true;
        self
    }

    pub fn out_of_office(mut self, event_type: EventType) -> Self {
        self.is_out_of_office = true;
        self.event_type = event_type;
        self
    }

    pub fn event_type(mut self, event_type: EventType) -> Self {
        self.event_type = event_type;
        self
    }

    pub fn groupings(mut self, grouping_ids: Vec<GroupingId>) -> Self {
        self.grouping_ids = grouping_ids;
        self
    }
}

/// A partial update. `None` leaves a field unchanged.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventPatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub start_time: Option<i64>,
    pub end_time: Option<i64>,
    pub is_private: Option<bool>,
    pub is_out_of_office: Option<bool>,
    pub event_type: Option<EventType>,
    /// Replaces the event's tags wholesale when set.
    pub grouping_ids: Option<Vec<GroupingId>>,
}

impl EventPatch {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Optional narrowing of an event listing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventFilter {
    /// Only the caller's own events. Takes precedence over `owner`.
    pub mine_only: bool,
    /// Only events owned by this user.
    pub owner: Option<UserId>,
    /// Only events tagged with at least one of these groupings.
    pub grouping_ids: Vec<GroupingId>,
}

/// An event as a particular viewer may see it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventView {
    /// Content is revealed only to the owner of a private event; the
    /// sealed payload is never included.
    pub event: Event,
    pub grouping_ids: Vec<GroupingId>,
    pub permissions: EventCapabilities,
}

/// One entry of the who's-out list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutOfOffice {
    pub event_id: EventId,
    pub user_id: UserId,
    pub user_name: Option<String>,
    pub title: String,
    pub event_type: EventType,
    pub start_time: i64,
    pub end_time: i64,
}

/// Capabilities an owner grants another user on one event.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionGrant {
    pub can_edit: bool,
    pub can_delete: bool,
}

impl PermissionGrant {
    pub const EDIT: Self = Self {
        can_edit: true,
        can_delete: false,
    };

    pub const DELETE: Self = Self {
        can_edit: false,
        can_delete: true,
    };

    pub const FULL: Self = Self {
        can_edit: true,
        can_delete: true,
    };
}

/// Activity log query as exposed to admins.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActivityFilter {
    pub user_id: Option<UserId>,
    pub action: Option<String>,
    pub since: Option<i64>,
    pub until: Option<i64>,
    /// Falls back to the configured page size.
    pub limit: Option<usize>,
}
