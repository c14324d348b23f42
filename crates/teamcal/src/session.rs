//! Caller identity.

use teamcal_core::UserId;

use crate::error::{CalendarError, Result};

/// The identity behind a request, as established by the surrounding
/// application. The calendar trusts it as given and performs no
/// authentication itself.
///
/// Only the user id is carried. Roles are read from storage on every check,
/// so a promotion or demotion applies to the very next call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Session {
    user_id: Option<UserId>,
}

impl Session {
    /// A request with no signed-in user.
    pub const fn anonymous() -> Self {
        Self { user_id: None }
    }

    /// A request made by `user_id`.
    pub const fn user(user_id: UserId) -> Self {
        Self {
            user_id: Some(user_id),
        }
    }

    pub fn user_id(&self) -> Option<&UserId> {
        self.user_id.as_ref()
    }

    pub fn is_anonymous(&self) -> bool {
        self.user_id.is_none()
    }

    /// The caller's id, or [`CalendarError::Unauthorized`].
    pub fn require(&self) -> Result<UserId> {
        self.user_id.ok_or(CalendarError::Unauthorized)
    }
}

impl From<UserId> for Session {
    fn from(user_id: UserId) -> Self {
        Self::user(user_id)
    }
}
