//! Calendar configuration.

use teamcal_access::DEFAULT_PLACEHOLDER;

use crate::error::{CalendarError, Result};

/// Environment variable overriding the private-event placeholder title.
pub const PLACEHOLDER_ENV: &str = "TEAMCAL_PRIVATE_PLACEHOLDER";

/// Environment variable toggling the activity log (`true`/`false`).
pub const ACTIVITY_LOG_ENV: &str = "TEAMCAL_ACTIVITY_LOG";

/// Environment variable setting the default activity page size.
pub const ACTIVITY_PAGE_SIZE_ENV: &str = "TEAMCAL_ACTIVITY_PAGE_SIZE";

/// Configuration for the [`Calendar`](crate::Calendar).
///
/// The master key is not part of this struct; it is loaded into a
/// [`KeyEnvelope`](teamcal_crypto::KeyEnvelope) and passed separately.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CalendarConfig {
    /// Title stored and shown in place of a private event's real title.
    pub private_placeholder: String,
    /// Whether mutations append to the activity log.
    pub activity_log: bool,
    /// Entries returned by an activity query that sets no limit.
    pub activity_page_size: usize,
}

impl Default for CalendarConfig {
    fn default() -> Self {
        Self {
            private_placeholder: DEFAULT_PLACEHOLDER.to_string(),
            activity_log: true,
            activity_page_size: 50,
        }
    }
}

impl CalendarConfig {
    /// Defaults overridden by any `TEAMCAL_*` variables that are set.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Like [`from_env`](Self::from_env) with an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(placeholder) = lookup(PLACEHOLDER_ENV) {
            if placeholder.trim().is_empty() {
                return Err(CalendarError::Config(format!("{} is empty", PLACEHOLDER_ENV)));
            }
            config.private_placeholder = placeholder;
        }

        if let Some(flag) = lookup(ACTIVITY_LOG_ENV) {
            config.activity_log = flag.trim().parse().map_err(|_| {
                CalendarError::Config(format!("{} must be true or false, got {:?}", ACTIVITY_LOG_ENV, flag))
            })?;
        }

        if let Some(size) = lookup(ACTIVITY_PAGE_SIZE_ENV) {
            config.activity_page_size = size
                .trim()
                .parse()
                .ok()
                .filter(|n: &usize| *n > 0)
                .ok_or_else(|| {
                    CalendarError::Config(format!(
                        "{} must be a positive integer, got {:?}",
                        ACTIVITY_PAGE_SIZE_ENV, size
                    ))
                })?;
        }

        Ok(config)
    }
}
