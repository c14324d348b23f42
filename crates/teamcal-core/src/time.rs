//! Time helpers. All timestamps are Unix milliseconds.

use serde::{Deserialize, Serialize};

/// An inclusive time window used by range queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeRange {
    pub start: i64,
    pub end: i64,
}

impl TimeRange {
    pub const fn new(start: i64, end: i64) -> Self {
        Self { start, end }
    }

    /// The widest possible window.
    pub const fn all() -> Self {
        Self {
            start: i64::MIN,
            end: i64::MAX,
        }
    }

    /// Whether an interval lies entirely inside this window.
    pub fn contains(&self, start: i64, end: i64) -> bool {
        start >= self.start && end <= self.end
    }
}

/// Get current time in milliseconds.
pub fn now_millis() -> i64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_range_contains_is_inclusive() {
        let range = TimeRange::new(10, 20);
        assert!(range.contains(10, 20));
        assert!(!range.contains(9, 20));
        assert!(!range.contains(10, 21));
    }

    #[test]
    fn test_all_contains_everything() {
        assert!(TimeRange::all().contains(i64::MIN, i64::MAX));
    }
}
