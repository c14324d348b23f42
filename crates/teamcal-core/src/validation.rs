//! Structural validation of user input.

use crate::error::{CoreError, Result};

/// Check the `end_time > start_time` invariant.
pub fn validate_event_times(start: i64, end: i64) -> Result<()> {
    if end <= start {
        return Err(CoreError::InvalidTimeRange { start, end });
    }
    Ok(())
}

/// Titles must contain something other than whitespace.
pub fn validate_title(title: &str) -> Result<()> {
    if title.trim().is_empty() {
        return Err(CoreError::EmptyTitle);
    }
    Ok(())
}

/// Grouping and team names follow the same rule as titles.
pub fn validate_name(kind: &'static str, name: &str) -> Result<()> {
    if name.trim().is_empty() {
        return Err(CoreError::EmptyName(kind));
    }
    Ok(())
}

/// `#rgb` or `#rrggbb`.
pub fn validate_color(color: &str) -> Result<()> {
    let digits = color
        .strip_prefix('#')
        .filter(|d| matches!(d.len(), 3 | 6) && d.chars().all(|c| c.is_ascii_hexdigit()));
    match digits {
        Some(_) => Ok(()),
        None => Err(CoreError::InvalidColor(color.to_string())),
    }
}

/// Minimal shape check: one `@` with a non-empty local part and a dotted domain.
pub fn validate_email(email: &str) -> Result<()> {
    let invalid = || CoreError::InvalidEmail(email.to_string());

    let (local, domain) = email.split_once('@').ok_or_else(invalid)?;
    if local.is_empty() || domain.contains('@') || email.chars().any(char::is_whitespace) {
        return Err(invalid());
    }
    match domain.split_once('.') {
        Some((host, tld)) if !host.is_empty() && !tld.is_empty() => Ok(()),
        _ => Err(invalid()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_end_must_follow_start() {
        assert!(validate_event_times(0, 1).is_ok());
        assert_eq!(
            validate_event_times(5, 5),
            Err(CoreError::InvalidTimeRange { start: 5, end: 5 })
        );
        assert!(validate_event_times(10, 5).is_err());
    }

    #[test]
    fn test_blank_title_rejected() {
        assert!(validate_title("Dentist").is_ok());
        assert_eq!(validate_title("   "), Err(CoreError::EmptyTitle));
    }

    #[test]
    fn test_names_and_colors() {
        assert!(validate_name("team", "Platform").is_ok());
        assert_eq!(validate_name("team", " "), Err(CoreError::EmptyName("team")));
        assert!(validate_color("#3b82f6").is_ok());
        assert!(validate_color("#FFF").is_ok());
        assert!(validate_color("3b82f6").is_err());
        assert!(validate_color("#12345g").is_err());
    }

    #[test]
    fn test_email_shapes() {
        assert!(validate_email("ada@example.com").is_ok());
        assert!(validate_email("ada.lovelace@mail.example.org").is_ok());
        assert!(validate_email("ada").is_err());
        assert!(validate_email("@example.com").is_err());
        assert!(validate_email("ada@example").is_err());
        assert!(validate_email("ada@@example.com").is_err());
        assert!(validate_email("a da@example.com").is_err());
    }

    proptest! {
        #[test]
        fn test_times_valid_iff_end_after_start(start in any::<i64>(), end in any::<i64>()) {
            prop_assert_eq!(validate_event_times(start, end).is_ok(), end > start);
        }
    }
}
