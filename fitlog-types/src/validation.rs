//! Input limits shared by the JSON API and the HTML forms.

use thiserror::Error;

pub const USERNAME_MIN: usize = 3;
pub const USERNAME_MAX: usize = 32;
pub const PASSWORD_MIN: usize = 4;
pub const DISPLAY_NAME_MAX: usize = 50;
pub const BIO_MAX: usize = 280;
pub const SPORT_MAX: usize = 50;
pub const MESSAGE_MAX: usize = 500;
pub const COMMENT_MAX: usize = 500;
pub const MINUTES_MAX: i64 = 24 * 60;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("username must be 3-32 characters of letters, digits or '_'")]
    InvalidUsername,
    #[error("password must be at least 4 characters")]
    PasswordTooShort,
    #[error("display name must be 1-50 characters")]
    InvalidDisplayName,
    #[error("bio exceeds 280 characters")]
    BioTooLong,
    #[error("sport must be 1-50 characters")]
    InvalidSport,
    #[error("minutes must be a whole number between 1 and 1440")]
    InvalidMinutes,
    #[error("message exceeds 500 characters")]
    MessageTooLong,
    #[error("comment must be 1-500 characters")]
    InvalidComment,
    #[error("visibility must be one of public, friends, private")]
    InvalidVisibility,
}

pub fn validate_username(username: &str) -> Result<(), ValidationError> {
    let len = username.chars().count();
    let charset_ok = username
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_');
    if !(USERNAME_MIN..=USERNAME_MAX).contains(&len) || !charset_ok {
        return Err(ValidationError::InvalidUsername);
    }
    Ok(())
}

pub fn validate_password(password: &str) -> Result<(), ValidationError> {
    if password.chars().count() < PASSWORD_MIN {
        return Err(ValidationError::PasswordTooShort);
    }
    Ok(())
}

/// Trims and checks a display name, returning the value to store
pub fn normalize_display_name(name: &str) -> Result<String, ValidationError> {
    let name = name.trim();
    let len = name.chars().count();
    if len == 0 || len > DISPLAY_NAME_MAX {
        return Err(ValidationError::InvalidDisplayName);
    }
    Ok(name.to_string())
}

/// Trims a bio; an empty bio clears it
pub fn normalize_bio(bio: &str) -> Result<Option<String>, ValidationError> {
    let bio = bio.trim();
    if bio.chars().count() > BIO_MAX {
        return Err(ValidationError::BioTooLong);
    }
    Ok((!bio.is_empty()).then(|| bio.to_string()))
}

pub fn normalize_sport(sport: &str) -> Result<String, ValidationError> {
    let sport = sport.trim();
    let len = sport.chars().count();
    if len == 0 || len > SPORT_MAX {
        return Err(ValidationError::InvalidSport);
    }
    Ok(sport.to_string())
}

/// Parses the minutes field as submitted by a form
pub fn parse_minutes(raw: &str) -> Result<i64, ValidationError> {
    let minutes: i64 = raw
        .trim()
        .parse()
        .map_err(|_| ValidationError::InvalidMinutes)?;
    validate_minutes(minutes)?;
    Ok(minutes)
}

pub fn validate_minutes(minutes: i64) -> Result<(), ValidationError> {
    if !(1..=MINUTES_MAX).contains(&minutes) {
        return Err(ValidationError::InvalidMinutes);
    }
    Ok(())
}

/// Trims an optional post message; blank becomes `None`
pub fn normalize_message(message: Option<&str>) -> Result<Option<String>, ValidationError> {
    match message.map(str::trim) {
        None | Some("") => Ok(None),
        Some(m) if m.chars().count() > MESSAGE_MAX => Err(ValidationError::MessageTooLong),
        Some(m) => Ok(Some(m.to_string())),
    }
}

pub fn normalize_comment(content: &str) -> Result<String, ValidationError> {
    let content = content.trim();
    let len = content.chars().count();
    if len == 0 || len > COMMENT_MAX {
        return Err(ValidationError::InvalidComment);
    }
    Ok(content.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn username_rules() {
        assert!(validate_username("alice").is_ok());
        assert!(validate_username("run_2024").is_ok());
        assert_eq!(validate_username("al"), Err(ValidationError::InvalidUsername));
        assert_eq!(validate_username("has space"), Err(ValidationError::InvalidUsername));
        assert_eq!(validate_username("跑步者"), Err(ValidationError::InvalidUsername));
    }

    #[test]
    fn minutes_from_form() {
        assert_eq!(parse_minutes("30"), Ok(30));
        assert_eq!(parse_minutes(" 45 "), Ok(45));
        assert_eq!(parse_minutes("0"), Err(ValidationError::InvalidMinutes));
        assert_eq!(parse_minutes("1441"), Err(ValidationError::InvalidMinutes));
        assert_eq!(parse_minutes("half an hour"), Err(ValidationError::InvalidMinutes));
    }

    #[test]
    fn blank_message_is_none() {
        assert_eq!(normalize_message(None), Ok(None));
        assert_eq!(normalize_message(Some("   ")), Ok(None));
        assert_eq!(
            normalize_message(Some(" morning run ")),
            Ok(Some("morning run".to_string()))
        );
    }

    #[test]
    fn message_limit_counts_characters_not_bytes() {
        let message = "跑".repeat(MESSAGE_MAX);
        assert!(normalize_message(Some(&message)).is_ok());
        let message = "跑".repeat(MESSAGE_MAX + 1);
        assert_eq!(
            normalize_message(Some(&message)),
            Err(ValidationError::MessageTooLong)
        );
    }

    #[test]
    fn sport_accepts_unicode() {
        assert_eq!(normalize_sport(" 游泳 "), Ok("游泳".to_string()));
        assert_eq!(normalize_sport(""), Err(ValidationError::InvalidSport));
    }

    #[test]
    fn empty_bio_clears() {
        assert_eq!(normalize_bio("  "), Ok(None));
        assert_eq!(normalize_bio("x".repeat(BIO_MAX + 1).as_str()), Err(ValidationError::BioTooLong));
    }

    proptest! {
        #[test]
        fn prop_minutes_in_range_accepted(minutes in 1i64..=MINUTES_MAX) {
            prop_assert_eq!(parse_minutes(&minutes.to_string()), Ok(minutes));
        }

        #[test]
        fn prop_minutes_out_of_range_rejected(minutes in prop_oneof![i64::MIN..=0i64, (MINUTES_MAX + 1)..=i64::MAX]) {
            prop_assert_eq!(validate_minutes(minutes), Err(ValidationError::InvalidMinutes));
        }

        #[test]
        fn prop_valid_usernames_accepted(username in "[A-Za-z0-9_]{3,32}") {
            prop_assert!(validate_username(&username).is_ok());
        }
    }
}
