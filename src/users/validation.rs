use lazy_static::lazy_static;
use regex::Regex;

use crate::{
    auth::password::strength_problem,
    error::ApiError,
    users::dto::{UserCreate, UserUpdate},
};

pub const MAX_EMAIL_LEN: usize = 255;
pub const MAX_NAME_LEN: usize = 100;
pub const MAX_BIO_LEN: usize = 10_000;
pub const MAX_URL_LEN: usize = 2048;

lazy_static! {
    static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    static ref NICKNAME_RE: Regex = Regex::new(r"^[A-Za-z0-9_-]{3,50}$").unwrap();
    static ref URL_RE: Regex = Regex::new(r"^https?://[^\s/$.?#][^\s]*$").unwrap();
}

pub fn is_valid_email(email: &str) -> bool {
    EMAIL_RE.is_match(email)
}

pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

pub fn nickname_problem(nickname: &str) -> Option<&'static str> {
    if NICKNAME_RE.is_match(nickname) {
        None
    } else {
        Some("Nickname must be 3-50 characters of letters, digits, '_' or '-'")
    }
}

fn invalid(msg: impl Into<String>) -> ApiError {
    ApiError::Validation(msg.into())
}

fn check_email(email: &str) -> Result<(), ApiError> {
    if !is_valid_email(email) {
        return Err(invalid("value is not a valid email address"));
    }
    if email.chars().count() > MAX_EMAIL_LEN {
        return Err(invalid(format!("email must be at most {MAX_EMAIL_LEN} characters")));
    }
    Ok(())
}

fn check_nickname(nickname: &str) -> Result<(), ApiError> {
    nickname_problem(nickname).map_or(Ok(()), |m| Err(invalid(m)))
}

fn check_name(field: &str, value: &str) -> Result<(), ApiError> {
    if value.trim().is_empty() {
        return Err(invalid(format!("{field} must not be empty")));
    }
    if value.chars().count() > MAX_NAME_LEN {
        return Err(invalid(format!("{field} must be at most {MAX_NAME_LEN} characters")));
    }
    Ok(())
}

fn check_bio(bio: &str) -> Result<(), ApiError> {
    if bio.chars().count() > MAX_BIO_LEN {
        return Err(invalid(format!("bio must be at most {MAX_BIO_LEN} characters")));
    }
    Ok(())
}

fn check_url(field: &str, value: &str) -> Result<(), ApiError> {
    if value.len() > MAX_URL_LEN || !URL_RE.is_match(value) {
        return Err(invalid(format!("{field} must be a valid http(s) URL")));
    }
    Ok(())
}

struct ProfileFields<'a> {
    first_name: Option<&'a str>,
    last_name: Option<&'a str>,
    bio: Option<&'a str>,
    profile_picture_url: Option<&'a str>,
    github_profile_url: Option<&'a str>,
    linkedin_profile_url: Option<&'a str>,
}

fn check_profile(p: ProfileFields<'_>) -> Result<(), ApiError> {
    if let Some(v) = p.first_name {
        check_name("first_name", v)?;
    }
    if let Some(v) = p.last_name {
        check_name("last_name", v)?;
    }
    if let Some(v) = p.bio {
        check_bio(v)?;
    }
    for (field, value) in [
        ("profile_picture_url", p.profile_picture_url),
        ("github_profile_url", p.github_profile_url),
        ("linkedin_profile_url", p.linkedin_profile_url),
    ] {
        if let Some(v) = value {
            check_url(field, v)?;
        }
    }
    Ok(())
}

/// Expects the email to be normalized already.
pub fn validate_create(c: &UserCreate) -> Result<(), ApiError> {
    check_email(&c.email)?;
    if let Some(problem) = strength_problem(&c.password) {
        return Err(invalid(problem));
    }
    if let Some(nick) = &c.nickname {
        check_nickname(nick)?;
    }
    check_profile(ProfileFields {
        first_name: c.first_name.as_deref(),
        last_name: c.last_name.as_deref(),
        bio: c.bio.as_deref(),
        profile_picture_url: c.profile_picture_url.as_deref(),
        github_profile_url: c.github_profile_url.as_deref(),
        linkedin_profile_url: c.linkedin_profile_url.as_deref(),
    })
}

/// Expects the email, if any, to be normalized already.
pub fn validate_update(u: &UserUpdate) -> Result<(), ApiError> {
    if u.is_empty() {
        return Err(invalid("At least one field must be provided for update"));
    }
    if let Some(email) = &u.email {
        check_email(email)?;
    }
    if let Some(nick) = &u.nickname {
        check_nickname(nick)?;
    }
    check_profile(ProfileFields {
        first_name: u.first_name.as_deref(),
        last_name: u.last_name.as_deref(),
        bio: u.bio.as_deref(),
        profile_picture_url: u.profile_picture_url.as_deref(),
        github_profile_url: u.github_profile_url.as_deref(),
        linkedin_profile_url: u.linkedin_profile_url.as_deref(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn update(f: impl FnOnce(&mut UserUpdate)) -> UserUpdate {
        let mut u = UserUpdate::default();
        f(&mut u);
        u
    }

    #[test]
    fn email_shapes() {
        assert!(is_valid_email("test@example.com"));
        assert!(is_valid_email("first.last+tag@sub.example.org"));
        assert!(!is_valid_email("notanemail"));
        assert!(!is_valid_email("a@b"));
        assert!(!is_valid_email("with space@example.com"));
        assert_eq!(normalize_email("  Mixed@Example.COM "), "mixed@example.com");
    }

    #[test]
    fn empty_update_is_rejected() {
        assert!(matches!(
            validate_update(&UserUpdate::default()),
            Err(ApiError::Validation(_))
        ));
    }

    #[test]
    fn blank_names_are_rejected() {
        let u = update(|u| u.first_name = Some("   ".into()));
        assert!(validate_update(&u).is_err());
        let u = update(|u| u.last_name = Some(String::new()));
        assert!(validate_update(&u).is_err());
    }

    #[test]
    fn email_and_names_have_column_limits() {
        let local = "a".repeat(MAX_EMAIL_LEN - "@example.com".len());
        let u = update(|u| u.email = Some(format!("{local}@example.com")));
        assert!(validate_update(&u).is_ok());
        let u = update(|u| u.email = Some(format!("{local}a@example.com")));
        assert!(matches!(validate_update(&u), Err(ApiError::Validation(_))));

        let u = update(|u| u.first_name = Some("J".repeat(MAX_NAME_LEN)));
        assert!(validate_update(&u).is_ok());
        let u = update(|u| u.last_name = Some("D".repeat(MAX_NAME_LEN + 1)));
        assert!(validate_update(&u).is_err());
    }

    #[test]
    fn bio_is_opaque_text_up_to_limit() {
        let u = update(|u| u.bio = Some("Robert'); DROP TABLE users;--".into()));
        assert!(validate_update(&u).is_ok());
        let u = update(|u| u.bio = Some("!@#$%^&*()_+-=~`[]{}|;':,./<>?".into()));
        assert!(validate_update(&u).is_ok());
        let u = update(|u| u.bio = Some("A".repeat(MAX_BIO_LEN)));
        assert!(validate_update(&u).is_ok());
        let u = update(|u| u.bio = Some("A".repeat(MAX_BIO_LEN + 1)));
        assert!(validate_update(&u).is_err());
    }

    #[test]
    fn profile_urls_must_be_http() {
        let u = update(|u| u.github_profile_url = Some("http://www.github.com/kaw393939".into()));
        assert!(validate_update(&u).is_ok());
        let u = update(|u| u.linkedin_profile_url = Some("javascript:alert(1)".into()));
        assert!(validate_update(&u).is_err());
    }

    #[test]
    fn nickname_rules() {
        assert_eq!(nickname_problem("john_doe-1"), None);
        assert!(nickname_problem("jo").is_some());
        assert!(nickname_problem("has space").is_some());
        assert!(nickname_problem(&"x".repeat(51)).is_some());
    }

    #[test]
    fn create_requires_strong_password() {
        let c = UserCreate {
            email: "a@example.com".into(),
            password: "weak".into(),
            nickname: None,
            first_name: None,
            last_name: None,
            bio: None,
            profile_picture_url: None,
            github_profile_url: None,
            linkedin_profile_url: None,
            role: None,
        };
        assert!(validate_create(&c).is_err());
        let c = UserCreate {
            password: "ValidPassword123!".into(),
            ..c
        };
        assert!(validate_create(&c).is_ok());
    }
}
