//! Input validation utilities
//!
//! Format checks for the values that cross the crate boundary: email
//! addresses, display names, and tenant slugs. Password strength is
//! policy, not format, and lives with
//! [`PasswordPolicy`](crate::services::PasswordPolicy).

use crate::error::ValidationError;
use regex::Regex;
use std::sync::LazyLock;

static EMAIL_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$")
        .expect("email regex must compile")
});

const MAX_EMAIL_LENGTH: usize = 254;
const MAX_NAME_LENGTH: usize = 100;
const MAX_SLUG_LENGTH: usize = 64;

/// Canonical form used for storage and lookups: trimmed and lowercased.
///
/// Two logins with `User@example.com` and `user@example.com` must hit the
/// same account and the same failure counter.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Validate an email address format.
pub fn validate_email(email: &str) -> Result<(), ValidationError> {
    if email.is_empty() {
        return Err(ValidationError::MissingField("email".to_string()));
    }
    if email.len() > MAX_EMAIL_LENGTH {
        return Err(ValidationError::InvalidEmail(format!(
            "email exceeds {MAX_EMAIL_LENGTH} characters"
        )));
    }
    if !EMAIL_REGEX.is_match(email) {
        return Err(ValidationError::InvalidEmail(
            "email format is invalid".to_string(),
        ));
    }
    Ok(())
}

/// Validate an optional display name (given or family name).
pub fn validate_name(name: Option<&str>) -> Result<(), ValidationError> {
    if let Some(name) = name {
        if name.trim().is_empty() {
            return Err(ValidationError::InvalidName(
                "name must not be blank".to_string(),
            ));
        }
        if name.len() > MAX_NAME_LENGTH {
            return Err(ValidationError::InvalidName(format!(
                "name exceeds {MAX_NAME_LENGTH} characters"
            )));
        }
    }
    Ok(())
}

/// Validate a tenant slug: lowercase alphanumerics and single hyphens,
/// no leading or trailing hyphen, at most 64 characters.
pub fn validate_slug(slug: &str) -> Result<(), ValidationError> {
    if slug.is_empty() {
        return Err(ValidationError::MissingField("slug".to_string()));
    }
    if slug.len() > MAX_SLUG_LENGTH {
        return Err(ValidationError::InvalidField(format!(
            "slug exceeds {MAX_SLUG_LENGTH} characters"
        )));
    }
    let valid_chars = slug
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-');
    if !valid_chars || slug.starts_with('-') || slug.ends_with('-') || slug.contains("--") {
        return Err(ValidationError::InvalidField(
            "slug must be lowercase alphanumerics separated by single hyphens".to_string(),
        ));
    }
    Ok(())
}

/// Derive a slug from a display name.
///
/// Lowercases, maps non-alphanumeric runs to single hyphens, and truncates
/// so a collision suffix still fits under the slug length cap.
pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    let mut last_was_hyphen = true; // suppress a leading hyphen
    for c in name.chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c.to_ascii_lowercase());
            last_was_hyphen = false;
        } else if !last_was_hyphen {
            slug.push('-');
            last_was_hyphen = true;
        }
    }
    while slug.ends_with('-') {
        slug.pop();
    }
    slug.truncate(MAX_SLUG_LENGTH - 16);
    while slug.ends_with('-') {
        slug.pop();
    }
    slug
}
