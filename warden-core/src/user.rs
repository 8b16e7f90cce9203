//! User identity types
//!
//! [`User`] is the account entity minus its secret material: the password
//! hash lives behind the password repository and never travels with the
//! user. The `is_active` flag gates login, `email_verified_at` records
//! verification, and `last_login_at` is bookkeeping updated on successful
//! authentication.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::Display;

use crate::{
    Error,
    error::ValidationError,
    id::{generate_prefixed_id, validate_prefixed_id},
};

/// Unique identifier for a user, of the form `usr_{random}`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UserId(String);

impl UserId {
    /// Wrap an existing ID string.
    pub fn new(id: &str) -> Self {
        Self(id.to_string())
    }

    /// Generate a new random user ID.
    pub fn new_random() -> Self {
        Self(generate_prefixed_id("usr"))
    }

    /// Check the `usr_` prefix and entropy of the wrapped string.
    pub fn is_valid(&self) -> bool {
        validate_prefixed_id(&self.0, "usr")
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

impl Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for UserId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for UserId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl AsRef<str> for UserId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// A user account.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    /// Stored lowercase; unique per account.
    pub email: String,
    pub given_name: Option<String>,
    pub family_name: Option<String>,
    /// Inactive accounts exist but cannot authenticate.
    pub is_active: bool,
    pub email_verified_at: Option<DateTime<Utc>>,
    pub last_login_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    pub fn builder() -> UserBuilder {
        UserBuilder::default()
    }

    pub fn is_email_verified(&self) -> bool {
        self.email_verified_at.is_some()
    }

    /// Full display name when at least one name part is present.
    pub fn display_name(&self) -> Option<String> {
        match (self.given_name.as_deref(), self.family_name.as_deref()) {
            (Some(given), Some(family)) => Some(format!("{given} {family}")),
            (Some(given), None) => Some(given.to_string()),
            (None, Some(family)) => Some(family.to_string()),
            (None, None) => None,
        }
    }
}

/// Builder for [`User`].
#[derive(Default)]
pub struct UserBuilder {
    id: Option<UserId>,
    email: Option<String>,
    given_name: Option<String>,
    family_name: Option<String>,
    is_active: Option<bool>,
    email_verified_at: Option<DateTime<Utc>>,
    last_login_at: Option<DateTime<Utc>>,
}

impl UserBuilder {
    pub fn id(mut self, id: UserId) -> Self {
        self.id = Some(id);
        self
    }

    pub fn email(mut self, email: String) -> Self {
        self.email = Some(email);
        self
    }

    pub fn given_name(mut self, given_name: Option<String>) -> Self {
        self.given_name = given_name;
        self
    }

    pub fn family_name(mut self, family_name: Option<String>) -> Self {
        self.family_name = family_name;
        self
    }

    pub fn is_active(mut self, is_active: bool) -> Self {
        self.is_active = Some(is_active);
        self
    }

    pub fn email_verified_at(mut self, at: Option<DateTime<Utc>>) -> Self {
        self.email_verified_at = at;
        self
    }

    pub fn last_login_at(mut self, at: Option<DateTime<Utc>>) -> Self {
        self.last_login_at = at;
        self
    }

    pub fn build(self) -> Result<User, Error> {
        let email = self.email.ok_or(Error::Validation(
            ValidationError::MissingField("email is required".to_string()),
        ))?;
        let now = Utc::now();
        Ok(User {
            id: self.id.unwrap_or_else(UserId::new_random),
            email,
            given_name: self.given_name,
            family_name: self.family_name,
            is_active: self.is_active.unwrap_or(true),
            email_verified_at: self.email_verified_at,
            last_login_at: self.last_login_at,
            created_at: now,
            updated_at: now,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_id_generation() {
        let id = UserId::new_random();
        assert!(id.is_valid());
        assert!(id.as_str().starts_with("usr_"));
    }

    #[test]
    fn test_user_id_validation_rejects_foreign_ids() {
        assert!(!UserId::new("tnt_AAAAAAAAAAAAAAAA").is_valid());
        assert!(!UserId::new("garbage").is_valid());
    }

    #[test]
    fn test_user_builder() {
        let user = User::builder()
            .email("user@example.com".to_string())
            .given_name(Some("Ada".to_string()))
            .build()
            .unwrap();

        assert!(user.id.is_valid());
        assert_eq!(user.email, "user@example.com");
        assert!(user.is_active);
        assert!(!user.is_email_verified());
        assert_eq!(user.last_login_at, None);
    }

    #[test]
    fn test_user_builder_requires_email() {
        let result = User::builder().given_name(Some("Ada".to_string())).build();
        assert!(result.is_err());
    }

    #[test]
    fn test_display_name() {
        let mut user = User::builder()
            .email("user@example.com".to_string())
            .build()
            .unwrap();
        assert_eq!(user.display_name(), None);

        user.given_name = Some("Ada".to_string());
        assert_eq!(user.display_name(), Some("Ada".to_string()));

        user.family_name = Some("Lovelace".to_string());
        assert_eq!(user.display_name(), Some("Ada Lovelace".to_string()));
    }
}
