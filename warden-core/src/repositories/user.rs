use crate::{Error, User, UserId};
use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// Repository for user account data access
#[async_trait]
pub trait UserRepository: Send + Sync + 'static {
    /// Create a new user. Fails with a constraint error when the email is
    /// already taken.
    async fn create(&self, user: User) -> Result<User, Error>;

    /// Find a user by ID
    async fn find_by_id(&self, id: &UserId) -> Result<Option<User>, Error>;

    /// Find a user by (normalized) email
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, Error>;

    /// Update an existing user
    async fn update(&self, user: &User) -> Result<User, Error>;

    /// Flip the active flag; inactive accounts cannot authenticate
    async fn set_active(&self, id: &UserId, active: bool) -> Result<User, Error>;

    /// Mark a user's email as verified
    async fn mark_email_verified(&self, id: &UserId) -> Result<(), Error>;

    /// Record a successful login instant
    async fn record_login(&self, id: &UserId, at: DateTime<Utc>) -> Result<(), Error>;

    /// Delete a user by ID
    async fn delete(&self, id: &UserId) -> Result<(), Error>;
}
