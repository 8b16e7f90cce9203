use crate::{
    Error,
    repositories::UserRepository,
    user::{User, UserId},
    validation::normalize_email,
};
use std::sync::Arc;

/// Thin service for account administration: lookups, activation, and
/// deletion. Password material is never visible here.
pub struct UserService<U: UserRepository> {
    repository: Arc<U>,
}

impl<U: UserRepository> UserService<U> {
    pub fn new(repository: Arc<U>) -> Self {
        Self { repository }
    }

    pub async fn get_user(&self, user_id: &UserId) -> Result<Option<User>, Error> {
        self.repository.find_by_id(user_id).await
    }

    pub async fn get_user_by_email(&self, email: &str) -> Result<Option<User>, Error> {
        self.repository.find_by_email(&normalize_email(email)).await
    }

    /// Flip the active flag. Deactivated accounts fail login with
    /// `AccountInactive` and cannot refresh existing sessions.
    pub async fn set_active(&self, user_id: &UserId, active: bool) -> Result<User, Error> {
        let user = self.repository.set_active(user_id, active).await?;
        tracing::info!(user_id = %user_id, active, "changed account active state");
        Ok(user)
    }

    pub async fn delete_user(&self, user_id: &UserId) -> Result<(), Error> {
        self.repository.delete(user_id).await?;
        tracing::info!(user_id = %user_id, "deleted user");
        Ok(())
    }
}
