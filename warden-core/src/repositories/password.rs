use crate::{Error, UserId};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A stored password credential. The hash is the only secret-derived value
/// this crate ever persists for a password.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredCredential {
    pub user_id: UserId,
    pub password_hash: String,
    /// When the password was last set; bumped on every change or reset.
    pub changed_at: DateTime<Utc>,
}

/// One retained previous password hash.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PasswordHistoryEntry {
    pub user_id: UserId,
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
}

/// Repository for password credentials and password history
#[async_trait]
pub trait PasswordRepository: Send + Sync + 'static {
    /// Upsert the credential for a user, bumping `changed_at`
    async fn set_password_hash(&self, user_id: &UserId, hash: &str) -> Result<(), Error>;

    /// Fetch the current credential, if the user has one
    async fn get_credential(&self, user_id: &UserId) -> Result<Option<StoredCredential>, Error>;

    /// Append a hash to the user's password history
    async fn add_history_entry(
        &self,
        user_id: &UserId,
        hash: &str,
    ) -> Result<PasswordHistoryEntry, Error>;

    /// The most recent history entries, newest first, at most `limit`
    async fn recent_history(
        &self,
        user_id: &UserId,
        limit: usize,
    ) -> Result<Vec<PasswordHistoryEntry>, Error>;

    /// Drop history entries beyond the newest `keep`, returning how many
    /// were removed
    async fn trim_history(&self, user_id: &UserId, keep: usize) -> Result<u64, Error>;
}
