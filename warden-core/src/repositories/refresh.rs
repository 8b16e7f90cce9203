use crate::{Error, UserId, id::generate_prefixed_id};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// A stored refresh token.
///
/// The row holds only the SHA-256 digest of the secret. Revoked rows stay
/// in storage (for audit and reuse detection) until the purge task removes
/// them by age.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RefreshToken {
    /// Token ID of the form `rft_{random}`; safe to log.
    pub id: String,
    pub user_id: UserId,
    pub token_hash: String,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub revoked_at: Option<DateTime<Utc>>,
    /// True for remember-me sessions with the longer lifetime.
    pub extended: bool,
}

impl RefreshToken {
    pub fn new(user_id: UserId, token_hash: String, ttl: Duration, extended: bool) -> Self {
        let now = Utc::now();
        Self {
            id: generate_prefixed_id("rft"),
            user_id,
            token_hash,
            issued_at: now,
            expires_at: now + ttl,
            revoked_at: None,
            extended,
        }
    }

    pub fn is_expired(&self) -> bool {
        self.expires_at <= Utc::now()
    }

    pub fn is_revoked(&self) -> bool {
        self.revoked_at.is_some()
    }

    /// Usable for validation or rotation right now.
    pub fn is_active(&self) -> bool {
        !self.is_revoked() && !self.is_expired()
    }
}

/// Repository for refresh token storage
#[async_trait]
pub trait RefreshTokenRepository: Send + Sync + 'static {
    /// Persist a newly issued token
    async fn insert(&self, token: RefreshToken) -> Result<RefreshToken, Error>;

    /// Look up a token by secret digest, regardless of its state. State
    /// interpretation (revoked, expired) belongs to the service so the
    /// distinct failure kinds survive for audit.
    async fn find_by_hash(&self, token_hash: &str) -> Result<Option<RefreshToken>, Error>;

    /// Revoke a token by ID, compare-and-swap style: returns `true` only
    /// if THIS call moved the token from active to revoked. Two racing
    /// rotations see exactly one `true` between them.
    async fn revoke(&self, id: &str) -> Result<bool, Error>;

    /// Revoke every active token of a user, returning how many flipped
    async fn revoke_all_for_user(&self, user_id: &UserId) -> Result<u64, Error>;

    /// Delete rows expired before `expired_before` and revoked rows whose
    /// revocation predates `revoked_before`, returning how many went away
    async fn purge_stale(
        &self,
        expired_before: DateTime<Utc>,
        revoked_before: DateTime<Utc>,
    ) -> Result<u64, Error>;
}
