use crate::{Error, UserId, id::generate_prefixed_id};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// What a single-use token is for. Purposes are disjoint: a reset token
/// can never verify an email, whatever its other properties.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenPurpose {
    PasswordReset,
    EmailVerification,
}

impl TokenPurpose {
    pub fn as_str(&self) -> &'static str {
        match self {
            TokenPurpose::PasswordReset => "password_reset",
            TokenPurpose::EmailVerification => "email_verification",
        }
    }
}

/// A stored single-use token (digest only, never the secret).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OneTimeToken {
    /// Token ID of the form `ott_{random}`; safe to log.
    pub id: String,
    pub user_id: UserId,
    pub purpose: TokenPurpose,
    pub token_hash: String,
    pub expires_at: DateTime<Utc>,
    pub used_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl OneTimeToken {
    pub fn new(user_id: UserId, purpose: TokenPurpose, token_hash: String, ttl: Duration) -> Self {
        let now = Utc::now();
        Self {
            id: generate_prefixed_id("ott"),
            user_id,
            purpose,
            token_hash,
            expires_at: now + ttl,
            used_at: None,
            created_at: now,
        }
    }

    pub fn is_expired(&self) -> bool {
        self.expires_at <= Utc::now()
    }

    pub fn is_used(&self) -> bool {
        self.used_at.is_some()
    }

    pub fn is_valid(&self) -> bool {
        !self.is_used() && !self.is_expired()
    }
}

/// Result of an atomic consume attempt.
///
/// The distinct variants feed audit logging; client responses collapse
/// them through [`Error::client_message`](crate::Error::client_message).
#[derive(Debug, Clone, PartialEq)]
pub enum ConsumeOutcome {
    /// This call marked the token used; the caller may proceed.
    Consumed(OneTimeToken),
    /// A previous (possibly concurrent) call already consumed it.
    AlreadyUsed,
    Expired,
    NotFound,
}

/// Repository for single-use token storage
#[async_trait]
pub trait OneTimeTokenRepository: Send + Sync + 'static {
    /// Persist a new token row
    async fn insert(&self, token: OneTimeToken) -> Result<OneTimeToken, Error>;

    /// Non-consuming lookup by digest and purpose, regardless of state
    async fn find_by_hash(
        &self,
        token_hash: &str,
        purpose: TokenPurpose,
    ) -> Result<Option<OneTimeToken>, Error>;

    /// Atomically mark the token used. The used check and the write happen
    /// under one guard, so of N concurrent calls exactly one observes
    /// [`ConsumeOutcome::Consumed`].
    async fn consume(
        &self,
        token_hash: &str,
        purpose: TokenPurpose,
    ) -> Result<ConsumeOutcome, Error>;

    /// Delete expired rows, returning how many went away
    async fn cleanup_expired(&self) -> Result<u64, Error>;
}
