use crate::{
    Error,
    crypto::{generate_secure_token, hash_token},
    error::TokenError,
    events::{AuditBus, SecurityEvent},
    repositories::{ConsumeOutcome, OneTimeToken, OneTimeTokenRepository, TokenPurpose, UserRepository},
    user::{User, UserId},
};
use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;

/// Verification links live longer than reset links; a day tolerates slow
/// inboxes without meaningful risk, since the token grants no access.
const VERIFICATION_TOKEN_TTL: Duration = Duration::hours(24);

/// A freshly minted verification token for the mail collaborator.
#[derive(Debug, Clone)]
pub struct IssuedVerificationToken {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

/// Service for email verification: single-use 24-hour tokens that flip
/// `email_verified_at` when redeemed.
pub struct EmailVerificationService<U, O>
where
    U: UserRepository,
    O: OneTimeTokenRepository,
{
    users: Arc<U>,
    tokens: Arc<O>,
    audit: AuditBus,
}

impl<U, O> EmailVerificationService<U, O>
where
    U: UserRepository,
    O: OneTimeTokenRepository,
{
    pub fn new(users: Arc<U>, tokens: Arc<O>, audit: AuditBus) -> Self {
        Self {
            users,
            tokens,
            audit,
        }
    }

    /// Mint a verification token for a user.
    pub async fn generate_token(&self, user_id: &UserId) -> Result<IssuedVerificationToken, Error> {
        let secret = generate_secure_token();
        let token = OneTimeToken::new(
            user_id.clone(),
            TokenPurpose::EmailVerification,
            hash_token(&secret),
            VERIFICATION_TOKEN_TTL,
        );
        let token = self.tokens.insert(token).await?;
        Ok(IssuedVerificationToken {
            token: secret,
            expires_at: token.expires_at,
        })
    }

    /// Whether a token is currently redeemable, without consuming it.
    pub async fn check_token(&self, secret: &str) -> Result<bool, Error> {
        let token = self
            .tokens
            .find_by_hash(&hash_token(secret), TokenPurpose::EmailVerification)
            .await?;
        Ok(token.is_some_and(|t| t.is_valid()))
    }

    /// Redeem a token and mark the owning user's email verified.
    pub async fn verify_email(&self, secret: &str) -> Result<User, Error> {
        let token = match self
            .tokens
            .consume(&hash_token(secret), TokenPurpose::EmailVerification)
            .await?
        {
            ConsumeOutcome::Consumed(token) => token,
            ConsumeOutcome::AlreadyUsed => return Err(Error::Token(TokenError::Revoked)),
            ConsumeOutcome::Expired => return Err(Error::Token(TokenError::Expired)),
            ConsumeOutcome::NotFound => return Err(Error::Token(TokenError::NotFound)),
        };

        self.users.mark_email_verified(&token.user_id).await?;
        let user = self
            .users
            .find_by_id(&token.user_id)
            .await?
            .ok_or(Error::Storage(crate::error::StorageError::NotFound))?;

        if let Err(e) = self
            .audit
            .emit(&SecurityEvent::EmailVerified {
                user_id: user.id.clone(),
                email: user.email.clone(),
                timestamp: Utc::now(),
            })
            .await
        {
            tracing::warn!(error = %e, "audit event delivery failed");
        }

        Ok(user)
    }

    /// Delete expired verification and reset tokens.
    pub async fn cleanup_expired_tokens(&self) -> Result<u64, Error> {
        self.tokens.cleanup_expired().await
    }
}
