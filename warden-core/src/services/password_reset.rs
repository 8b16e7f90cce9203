use crate::{
    Error,
    crypto::{generate_secure_token, hash_token},
    error::TokenError,
    events::{AuditBus, SecurityEvent},
    repositories::{
        ConsumeOutcome, LoginAttemptRepository, OneTimeToken, OneTimeTokenRepository,
        PasswordRepository, RefreshTokenRepository, TokenPurpose, UserRepository,
    },
    services::{lockout::LockoutService, password::PasswordService, refresh::RefreshTokenService},
    user::User,
    validation::normalize_email,
};
use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;

/// Reset links are short-lived; an hour covers mail delivery latency
/// without leaving a long-lived credential in an inbox.
const RESET_TOKEN_TTL: Duration = Duration::hours(1);

/// A granted reset request: the raw single-use token for the mail
/// collaborator, plus whom it is for and when it dies.
#[derive(Debug, Clone)]
pub struct PasswordResetRequest {
    pub user: User,
    /// Raw secret for the reset link; never stored, never logged.
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

/// Service for the forgot-password flow: request a single-use token,
/// redeem it for a new password.
///
/// Redemption is race-safe: the token is consumed with a compare-and-swap
/// before the password is written, so two concurrent redemptions of one
/// link produce exactly one password change. Used, expired, and unknown
/// tokens keep distinct kinds internally and share one client message.
pub struct PasswordResetService<U, P, R, L, O>
where
    U: UserRepository,
    P: PasswordRepository,
    R: RefreshTokenRepository,
    L: LoginAttemptRepository,
    O: OneTimeTokenRepository,
{
    users: Arc<U>,
    tokens: Arc<O>,
    passwords: Arc<PasswordService<P>>,
    refresh: Arc<RefreshTokenService<R>>,
    lockout: Arc<LockoutService<L>>,
    audit: AuditBus,
}

impl<U, P, R, L, O> PasswordResetService<U, P, R, L, O>
where
    U: UserRepository,
    P: PasswordRepository,
    R: RefreshTokenRepository,
    L: LoginAttemptRepository,
    O: OneTimeTokenRepository,
{
    pub fn new(
        users: Arc<U>,
        tokens: Arc<O>,
        passwords: Arc<PasswordService<P>>,
        refresh: Arc<RefreshTokenService<R>>,
        lockout: Arc<LockoutService<L>>,
        audit: AuditBus,
    ) -> Self {
        Self {
            users,
            tokens,
            passwords,
            refresh,
            lockout,
            audit,
        }
    }

    /// Begin a reset for an email address.
    ///
    /// Returns `Ok(None)` when no account matches: the caller responds
    /// identically either way and simply sends no mail, so the endpoint
    /// cannot be used to probe which addresses exist.
    pub async fn request_reset(&self, email: &str) -> Result<Option<PasswordResetRequest>, Error> {
        let email = normalize_email(email);
        let Some(user) = self.users.find_by_email(&email).await? else {
            tracing::debug!("password reset requested for unknown email");
            return Ok(None);
        };

        let secret = generate_secure_token();
        let token = OneTimeToken::new(
            user.id.clone(),
            TokenPurpose::PasswordReset,
            hash_token(&secret),
            RESET_TOKEN_TTL,
        );
        let token = self.tokens.insert(token).await?;

        self.emit(SecurityEvent::PasswordResetRequested {
            user_id: user.id.clone(),
            email,
            expires_at: token.expires_at,
            timestamp: Utc::now(),
        })
        .await;

        Ok(Some(PasswordResetRequest {
            user,
            token: secret,
            expires_at: token.expires_at,
        }))
    }

    /// Whether a reset token is currently redeemable, without consuming
    /// it. For the form that asks for the new password before submission.
    pub async fn check_token(&self, secret: &str) -> Result<bool, Error> {
        let token = self
            .tokens
            .find_by_hash(&hash_token(secret), TokenPurpose::PasswordReset)
            .await?;
        Ok(token.is_some_and(|t| t.is_valid()))
    }

    /// Redeem a reset token for a new password.
    ///
    /// Order matters: policy and history are checked against the live
    /// token row first, so a rejected password does not burn the link;
    /// then the token is atomically consumed, and only the consume winner
    /// writes the password, revokes all sessions, and clears the lockout
    /// counter (a reset is the unlock mechanism for a locked account).
    pub async fn reset_password(&self, secret: &str, new_password: &str) -> Result<User, Error> {
        self.passwords.validate_strength(new_password)?;

        let token = self
            .tokens
            .find_by_hash(&hash_token(secret), TokenPurpose::PasswordReset)
            .await?
            .ok_or(Error::Token(TokenError::NotFound))?;
        if token.is_used() {
            return Err(Error::Token(TokenError::Revoked));
        }
        if token.is_expired() {
            return Err(Error::Token(TokenError::Expired));
        }

        let user = self
            .users
            .find_by_id(&token.user_id)
            .await?
            .ok_or(Error::Token(TokenError::NotFound))?;

        self.passwords
            .ensure_not_reused(&user.id, new_password)
            .await?;

        // Consume before writing the password. The CAS re-reads the used
        // flag under the same guard that sets it, so a concurrent
        // redemption of the same link loses here, before any state moved.
        match self
            .tokens
            .consume(&hash_token(secret), TokenPurpose::PasswordReset)
            .await?
        {
            ConsumeOutcome::Consumed(_) => {}
            ConsumeOutcome::AlreadyUsed => return Err(Error::Token(TokenError::Revoked)),
            ConsumeOutcome::Expired => return Err(Error::Token(TokenError::Expired)),
            ConsumeOutcome::NotFound => return Err(Error::Token(TokenError::NotFound)),
        }

        self.passwords.set_password(&user.id, new_password).await?;
        let revoked = self.refresh.revoke_all(&user.id).await?;
        self.lockout.clear(&user.email).await?;

        self.emit(SecurityEvent::PasswordResetCompleted {
            user_id: user.id.clone(),
            email: user.email.clone(),
            revoked_sessions: revoked,
            timestamp: Utc::now(),
        })
        .await;

        Ok(user)
    }

    async fn emit(&self, event: SecurityEvent) {
        if let Err(e) = self.audit.emit(&event).await {
            tracing::warn!(action = event.action(), error = %e, "audit event delivery failed");
        }
    }
}
