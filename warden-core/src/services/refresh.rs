use crate::{
    Error,
    crypto::{generate_secure_token_with_bytes, hash_token},
    error::TokenError,
    repositories::{RefreshToken, RefreshTokenRepository},
    user::UserId,
};
use chrono::{Duration, Utc};
use std::sync::Arc;
use tokio::sync::watch;

/// Entropy for refresh secrets, double the one-time token floor. The
/// secret only ever exists as this many random bytes in base64; storage
/// sees its SHA-256 digest.
const REFRESH_SECRET_BYTES: usize = 64;

/// Configuration for refresh token lifetimes.
#[derive(Debug, Clone)]
pub struct RefreshConfig {
    /// Lifetime of a standard session.
    pub ttl: Duration,
    /// Lifetime of a remember-me session.
    pub extended_ttl: Duration,
    /// How long expired and revoked rows are kept for audit before the
    /// purge task deletes them.
    pub purge_grace: Duration,
}

impl Default for RefreshConfig {
    fn default() -> Self {
        Self {
            ttl: Duration::days(7),
            extended_ttl: Duration::days(30),
            purge_grace: Duration::days(30),
        }
    }
}

/// A freshly issued refresh token: the raw secret (shown exactly once)
/// and the stored row describing it.
#[derive(Debug, Clone)]
pub struct IssuedRefreshToken {
    pub secret: String,
    pub token: RefreshToken,
}

/// Service for the refresh token lifecycle: issue, validate, rotate,
/// revoke, and purge.
///
/// Each token moves through `issued -> (validated)* -> rotated | revoked
/// | expired` and the terminal states are absorbing. Rotation leans on the
/// repository's compare-and-swap [`revoke`](RefreshTokenRepository::revoke):
/// of two racing rotations of one secret, exactly one observes the flip
/// and issues a successor; the loser gets [`TokenError::Reused`].
pub struct RefreshTokenService<R: RefreshTokenRepository> {
    repository: Arc<R>,
    config: RefreshConfig,
}

impl<R: RefreshTokenRepository> RefreshTokenService<R> {
    pub fn new(repository: Arc<R>) -> Self {
        Self::with_config(repository, RefreshConfig::default())
    }

    pub fn with_config(repository: Arc<R>, config: RefreshConfig) -> Self {
        Self { repository, config }
    }

    pub fn config(&self) -> &RefreshConfig {
        &self.config
    }

    /// Issue a new refresh token for a user.
    ///
    /// Returns the raw secret alongside the stored row. The secret is not
    /// recoverable afterwards; callers hand it to the client and keep only
    /// the row's ID for logging.
    pub async fn issue(&self, user_id: &UserId, extended: bool) -> Result<IssuedRefreshToken, Error> {
        let secret = generate_secure_token_with_bytes(REFRESH_SECRET_BYTES);
        let ttl = if extended {
            self.config.extended_ttl
        } else {
            self.config.ttl
        };
        let token = RefreshToken::new(user_id.clone(), hash_token(&secret), ttl, extended);
        let token = self.repository.insert(token).await?;

        tracing::debug!(
            token_id = %token.id,
            user_id = %token.user_id,
            extended,
            "issued refresh token"
        );

        Ok(IssuedRefreshToken { secret, token })
    }

    /// Validate a presented secret, returning the live token row.
    ///
    /// The three failure kinds stay distinct here for audit logging and
    /// collapse into one client message at the error boundary.
    pub async fn validate(&self, secret: &str) -> Result<RefreshToken, Error> {
        let token = self
            .repository
            .find_by_hash(&hash_token(secret))
            .await?
            .ok_or(Error::Token(TokenError::NotFound))?;

        if token.is_revoked() {
            return Err(Error::Token(TokenError::Revoked));
        }
        if token.is_expired() {
            return Err(Error::Token(TokenError::Expired));
        }
        Ok(token)
    }

    /// Look up the row behind a secret regardless of its state.
    ///
    /// Lets orchestration identify which token (and whose) a failed
    /// validation was about, for reuse-detection audit events.
    pub async fn peek(&self, secret: &str) -> Result<Option<RefreshToken>, Error> {
        self.repository.find_by_hash(&hash_token(secret)).await
    }

    /// Rotate a refresh token: revoke the old one and issue a successor
    /// inheriting the extended (remember-me) flag.
    ///
    /// The revoke is a compare-and-swap; losing it means another call
    /// rotated the same secret concurrently, and the loser fails with
    /// [`TokenError::Reused`] instead of silently minting a second
    /// successor. The old row is returned with the new token so callers
    /// can log both IDs.
    pub async fn rotate(
        &self,
        secret: &str,
    ) -> Result<(RefreshToken, IssuedRefreshToken), Error> {
        let old = self.validate(secret).await?;

        if !self.repository.revoke(&old.id).await? {
            tracing::warn!(
                token_id = %old.id,
                user_id = %old.user_id,
                "refresh rotation lost the revoke race; possible token replay"
            );
            return Err(Error::Token(TokenError::Reused));
        }

        let issued = self.issue(&old.user_id, old.extended).await?;
        tracing::debug!(
            old_token_id = %old.id,
            new_token_id = %issued.token.id,
            user_id = %old.user_id,
            "rotated refresh token"
        );
        Ok((old, issued))
    }

    /// Revoke the token behind a secret (single-session logout).
    ///
    /// Succeeds only if this call performed the revocation; a secret that
    /// is already revoked, expired, or unknown fails like any other
    /// token-lookup error.
    pub async fn revoke(&self, secret: &str) -> Result<RefreshToken, Error> {
        let token = self.validate(secret).await?;
        if !self.repository.revoke(&token.id).await? {
            return Err(Error::Token(TokenError::Revoked));
        }
        tracing::debug!(token_id = %token.id, user_id = %token.user_id, "revoked refresh token");
        Ok(token)
    }

    /// Revoke every active token of a user, returning how many flipped.
    /// Used after password change/reset to invalidate all other sessions.
    pub async fn revoke_all(&self, user_id: &UserId) -> Result<u64, Error> {
        let revoked = self.repository.revoke_all_for_user(user_id).await?;
        if revoked > 0 {
            tracing::info!(user_id = %user_id, revoked, "revoked all refresh tokens");
        }
        Ok(revoked)
    }

    /// Delete rows past expiry plus the grace period, and revoked rows
    /// whose revocation has aged past the grace period.
    pub async fn purge_expired(&self) -> Result<u64, Error> {
        let cutoff = Utc::now() - self.config.purge_grace;
        self.repository.purge_stale(cutoff, cutoff).await
    }

    /// Spawn the hourly purge sweep. The task runs until `true` is
    /// observed on the shutdown channel. Not safety-critical: a missed
    /// sweep leaves stale rows, never a live token.
    pub fn start_purge_task(
        &self,
        mut shutdown_rx: watch::Receiver<bool>,
    ) -> tokio::task::JoinHandle<()> {
        const PURGE_INTERVAL: std::time::Duration = std::time::Duration::from_secs(3600);

        let repository = self.repository.clone();
        let grace = self.config.purge_grace;

        tokio::spawn(async move {
            let mut interval = tokio::time::interval(PURGE_INTERVAL);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        let cutoff = Utc::now() - grace;
                        match repository.purge_stale(cutoff, cutoff).await {
                            Ok(removed) if removed > 0 => {
                                tracing::info!(removed, "purged stale refresh tokens");
                            }
                            Ok(_) => {}
                            Err(e) => {
                                tracing::warn!(error = %e, "refresh token purge failed");
                            }
                        }
                    }
                    _ = shutdown_rx.changed() => {
                        if *shutdown_rx.borrow() {
                            tracing::debug!("refresh token purge task shutting down");
                            break;
                        }
                    }
                }
            }
        })
    }
}
