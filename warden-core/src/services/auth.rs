use crate::{
    Error,
    error::{AuthError, TokenError},
    events::{AuditBus, LoginFailureReason, SecurityEvent},
    repositories::{
        LoginAttemptRepository, PasswordRepository, RefreshTokenRepository, TenantRepository,
        UserRepository,
    },
    services::{
        lockout::{LockoutService, LockoutStatus},
        password::PasswordService,
        refresh::RefreshTokenService,
    },
    token::{AccessClaims, TenantClaims, TokenIssuer, TokenPair},
    user::{User, UserId},
    validation::normalize_email,
};
use chrono::Utc;
use std::sync::Arc;

/// What the transport knows about the caller; attached to audit events
/// and failure counters.
#[derive(Debug, Clone, Default)]
pub struct ClientInfo {
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

impl ClientInfo {
    pub fn from_ip(ip_address: impl Into<String>) -> Self {
        Self {
            ip_address: Some(ip_address.into()),
            user_agent: None,
        }
    }

    fn ip(&self) -> Option<&str> {
        self.ip_address.as_deref()
    }
}

/// The result of a successful login or refresh.
#[derive(Debug, Clone)]
pub struct AuthenticatedSession {
    pub user: User,
    pub claims: AccessClaims,
    pub tokens: TokenPair,
}

/// Orchestrates credential verification: the login state machine plus
/// session refresh, password change, and logout.
///
/// Per login attempt, the order is fixed: lockout first (before any hash
/// work), then existence, then the active flag, then the password. The
/// failure counter keys on the submitted email whether or not an account
/// exists, so address probing and password guessing burn the same budget,
/// and the client-facing error for both is [`AuthError::InvalidCredentials`].
pub struct CredentialVerifier<U, P, R, L, T>
where
    U: UserRepository,
    P: PasswordRepository,
    R: RefreshTokenRepository,
    L: LoginAttemptRepository,
    T: TenantRepository,
{
    users: Arc<U>,
    tenants: Arc<T>,
    passwords: Arc<PasswordService<P>>,
    refresh: Arc<RefreshTokenService<R>>,
    lockout: Arc<LockoutService<L>>,
    issuer: Arc<TokenIssuer>,
    audit: AuditBus,
}

impl<U, P, R, L, T> CredentialVerifier<U, P, R, L, T>
where
    U: UserRepository,
    P: PasswordRepository,
    R: RefreshTokenRepository,
    L: LoginAttemptRepository,
    T: TenantRepository,
{
    pub fn new(
        users: Arc<U>,
        tenants: Arc<T>,
        passwords: Arc<PasswordService<P>>,
        refresh: Arc<RefreshTokenService<R>>,
        lockout: Arc<LockoutService<L>>,
        issuer: Arc<TokenIssuer>,
        audit: AuditBus,
    ) -> Self {
        Self {
            users,
            tenants,
            passwords,
            refresh,
            lockout,
            issuer,
            audit,
        }
    }

    /// Authenticate an email/password pair and mint a session.
    pub async fn login(
        &self,
        email: &str,
        password: &str,
        remember_me: bool,
        client: &ClientInfo,
    ) -> Result<AuthenticatedSession, Error> {
        let email = normalize_email(email);

        // Lockout gate before any password work: a locked account fails
        // without a hash comparison, and the attempt is not recorded, so
        // hammering a locked account does not extend the lockout.
        let status = self.lockout.status(&email).await?;
        if status.is_locked {
            self.emit(SecurityEvent::LoginFailed {
                email: email.clone(),
                reason: LoginFailureReason::AccountLocked,
                failed_attempts: status.failed_attempts,
                ip_address: client.ip_address.clone(),
                timestamp: Utc::now(),
            })
            .await;
            return Err(Error::Auth(AuthError::AccountLocked {
                retry_after_seconds: status.retry_after_seconds().unwrap_or(1),
            }));
        }

        let Some(user) = self.users.find_by_email(&email).await? else {
            // Unknown email burns a failure like a wrong password does,
            // throttling enumeration; the response is identical.
            self.record_failure(&email, LoginFailureReason::UnknownEmail, client)
                .await?;
            return Err(Error::Auth(AuthError::InvalidCredentials));
        };

        if !user.is_active {
            // Existence is confirmed, so this is not counted toward
            // lockout; the account owner cannot lock themselves out by
            // retrying a deactivated account.
            self.emit(SecurityEvent::LoginFailed {
                email: email.clone(),
                reason: LoginFailureReason::AccountInactive,
                failed_attempts: status.failed_attempts,
                ip_address: client.ip_address.clone(),
                timestamp: Utc::now(),
            })
            .await;
            return Err(Error::Auth(AuthError::AccountInactive));
        }

        if !self.passwords.verify_for_user(&user.id, password).await? {
            self.record_failure(&email, LoginFailureReason::WrongPassword, client)
                .await?;
            return Err(Error::Auth(AuthError::InvalidCredentials));
        }

        // Success: clear the counter, then mint tokens.
        self.lockout.clear(&email).await?;

        let tenant_claims = self.primary_tenant_claims(&user.id).await?;
        let session = self
            .issue_session(&user, tenant_claims.as_ref(), remember_me)
            .await?;

        self.users.record_login(&user.id, Utc::now()).await?;
        self.emit(SecurityEvent::LoginSucceeded {
            user_id: user.id.clone(),
            email,
            tenant_id: tenant_claims.map(|t| t.tenant_id),
            ip_address: client.ip_address.clone(),
            timestamp: Utc::now(),
        })
        .await;

        Ok(session)
    }

    /// Rotate a refresh secret into a fresh session.
    ///
    /// The old secret dies whether or not the rest succeeds: a rotated-in
    /// token for a user who has since vanished or been deactivated is
    /// revoked again before the error is returned.
    pub async fn refresh_session(&self, secret: &str) -> Result<AuthenticatedSession, Error> {
        let (old, issued) = match self.refresh.rotate(secret).await {
            Ok(pair) => pair,
            Err(err) => {
                // A revoked or raced secret arriving here is the replay
                // signature rotation exists to catch.
                if matches!(
                    err,
                    Error::Token(TokenError::Revoked) | Error::Token(TokenError::Reused)
                ) && let Some(token) = self.refresh.peek(secret).await?
                {
                    self.emit(SecurityEvent::RefreshReuseDetected {
                        user_id: token.user_id,
                        token_id: token.id,
                        timestamp: Utc::now(),
                    })
                    .await;
                }
                return Err(err);
            }
        };

        let user = match self.users.find_by_id(&old.user_id).await? {
            Some(user) if user.is_active => user,
            gone_or_inactive => {
                self.refresh.revoke(&issued.secret).await?;
                return Err(match gone_or_inactive {
                    Some(_) => Error::Auth(AuthError::AccountInactive),
                    None => Error::Auth(AuthError::InvalidCredentials),
                });
            }
        };

        let tenant_claims = self.primary_tenant_claims(&user.id).await?;
        let access = self.issuer.issue(
            &user.id,
            &user.email,
            tenant_claims.as_ref(),
        )?;

        self.emit(SecurityEvent::RefreshRotated {
            user_id: user.id.clone(),
            old_token_id: old.id,
            new_token_id: issued.token.id,
            timestamp: Utc::now(),
        })
        .await;

        Ok(AuthenticatedSession {
            user,
            tokens: TokenPair {
                access_token: access.token,
                access_expires_at: access.claims.expires_at(),
                refresh_token: issued.secret,
            },
            claims: access.claims,
        })
    }

    /// Change a password with the current one as proof of possession.
    ///
    /// Runs strength and history checks, then revokes every refresh token
    /// so all other sessions die with the old password. A wrong current
    /// password is not counted toward lockout; this path already requires
    /// an authenticated caller.
    pub async fn change_password(
        &self,
        user_id: &UserId,
        current_password: &str,
        new_password: &str,
    ) -> Result<(), Error> {
        if !self
            .passwords
            .verify_for_user(user_id, current_password)
            .await?
        {
            return Err(Error::Auth(AuthError::InvalidCredentials));
        }

        self.passwords.validate_strength(new_password)?;
        self.passwords.ensure_not_reused(user_id, new_password).await?;
        self.passwords.set_password(user_id, new_password).await?;

        let revoked = self.refresh.revoke_all(user_id).await?;
        self.emit(SecurityEvent::PasswordChanged {
            user_id: user_id.clone(),
            revoked_sessions: revoked,
            timestamp: Utc::now(),
        })
        .await;
        Ok(())
    }

    /// End the session behind one refresh secret.
    pub async fn logout(&self, secret: &str) -> Result<(), Error> {
        let token = self.refresh.revoke(secret).await?;
        self.emit(SecurityEvent::SessionsRevoked {
            user_id: token.user_id,
            revoked: 1,
            timestamp: Utc::now(),
        })
        .await;
        Ok(())
    }

    /// End every session of a user, returning how many were revoked.
    pub async fn logout_all(&self, user_id: &UserId) -> Result<u64, Error> {
        let revoked = self.refresh.revoke_all(user_id).await?;
        self.emit(SecurityEvent::SessionsRevoked {
            user_id: user_id.clone(),
            revoked,
            timestamp: Utc::now(),
        })
        .await;
        Ok(revoked)
    }

    /// Claims for the user's primary tenant: the earliest-joined
    /// membership, ties broken by tenant ID, never iteration order.
    async fn primary_tenant_claims(
        &self,
        user_id: &UserId,
    ) -> Result<Option<TenantClaims>, Error> {
        let mut memberships = self.tenants.memberships_for_user(user_id).await?;
        memberships.sort_by(|a, b| {
            a.joined_at
                .cmp(&b.joined_at)
                .then_with(|| a.tenant_id.as_str().cmp(b.tenant_id.as_str()))
        });

        let Some(primary) = memberships.into_iter().next() else {
            return Ok(None);
        };

        let tenant_name = self
            .tenants
            .find_by_id(&primary.tenant_id)
            .await?
            .map(|tenant| tenant.name);

        Ok(Some(TenantClaims {
            tenant_id: primary.tenant_id,
            tenant_role: primary.role,
            tenant_name,
        }))
    }

    async fn issue_session(
        &self,
        user: &User,
        tenant: Option<&TenantClaims>,
        remember_me: bool,
    ) -> Result<AuthenticatedSession, Error> {
        let access = self.issuer.issue(&user.id, &user.email, tenant)?;
        let refresh = self.refresh.issue(&user.id, remember_me).await?;

        Ok(AuthenticatedSession {
            user: user.clone(),
            tokens: TokenPair {
                access_token: access.token,
                access_expires_at: access.claims.expires_at(),
                refresh_token: refresh.secret,
            },
            claims: access.claims,
        })
    }

    /// Record a login failure and emit the matching events, including the
    /// lockout event exactly once on the attempt that trips it.
    async fn record_failure(
        &self,
        email: &str,
        reason: LoginFailureReason,
        client: &ClientInfo,
    ) -> Result<LockoutStatus, Error> {
        let status = self.lockout.record_failure(email, client.ip()).await?;

        self.emit(SecurityEvent::LoginFailed {
            email: email.to_string(),
            reason,
            failed_attempts: status.failed_attempts,
            ip_address: client.ip_address.clone(),
            timestamp: Utc::now(),
        })
        .await;

        // The lockout event fires on the tripping attempt only; later
        // attempts during the window fail at the gate without recording.
        if status.is_locked
            && status.failed_attempts == self.lockout.config().max_failed_attempts
            && let Some(locked_until) = status.locked_until
        {
            self.emit(SecurityEvent::AccountLocked {
                email: email.to_string(),
                failed_attempts: status.failed_attempts,
                locked_until,
                ip_address: client.ip_address.clone(),
                timestamp: Utc::now(),
            })
            .await;
        }

        Ok(status)
    }

    /// Audit delivery is best-effort: a failing sink is logged, never
    /// allowed to fail the authentication operation itself.
    async fn emit(&self, event: SecurityEvent) {
        if let Err(e) = self.audit.emit(&event).await {
            tracing::warn!(action = event.action(), error = %e, "audit event delivery failed");
        }
    }
}
