//! # Warden
//!
//! Warden is an embeddable identity and session core for Rust applications
//! that keeps your users' data in your own storage. It provides password
//! authentication with account lockout, stateless access tokens paired
//! with rotating refresh tokens, password reset and email verification
//! flows, tenant invitations, request throttling, and multi-tenant
//! resolution, all behind one coordinator type.
//!
//! Storage is pluggable: any backend implementing
//! [`warden_core::repositories::RepositoryProvider`] works. The `memory`
//! feature ships a [`MemoryRepositoryProvider`] for tests and prototypes.
//!
//! ## Example
//!
//! ```rust,no_run
//! use warden::{ClientInfo, WardenBuilder};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), warden::Error> {
//!     let warden = WardenBuilder::new()
//!         .with_memory()
//!         .with_signing_key(*b"an example signing key of 32 by!")
//!         .build()
//!         .await?;
//!
//!     let session = warden
//!         .login("user@example.com", "correct horse battery", false, &ClientInfo::default())
//!         .await?;
//!     println!("access token: {}", session.tokens.access_token);
//!     Ok(())
//! }
//! ```
use std::sync::Arc;

use tokio::sync::watch;
use tokio::task::JoinHandle;

use warden_core::{
    repositories::{
        InvitationRepositoryAdapter, LoginAttemptRepositoryAdapter, OneTimeTokenRepository,
        OneTimeTokenRepositoryAdapter, PasswordRepositoryAdapter, RefreshTokenRepositoryAdapter,
        RepositoryProvider, TenantRepository, TenantRepositoryAdapter, TenantRepositoryProvider,
        UserRepositoryAdapter,
    },
    services::{
        CredentialVerifier, EmailVerificationService, InvitationService, LockoutService,
        PasswordResetService, PasswordService, RefreshTokenService, RegistrationService,
        TenantResolver, UserService,
    },
    token::TokenIssuer,
};

mod builder;

pub use builder::{NoStorage, WardenBuilder, WithStorage};

/// Re-export core types from warden_core
///
/// These types are commonly used when working with the Warden API.
pub use warden_core::{
    AccessClaims, AuditBus, AuditSink, Error, RouteScope, SecurityEvent, Tenant, TenantContext,
    TenantId, TenantMembership, TenantRole, TenantSelector, TenantSource, TokenIssuerConfig,
    TokenPair, TracingAuditSink, User, UserId, error,
    repositories::{Invitation, InvitationStatus},
    services::{
        AuthenticatedSession, ClientIdentity, ClientInfo, InvitationConfig,
        IssuedInvitation, IssuedVerificationToken, LockoutConfig, LockoutStatus,
        MemoryRateLimitStore, NewRegistration, PasswordPolicy, PasswordResetRequest,
        RateLimitConfig, RateLimitRule, RateLimiter, RefreshConfig, RegistrationOutcome,
        RouteClass, TenantRequest,
    },
};

/// Re-export storage backends
#[cfg(feature = "memory")]
pub use warden_storage_memory::MemoryRepositoryProvider;

/// Handles for the background maintenance tasks: the refresh token purge,
/// the login attempt retention sweep, the one-time token sweep, and the
/// invitation sweep.
///
/// Dropping the struct aborts nothing; call [`shutdown`](Self::shutdown)
/// for an orderly stop.
pub struct MaintenanceTasks {
    shutdown_tx: watch::Sender<bool>,
    handles: Vec<JoinHandle<()>>,
}

impl MaintenanceTasks {
    /// Signal every task to stop and wait for them to finish.
    pub async fn shutdown(self) {
        // Receivers may already be gone if a task panicked; nothing to do.
        let _ = self.shutdown_tx.send(true);
        for handle in self.handles {
            if let Err(e) = handle.await {
                tracing::warn!(error = %e, "maintenance task did not stop cleanly");
            }
        }
    }
}

/// The central coordinator for identity and session management.
///
/// `Warden` wires the services in [`warden_core`] to one storage backend
/// and exposes the high-level operations: registration, login, session
/// refresh, password lifecycle, email verification, tenant resolution,
/// and tenant invitations.
/// Construct it through [`WardenBuilder`].
///
/// All methods surface [`warden_core::Error`]; use
/// [`Error::client_message`] at the transport boundary to avoid leaking
/// account state to callers.
pub struct Warden<R: RepositoryProvider> {
    repositories: Arc<R>,
    one_time_tokens: Arc<OneTimeTokenRepositoryAdapter<R>>,
    users: Arc<UserService<UserRepositoryAdapter<R>>>,
    refresh: Arc<RefreshTokenService<RefreshTokenRepositoryAdapter<R>>>,
    lockout: Arc<LockoutService<LoginAttemptRepositoryAdapter<R>>>,
    verifier: CredentialVerifier<
        UserRepositoryAdapter<R>,
        PasswordRepositoryAdapter<R>,
        RefreshTokenRepositoryAdapter<R>,
        LoginAttemptRepositoryAdapter<R>,
        TenantRepositoryAdapter<R>,
    >,
    registration: RegistrationService<
        UserRepositoryAdapter<R>,
        PasswordRepositoryAdapter<R>,
        TenantRepositoryAdapter<R>,
        OneTimeTokenRepositoryAdapter<R>,
    >,
    password_reset: PasswordResetService<
        UserRepositoryAdapter<R>,
        PasswordRepositoryAdapter<R>,
        RefreshTokenRepositoryAdapter<R>,
        LoginAttemptRepositoryAdapter<R>,
        OneTimeTokenRepositoryAdapter<R>,
    >,
    email_verification:
        Arc<EmailVerificationService<UserRepositoryAdapter<R>, OneTimeTokenRepositoryAdapter<R>>>,
    invitations: Arc<
        InvitationService<
            InvitationRepositoryAdapter<R>,
            UserRepositoryAdapter<R>,
            TenantRepositoryAdapter<R>,
        >,
    >,
    rate_limiter: RateLimiter<MemoryRateLimitStore>,
    tenant_resolver: TenantResolver,
    issuer: Arc<TokenIssuer>,
    audit: AuditBus,
}

impl<R: RepositoryProvider> std::fmt::Debug for Warden<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Warden").finish_non_exhaustive()
    }
}

impl<R: RepositoryProvider> Warden<R> {
    pub(crate) fn assemble(
        repositories: Arc<R>,
        issuer: TokenIssuer,
        password_policy: PasswordPolicy,
        lockout_config: LockoutConfig,
        refresh_config: RefreshConfig,
        rate_limit_config: RateLimitConfig,
        invitation_config: InvitationConfig,
        audit: AuditBus,
    ) -> Self {
        let user_repo = Arc::new(UserRepositoryAdapter::new(repositories.clone()));
        let password_repo = Arc::new(PasswordRepositoryAdapter::new(repositories.clone()));
        let refresh_repo = Arc::new(RefreshTokenRepositoryAdapter::new(repositories.clone()));
        let attempt_repo = Arc::new(LoginAttemptRepositoryAdapter::new(repositories.clone()));
        let token_repo = Arc::new(OneTimeTokenRepositoryAdapter::new(repositories.clone()));
        let tenant_repo = Arc::new(TenantRepositoryAdapter::new(repositories.clone()));
        let invitation_repo = Arc::new(InvitationRepositoryAdapter::new(repositories.clone()));

        let issuer = Arc::new(issuer);
        let users = Arc::new(UserService::new(user_repo.clone()));
        let passwords = Arc::new(PasswordService::with_policy(
            password_repo.clone(),
            password_policy,
        ));
        let refresh = Arc::new(RefreshTokenService::with_config(
            refresh_repo.clone(),
            refresh_config,
        ));
        let lockout = Arc::new(LockoutService::with_config(
            attempt_repo.clone(),
            lockout_config,
        ));
        let email_verification = Arc::new(EmailVerificationService::new(
            user_repo.clone(),
            token_repo.clone(),
            audit.clone(),
        ));

        let verifier = CredentialVerifier::new(
            user_repo.clone(),
            tenant_repo.clone(),
            passwords.clone(),
            refresh.clone(),
            lockout.clone(),
            issuer.clone(),
            audit.clone(),
        );
        let registration = RegistrationService::new(
            user_repo.clone(),
            tenant_repo.clone(),
            passwords.clone(),
            email_verification.clone(),
            audit.clone(),
        );
        let password_reset = PasswordResetService::new(
            user_repo.clone(),
            token_repo.clone(),
            passwords,
            refresh.clone(),
            lockout.clone(),
            audit.clone(),
        );
        let invitations = Arc::new(InvitationService::with_config(
            invitation_repo,
            user_repo,
            tenant_repo,
            invitation_config,
            audit.clone(),
        ));

        Self {
            repositories,
            one_time_tokens: token_repo,
            users,
            refresh,
            lockout,
            verifier,
            registration,
            password_reset,
            email_verification,
            invitations,
            rate_limiter: RateLimiter::new(
                Arc::new(MemoryRateLimitStore::new()),
                rate_limit_config,
            ),
            tenant_resolver: TenantResolver::new(),
            issuer,
            audit,
        }
    }

    /// Prepare the storage backend (create tables, run migrations)
    pub async fn migrate(&self) -> Result<(), Error> {
        self.repositories.migrate().await
    }

    /// Verify the storage backend is reachable
    pub async fn health_check(&self) -> Result<(), Error> {
        self.repositories.health_check().await
    }

    /// The audit bus; register additional [`AuditSink`]s here.
    pub fn audit(&self) -> &AuditBus {
        &self.audit
    }

    /// The request rate limiter. Transports call
    /// [`enforce`](RateLimiter::enforce) before the operations below.
    pub fn rate_limiter(&self) -> &RateLimiter<MemoryRateLimitStore> {
        &self.rate_limiter
    }

    // ------------------------------------------------------------------
    // Registration and account management
    // ------------------------------------------------------------------

    /// Register a new account with its bootstrap tenant.
    ///
    /// Returns the created user, the tenant, and the email verification
    /// token to hand to the mail collaborator.
    pub async fn register(&self, input: NewRegistration) -> Result<RegistrationOutcome, Error> {
        self.registration.register(input).await
    }

    /// Get a user by ID
    pub async fn get_user(&self, user_id: &UserId) -> Result<Option<User>, Error> {
        self.users.get_user(user_id).await
    }

    /// Get a user by email; the address is normalized before lookup
    pub async fn get_user_by_email(&self, email: &str) -> Result<Option<User>, Error> {
        self.users.get_user_by_email(email).await
    }

    /// Activate or deactivate an account. Deactivation does not revoke
    /// refresh tokens, but every later login and refresh fails until the
    /// account is reactivated.
    pub async fn set_user_active(&self, user_id: &UserId, active: bool) -> Result<User, Error> {
        self.users.set_active(user_id, active).await
    }

    /// Delete a user, revoking their sessions first.
    pub async fn delete_user(&self, user_id: &UserId) -> Result<(), Error> {
        self.verifier.logout_all(user_id).await?;
        self.users.delete_user(user_id).await
    }

    // ------------------------------------------------------------------
    // Login and sessions
    // ------------------------------------------------------------------

    /// Authenticate an email/password pair and mint a session.
    ///
    /// `remember_me` selects the extended refresh token lifetime. The
    /// client info feeds audit events and the lockout counter.
    pub async fn login(
        &self,
        email: &str,
        password: &str,
        remember_me: bool,
        client: &ClientInfo,
    ) -> Result<AuthenticatedSession, Error> {
        self.verifier.login(email, password, remember_me, client).await
    }

    /// Rotate a refresh secret into a fresh session; the old secret is
    /// dead afterwards.
    pub async fn refresh_session(&self, refresh_token: &str) -> Result<AuthenticatedSession, Error> {
        self.verifier.refresh_session(refresh_token).await
    }

    /// End the session behind one refresh secret
    pub async fn logout(&self, refresh_token: &str) -> Result<(), Error> {
        self.verifier.logout(refresh_token).await
    }

    /// End every session of a user, returning how many were revoked
    pub async fn logout_all(&self, user_id: &UserId) -> Result<u64, Error> {
        self.verifier.logout_all(user_id).await
    }

    /// Verify an access token's signature and standard claims.
    pub fn verify_access_token(&self, token: &str) -> Result<AccessClaims, Error> {
        self.issuer.verify(token)
    }

    /// Current lockout state for an email.
    pub async fn lockout_status(&self, email: &str) -> Result<LockoutStatus, Error> {
        self.lockout.status(email).await
    }

    // ------------------------------------------------------------------
    // Password lifecycle
    // ------------------------------------------------------------------

    /// Change a password, proving possession of the current one. All
    /// refresh tokens are revoked on success.
    pub async fn change_password(
        &self,
        user_id: &UserId,
        current_password: &str,
        new_password: &str,
    ) -> Result<(), Error> {
        self.verifier
            .change_password(user_id, current_password, new_password)
            .await
    }

    /// Start a password reset.
    ///
    /// `Ok(None)` means the email is unknown; callers respond identically
    /// in both cases so the endpoint does not confirm account existence.
    pub async fn request_password_reset(
        &self,
        email: &str,
    ) -> Result<Option<PasswordResetRequest>, Error> {
        self.password_reset.request_reset(email).await
    }

    /// Whether a reset token is currently redeemable, without consuming it
    pub async fn check_reset_token(&self, token: &str) -> Result<bool, Error> {
        self.password_reset.check_token(token).await
    }

    /// Redeem a reset token for a new password. Consumes the token,
    /// revokes all sessions, and clears the lockout counter.
    pub async fn reset_password(&self, token: &str, new_password: &str) -> Result<User, Error> {
        self.password_reset.reset_password(token, new_password).await
    }

    // ------------------------------------------------------------------
    // Email verification
    // ------------------------------------------------------------------

    /// Mint a fresh verification token for a user (resend flow)
    pub async fn generate_verification_token(
        &self,
        user_id: &UserId,
    ) -> Result<IssuedVerificationToken, Error> {
        self.email_verification.generate_token(user_id).await
    }

    /// Redeem a verification token, marking the owner's email verified
    pub async fn verify_email(&self, token: &str) -> Result<User, Error> {
        self.email_verification.verify_email(token).await
    }

    // ------------------------------------------------------------------
    // Tenants
    // ------------------------------------------------------------------

    /// Resolve the tenant for a request. Pure precedence logic; see
    /// [`TenantRequest`] for the sources.
    pub fn resolve_tenant(&self, request: &TenantRequest) -> Result<Option<TenantContext>, Error> {
        self.tenant_resolver.resolve(request)
    }

    /// Look up a tenant by ID
    pub async fn get_tenant(&self, tenant_id: &TenantId) -> Result<Option<Tenant>, Error> {
        self.repositories.tenant().find_by_id(tenant_id).await
    }

    /// Look up a tenant by slug
    pub async fn get_tenant_by_slug(&self, slug: &str) -> Result<Option<Tenant>, Error> {
        self.repositories.tenant().find_by_slug(slug).await
    }

    /// All memberships of a user; the first element is the primary tenant
    pub async fn get_memberships(&self, user_id: &UserId) -> Result<Vec<TenantMembership>, Error> {
        self.repositories.tenant().memberships_for_user(user_id).await
    }

    // ------------------------------------------------------------------
    // Invitations
    // ------------------------------------------------------------------

    /// Invite an email address into a tenant.
    ///
    /// Issuance counts against the inviter's invitation rate limit.
    /// Returns the raw invitation token exactly once, for the mail
    /// collaborator.
    pub async fn invite_user(
        &self,
        tenant_id: &TenantId,
        email: &str,
        role: TenantRole,
        inviter_id: &UserId,
    ) -> Result<IssuedInvitation, Error> {
        self.rate_limiter
            .enforce(
                &ClientIdentity::Subject(inviter_id.clone()),
                RouteClass::Invitation,
            )
            .await?;
        self.invitations.invite(tenant_id, email, role, inviter_id).await
    }

    /// The invitation behind a link, when it is still redeemable, without
    /// consuming it
    pub async fn check_invitation(&self, token: &str) -> Result<Option<Invitation>, Error> {
        self.invitations.check_token(token).await
    }

    /// Accept an invitation, creating the membership for `user_id`. The
    /// accepting account's email must match the invited address.
    pub async fn accept_invitation(
        &self,
        token: &str,
        user_id: &UserId,
    ) -> Result<TenantMembership, Error> {
        self.invitations.accept(token, user_id).await
    }

    /// Decline an invitation, ending it without a membership
    pub async fn decline_invitation(&self, token: &str) -> Result<(), Error> {
        self.invitations.decline(token).await
    }

    /// Revoke a pending invitation by ID, killing its link
    pub async fn revoke_invitation(
        &self,
        invitation_id: &str,
        revoked_by: &UserId,
    ) -> Result<(), Error> {
        self.invitations.revoke(invitation_id, revoked_by).await
    }

    /// Open invitations for a tenant, newest first
    pub async fn pending_invitations(
        &self,
        tenant_id: &TenantId,
    ) -> Result<Vec<Invitation>, Error> {
        self.invitations.pending_for_tenant(tenant_id).await
    }

    // ------------------------------------------------------------------
    // Maintenance
    // ------------------------------------------------------------------

    /// Spawn the hourly background sweeps: stale refresh token purge,
    /// login attempt retention, expired one-time token cleanup, and
    /// expired invitation cleanup.
    pub fn start_maintenance_tasks(&self) -> MaintenanceTasks {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let handles = vec![
            self.refresh.start_purge_task(shutdown_rx.clone()),
            self.lockout.start_cleanup_task(shutdown_rx.clone()),
            self.invitations.start_cleanup_task(shutdown_rx.clone()),
            spawn_token_sweep(self.one_time_tokens.clone(), shutdown_rx),
        ];

        MaintenanceTasks {
            shutdown_tx,
            handles,
        }
    }
}

/// Hourly sweep deleting expired one-time tokens.
fn spawn_token_sweep<R: RepositoryProvider>(
    tokens: Arc<OneTimeTokenRepositoryAdapter<R>>,
    mut shutdown_rx: watch::Receiver<bool>,
) -> JoinHandle<()> {
    const SWEEP_INTERVAL: std::time::Duration = std::time::Duration::from_secs(3600);

    tokio::spawn(async move {
        let mut interval = tokio::time::interval(SWEEP_INTERVAL);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    match tokens.cleanup_expired().await {
                        Ok(removed) if removed > 0 => {
                            tracing::info!(removed, "swept expired one-time tokens");
                        }
                        Ok(_) => {}
                        Err(e) => {
                            tracing::warn!(error = %e, "one-time token sweep failed");
                        }
                    }
                }
                _ = shutdown_rx.changed() => {
                    if *shutdown_rx.borrow() {
                        tracing::debug!("one-time token sweep task shutting down");
                        break;
                    }
                }
            }
        }
    })
}
