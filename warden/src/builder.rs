//! Builder pattern for constructing Warden instances
//!
//! The builder uses a type-state pattern so storage configuration is
//! checked at compile time, and it treats a missing or undersized signing
//! key as a build failure rather than something to default. Generating a
//! fallback key would silently invalidate every outstanding access token
//! on restart, so startup is the right place to fail.
//!
//! # Example
//!
//! ```rust,no_run
//! use warden::WardenBuilder;
//! use chrono::Duration;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), warden::Error> {
//!     let warden = WardenBuilder::new()
//!         .with_memory()
//!         .with_signing_key(std::env::var("WARDEN_SIGNING_KEY").unwrap().into_bytes())
//!         .with_access_ttl(Duration::minutes(10))
//!         .build()
//!         .await?;
//!
//!     warden.health_check().await?;
//!     Ok(())
//! }
//! ```

use std::sync::Arc;

use chrono::Duration;
use warden_core::{
    AuditBus, Error, TokenIssuerConfig, TracingAuditSink,
    repositories::RepositoryProvider,
    services::{InvitationConfig, LockoutConfig, PasswordPolicy, RateLimitConfig, RefreshConfig},
    token::{DEFAULT_ACCESS_TOKEN_TTL, TokenIssuer},
};

use crate::Warden;

#[cfg(feature = "memory")]
use warden_storage_memory::MemoryRepositoryProvider;

/// Marker type indicating no storage has been configured yet.
///
/// This is the initial state of [`WardenBuilder`].
pub struct NoStorage;

/// Marker type indicating storage has been configured.
pub struct WithStorage<R: RepositoryProvider> {
    repositories: Arc<R>,
}

/// A type-safe builder for constructing [`Warden`] instances.
///
/// # Type States
///
/// - [`NoStorage`]: initial state, storage must be configured
/// - [`WithStorage<R>`]: storage configured, ready to build
pub struct WardenBuilder<Storage> {
    storage: Storage,
    signing_key: Option<Vec<u8>>,
    issuer: String,
    audience: String,
    access_ttl: Duration,
    password_policy: PasswordPolicy,
    lockout: LockoutConfig,
    refresh: RefreshConfig,
    rate_limit: RateLimitConfig,
    invitation: InvitationConfig,
    apply_migrations: bool,
    tracing_audit: bool,
}

impl Default for WardenBuilder<NoStorage> {
    fn default() -> Self {
        Self::new()
    }
}

impl WardenBuilder<NoStorage> {
    /// Create a new builder with default configuration.
    ///
    /// # Defaults
    ///
    /// - Access tokens: 60 minutes, issuer and audience `"warden"`
    /// - Refresh tokens: 7 days, 30 with remember-me
    /// - Lockout: 5 failures per 30-minute window
    /// - Rate limits: production values (login 5 per 15 minutes)
    /// - Invitations: 7-day links, 5 pending per address
    /// - Audit: [`TracingAuditSink`] registered
    /// - Apply migrations: false
    pub fn new() -> Self {
        Self {
            storage: NoStorage,
            signing_key: None,
            issuer: "warden".to_string(),
            audience: "warden".to_string(),
            access_ttl: DEFAULT_ACCESS_TOKEN_TTL,
            password_policy: PasswordPolicy::default(),
            lockout: LockoutConfig::default(),
            refresh: RefreshConfig::default(),
            rate_limit: RateLimitConfig::default(),
            invitation: InvitationConfig::default(),
            apply_migrations: false,
            tracing_audit: true,
        }
    }

    /// Use the given repository provider as storage.
    pub fn with_repositories<R: RepositoryProvider>(
        self,
        repositories: Arc<R>,
    ) -> WardenBuilder<WithStorage<R>> {
        WardenBuilder {
            storage: WithStorage { repositories },
            signing_key: self.signing_key,
            issuer: self.issuer,
            audience: self.audience,
            access_ttl: self.access_ttl,
            password_policy: self.password_policy,
            lockout: self.lockout,
            refresh: self.refresh,
            rate_limit: self.rate_limit,
            invitation: self.invitation,
            apply_migrations: self.apply_migrations,
            tracing_audit: self.tracing_audit,
        }
    }

    /// Use the in-memory storage backend. Nothing survives restart;
    /// intended for tests and prototypes.
    #[cfg(feature = "memory")]
    pub fn with_memory(self) -> WardenBuilder<WithStorage<MemoryRepositoryProvider>> {
        self.with_repositories(Arc::new(MemoryRepositoryProvider::new()))
    }
}

impl<Storage> WardenBuilder<Storage> {
    /// Set the HS256 signing key for access tokens. Required; at least
    /// 32 bytes.
    pub fn with_signing_key(mut self, key: impl Into<Vec<u8>>) -> Self {
        self.signing_key = Some(key.into());
        self
    }

    /// Set the `iss` claim for issued access tokens
    pub fn with_issuer(mut self, issuer: impl Into<String>) -> Self {
        self.issuer = issuer.into();
        self
    }

    /// Set the `aud` claim for issued access tokens
    pub fn with_audience(mut self, audience: impl Into<String>) -> Self {
        self.audience = audience.into();
        self
    }

    /// Set the access token lifetime
    pub fn with_access_ttl(mut self, ttl: Duration) -> Self {
        self.access_ttl = ttl;
        self
    }

    /// Set the password strength and history policy
    pub fn with_password_policy(mut self, policy: PasswordPolicy) -> Self {
        self.password_policy = policy;
        self
    }

    /// Set the account lockout configuration
    pub fn with_lockout_config(mut self, config: LockoutConfig) -> Self {
        self.lockout = config;
        self
    }

    /// Set the refresh token configuration
    pub fn with_refresh_config(mut self, config: RefreshConfig) -> Self {
        self.refresh = config;
        self
    }

    /// Set the per-route rate limit rules
    pub fn with_rate_limit_config(mut self, config: RateLimitConfig) -> Self {
        self.rate_limit = config;
        self
    }

    /// Set the invitation lifetime and pending cap
    pub fn with_invitation_config(mut self, config: InvitationConfig) -> Self {
        self.invitation = config;
        self
    }

    /// Run storage migrations during [`build`](WardenBuilder::build)
    pub fn apply_migrations(mut self, apply: bool) -> Self {
        self.apply_migrations = apply;
        self
    }

    /// Skip registering the default [`TracingAuditSink`]; audit events go
    /// only to sinks registered later on [`Warden::audit`].
    pub fn without_tracing_audit(mut self) -> Self {
        self.tracing_audit = false;
        self
    }
}

impl<R: RepositoryProvider> WardenBuilder<WithStorage<R>> {
    /// Build the [`Warden`] instance.
    ///
    /// Fails when the signing key is missing or under 32 bytes, or when
    /// migrations were requested and fail.
    pub async fn build(self) -> Result<Warden<R>, Error> {
        let signing_key = self.signing_key.ok_or_else(|| {
            Error::Validation(warden_core::error::ValidationError::MissingField(
                "access token signing key is required".to_string(),
            ))
        })?;

        let issuer = TokenIssuer::new(
            TokenIssuerConfig::new(signing_key, self.issuer, self.audience)
                .with_ttl(self.access_ttl),
        )?;

        let audit = AuditBus::new();
        if self.tracing_audit {
            audit.register(Arc::new(TracingAuditSink)).await;
        }

        if self.apply_migrations {
            self.storage.repositories.migrate().await?;
        }

        Ok(Warden::assemble(
            self.storage.repositories,
            issuer,
            self.password_policy,
            self.lockout,
            self.refresh,
            self.rate_limit,
            self.invitation,
            audit,
        ))
    }
}
