//! Adapters bridging a [`RepositoryProvider`] to the individual
//! repository traits, so services can be generic over one repository
//! rather than over a whole provider.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;

use crate::{
    Error, User, UserId,
    repositories::{
        AttemptStats, ConsumeOutcome, Invitation, InvitationRepository, InvitationStatus,
        LoginAttempt, LoginAttemptRepository, OneTimeToken, OneTimeTokenRepository,
        PasswordHistoryEntry, PasswordRepository, RefreshToken, RefreshTokenRepository,
        RepositoryProvider, StoredCredential, TenantRepository, TokenPurpose, UserRepository,
    },
    tenant::{Tenant, TenantId, TenantMembership},
};

/// Exposes the provider's user repository as a [`UserRepository`].
pub struct UserRepositoryAdapter<R: RepositoryProvider> {
    provider: Arc<R>,
}

impl<R: RepositoryProvider> UserRepositoryAdapter<R> {
    pub fn new(provider: Arc<R>) -> Self {
        Self { provider }
    }
}

#[async_trait]
impl<R: RepositoryProvider> UserRepository for UserRepositoryAdapter<R> {
    async fn create(&self, user: User) -> Result<User, Error> {
        self.provider.user().create(user).await
    }

    async fn find_by_id(&self, id: &UserId) -> Result<Option<User>, Error> {
        self.provider.user().find_by_id(id).await
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, Error> {
        self.provider.user().find_by_email(email).await
    }

    async fn update(&self, user: &User) -> Result<User, Error> {
        self.provider.user().update(user).await
    }

    async fn set_active(&self, id: &UserId, active: bool) -> Result<User, Error> {
        self.provider.user().set_active(id, active).await
    }

    async fn mark_email_verified(&self, id: &UserId) -> Result<(), Error> {
        self.provider.user().mark_email_verified(id).await
    }

    async fn record_login(&self, id: &UserId, at: DateTime<Utc>) -> Result<(), Error> {
        self.provider.user().record_login(id, at).await
    }

    async fn delete(&self, id: &UserId) -> Result<(), Error> {
        self.provider.user().delete(id).await
    }
}

/// Exposes the provider's password repository as a [`PasswordRepository`].
pub struct PasswordRepositoryAdapter<R: RepositoryProvider> {
    provider: Arc<R>,
}

impl<R: RepositoryProvider> PasswordRepositoryAdapter<R> {
    pub fn new(provider: Arc<R>) -> Self {
        Self { provider }
    }
}

#[async_trait]
impl<R: RepositoryProvider> PasswordRepository for PasswordRepositoryAdapter<R> {
    async fn set_password_hash(&self, user_id: &UserId, hash: &str) -> Result<(), Error> {
        self.provider.password().set_password_hash(user_id, hash).await
    }

    async fn get_credential(&self, user_id: &UserId) -> Result<Option<StoredCredential>, Error> {
        self.provider.password().get_credential(user_id).await
    }

    async fn add_history_entry(
        &self,
        user_id: &UserId,
        hash: &str,
    ) -> Result<PasswordHistoryEntry, Error> {
        self.provider.password().add_history_entry(user_id, hash).await
    }

    async fn recent_history(
        &self,
        user_id: &UserId,
        limit: usize,
    ) -> Result<Vec<PasswordHistoryEntry>, Error> {
        self.provider.password().recent_history(user_id, limit).await
    }

    async fn trim_history(&self, user_id: &UserId, keep: usize) -> Result<u64, Error> {
        self.provider.password().trim_history(user_id, keep).await
    }
}

/// Exposes the provider's refresh token repository as a
/// [`RefreshTokenRepository`].
pub struct RefreshTokenRepositoryAdapter<R: RepositoryProvider> {
    provider: Arc<R>,
}

impl<R: RepositoryProvider> RefreshTokenRepositoryAdapter<R> {
    pub fn new(provider: Arc<R>) -> Self {
        Self { provider }
    }
}

#[async_trait]
impl<R: RepositoryProvider> RefreshTokenRepository for RefreshTokenRepositoryAdapter<R> {
    async fn insert(&self, token: RefreshToken) -> Result<RefreshToken, Error> {
        self.provider.refresh_token().insert(token).await
    }

    async fn find_by_hash(&self, token_hash: &str) -> Result<Option<RefreshToken>, Error> {
        self.provider.refresh_token().find_by_hash(token_hash).await
    }

    async fn revoke(&self, id: &str) -> Result<bool, Error> {
        self.provider.refresh_token().revoke(id).await
    }

    async fn revoke_all_for_user(&self, user_id: &UserId) -> Result<u64, Error> {
        self.provider.refresh_token().revoke_all_for_user(user_id).await
    }

    async fn purge_stale(
        &self,
        expired_before: DateTime<Utc>,
        revoked_before: DateTime<Utc>,
    ) -> Result<u64, Error> {
        self.provider
            .refresh_token()
            .purge_stale(expired_before, revoked_before)
            .await
    }
}

/// Exposes the provider's one-time token repository as a
/// [`OneTimeTokenRepository`].
pub struct OneTimeTokenRepositoryAdapter<R: RepositoryProvider> {
    provider: Arc<R>,
}

impl<R: RepositoryProvider> OneTimeTokenRepositoryAdapter<R> {
    pub fn new(provider: Arc<R>) -> Self {
        Self { provider }
    }
}

#[async_trait]
impl<R: RepositoryProvider> OneTimeTokenRepository for OneTimeTokenRepositoryAdapter<R> {
    async fn insert(&self, token: OneTimeToken) -> Result<OneTimeToken, Error> {
        self.provider.one_time_token().insert(token).await
    }

    async fn find_by_hash(
        &self,
        token_hash: &str,
        purpose: TokenPurpose,
    ) -> Result<Option<OneTimeToken>, Error> {
        self.provider
            .one_time_token()
            .find_by_hash(token_hash, purpose)
            .await
    }

    async fn consume(
        &self,
        token_hash: &str,
        purpose: TokenPurpose,
    ) -> Result<ConsumeOutcome, Error> {
        self.provider.one_time_token().consume(token_hash, purpose).await
    }

    async fn cleanup_expired(&self) -> Result<u64, Error> {
        self.provider.one_time_token().cleanup_expired().await
    }
}

/// Exposes the provider's login attempt repository as a
/// [`LoginAttemptRepository`].
pub struct LoginAttemptRepositoryAdapter<R: RepositoryProvider> {
    provider: Arc<R>,
}

impl<R: RepositoryProvider> LoginAttemptRepositoryAdapter<R> {
    pub fn new(provider: Arc<R>) -> Self {
        Self { provider }
    }
}

#[async_trait]
impl<R: RepositoryProvider> LoginAttemptRepository for LoginAttemptRepositoryAdapter<R> {
    async fn record_attempt(
        &self,
        email: &str,
        ip_address: Option<&str>,
    ) -> Result<LoginAttempt, Error> {
        self.provider.login_attempt().record_attempt(email, ip_address).await
    }

    async fn attempt_stats(
        &self,
        email: &str,
        since: DateTime<Utc>,
    ) -> Result<AttemptStats, Error> {
        self.provider.login_attempt().attempt_stats(email, since).await
    }

    async fn clear_attempts(&self, email: &str) -> Result<u64, Error> {
        self.provider.login_attempt().clear_attempts(email).await
    }

    async fn cleanup_attempts_before(&self, before: DateTime<Utc>) -> Result<u64, Error> {
        self.provider.login_attempt().cleanup_attempts_before(before).await
    }
}

/// Exposes the provider's tenant repository as a [`TenantRepository`].
pub struct TenantRepositoryAdapter<R: RepositoryProvider> {
    provider: Arc<R>,
}

impl<R: RepositoryProvider> TenantRepositoryAdapter<R> {
    pub fn new(provider: Arc<R>) -> Self {
        Self { provider }
    }
}

#[async_trait]
impl<R: RepositoryProvider> TenantRepository for TenantRepositoryAdapter<R> {
    async fn create(&self, tenant: Tenant) -> Result<Tenant, Error> {
        self.provider.tenant().create(tenant).await
    }

    async fn find_by_id(&self, id: &TenantId) -> Result<Option<Tenant>, Error> {
        self.provider.tenant().find_by_id(id).await
    }

    async fn find_by_slug(&self, slug: &str) -> Result<Option<Tenant>, Error> {
        self.provider.tenant().find_by_slug(slug).await
    }

    async fn add_membership(
        &self,
        membership: TenantMembership,
    ) -> Result<TenantMembership, Error> {
        self.provider.tenant().add_membership(membership).await
    }

    async fn memberships_for_user(
        &self,
        user_id: &UserId,
    ) -> Result<Vec<TenantMembership>, Error> {
        self.provider.tenant().memberships_for_user(user_id).await
    }
}

/// Exposes the provider's invitation repository as an
/// [`InvitationRepository`].
pub struct InvitationRepositoryAdapter<R: RepositoryProvider> {
    provider: Arc<R>,
}

impl<R: RepositoryProvider> InvitationRepositoryAdapter<R> {
    pub fn new(provider: Arc<R>) -> Self {
        Self { provider }
    }
}

#[async_trait]
impl<R: RepositoryProvider> InvitationRepository for InvitationRepositoryAdapter<R> {
    async fn insert(&self, invitation: Invitation) -> Result<Invitation, Error> {
        self.provider.invitation().insert(invitation).await
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<Invitation>, Error> {
        self.provider.invitation().find_by_id(id).await
    }

    async fn find_by_hash(&self, token_hash: &str) -> Result<Option<Invitation>, Error> {
        self.provider.invitation().find_by_hash(token_hash).await
    }

    async fn resolve(
        &self,
        id: &str,
        status: InvitationStatus,
        accepted_by: Option<&UserId>,
    ) -> Result<bool, Error> {
        self.provider.invitation().resolve(id, status, accepted_by).await
    }

    async fn pending_for_tenant(&self, tenant_id: &TenantId) -> Result<Vec<Invitation>, Error> {
        self.provider.invitation().pending_for_tenant(tenant_id).await
    }

    async fn count_pending(&self, tenant_id: &TenantId, email: &str) -> Result<u32, Error> {
        self.provider.invitation().count_pending(tenant_id, email).await
    }

    async fn cleanup_expired(&self) -> Result<u64, Error> {
        self.provider.invitation().cleanup_expired().await
    }
}
