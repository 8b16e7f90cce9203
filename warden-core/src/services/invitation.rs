use crate::{
    Error,
    crypto::{generate_secure_token, hash_token},
    error::{AuthError, StorageError, TokenError, ValidationError},
    events::{AuditBus, SecurityEvent},
    repositories::{
        Invitation, InvitationRepository, InvitationStatus, TenantRepository, UserRepository,
    },
    tenant::{TenantId, TenantMembership, TenantRole},
    user::UserId,
    validation::{normalize_email, validate_email},
};
use chrono::{Duration, Utc};
use std::sync::Arc;
use tokio::sync::watch;

/// Knobs for the invitation flow.
#[derive(Debug, Clone)]
pub struct InvitationConfig {
    /// How long an invitation link stays redeemable.
    pub ttl: Duration,
    /// Cap on live pending invitations per (tenant, email) pair, so a
    /// misbehaving admin cannot flood one inbox.
    pub max_pending_per_email: u32,
}

impl Default for InvitationConfig {
    fn default() -> Self {
        Self {
            ttl: Duration::days(7),
            max_pending_per_email: 5,
        }
    }
}

/// A granted invitation: the raw single-use token for the mail
/// collaborator, plus the stored row.
#[derive(Debug, Clone)]
pub struct IssuedInvitation {
    pub invitation: Invitation,
    /// Raw secret for the invitation link; never stored, never logged.
    pub token: String,
}

/// Service for tenant invitations: an admin issues a single-use link,
/// the invitee accepts it into a membership or declines it.
///
/// Resolution is race-safe: the invitation leaves `Pending` through a
/// compare-and-swap, so of two concurrent acceptances of one link exactly
/// one creates a membership. Revoked, declined, expired, and unknown
/// links keep distinct kinds internally and share one client message.
pub struct InvitationService<I, U, T>
where
    I: InvitationRepository,
    U: UserRepository,
    T: TenantRepository,
{
    invitations: Arc<I>,
    users: Arc<U>,
    tenants: Arc<T>,
    config: InvitationConfig,
    audit: AuditBus,
}

impl<I, U, T> InvitationService<I, U, T>
where
    I: InvitationRepository,
    U: UserRepository,
    T: TenantRepository,
{
    pub fn new(invitations: Arc<I>, users: Arc<U>, tenants: Arc<T>, audit: AuditBus) -> Self {
        Self::with_config(invitations, users, tenants, InvitationConfig::default(), audit)
    }

    pub fn with_config(
        invitations: Arc<I>,
        users: Arc<U>,
        tenants: Arc<T>,
        config: InvitationConfig,
        audit: AuditBus,
    ) -> Self {
        Self {
            invitations,
            users,
            tenants,
            config,
            audit,
        }
    }

    /// Issue an invitation for an email to join a tenant.
    ///
    /// Fails when the tenant does not exist, when the address already has
    /// a membership there, or when the pending cap for the address is
    /// reached. Returns the raw token exactly once.
    pub async fn invite(
        &self,
        tenant_id: &TenantId,
        email: &str,
        role: TenantRole,
        inviter_id: &UserId,
    ) -> Result<IssuedInvitation, Error> {
        let email = normalize_email(email);
        validate_email(&email)?;

        if self.tenants.find_by_id(tenant_id).await?.is_none() {
            return Err(Error::Storage(StorageError::NotFound));
        }

        if let Some(user) = self.users.find_by_email(&email).await? {
            let memberships = self.tenants.memberships_for_user(&user.id).await?;
            if memberships.iter().any(|m| &m.tenant_id == tenant_id) {
                return Err(Error::Auth(AuthError::UserAlreadyExists));
            }
        }

        let pending = self.invitations.count_pending(tenant_id, &email).await?;
        if pending >= self.config.max_pending_per_email {
            return Err(Error::Validation(ValidationError::InvalidField(
                "too many pending invitations for this email".to_string(),
            )));
        }

        let secret = generate_secure_token();
        let invitation = Invitation::new(
            tenant_id.clone(),
            email,
            role,
            inviter_id.clone(),
            hash_token(&secret),
            self.config.ttl,
        );
        let invitation = self.invitations.insert(invitation).await?;

        self.emit(SecurityEvent::InvitationIssued {
            invitation_id: invitation.id.clone(),
            tenant_id: invitation.tenant_id.clone(),
            email: invitation.email.clone(),
            inviter_id: inviter_id.clone(),
            expires_at: invitation.expires_at,
            timestamp: Utc::now(),
        })
        .await;

        Ok(IssuedInvitation {
            invitation,
            token: secret,
        })
    }

    /// The invitation behind a link, when it is still redeemable, without
    /// consuming it. For the acceptance page that shows tenant and role
    /// before the invitee commits.
    pub async fn check_token(&self, secret: &str) -> Result<Option<Invitation>, Error> {
        let invitation = self.invitations.find_by_hash(&hash_token(secret)).await?;
        Ok(invitation.filter(|i| i.is_pending()))
    }

    /// Accept an invitation into a membership for `user_id`.
    ///
    /// Order matters: the address check runs against the live row first,
    /// so a mismatched account does not burn the link; then the row is
    /// atomically resolved, and only the resolve winner writes the
    /// membership.
    pub async fn accept(&self, secret: &str, user_id: &UserId) -> Result<TenantMembership, Error> {
        let invitation = self.live_invitation(secret).await?;

        let user = self
            .users
            .find_by_id(user_id)
            .await?
            .ok_or(Error::Token(TokenError::NotFound))?;
        if normalize_email(&user.email) != invitation.email {
            return Err(Error::Validation(ValidationError::InvalidField(
                "invitation was issued to a different email".to_string(),
            )));
        }

        let won = self
            .invitations
            .resolve(&invitation.id, InvitationStatus::Accepted, Some(user_id))
            .await?;
        if !won {
            return Err(Error::Token(TokenError::Revoked));
        }

        let membership = self
            .tenants
            .add_membership(TenantMembership::new(
                invitation.tenant_id.clone(),
                user_id.clone(),
                invitation.role,
            ))
            .await?;

        self.emit(SecurityEvent::InvitationAccepted {
            invitation_id: invitation.id.clone(),
            tenant_id: invitation.tenant_id.clone(),
            user_id: user_id.clone(),
            email: invitation.email.clone(),
            timestamp: Utc::now(),
        })
        .await;

        Ok(membership)
    }

    /// Decline an invitation, ending it without a membership.
    pub async fn decline(&self, secret: &str) -> Result<(), Error> {
        let invitation = self.live_invitation(secret).await?;

        let won = self
            .invitations
            .resolve(&invitation.id, InvitationStatus::Declined, None)
            .await?;
        if !won {
            return Err(Error::Token(TokenError::Revoked));
        }

        self.emit(SecurityEvent::InvitationDeclined {
            invitation_id: invitation.id.clone(),
            tenant_id: invitation.tenant_id.clone(),
            email: invitation.email.clone(),
            timestamp: Utc::now(),
        })
        .await;

        Ok(())
    }

    /// Revoke a pending invitation by ID, killing its link.
    pub async fn revoke(&self, invitation_id: &str, revoked_by: &UserId) -> Result<(), Error> {
        let invitation = self
            .invitations
            .find_by_id(invitation_id)
            .await?
            .ok_or(Error::Token(TokenError::NotFound))?;
        if invitation.is_expired() {
            return Err(Error::Token(TokenError::Expired));
        }

        let won = self
            .invitations
            .resolve(invitation_id, InvitationStatus::Revoked, None)
            .await?;
        if !won {
            return Err(Error::Token(TokenError::Revoked));
        }

        self.emit(SecurityEvent::InvitationRevoked {
            invitation_id: invitation.id.clone(),
            tenant_id: invitation.tenant_id.clone(),
            revoked_by: revoked_by.clone(),
            timestamp: Utc::now(),
        })
        .await;

        Ok(())
    }

    /// Open invitations for a tenant, newest first.
    pub async fn pending_for_tenant(&self, tenant_id: &TenantId) -> Result<Vec<Invitation>, Error> {
        self.invitations.pending_for_tenant(tenant_id).await
    }

    /// Look up the live row for a secret, mapping each dead state to its
    /// token error kind.
    async fn live_invitation(&self, secret: &str) -> Result<Invitation, Error> {
        let invitation = self
            .invitations
            .find_by_hash(&hash_token(secret))
            .await?
            .ok_or(Error::Token(TokenError::NotFound))?;
        if invitation.status != InvitationStatus::Pending {
            return Err(Error::Token(TokenError::Revoked));
        }
        if invitation.is_expired() {
            return Err(Error::Token(TokenError::Expired));
        }
        Ok(invitation)
    }

    /// Spawn the hourly sweep deleting expired pending invitations. The
    /// task runs until `true` is observed on the shutdown channel.
    pub fn start_cleanup_task(
        &self,
        mut shutdown_rx: watch::Receiver<bool>,
    ) -> tokio::task::JoinHandle<()> {
        const CLEANUP_INTERVAL: std::time::Duration = std::time::Duration::from_secs(3600);

        let invitations = self.invitations.clone();

        tokio::spawn(async move {
            let mut interval = tokio::time::interval(CLEANUP_INTERVAL);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        match invitations.cleanup_expired().await {
                            Ok(removed) if removed > 0 => {
                                tracing::info!(removed, "swept expired invitations");
                            }
                            Ok(_) => {}
                            Err(e) => {
                                tracing::warn!(error = %e, "invitation sweep failed");
                            }
                        }
                    }
                    _ = shutdown_rx.changed() => {
                        if *shutdown_rx.borrow() {
                            tracing::debug!("invitation sweep task shutting down");
                            break;
                        }
                    }
                }
            }
        })
    }

    async fn emit(&self, event: SecurityEvent) {
        if let Err(e) = self.audit.emit(&event).await {
            tracing::warn!(action = event.action(), error = %e, "audit event delivery failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        tenant::Tenant,
        user::User,
    };
    use async_trait::async_trait;
    use chrono::DateTime;
    use std::collections::HashMap;
    use tokio::sync::Mutex;

    #[derive(Default)]
    struct MockInvitationRepository {
        invitations: Arc<Mutex<HashMap<String, Invitation>>>,
    }

    #[async_trait]
    impl InvitationRepository for MockInvitationRepository {
        async fn insert(&self, invitation: Invitation) -> Result<Invitation, Error> {
            self.invitations
                .lock()
                .await
                .insert(invitation.id.clone(), invitation.clone());
            Ok(invitation)
        }

        async fn find_by_id(&self, id: &str) -> Result<Option<Invitation>, Error> {
            Ok(self.invitations.lock().await.get(id).cloned())
        }

        async fn find_by_hash(&self, token_hash: &str) -> Result<Option<Invitation>, Error> {
            Ok(self
                .invitations
                .lock()
                .await
                .values()
                .find(|i| i.token_hash == token_hash)
                .cloned())
        }

        async fn resolve(
            &self,
            id: &str,
            status: InvitationStatus,
            accepted_by: Option<&UserId>,
        ) -> Result<bool, Error> {
            // The whole check-and-set runs under one lock, like a real
            // backend's transaction.
            let mut invitations = self.invitations.lock().await;
            match invitations.get_mut(id) {
                Some(invitation) if invitation.status == InvitationStatus::Pending => {
                    invitation.status = status;
                    invitation.resolved_at = Some(Utc::now());
                    invitation.accepted_by = accepted_by.cloned();
                    Ok(true)
                }
                _ => Ok(false),
            }
        }

        async fn pending_for_tenant(
            &self,
            tenant_id: &TenantId,
        ) -> Result<Vec<Invitation>, Error> {
            let invitations = self.invitations.lock().await;
            let mut pending: Vec<_> = invitations
                .values()
                .filter(|i| &i.tenant_id == tenant_id && i.is_pending())
                .cloned()
                .collect();
            pending.sort_by(|a, b| b.created_at.cmp(&a.created_at));
            Ok(pending)
        }

        async fn count_pending(&self, tenant_id: &TenantId, email: &str) -> Result<u32, Error> {
            let invitations = self.invitations.lock().await;
            Ok(invitations
                .values()
                .filter(|i| &i.tenant_id == tenant_id && i.email == email && i.is_pending())
                .count() as u32)
        }

        async fn cleanup_expired(&self) -> Result<u64, Error> {
            let mut invitations = self.invitations.lock().await;
            let before = invitations.len();
            invitations.retain(|_, i| !(i.status == InvitationStatus::Pending && i.is_expired()));
            Ok((before - invitations.len()) as u64)
        }
    }

    #[derive(Default)]
    struct MockUserRepository {
        users: Arc<Mutex<HashMap<UserId, User>>>,
    }

    #[async_trait]
    impl UserRepository for MockUserRepository {
        async fn create(&self, user: User) -> Result<User, Error> {
            self.users.lock().await.insert(user.id.clone(), user.clone());
            Ok(user)
        }

        async fn find_by_id(&self, id: &UserId) -> Result<Option<User>, Error> {
            Ok(self.users.lock().await.get(id).cloned())
        }

        async fn find_by_email(&self, email: &str) -> Result<Option<User>, Error> {
            Ok(self
                .users
                .lock()
                .await
                .values()
                .find(|u| u.email == email)
                .cloned())
        }

        async fn update(&self, user: &User) -> Result<User, Error> {
            Ok(user.clone())
        }

        async fn set_active(&self, _id: &UserId, _active: bool) -> Result<User, Error> {
            unimplemented!("not used by invitation tests")
        }

        async fn mark_email_verified(&self, _id: &UserId) -> Result<(), Error> {
            Ok(())
        }

        async fn record_login(&self, _id: &UserId, _at: DateTime<Utc>) -> Result<(), Error> {
            Ok(())
        }

        async fn delete(&self, id: &UserId) -> Result<(), Error> {
            self.users.lock().await.remove(id);
            Ok(())
        }
    }

    #[derive(Default)]
    struct MockTenantRepository {
        tenants: Arc<Mutex<HashMap<TenantId, Tenant>>>,
        memberships: Arc<Mutex<Vec<TenantMembership>>>,
    }

    #[async_trait]
    impl TenantRepository for MockTenantRepository {
        async fn create(&self, tenant: Tenant) -> Result<Tenant, Error> {
            self.tenants
                .lock()
                .await
                .insert(tenant.id.clone(), tenant.clone());
            Ok(tenant)
        }

        async fn find_by_id(&self, id: &TenantId) -> Result<Option<Tenant>, Error> {
            Ok(self.tenants.lock().await.get(id).cloned())
        }

        async fn find_by_slug(&self, slug: &str) -> Result<Option<Tenant>, Error> {
            Ok(self
                .tenants
                .lock()
                .await
                .values()
                .find(|t| t.slug == slug)
                .cloned())
        }

        async fn add_membership(
            &self,
            membership: TenantMembership,
        ) -> Result<TenantMembership, Error> {
            let mut memberships = self.memberships.lock().await;
            if memberships
                .iter()
                .any(|m| m.tenant_id == membership.tenant_id && m.user_id == membership.user_id)
            {
                return Err(Error::Storage(StorageError::Constraint(
                    "membership already exists".to_string(),
                )));
            }
            memberships.push(membership.clone());
            Ok(membership)
        }

        async fn memberships_for_user(
            &self,
            user_id: &UserId,
        ) -> Result<Vec<TenantMembership>, Error> {
            Ok(self
                .memberships
                .lock()
                .await
                .iter()
                .filter(|m| &m.user_id == user_id)
                .cloned()
                .collect())
        }
    }

    type TestService =
        InvitationService<MockInvitationRepository, MockUserRepository, MockTenantRepository>;

    struct Fixture {
        service: Arc<TestService>,
        invitations: Arc<MockInvitationRepository>,
        users: Arc<MockUserRepository>,
        tenants: Arc<MockTenantRepository>,
    }

    fn fixture_with_config(config: InvitationConfig) -> Fixture {
        let invitations = Arc::new(MockInvitationRepository::default());
        let users = Arc::new(MockUserRepository::default());
        let tenants = Arc::new(MockTenantRepository::default());
        let service = Arc::new(InvitationService::with_config(
            invitations.clone(),
            users.clone(),
            tenants.clone(),
            config,
            AuditBus::new(),
        ));
        Fixture {
            service,
            invitations,
            users,
            tenants,
        }
    }

    fn fixture() -> Fixture {
        fixture_with_config(InvitationConfig::default())
    }

    async fn seed_tenant(fixture: &Fixture) -> Tenant {
        let tenant = Tenant::new("Acme", "acme").unwrap();
        fixture.tenants.create(tenant.clone()).await.unwrap();
        tenant
    }

    async fn seed_user(fixture: &Fixture, email: &str) -> User {
        let user = User::builder().email(email.to_string()).build().unwrap();
        fixture.users.create(user.clone()).await.unwrap();
        user
    }

    #[tokio::test]
    async fn test_invite_and_accept_creates_membership() {
        let fixture = fixture();
        let tenant = seed_tenant(&fixture).await;
        let inviter = seed_user(&fixture, "admin@example.com").await;
        let invitee = seed_user(&fixture, "invitee@example.com").await;

        let issued = fixture
            .service
            .invite(&tenant.id, "Invitee@example.com", TenantRole::Member, &inviter.id)
            .await
            .unwrap();
        assert_eq!(issued.invitation.email, "invitee@example.com");
        assert!(issued.invitation.expires_at > Utc::now());

        let checked = fixture
            .service
            .check_token(&issued.token)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(checked.tenant_id, tenant.id);
        assert_eq!(checked.role, TenantRole::Member);

        let membership = fixture.service.accept(&issued.token, &invitee.id).await.unwrap();
        assert_eq!(membership.tenant_id, tenant.id);
        assert_eq!(membership.user_id, invitee.id);
        assert_eq!(membership.role, TenantRole::Member);

        let stored = fixture
            .invitations
            .find_by_id(&issued.invitation.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.status, InvitationStatus::Accepted);
        assert_eq!(stored.accepted_by, Some(invitee.id));
    }

    #[tokio::test]
    async fn test_invite_requires_an_existing_tenant() {
        let fixture = fixture();
        let inviter = seed_user(&fixture, "admin@example.com").await;

        let err = fixture
            .service
            .invite(
                &TenantId::new_random(),
                "invitee@example.com",
                TenantRole::Member,
                &inviter.id,
            )
            .await
            .unwrap_err();
        assert!(err.is_storage_error());
    }

    #[tokio::test]
    async fn test_existing_member_cannot_be_invited() {
        let fixture = fixture();
        let tenant = seed_tenant(&fixture).await;
        let inviter = seed_user(&fixture, "admin@example.com").await;
        let member = seed_user(&fixture, "member@example.com").await;
        fixture
            .tenants
            .add_membership(TenantMembership::new(
                tenant.id.clone(),
                member.id.clone(),
                TenantRole::Member,
            ))
            .await
            .unwrap();

        let err = fixture
            .service
            .invite(&tenant.id, "member@example.com", TenantRole::Member, &inviter.id)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Auth(AuthError::UserAlreadyExists)));
    }

    #[tokio::test]
    async fn test_pending_cap_is_enforced_per_email() {
        let fixture = fixture_with_config(InvitationConfig {
            max_pending_per_email: 2,
            ..InvitationConfig::default()
        });
        let tenant = seed_tenant(&fixture).await;
        let inviter = seed_user(&fixture, "admin@example.com").await;

        for _ in 0..2 {
            fixture
                .service
                .invite(&tenant.id, "invitee@example.com", TenantRole::Member, &inviter.id)
                .await
                .unwrap();
        }
        let err = fixture
            .service
            .invite(&tenant.id, "invitee@example.com", TenantRole::Member, &inviter.id)
            .await
            .unwrap_err();
        assert!(err.is_validation_error());

        // A different address is unaffected.
        fixture
            .service
            .invite(&tenant.id, "other@example.com", TenantRole::Member, &inviter.id)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_accept_requires_the_invited_email() {
        let fixture = fixture();
        let tenant = seed_tenant(&fixture).await;
        let inviter = seed_user(&fixture, "admin@example.com").await;
        let stranger = seed_user(&fixture, "stranger@example.com").await;

        let issued = fixture
            .service
            .invite(&tenant.id, "invitee@example.com", TenantRole::Member, &inviter.id)
            .await
            .unwrap();

        let err = fixture
            .service
            .accept(&issued.token, &stranger.id)
            .await
            .unwrap_err();
        assert!(err.is_validation_error());

        // The mismatch did not burn the link.
        assert!(fixture.service.check_token(&issued.token).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_second_acceptance_fails_like_a_revoked_token() {
        let fixture = fixture();
        let tenant = seed_tenant(&fixture).await;
        let inviter = seed_user(&fixture, "admin@example.com").await;
        let invitee = seed_user(&fixture, "invitee@example.com").await;

        let issued = fixture
            .service
            .invite(&tenant.id, "invitee@example.com", TenantRole::Member, &inviter.id)
            .await
            .unwrap();
        fixture.service.accept(&issued.token, &invitee.id).await.unwrap();

        let err = fixture
            .service
            .accept(&issued.token, &invitee.id)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Token(TokenError::Revoked)));
        assert_eq!(err.client_message(), "Invalid or expired token");
    }

    #[tokio::test]
    async fn test_declined_invitation_cannot_be_accepted() {
        let fixture = fixture();
        let tenant = seed_tenant(&fixture).await;
        let inviter = seed_user(&fixture, "admin@example.com").await;
        let invitee = seed_user(&fixture, "invitee@example.com").await;

        let issued = fixture
            .service
            .invite(&tenant.id, "invitee@example.com", TenantRole::Member, &inviter.id)
            .await
            .unwrap();
        fixture.service.decline(&issued.token).await.unwrap();

        let err = fixture
            .service
            .accept(&issued.token, &invitee.id)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Token(TokenError::Revoked)));
        assert!(
            fixture
                .tenants
                .memberships_for_user(&invitee.id)
                .await
                .unwrap()
                .is_empty()
        );
    }

    #[tokio::test]
    async fn test_revoked_invitation_is_dead_and_leaves_pending_list() {
        let fixture = fixture();
        let tenant = seed_tenant(&fixture).await;
        let inviter = seed_user(&fixture, "admin@example.com").await;
        let invitee = seed_user(&fixture, "invitee@example.com").await;

        let issued = fixture
            .service
            .invite(&tenant.id, "invitee@example.com", TenantRole::Member, &inviter.id)
            .await
            .unwrap();
        assert_eq!(fixture.service.pending_for_tenant(&tenant.id).await.unwrap().len(), 1);

        fixture
            .service
            .revoke(&issued.invitation.id, &inviter.id)
            .await
            .unwrap();
        assert!(fixture.service.pending_for_tenant(&tenant.id).await.unwrap().is_empty());

        let err = fixture
            .service
            .accept(&issued.token, &invitee.id)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Token(TokenError::Revoked)));
    }

    #[tokio::test]
    async fn test_expired_invitation_is_rejected() {
        let fixture = fixture();
        let tenant = seed_tenant(&fixture).await;
        let inviter = seed_user(&fixture, "admin@example.com").await;
        let invitee = seed_user(&fixture, "invitee@example.com").await;

        let issued = fixture
            .service
            .invite(&tenant.id, "invitee@example.com", TenantRole::Member, &inviter.id)
            .await
            .unwrap();
        {
            let mut invitations = fixture.invitations.invitations.lock().await;
            for invitation in invitations.values_mut() {
                invitation.expires_at = Utc::now() - Duration::seconds(1);
            }
        }

        assert!(fixture.service.check_token(&issued.token).await.unwrap().is_none());
        let err = fixture
            .service
            .accept(&issued.token, &invitee.id)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Token(TokenError::Expired)));
        assert_eq!(err.client_message(), "Invalid or expired token");
    }

    #[tokio::test]
    async fn test_concurrent_acceptance_has_one_winner() {
        let fixture = fixture();
        let tenant = seed_tenant(&fixture).await;
        let inviter = seed_user(&fixture, "admin@example.com").await;
        let invitee = seed_user(&fixture, "invitee@example.com").await;

        let issued = fixture
            .service
            .invite(&tenant.id, "invitee@example.com", TenantRole::Member, &inviter.id)
            .await
            .unwrap();

        let mut handles = Vec::new();
        for _ in 0..8 {
            let service = fixture.service.clone();
            let token = issued.token.clone();
            let user_id = invitee.id.clone();
            handles.push(tokio::spawn(async move { service.accept(&token, &user_id).await }));
        }

        let mut winners = 0;
        for handle in handles {
            if handle.await.unwrap().is_ok() {
                winners += 1;
            }
        }
        assert_eq!(winners, 1);
        assert_eq!(
            fixture
                .tenants
                .memberships_for_user(&invitee.id)
                .await
                .unwrap()
                .len(),
            1
        );
    }

    #[tokio::test]
    async fn test_garbage_token_is_rejected() {
        let fixture = fixture();
        let invitee = UserId::new_random();
        let err = fixture
            .service
            .accept("not-a-real-token", &invitee)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Token(TokenError::NotFound)));
        assert!(fixture.service.check_token("not-a-real-token").await.unwrap().is_none());
    }
}
