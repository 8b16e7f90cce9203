use crate::{
    Error,
    error::AuthError,
    events::{AuditBus, SecurityEvent},
    repositories::{OneTimeTokenRepository, PasswordRepository, TenantRepository, UserRepository},
    services::{
        email_verification::{EmailVerificationService, IssuedVerificationToken},
        password::PasswordService,
    },
    tenant::{Tenant, TenantMembership, TenantRole},
    user::User,
    validation::{normalize_email, slugify, validate_email, validate_name, validate_slug},
};
use chrono::Utc;
use rand::{TryRngCore, rngs::OsRng};
use std::sync::Arc;

/// Input for a new registration.
#[derive(Debug, Clone)]
pub struct NewRegistration {
    pub email: String,
    pub password: String,
    pub given_name: Option<String>,
    pub family_name: Option<String>,
    /// Display name of the tenant bootstrapped for this user.
    pub tenant_name: String,
    /// Explicit slug; derived from the tenant name when absent.
    pub slug: Option<String>,
}

/// What registration produced: the account, its bootstrap tenant, and the
/// verification token for the mail collaborator.
#[derive(Debug, Clone)]
pub struct RegistrationOutcome {
    pub user: User,
    pub tenant: Tenant,
    pub verification: IssuedVerificationToken,
}

/// Service for self-service registration: account, credential, bootstrap
/// tenant with an Admin membership, and an email verification token.
///
/// The bootstrap membership's `joined_at` is the registration instant, so
/// the tenant created here is deterministically the user's primary tenant
/// until they join an older one. Writes are sequential; a backend with
/// real transactions can strengthen that behind the same traits.
pub struct RegistrationService<U, P, T, O>
where
    U: UserRepository,
    P: PasswordRepository,
    T: TenantRepository,
    O: OneTimeTokenRepository,
{
    users: Arc<U>,
    tenants: Arc<T>,
    passwords: Arc<PasswordService<P>>,
    verification: Arc<EmailVerificationService<U, O>>,
    audit: AuditBus,
}

impl<U, P, T, O> RegistrationService<U, P, T, O>
where
    U: UserRepository,
    P: PasswordRepository,
    T: TenantRepository,
    O: OneTimeTokenRepository,
{
    pub fn new(
        users: Arc<U>,
        tenants: Arc<T>,
        passwords: Arc<PasswordService<P>>,
        verification: Arc<EmailVerificationService<U, O>>,
        audit: AuditBus,
    ) -> Self {
        Self {
            users,
            tenants,
            passwords,
            verification,
            audit,
        }
    }

    /// Register a new account with its bootstrap tenant.
    pub async fn register(&self, input: NewRegistration) -> Result<RegistrationOutcome, Error> {
        let email = normalize_email(&input.email);
        validate_email(&email)?;
        validate_name(input.given_name.as_deref())?;
        validate_name(input.family_name.as_deref())?;
        validate_name(Some(&input.tenant_name))?;
        // Strength is checked before any row exists, so a rejected
        // password leaves nothing behind.
        self.passwords.validate_strength(&input.password)?;

        if self.users.find_by_email(&email).await?.is_some() {
            return Err(Error::Auth(AuthError::UserAlreadyExists));
        }

        let user = User::builder()
            .email(email.clone())
            .given_name(input.given_name)
            .family_name(input.family_name)
            .build()?;
        let user = self.users.create(user).await?;

        self.passwords.set_password(&user.id, &input.password).await?;

        let tenant = self
            .create_tenant_with_free_slug(&input.tenant_name, input.slug)
            .await?;
        self.tenants
            .add_membership(TenantMembership::new(
                tenant.id.clone(),
                user.id.clone(),
                TenantRole::Admin,
            ))
            .await?;

        let verification = self.verification.generate_token(&user.id).await?;

        tracing::info!(user_id = %user.id, tenant_id = %tenant.id, "registered new user");
        if let Err(e) = self
            .audit
            .emit(&SecurityEvent::UserRegistered {
                user_id: user.id.clone(),
                email,
                tenant_id: tenant.id.clone(),
                timestamp: Utc::now(),
            })
            .await
        {
            tracing::warn!(error = %e, "audit event delivery failed");
        }

        Ok(RegistrationOutcome {
            user,
            tenant,
            verification,
        })
    }

    /// Create the tenant, resolving slug collisions with a random suffix.
    ///
    /// An explicit slug is the caller's choice; a collision there is an
    /// error, not something to silently rename around.
    async fn create_tenant_with_free_slug(
        &self,
        name: &str,
        explicit_slug: Option<String>,
    ) -> Result<Tenant, Error> {
        if let Some(slug) = explicit_slug {
            validate_slug(&slug)?;
            if self.tenants.find_by_slug(&slug).await?.is_some() {
                return Err(Error::Storage(crate::error::StorageError::Constraint(
                    format!("tenant slug '{slug}' is already taken"),
                )));
            }
            return self.tenants.create(Tenant::new(name, slug)?).await;
        }

        let base = slugify(name);
        let slug = if self.tenants.find_by_slug(&base).await?.is_none() {
            base
        } else {
            format!("{base}-{}", random_slug_suffix())
        };
        self.tenants.create(Tenant::new(name, slug)?).await
    }
}

/// Eight lowercase hex characters of OS entropy for slug deduplication.
fn random_slug_suffix() -> String {
    let mut bytes = [0u8; 4];
    OsRng
        .try_fill_bytes(&mut bytes)
        .expect("OS RNG failure - system entropy source unavailable");
    hex::encode(bytes)
}
