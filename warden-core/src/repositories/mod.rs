//! Repository traits for data access
//!
//! Services never talk to a backend directly; they hold one of these
//! traits. A storage crate implements the seven repositories plus the
//! per-domain provider traits, and [`RepositoryProvider`] ties them
//! together so the facade can be generic over a single type parameter.

use crate::Error;
use async_trait::async_trait;

mod adapter;
mod invitation;
mod lockout;
mod password;
mod refresh;
mod tenant;
mod token;
mod user;

pub use adapter::{
    InvitationRepositoryAdapter, LoginAttemptRepositoryAdapter, OneTimeTokenRepositoryAdapter,
    PasswordRepositoryAdapter, RefreshTokenRepositoryAdapter, TenantRepositoryAdapter,
    UserRepositoryAdapter,
};
pub use invitation::{Invitation, InvitationRepository, InvitationStatus};
pub use lockout::{AttemptStats, LoginAttempt, LoginAttemptRepository};
pub use password::{PasswordHistoryEntry, PasswordRepository, StoredCredential};
pub use refresh::{RefreshToken, RefreshTokenRepository};
pub use tenant::TenantRepository;
pub use token::{ConsumeOutcome, OneTimeToken, OneTimeTokenRepository, TokenPurpose};
pub use user::UserRepository;

/// Provides access to the user repository
pub trait UserRepositoryProvider: Send + Sync + 'static {
    type UserRepo: UserRepository;
    fn user(&self) -> &Self::UserRepo;
}

/// Provides access to the password repository
pub trait PasswordRepositoryProvider: Send + Sync + 'static {
    type PasswordRepo: PasswordRepository;
    fn password(&self) -> &Self::PasswordRepo;
}

/// Provides access to the refresh token repository
pub trait RefreshTokenRepositoryProvider: Send + Sync + 'static {
    type RefreshTokenRepo: RefreshTokenRepository;
    fn refresh_token(&self) -> &Self::RefreshTokenRepo;
}

/// Provides access to the one-time token repository
pub trait OneTimeTokenRepositoryProvider: Send + Sync + 'static {
    type OneTimeTokenRepo: OneTimeTokenRepository;
    fn one_time_token(&self) -> &Self::OneTimeTokenRepo;
}

/// Provides access to the login attempt repository
pub trait LoginAttemptRepositoryProvider: Send + Sync + 'static {
    type LoginAttemptRepo: LoginAttemptRepository;
    fn login_attempt(&self) -> &Self::LoginAttemptRepo;
}

/// Provides access to the tenant repository
pub trait TenantRepositoryProvider: Send + Sync + 'static {
    type TenantRepo: TenantRepository;
    fn tenant(&self) -> &Self::TenantRepo;
}

/// Provides access to the invitation repository
pub trait InvitationRepositoryProvider: Send + Sync + 'static {
    type InvitationRepo: InvitationRepository;
    fn invitation(&self) -> &Self::InvitationRepo;
}

/// Combined provider implemented by storage backends.
#[async_trait]
pub trait RepositoryProvider:
    UserRepositoryProvider
    + PasswordRepositoryProvider
    + RefreshTokenRepositoryProvider
    + OneTimeTokenRepositoryProvider
    + LoginAttemptRepositoryProvider
    + TenantRepositoryProvider
    + InvitationRepositoryProvider
    + Send
    + Sync
    + 'static
{
    /// Prepare the backend (create tables, run migrations). No-op for
    /// backends without schemas.
    async fn migrate(&self) -> Result<(), Error>;

    /// Verify the backend is reachable
    async fn health_check(&self) -> Result<(), Error>;
}
