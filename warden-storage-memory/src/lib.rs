//! In-memory storage backend for the warden identity ecosystem
//!
//! Backs every repository with [`dashmap`] concurrent maps. Uniqueness
//! constraints and compare-and-swap updates run under the relevant map
//! entry's guard, so the concurrency semantics match what a transactional
//! SQL backend provides. Nothing survives process restart; intended for
//! tests, examples, and prototypes.
//!
//! ```rust,no_run
//! use warden_storage_memory::MemoryRepositoryProvider;
//!
//! let provider = MemoryRepositoryProvider::new();
//! ```

mod invitation;
mod lockout;
mod password;
mod refresh;
mod tenant;
mod token;
mod user;

pub use invitation::MemoryInvitationRepository;
pub use lockout::MemoryLoginAttemptRepository;
pub use password::MemoryPasswordRepository;
pub use refresh::MemoryRefreshTokenRepository;
pub use tenant::MemoryTenantRepository;
pub use token::MemoryOneTimeTokenRepository;
pub use user::MemoryUserRepository;

use async_trait::async_trait;
use warden_core::{
    Error,
    repositories::{
        InvitationRepositoryProvider, LoginAttemptRepositoryProvider,
        OneTimeTokenRepositoryProvider, PasswordRepositoryProvider,
        RefreshTokenRepositoryProvider, RepositoryProvider, TenantRepositoryProvider,
        UserRepositoryProvider,
    },
};

/// All seven repositories over shared in-process maps.
#[derive(Default)]
pub struct MemoryRepositoryProvider {
    user: MemoryUserRepository,
    password: MemoryPasswordRepository,
    refresh_token: MemoryRefreshTokenRepository,
    one_time_token: MemoryOneTimeTokenRepository,
    login_attempt: MemoryLoginAttemptRepository,
    tenant: MemoryTenantRepository,
    invitation: MemoryInvitationRepository,
}

impl MemoryRepositoryProvider {
    pub fn new() -> Self {
        Self::default()
    }
}

impl UserRepositoryProvider for MemoryRepositoryProvider {
    type UserRepo = MemoryUserRepository;

    fn user(&self) -> &Self::UserRepo {
        &self.user
    }
}

impl PasswordRepositoryProvider for MemoryRepositoryProvider {
    type PasswordRepo = MemoryPasswordRepository;

    fn password(&self) -> &Self::PasswordRepo {
        &self.password
    }
}

impl RefreshTokenRepositoryProvider for MemoryRepositoryProvider {
    type RefreshTokenRepo = MemoryRefreshTokenRepository;

    fn refresh_token(&self) -> &Self::RefreshTokenRepo {
        &self.refresh_token
    }
}

impl OneTimeTokenRepositoryProvider for MemoryRepositoryProvider {
    type OneTimeTokenRepo = MemoryOneTimeTokenRepository;

    fn one_time_token(&self) -> &Self::OneTimeTokenRepo {
        &self.one_time_token
    }
}

impl LoginAttemptRepositoryProvider for MemoryRepositoryProvider {
    type LoginAttemptRepo = MemoryLoginAttemptRepository;

    fn login_attempt(&self) -> &Self::LoginAttemptRepo {
        &self.login_attempt
    }
}

impl TenantRepositoryProvider for MemoryRepositoryProvider {
    type TenantRepo = MemoryTenantRepository;

    fn tenant(&self) -> &Self::TenantRepo {
        &self.tenant
    }
}

impl InvitationRepositoryProvider for MemoryRepositoryProvider {
    type InvitationRepo = MemoryInvitationRepository;

    fn invitation(&self) -> &Self::InvitationRepo {
        &self.invitation
    }
}

#[async_trait]
impl RepositoryProvider for MemoryRepositoryProvider {
    /// No schema to prepare.
    async fn migrate(&self) -> Result<(), Error> {
        tracing::debug!("memory backend requires no migration");
        Ok(())
    }

    async fn health_check(&self) -> Result<(), Error> {
        Ok(())
    }
}
