//! Service layer for identity and session logic
//!
//! Each service owns one concern and talks to storage through the traits
//! in [`crate::repositories`]. [`CredentialVerifier`] is the orchestrator
//! that composes the others into the login, refresh, password change, and
//! logout flows.

pub mod auth;
pub mod email_verification;
pub mod invitation;
pub mod lockout;
pub mod password;
pub mod password_reset;
pub mod rate_limit;
pub mod refresh;
pub mod registration;
pub mod tenant;
pub mod user;

pub use auth::{AuthenticatedSession, ClientInfo, CredentialVerifier};
pub use email_verification::{EmailVerificationService, IssuedVerificationToken};
pub use invitation::{InvitationConfig, InvitationService, IssuedInvitation};
pub use lockout::{LockoutConfig, LockoutService, LockoutStatus};
pub use password::{ALLOWED_SYMBOLS, PasswordPolicy, PasswordService};
pub use password_reset::{PasswordResetRequest, PasswordResetService};
pub use rate_limit::{
    ClientIdentity, MemoryRateLimitStore, RateLimitConfig, RateLimitDecision, RateLimitRule,
    RateLimitStore, RateLimiter, RouteClass,
};
pub use refresh::{IssuedRefreshToken, RefreshConfig, RefreshTokenService};
pub use registration::{NewRegistration, RegistrationOutcome, RegistrationService};
pub use tenant::{TenantRequest, TenantResolver};
pub use user::UserService;
