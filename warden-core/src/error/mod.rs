//! Error types for the warden crate ecosystem
//!
//! This module defines the error hierarchy shared by every warden crate.
//! [`Error`] is the top-level type; each domain (authentication, tokens,
//! passwords, rate limiting, tenancy, storage, validation, events, crypto)
//! has its own enum that converts into `Error` via `#[from]`.
//!
//! Services keep error kinds distinct internally so audit logging can tell
//! a revoked token from an expired one. What a client is allowed to learn
//! is a separate concern: [`Error::client_message`] is the single place
//! where token-lookup failures collapse into one indistinguishable message
//! while lockout and rate-limit responses keep their retry guidance.

use thiserror::Error;

/// Main error type for warden operations.
#[derive(Debug, Error)]
pub enum Error {
    /// Authentication outcomes (credentials, lockout, account state)
    #[error("Authentication error: {0}")]
    Auth(#[from] AuthError),

    /// Refresh and one-time token failures
    #[error("Token error: {0}")]
    Token(#[from] TokenError),

    /// Password policy and history failures
    #[error("Password error: {0}")]
    Password(#[from] PasswordError),

    /// Request throttling
    #[error("Rate limit error: {0}")]
    RateLimit(#[from] RateLimitError),

    /// Tenant resolution failures
    #[error("Tenant error: {0}")]
    Tenant(#[from] TenantError),

    /// Storage backend failures
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// Malformed input
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Audit event delivery failures
    #[error("Event error: {0}")]
    Event(#[from] EventError),

    /// Signing and hashing failures
    #[error("Crypto error: {0}")]
    Crypto(#[from] CryptoError),
}

/// Authentication-specific errors.
#[derive(Debug, Error)]
pub enum AuthError {
    /// Wrong password, or no account for the submitted email. The two are
    /// deliberately indistinguishable.
    #[error("Invalid email or password")]
    InvalidCredentials,

    /// Too many recent failures for this account.
    #[error("Account locked, retry in {retry_after_seconds} seconds")]
    AccountLocked { retry_after_seconds: i64 },

    /// The account exists but has been deactivated.
    #[error("Account is inactive")]
    AccountInactive,

    /// Registration attempted with an email that is already taken.
    #[error("User already exists")]
    UserAlreadyExists,
}

/// Refresh and one-time token errors.
///
/// All four lookup kinds share one [`Error::client_message`]; the variants
/// exist for internal logging and audit events.
#[derive(Debug, Error)]
pub enum TokenError {
    /// No stored token matches the presented secret.
    #[error("Token not found")]
    NotFound,

    /// The token exists but its expiry has passed.
    #[error("Token expired")]
    Expired,

    /// The token was revoked (or, for one-time tokens, already consumed).
    #[error("Token revoked")]
    Revoked,

    /// A rotation raced another rotation of the same token and lost.
    #[error("Token reuse detected")]
    Reused,

    /// The presented value is not a token at all.
    #[error("Malformed token: {0}")]
    Malformed(String),
}

/// Password lifecycle errors.
#[derive(Debug, Error)]
pub enum PasswordError {
    /// One or more strength rules failed; the message lists all of them.
    #[error("Password does not meet policy: {0}")]
    PolicyViolation(String),

    /// The candidate matches one of the retained previous passwords.
    #[error("Password was used recently")]
    Reused,
}

/// Request throttling errors.
#[derive(Debug, Error)]
pub enum RateLimitError {
    #[error("Rate limit exceeded for {route}, retry in {retry_after_seconds} seconds")]
    Exceeded {
        route: String,
        retry_after_seconds: i64,
    },
}

/// Tenant resolution errors.
#[derive(Debug, Error)]
pub enum TenantError {
    /// No source (claim, header, query) yielded a usable tenant identifier
    /// on a route that requires one.
    #[error("Tenant could not be resolved")]
    Unresolved,

    /// A tenant identifier failed format validation.
    #[error("Invalid tenant identifier '{value}': {reason}")]
    InvalidIdentifier { value: String, reason: String },
}

/// Storage backend errors.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Record not found")]
    NotFound,

    #[error("Constraint violation: {0}")]
    Constraint(String),
}

/// Input validation errors.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("Invalid email: {0}")]
    InvalidEmail(String),

    #[error("Invalid name: {0}")]
    InvalidName(String),

    #[error("Invalid user ID: {0}")]
    InvalidUserId(String),

    #[error("Invalid field: {0}")]
    InvalidField(String),

    #[error("Missing required field: {0}")]
    MissingField(String),
}

/// Audit event errors.
#[derive(Debug, Error)]
pub enum EventError {
    #[error("Audit sink error: {0}")]
    Sink(String),
}

/// Cryptographic operation errors.
#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("JWT signing error: {0}")]
    JwtSigning(String),

    #[error("JWT verification error: {0}")]
    JwtVerification(String),

    #[error("Password hashing error: {0}")]
    PasswordHash(String),
}

impl Error {
    /// Returns true if this is an authentication error
    pub fn is_auth_error(&self) -> bool {
        matches!(self, Error::Auth(_))
    }

    /// Returns true if this is a token error
    pub fn is_token_error(&self) -> bool {
        matches!(self, Error::Token(_))
    }

    /// Returns true if this is a password error
    pub fn is_password_error(&self) -> bool {
        matches!(self, Error::Password(_))
    }

    /// Returns true if this is a rate limit error
    pub fn is_rate_limit_error(&self) -> bool {
        matches!(self, Error::RateLimit(_))
    }

    /// Returns true if this is a tenant error
    pub fn is_tenant_error(&self) -> bool {
        matches!(self, Error::Tenant(_))
    }

    /// Returns true if this is a storage error
    pub fn is_storage_error(&self) -> bool {
        matches!(self, Error::Storage(_))
    }

    /// Returns true if this is a validation error
    pub fn is_validation_error(&self) -> bool {
        matches!(self, Error::Validation(_))
    }

    /// Seconds the caller should wait before retrying, when the failure
    /// carries that guidance (lockout and rate limiting).
    pub fn retry_after_seconds(&self) -> Option<i64> {
        match self {
            Error::Auth(AuthError::AccountLocked {
                retry_after_seconds,
            }) => Some(*retry_after_seconds),
            Error::RateLimit(RateLimitError::Exceeded {
                retry_after_seconds,
                ..
            }) => Some(*retry_after_seconds),
            _ => None,
        }
    }

    /// Message safe to show to an end user.
    ///
    /// Every token lookup failure (not found, expired, revoked, reused)
    /// maps to the same string so a response cannot be used to probe which
    /// tokens exist or why one stopped working. Lockout and rate limiting
    /// stay distinct because callers need the retry guidance. Storage,
    /// event, and crypto failures are never described to clients.
    pub fn client_message(&self) -> String {
        match self {
            Error::Auth(AuthError::InvalidCredentials) => "Invalid email or password".to_string(),
            Error::Auth(AuthError::AccountLocked {
                retry_after_seconds,
            }) => format!(
                "Account temporarily locked. Try again in {retry_after_seconds} seconds"
            ),
            Error::Auth(AuthError::AccountInactive) => "Account is inactive".to_string(),
            Error::Auth(AuthError::UserAlreadyExists) => {
                "An account with this email already exists".to_string()
            }
            Error::Token(_) => "Invalid or expired token".to_string(),
            Error::Password(PasswordError::PolicyViolation(rules)) => {
                format!("Password does not meet requirements: {rules}")
            }
            Error::Password(PasswordError::Reused) => {
                "Password was used recently. Choose one you have not used before".to_string()
            }
            Error::RateLimit(RateLimitError::Exceeded {
                retry_after_seconds,
                ..
            }) => format!("Too many requests. Try again in {retry_after_seconds} seconds"),
            Error::Tenant(_) => "Tenant could not be determined for this request".to_string(),
            Error::Validation(e) => e.to_string(),
            Error::Storage(_) | Error::Event(_) | Error::Crypto(_) => {
                "Internal error".to_string()
            }
        }
    }
}
