//! Core functionality for the warden identity and session ecosystem
//!
//! This crate holds the domain types, error taxonomy, repository traits,
//! and services that make up the identity core: password lifecycle,
//! stateless access tokens, rotating refresh tokens, account lockout,
//! request throttling, tenant resolution, and tenant invitations.
//!
//! Storage is abstracted behind the traits in [`repositories`]; a backend
//! crate implements [`repositories::RepositoryProvider`] and the `warden`
//! facade wires everything together. Application code normally depends on
//! the facade rather than on this crate directly.

pub mod crypto;
pub mod error;
pub mod events;
pub mod id;
pub mod repositories;
pub mod services;
pub mod tenant;
pub mod token;
pub mod user;
pub mod validation;

pub use error::Error;
pub use events::{AuditBus, AuditSink, SecurityEvent, TracingAuditSink};
pub use tenant::{
    RouteScope, Tenant, TenantContext, TenantId, TenantMembership, TenantRole, TenantSelector,
    TenantSource,
};
pub use token::{AccessClaims, IssuedAccessToken, TokenIssuer, TokenIssuerConfig, TokenPair};
pub use user::{User, UserId};
