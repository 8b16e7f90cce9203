//! Tenant model and request-scoped tenant context
//!
//! Tenancy is carried, not enforced, by this crate: services stamp tokens
//! and contexts with a tenant, and the embedding application decides what
//! that tenant may reach. [`TenantContext`] is the per-request resolution
//! result produced by
//! [`TenantResolver`](crate::services::TenantResolver); it records which
//! source supplied the identifier so audit trails can tell a claim-derived
//! tenant from a header-derived one.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::Display;

use crate::{
    Error,
    error::TenantError,
    id::generate_prefixed_id,
    user::UserId,
    validation::{validate_name, validate_slug},
};

const MAX_TENANT_ID_LENGTH: usize = 64;

/// Validated tenant identifier.
///
/// Accepts generated `tnt_` IDs as well as externally issued identifiers
/// (UUIDs and the like): ASCII alphanumerics plus `-` and `_`, at most 64
/// characters, never empty.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TenantId(String);

impl TenantId {
    pub fn new(id: impl Into<String>) -> Result<Self, TenantError> {
        let id = id.into();
        if id.is_empty() {
            return Err(TenantError::InvalidIdentifier {
                value: id,
                reason: "must not be empty".to_string(),
            });
        }
        if id.len() > MAX_TENANT_ID_LENGTH {
            return Err(TenantError::InvalidIdentifier {
                value: id,
                reason: format!("exceeds {MAX_TENANT_ID_LENGTH} characters"),
            });
        }
        if !id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        {
            return Err(TenantError::InvalidIdentifier {
                value: id,
                reason: "contains characters outside [A-Za-z0-9-_]".to_string(),
            });
        }
        Ok(Self(id))
    }

    /// Wrap a string known to be valid (IDs read back from storage).
    pub fn new_unchecked(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generate a new random tenant ID of the form `tnt_{random}`.
    pub fn new_random() -> Self {
        Self(generate_prefixed_id("tnt"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

impl Display for TenantId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for TenantId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl TryFrom<&str> for TenantId {
    type Error = TenantError;

    fn try_from(id: &str) -> Result<Self, Self::Error> {
        Self::new(id)
    }
}

/// Role a user holds within a tenant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TenantRole {
    Admin,
    Member,
}

impl TenantRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            TenantRole::Admin => "admin",
            TenantRole::Member => "member",
        }
    }
}

impl Display for TenantRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A tenant (organization) record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tenant {
    pub id: TenantId,
    pub name: String,
    /// URL-safe identifier, unique across tenants.
    pub slug: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Tenant {
    pub fn new(name: impl Into<String>, slug: impl Into<String>) -> Result<Self, Error> {
        let name = name.into();
        let slug = slug.into();
        validate_name(Some(&name))?;
        validate_slug(&slug)?;
        let now = Utc::now();
        Ok(Self {
            id: TenantId::new_random(),
            name,
            slug,
            created_at: now,
            updated_at: now,
        })
    }
}

/// A user's membership in a tenant.
///
/// `joined_at` is load-bearing: the membership with the earliest join
/// instant is the user's primary tenant, with the tenant ID as the tie
/// breaker, so token claims never depend on storage iteration order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TenantMembership {
    pub tenant_id: TenantId,
    pub user_id: UserId,
    pub role: TenantRole,
    pub joined_at: DateTime<Utc>,
}

impl TenantMembership {
    pub fn new(tenant_id: TenantId, user_id: UserId, role: TenantRole) -> Self {
        Self {
            tenant_id,
            user_id,
            role,
            joined_at: Utc::now(),
        }
    }
}

/// Which part of the request supplied the tenant identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TenantSource {
    /// `tenant_id` claim in a verified access token.
    Claim,
    /// `x-tenant-id` or `x-tenant-slug` request header.
    Header,
    /// `tenant_id` query parameter (system-scoped routes only).
    Query,
}

/// The tenant identifier a request carried: either a full ID or a slug
/// still to be mapped to a tenant by the caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TenantSelector {
    Id(TenantId),
    Slug(String),
}

/// Resolved tenant context for one request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TenantContext {
    selector: TenantSelector,
    source: TenantSource,
}

impl TenantContext {
    pub fn new(selector: TenantSelector, source: TenantSource) -> Self {
        Self { selector, source }
    }

    pub fn selector(&self) -> &TenantSelector {
        &self.selector
    }

    pub fn source(&self) -> TenantSource {
        self.source
    }

    /// The tenant ID, when the request carried one directly.
    pub fn tenant_id(&self) -> Option<&TenantId> {
        match &self.selector {
            TenantSelector::Id(id) => Some(id),
            TenantSelector::Slug(_) => None,
        }
    }

    /// The slug, when the request identified the tenant by slug.
    pub fn slug(&self) -> Option<&str> {
        match &self.selector {
            TenantSelector::Id(_) => None,
            TenantSelector::Slug(slug) => Some(slug),
        }
    }
}

/// How a route participates in tenant resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteScope {
    /// No tenant ever required (login, registration, health).
    Public,
    /// System administration; may act on a tenant via query parameter.
    System,
    /// Regular business route; a tenant must resolve.
    Tenant,
}
