use crate::{
    Error,
    error::TenantError,
    tenant::{RouteScope, TenantContext, TenantId, TenantSelector, TenantSource},
    token::AccessClaims,
    validation::validate_slug,
};
use std::collections::HashMap;

/// The tenant-identifying header names, lowercased as transports
/// normalize them.
pub const TENANT_ID_HEADER: &str = "x-tenant-id";
pub const TENANT_SLUG_HEADER: &str = "x-tenant-slug";

/// The query parameter system-scoped routes may use to act on a tenant.
pub const TENANT_ID_QUERY: &str = "tenant_id";

/// The tenant-relevant parts of one request, assembled by the transport
/// layer.
#[derive(Debug, Clone)]
pub struct TenantRequest {
    scope: RouteScope,
    claim_tenant_id: Option<TenantId>,
    headers: HashMap<String, String>,
    query: HashMap<String, String>,
}

impl TenantRequest {
    pub fn new(scope: RouteScope) -> Self {
        Self {
            scope,
            claim_tenant_id: None,
            headers: HashMap::new(),
            query: HashMap::new(),
        }
    }

    /// Take the tenant claim from verified access token claims.
    pub fn with_claims(mut self, claims: &AccessClaims) -> Self {
        self.claim_tenant_id = claims.tenant_id.clone();
        self
    }

    pub fn with_claim_tenant_id(mut self, tenant_id: TenantId) -> Self {
        self.claim_tenant_id = Some(tenant_id);
        self
    }

    /// Add a request header. Names are lowercased on the way in.
    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers.insert(name.to_lowercase(), value.to_string());
        self
    }

    /// Add a query parameter.
    pub fn with_query_param(mut self, name: &str, value: &str) -> Self {
        self.query.insert(name.to_string(), value.to_string());
        self
    }

    fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).map(String::as_str)
    }
}

/// Resolves the tenant context for a request.
///
/// A pure precedence walk with no storage access: token claim, then the
/// `x-tenant-id` header, then the `x-tenant-slug` header, then (on system
/// routes only) the `tenant_id` query parameter. A present-but-malformed
/// value falls through to the next source rather than failing the walk.
/// Whether the selected tenant exists, and whether the caller may touch
/// it, is the downstream consumer's problem.
#[derive(Debug, Clone, Copy, Default)]
pub struct TenantResolver;

impl TenantResolver {
    pub fn new() -> Self {
        Self
    }

    /// Resolve the tenant for a request.
    ///
    /// `Ok(None)` means the route legitimately has no tenant (public and
    /// system scopes); `Err(TenantError::Unresolved)` means a business
    /// route had no usable source.
    pub fn resolve(&self, request: &TenantRequest) -> Result<Option<TenantContext>, Error> {
        match request.scope {
            RouteScope::Public => Ok(None),
            RouteScope::System => Ok(self.from_query(request)),
            RouteScope::Tenant => self
                .from_claim(request)
                .or_else(|| self.from_headers(request))
                .map(Some)
                .ok_or(Error::Tenant(TenantError::Unresolved)),
        }
    }

    fn from_claim(&self, request: &TenantRequest) -> Option<TenantContext> {
        request.claim_tenant_id.clone().map(|tenant_id| {
            TenantContext::new(TenantSelector::Id(tenant_id), TenantSource::Claim)
        })
    }

    fn from_headers(&self, request: &TenantRequest) -> Option<TenantContext> {
        if let Some(raw) = request.header(TENANT_ID_HEADER)
            && let Ok(tenant_id) = TenantId::new(raw)
        {
            return Some(TenantContext::new(
                TenantSelector::Id(tenant_id),
                TenantSource::Header,
            ));
        }
        if let Some(slug) = request.header(TENANT_SLUG_HEADER)
            && validate_slug(slug).is_ok()
        {
            return Some(TenantContext::new(
                TenantSelector::Slug(slug.to_string()),
                TenantSource::Header,
            ));
        }
        None
    }

    fn from_query(&self, request: &TenantRequest) -> Option<TenantContext> {
        request
            .query
            .get(TENANT_ID_QUERY)
            .and_then(|raw| TenantId::new(raw.as_str()).ok())
            .map(|tenant_id| {
                TenantContext::new(TenantSelector::Id(tenant_id), TenantSource::Query)
            })
    }
}
