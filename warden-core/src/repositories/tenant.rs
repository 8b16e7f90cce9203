use crate::{
    Error, UserId,
    tenant::{Tenant, TenantId, TenantMembership},
};
use async_trait::async_trait;

/// Repository for tenant and membership data access
#[async_trait]
pub trait TenantRepository: Send + Sync + 'static {
    /// Create a tenant. Fails with a constraint error when the slug is
    /// already taken.
    async fn create(&self, tenant: Tenant) -> Result<Tenant, Error>;

    /// Find a tenant by ID
    async fn find_by_id(&self, id: &TenantId) -> Result<Option<Tenant>, Error>;

    /// Find a tenant by slug
    async fn find_by_slug(&self, slug: &str) -> Result<Option<Tenant>, Error>;

    /// Add a membership linking a user to a tenant
    async fn add_membership(&self, membership: TenantMembership)
    -> Result<TenantMembership, Error>;

    /// All memberships of a user, ordered by join instant then tenant ID
    /// so the first element is the primary tenant
    async fn memberships_for_user(&self, user_id: &UserId)
    -> Result<Vec<TenantMembership>, Error>;
}
