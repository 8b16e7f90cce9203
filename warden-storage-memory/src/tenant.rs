use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use warden_core::{
    Error, Tenant, TenantId, TenantMembership, UserId,
    error::StorageError,
    repositories::TenantRepository,
};

use async_trait::async_trait;

/// DashMap-backed tenant and membership store with a slug secondary index.
///
/// Slug uniqueness works like the user repository's email index: the
/// reservation happens under the index entry's guard.
#[derive(Default)]
pub struct MemoryTenantRepository {
    tenants: DashMap<TenantId, Tenant>,
    slug_index: DashMap<String, TenantId>,
    memberships: DashMap<UserId, Vec<TenantMembership>>,
}

impl MemoryTenantRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TenantRepository for MemoryTenantRepository {
    async fn create(&self, tenant: Tenant) -> Result<Tenant, Error> {
        match self.slug_index.entry(tenant.slug.clone()) {
            Entry::Occupied(_) => Err(Error::Storage(StorageError::Constraint(format!(
                "slug already taken: {}",
                tenant.slug
            )))),
            Entry::Vacant(slot) => {
                slot.insert(tenant.id.clone());
                self.tenants.insert(tenant.id.clone(), tenant.clone());
                Ok(tenant)
            }
        }
    }

    async fn find_by_id(&self, id: &TenantId) -> Result<Option<Tenant>, Error> {
        Ok(self.tenants.get(id).map(|t| t.clone()))
    }

    async fn find_by_slug(&self, slug: &str) -> Result<Option<Tenant>, Error> {
        let Some(id) = self.slug_index.get(slug).map(|e| e.clone()) else {
            return Ok(None);
        };
        Ok(self.tenants.get(&id).map(|t| t.clone()))
    }

    async fn add_membership(
        &self,
        membership: TenantMembership,
    ) -> Result<TenantMembership, Error> {
        let mut memberships = self.memberships.entry(membership.user_id.clone()).or_default();
        if memberships.iter().any(|m| m.tenant_id == membership.tenant_id) {
            return Err(Error::Storage(StorageError::Constraint(format!(
                "user already a member of tenant {}",
                membership.tenant_id
            ))));
        }
        memberships.push(membership.clone());
        Ok(membership)
    }

    async fn memberships_for_user(
        &self,
        user_id: &UserId,
    ) -> Result<Vec<TenantMembership>, Error> {
        let mut memberships = self
            .memberships
            .get(user_id)
            .map(|m| m.clone())
            .unwrap_or_default();
        memberships.sort_by(|a, b| {
            a.joined_at
                .cmp(&b.joined_at)
                .then_with(|| a.tenant_id.as_str().cmp(b.tenant_id.as_str()))
        });
        Ok(memberships)
    }
}
