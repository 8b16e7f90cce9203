use dashmap::DashMap;
use warden_core::{
    Error, UserId,
    repositories::{Invitation, InvitationRepository, InvitationStatus},
    tenant::TenantId,
};

use async_trait::async_trait;
use chrono::Utc;

/// DashMap-backed invitation store.
///
/// The status check and the write in [`resolve`] happen under one
/// `get_mut` guard, so concurrent resolutions of the same invitation see
/// exactly one `true`.
///
/// [`resolve`]: InvitationRepository::resolve
#[derive(Default)]
pub struct MemoryInvitationRepository {
    invitations: DashMap<String, Invitation>,
    hash_index: DashMap<String, String>,
}

impl MemoryInvitationRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl InvitationRepository for MemoryInvitationRepository {
    async fn insert(&self, invitation: Invitation) -> Result<Invitation, Error> {
        self.hash_index
            .insert(invitation.token_hash.clone(), invitation.id.clone());
        self.invitations
            .insert(invitation.id.clone(), invitation.clone());
        Ok(invitation)
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<Invitation>, Error> {
        Ok(self.invitations.get(id).map(|i| i.clone()))
    }

    async fn find_by_hash(&self, token_hash: &str) -> Result<Option<Invitation>, Error> {
        let Some(id) = self.hash_index.get(token_hash).map(|e| e.clone()) else {
            return Ok(None);
        };
        Ok(self.invitations.get(&id).map(|i| i.clone()))
    }

    async fn resolve(
        &self,
        id: &str,
        status: InvitationStatus,
        accepted_by: Option<&UserId>,
    ) -> Result<bool, Error> {
        let Some(mut invitation) = self.invitations.get_mut(id) else {
            return Ok(false);
        };
        if invitation.status != InvitationStatus::Pending {
            return Ok(false);
        }
        invitation.status = status;
        invitation.resolved_at = Some(Utc::now());
        invitation.accepted_by = accepted_by.cloned();
        Ok(true)
    }

    async fn pending_for_tenant(&self, tenant_id: &TenantId) -> Result<Vec<Invitation>, Error> {
        let mut pending: Vec<Invitation> = self
            .invitations
            .iter()
            .filter(|entry| &entry.tenant_id == tenant_id && entry.is_pending())
            .map(|entry| entry.value().clone())
            .collect();
        pending.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(pending)
    }

    async fn count_pending(&self, tenant_id: &TenantId, email: &str) -> Result<u32, Error> {
        Ok(self
            .invitations
            .iter()
            .filter(|entry| {
                &entry.tenant_id == tenant_id && entry.email == email && entry.is_pending()
            })
            .count() as u32)
    }

    async fn cleanup_expired(&self) -> Result<u64, Error> {
        let mut removed_hashes = Vec::new();
        self.invitations.retain(|_, invitation| {
            if invitation.status == InvitationStatus::Pending && invitation.is_expired() {
                removed_hashes.push(invitation.token_hash.clone());
                false
            } else {
                true
            }
        });
        for hash in &removed_hashes {
            self.hash_index.remove(hash);
        }
        Ok(removed_hashes.len() as u64)
    }
}
