use crate::{
    Error, UserId,
    id::generate_prefixed_id,
    tenant::{TenantId, TenantRole},
};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Where an invitation ended up. `Pending` is the only state a resolve
/// can move away from; the other three are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvitationStatus {
    Pending,
    Accepted,
    Declined,
    Revoked,
}

impl InvitationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            InvitationStatus::Pending => "pending",
            InvitationStatus::Accepted => "accepted",
            InvitationStatus::Declined => "declined",
            InvitationStatus::Revoked => "revoked",
        }
    }
}

/// A stored tenant invitation (digest only, never the secret).
///
/// Expiry is a predicate over `expires_at` rather than a stored status,
/// so an invitation that lapses needs no background write to stop
/// working.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Invitation {
    /// Invitation ID of the form `inv_{random}`; safe to log.
    pub id: String,
    pub tenant_id: TenantId,
    /// Normalized address the invitation was issued to.
    pub email: String,
    /// Role the membership gets on acceptance.
    pub role: TenantRole,
    pub inviter_id: UserId,
    pub token_hash: String,
    pub status: InvitationStatus,
    pub expires_at: DateTime<Utc>,
    /// When the invitation left `Pending`.
    pub resolved_at: Option<DateTime<Utc>>,
    /// The account that accepted, once one has.
    pub accepted_by: Option<UserId>,
    pub created_at: DateTime<Utc>,
}

impl Invitation {
    pub fn new(
        tenant_id: TenantId,
        email: impl Into<String>,
        role: TenantRole,
        inviter_id: UserId,
        token_hash: String,
        ttl: Duration,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: generate_prefixed_id("inv"),
            tenant_id,
            email: email.into(),
            role,
            inviter_id,
            token_hash,
            status: InvitationStatus::Pending,
            expires_at: now + ttl,
            resolved_at: None,
            accepted_by: None,
            created_at: now,
        }
    }

    pub fn is_expired(&self) -> bool {
        self.expires_at <= Utc::now()
    }

    pub fn is_pending(&self) -> bool {
        self.status == InvitationStatus::Pending && !self.is_expired()
    }
}

/// Repository for tenant invitation storage
#[async_trait]
pub trait InvitationRepository: Send + Sync + 'static {
    /// Persist a new invitation row
    async fn insert(&self, invitation: Invitation) -> Result<Invitation, Error>;

    /// Find an invitation by ID, regardless of state
    async fn find_by_id(&self, id: &str) -> Result<Option<Invitation>, Error>;

    /// Non-consuming lookup by digest, regardless of state
    async fn find_by_hash(&self, token_hash: &str) -> Result<Option<Invitation>, Error>;

    /// Atomically move a pending invitation to a terminal status. The
    /// status check and the write happen under one guard: returns `true`
    /// only if THIS call moved the invitation out of `Pending`, so of N
    /// concurrent resolutions exactly one wins.
    async fn resolve(
        &self,
        id: &str,
        status: InvitationStatus,
        accepted_by: Option<&UserId>,
    ) -> Result<bool, Error>;

    /// Pending invitations for a tenant, newest first
    async fn pending_for_tenant(&self, tenant_id: &TenantId) -> Result<Vec<Invitation>, Error>;

    /// How many live pending invitations a tenant has for an email
    async fn count_pending(&self, tenant_id: &TenantId, email: &str) -> Result<u32, Error>;

    /// Delete expired pending rows, returning how many went away
    async fn cleanup_expired(&self) -> Result<u64, Error>;
}
