use dashmap::DashMap;
use warden_core::{
    Error, UserId,
    repositories::{RefreshToken, RefreshTokenRepository},
};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// DashMap-backed refresh token store.
///
/// Rows are keyed by token ID with a digest secondary index. The revoke
/// compare-and-swap runs under the row's `get_mut` guard, which is what
/// gives two racing rotations exactly one winner.
#[derive(Default)]
pub struct MemoryRefreshTokenRepository {
    tokens: DashMap<String, RefreshToken>,
    hash_index: DashMap<String, String>,
}

impl MemoryRefreshTokenRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RefreshTokenRepository for MemoryRefreshTokenRepository {
    async fn insert(&self, token: RefreshToken) -> Result<RefreshToken, Error> {
        self.hash_index
            .insert(token.token_hash.clone(), token.id.clone());
        self.tokens.insert(token.id.clone(), token.clone());
        Ok(token)
    }

    async fn find_by_hash(&self, token_hash: &str) -> Result<Option<RefreshToken>, Error> {
        let Some(id) = self.hash_index.get(token_hash).map(|e| e.clone()) else {
            return Ok(None);
        };
        Ok(self.tokens.get(&id).map(|t| t.clone()))
    }

    async fn revoke(&self, id: &str) -> Result<bool, Error> {
        let Some(mut token) = self.tokens.get_mut(id) else {
            return Ok(false);
        };
        if !token.is_active() {
            return Ok(false);
        }
        token.revoked_at = Some(Utc::now());
        Ok(true)
    }

    async fn revoke_all_for_user(&self, user_id: &UserId) -> Result<u64, Error> {
        let now = Utc::now();
        let mut revoked = 0;
        for mut entry in self.tokens.iter_mut() {
            if entry.user_id == *user_id && entry.is_active() {
                entry.revoked_at = Some(now);
                revoked += 1;
            }
        }
        Ok(revoked)
    }

    async fn purge_stale(
        &self,
        expired_before: DateTime<Utc>,
        revoked_before: DateTime<Utc>,
    ) -> Result<u64, Error> {
        let mut purged_hashes = Vec::new();
        self.tokens.retain(|_, token| {
            let stale = token.expires_at <= expired_before
                || token.revoked_at.is_some_and(|at| at <= revoked_before);
            if stale {
                purged_hashes.push(token.token_hash.clone());
            }
            !stale
        });
        for hash in &purged_hashes {
            self.hash_index.remove(hash);
        }
        Ok(purged_hashes.len() as u64)
    }
}
