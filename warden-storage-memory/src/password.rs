use dashmap::DashMap;
use warden_core::{
    Error, UserId,
    repositories::{PasswordHistoryEntry, PasswordRepository, StoredCredential},
};

use async_trait::async_trait;
use chrono::Utc;

/// DashMap-backed credential and password history store.
///
/// History vectors are kept newest-first so reads are a prefix clone.
#[derive(Default)]
pub struct MemoryPasswordRepository {
    credentials: DashMap<UserId, StoredCredential>,
    history: DashMap<UserId, Vec<PasswordHistoryEntry>>,
}

impl MemoryPasswordRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PasswordRepository for MemoryPasswordRepository {
    async fn set_password_hash(&self, user_id: &UserId, hash: &str) -> Result<(), Error> {
        self.credentials.insert(
            user_id.clone(),
            StoredCredential {
                user_id: user_id.clone(),
                password_hash: hash.to_string(),
                changed_at: Utc::now(),
            },
        );
        Ok(())
    }

    async fn get_credential(&self, user_id: &UserId) -> Result<Option<StoredCredential>, Error> {
        Ok(self.credentials.get(user_id).map(|c| c.clone()))
    }

    async fn add_history_entry(
        &self,
        user_id: &UserId,
        hash: &str,
    ) -> Result<PasswordHistoryEntry, Error> {
        let entry = PasswordHistoryEntry {
            user_id: user_id.clone(),
            password_hash: hash.to_string(),
            created_at: Utc::now(),
        };
        self.history
            .entry(user_id.clone())
            .or_default()
            .insert(0, entry.clone());
        Ok(entry)
    }

    async fn recent_history(
        &self,
        user_id: &UserId,
        limit: usize,
    ) -> Result<Vec<PasswordHistoryEntry>, Error> {
        Ok(self
            .history
            .get(user_id)
            .map(|entries| entries.iter().take(limit).cloned().collect())
            .unwrap_or_default())
    }

    async fn trim_history(&self, user_id: &UserId, keep: usize) -> Result<u64, Error> {
        let Some(mut entries) = self.history.get_mut(user_id) else {
            return Ok(0);
        };
        let before = entries.len();
        entries.truncate(keep);
        Ok((before - entries.len()) as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_set_password_hash_upserts() {
        let repo = MemoryPasswordRepository::new();
        let user_id = UserId::new_random();

        assert_eq!(repo.get_credential(&user_id).await.unwrap(), None);

        repo.set_password_hash(&user_id, "hash-one").await.unwrap();
        let first = repo.get_credential(&user_id).await.unwrap().unwrap();
        assert_eq!(first.password_hash, "hash-one");

        repo.set_password_hash(&user_id, "hash-two").await.unwrap();
        let second = repo.get_credential(&user_id).await.unwrap().unwrap();
        assert_eq!(second.password_hash, "hash-two");
        assert!(second.changed_at >= first.changed_at);
    }

    #[tokio::test]
    async fn test_history_is_newest_first_and_limited() {
        let repo = MemoryPasswordRepository::new();
        let user_id = UserId::new_random();

        for n in 1..=5 {
            repo.add_history_entry(&user_id, &format!("hash-{n}"))
                .await
                .unwrap();
        }

        let recent = repo.recent_history(&user_id, 3).await.unwrap();
        assert_eq!(recent.len(), 3);
        assert_eq!(recent[0].password_hash, "hash-5");
        assert_eq!(recent[2].password_hash, "hash-3");
    }

    #[tokio::test]
    async fn test_trim_history_drops_oldest() {
        let repo = MemoryPasswordRepository::new();
        let user_id = UserId::new_random();

        for n in 1..=5 {
            repo.add_history_entry(&user_id, &format!("hash-{n}"))
                .await
                .unwrap();
        }

        assert_eq!(repo.trim_history(&user_id, 2).await.unwrap(), 3);
        let remaining = repo.recent_history(&user_id, 10).await.unwrap();
        assert_eq!(remaining.len(), 2);
        assert_eq!(remaining[0].password_hash, "hash-5");
        assert_eq!(remaining[1].password_hash, "hash-4");

        // Trimming an empty history is a no-op.
        assert_eq!(repo.trim_history(&UserId::new_random(), 2).await.unwrap(), 0);
    }
}
