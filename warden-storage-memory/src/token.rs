use dashmap::DashMap;
use warden_core::{
    Error,
    repositories::{ConsumeOutcome, OneTimeToken, OneTimeTokenRepository, TokenPurpose},
};

use async_trait::async_trait;
use chrono::Utc;

/// DashMap-backed single-use token store.
///
/// The used check and the `used_at` write in [`consume`] happen under one
/// `get_mut` guard, so concurrent redemptions of the same link see exactly
/// one `Consumed`.
///
/// [`consume`]: OneTimeTokenRepository::consume
#[derive(Default)]
pub struct MemoryOneTimeTokenRepository {
    tokens: DashMap<String, OneTimeToken>,
    hash_index: DashMap<(String, TokenPurpose), String>,
}

impl MemoryOneTimeTokenRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl OneTimeTokenRepository for MemoryOneTimeTokenRepository {
    async fn insert(&self, token: OneTimeToken) -> Result<OneTimeToken, Error> {
        self.hash_index.insert(
            (token.token_hash.clone(), token.purpose),
            token.id.clone(),
        );
        self.tokens.insert(token.id.clone(), token.clone());
        Ok(token)
    }

    async fn find_by_hash(
        &self,
        token_hash: &str,
        purpose: TokenPurpose,
    ) -> Result<Option<OneTimeToken>, Error> {
        let key = (token_hash.to_string(), purpose);
        let Some(id) = self.hash_index.get(&key).map(|e| e.clone()) else {
            return Ok(None);
        };
        Ok(self.tokens.get(&id).map(|t| t.clone()))
    }

    async fn consume(
        &self,
        token_hash: &str,
        purpose: TokenPurpose,
    ) -> Result<ConsumeOutcome, Error> {
        let key = (token_hash.to_string(), purpose);
        let Some(id) = self.hash_index.get(&key).map(|e| e.clone()) else {
            return Ok(ConsumeOutcome::NotFound);
        };
        let Some(mut token) = self.tokens.get_mut(&id) else {
            return Ok(ConsumeOutcome::NotFound);
        };
        if token.is_used() {
            return Ok(ConsumeOutcome::AlreadyUsed);
        }
        if token.is_expired() {
            return Ok(ConsumeOutcome::Expired);
        }
        token.used_at = Some(Utc::now());
        Ok(ConsumeOutcome::Consumed(token.clone()))
    }

    async fn cleanup_expired(&self) -> Result<u64, Error> {
        let mut removed_keys = Vec::new();
        self.tokens.retain(|_, token| {
            if token.is_expired() {
                removed_keys.push((token.token_hash.clone(), token.purpose));
                false
            } else {
                true
            }
        });
        for key in &removed_keys {
            self.hash_index.remove(key);
        }
        Ok(removed_keys.len() as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use std::sync::Arc;
    use warden_core::UserId;

    fn token(purpose: TokenPurpose, hash: &str) -> OneTimeToken {
        OneTimeToken::new(
            UserId::new_random(),
            purpose,
            hash.to_string(),
            Duration::hours(1),
        )
    }

    #[tokio::test]
    async fn test_purposes_are_disjoint() {
        let repo = MemoryOneTimeTokenRepository::new();
        repo.insert(token(TokenPurpose::PasswordReset, "digest-a"))
            .await
            .unwrap();

        assert!(
            repo.find_by_hash("digest-a", TokenPurpose::PasswordReset)
                .await
                .unwrap()
                .is_some()
        );
        assert!(
            repo.find_by_hash("digest-a", TokenPurpose::EmailVerification)
                .await
                .unwrap()
                .is_none()
        );
        assert_eq!(
            repo.consume("digest-a", TokenPurpose::EmailVerification)
                .await
                .unwrap(),
            ConsumeOutcome::NotFound
        );
    }

    #[tokio::test]
    async fn test_consume_outcomes() {
        let repo = MemoryOneTimeTokenRepository::new();
        repo.insert(token(TokenPurpose::PasswordReset, "digest-a"))
            .await
            .unwrap();

        let mut expired = token(TokenPurpose::PasswordReset, "digest-b");
        expired.expires_at = Utc::now() - Duration::seconds(1);
        repo.insert(expired).await.unwrap();

        assert!(matches!(
            repo.consume("digest-a", TokenPurpose::PasswordReset)
                .await
                .unwrap(),
            ConsumeOutcome::Consumed(_)
        ));
        assert_eq!(
            repo.consume("digest-a", TokenPurpose::PasswordReset)
                .await
                .unwrap(),
            ConsumeOutcome::AlreadyUsed
        );
        assert_eq!(
            repo.consume("digest-b", TokenPurpose::PasswordReset)
                .await
                .unwrap(),
            ConsumeOutcome::Expired
        );
        assert_eq!(
            repo.consume("digest-c", TokenPurpose::PasswordReset)
                .await
                .unwrap(),
            ConsumeOutcome::NotFound
        );
    }

    #[tokio::test]
    async fn test_concurrent_consume_single_winner() {
        let repo = Arc::new(MemoryOneTimeTokenRepository::new());
        repo.insert(token(TokenPurpose::PasswordReset, "digest-a"))
            .await
            .unwrap();

        let mut handles = Vec::new();
        for _ in 0..16 {
            let repo = repo.clone();
            handles.push(tokio::spawn(async move {
                repo.consume("digest-a", TokenPurpose::PasswordReset)
                    .await
                    .unwrap()
            }));
        }

        let mut consumed = 0;
        let mut already_used = 0;
        for handle in handles {
            match handle.await.unwrap() {
                ConsumeOutcome::Consumed(_) => consumed += 1,
                ConsumeOutcome::AlreadyUsed => already_used += 1,
                other => panic!("unexpected outcome: {other:?}"),
            }
        }
        assert_eq!(consumed, 1);
        assert_eq!(already_used, 15);
    }

    #[tokio::test]
    async fn test_cleanup_expired() {
        let repo = MemoryOneTimeTokenRepository::new();
        repo.insert(token(TokenPurpose::EmailVerification, "digest-live"))
            .await
            .unwrap();

        let mut expired = token(TokenPurpose::EmailVerification, "digest-old");
        expired.expires_at = Utc::now() - Duration::seconds(1);
        repo.insert(expired).await.unwrap();

        assert_eq!(repo.cleanup_expired().await.unwrap(), 1);
        assert!(
            repo.find_by_hash("digest-old", TokenPurpose::EmailVerification)
                .await
                .unwrap()
                .is_none()
        );
        assert!(
            repo.find_by_hash("digest-live", TokenPurpose::EmailVerification)
                .await
                .unwrap()
                .is_some()
        );
    }
}
