use dashmap::DashMap;
use warden_core::{
    Error,
    repositories::{AttemptStats, LoginAttempt, LoginAttemptRepository},
};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// DashMap-backed failed login attempt store, keyed by submitted email.
///
/// `clear_attempts` removes the whole key in one map operation, so a
/// concurrent `record_attempt` either lands before the clear (and is
/// removed with the rest) or after it (and starts a fresh counter).
#[derive(Default)]
pub struct MemoryLoginAttemptRepository {
    attempts: DashMap<String, Vec<LoginAttempt>>,
}

impl MemoryLoginAttemptRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl LoginAttemptRepository for MemoryLoginAttemptRepository {
    async fn record_attempt(
        &self,
        email: &str,
        ip_address: Option<&str>,
    ) -> Result<LoginAttempt, Error> {
        let attempt = LoginAttempt::new(email, ip_address);
        self.attempts
            .entry(email.to_string())
            .or_default()
            .push(attempt.clone());
        Ok(attempt)
    }

    async fn attempt_stats(
        &self,
        email: &str,
        since: DateTime<Utc>,
    ) -> Result<AttemptStats, Error> {
        let Some(attempts) = self.attempts.get(email) else {
            return Ok(AttemptStats::default());
        };
        let mut stats = AttemptStats::default();
        for attempt in attempts.iter().filter(|a| a.attempted_at >= since) {
            stats.count += 1;
            if stats.latest_at.is_none_or(|latest| attempt.attempted_at > latest) {
                stats.latest_at = Some(attempt.attempted_at);
            }
        }
        Ok(stats)
    }

    async fn clear_attempts(&self, email: &str) -> Result<u64, Error> {
        Ok(self
            .attempts
            .remove(email)
            .map(|(_, attempts)| attempts.len() as u64)
            .unwrap_or(0))
    }

    async fn cleanup_attempts_before(&self, before: DateTime<Utc>) -> Result<u64, Error> {
        let mut removed = 0;
        self.attempts.retain(|_, attempts| {
            let len = attempts.len();
            attempts.retain(|a| a.attempted_at >= before);
            removed += (len - attempts.len()) as u64;
            !attempts.is_empty()
        });
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[tokio::test]
    async fn test_stats_respect_the_window() {
        let repo = MemoryLoginAttemptRepository::new();
        for _ in 0..3 {
            repo.record_attempt("user@example.com", Some("203.0.113.9"))
                .await
                .unwrap();
        }

        let stats = repo
            .attempt_stats("user@example.com", Utc::now() - Duration::minutes(30))
            .await
            .unwrap();
        assert_eq!(stats.count, 3);
        assert!(stats.latest_at.is_some());

        // A window starting in the future sees nothing.
        let stats = repo
            .attempt_stats("user@example.com", Utc::now() + Duration::minutes(1))
            .await
            .unwrap();
        assert_eq!(stats, AttemptStats::default());

        // Unknown email is a zero count, never an error.
        let stats = repo
            .attempt_stats("ghost@example.com", Utc::now() - Duration::minutes(30))
            .await
            .unwrap();
        assert_eq!(stats.count, 0);
    }

    #[tokio::test]
    async fn test_clear_is_per_email() {
        let repo = MemoryLoginAttemptRepository::new();
        for _ in 0..2 {
            repo.record_attempt("first@example.com", None).await.unwrap();
        }
        repo.record_attempt("second@example.com", None).await.unwrap();

        assert_eq!(repo.clear_attempts("first@example.com").await.unwrap(), 2);
        assert_eq!(repo.clear_attempts("first@example.com").await.unwrap(), 0);

        let stats = repo
            .attempt_stats("second@example.com", Utc::now() - Duration::minutes(30))
            .await
            .unwrap();
        assert_eq!(stats.count, 1);
    }

    #[tokio::test]
    async fn test_cleanup_removes_old_rows() {
        let repo = MemoryLoginAttemptRepository::new();
        repo.record_attempt("user@example.com", None).await.unwrap();

        // Nothing predates a cutoff in the past.
        assert_eq!(
            repo.cleanup_attempts_before(Utc::now() - Duration::days(7))
                .await
                .unwrap(),
            0
        );
        // Everything predates a cutoff in the future.
        assert_eq!(
            repo.cleanup_attempts_before(Utc::now() + Duration::seconds(1))
                .await
                .unwrap(),
            1
        );
        let stats = repo
            .attempt_stats("user@example.com", Utc::now() - Duration::minutes(30))
            .await
            .unwrap();
        assert_eq!(stats.count, 0);
    }
}
