use crate::{Error, id::generate_prefixed_id};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One recorded login failure. Keyed by submitted email, whether or not
/// an account exists for it, so probing unknown addresses is throttled
/// exactly like guessing real passwords.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoginAttempt {
    /// Attempt ID of the form `att_{random}`.
    pub id: String,
    pub email: String,
    pub ip_address: Option<String>,
    pub attempted_at: DateTime<Utc>,
}

impl LoginAttempt {
    pub fn new(email: &str, ip_address: Option<&str>) -> Self {
        Self {
            id: generate_prefixed_id("att"),
            email: email.to_string(),
            ip_address: ip_address.map(|ip| ip.to_string()),
            attempted_at: Utc::now(),
        }
    }
}

/// Aggregate view of a window of failures for one email.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct AttemptStats {
    pub count: u32,
    /// The newest failure inside the window, if any.
    pub latest_at: Option<DateTime<Utc>>,
}

/// Repository for failed login attempt tracking
#[async_trait]
pub trait LoginAttemptRepository: Send + Sync + 'static {
    /// Append a failure row
    async fn record_attempt(
        &self,
        email: &str,
        ip_address: Option<&str>,
    ) -> Result<LoginAttempt, Error>;

    /// Count failures for an email since the given instant. Absence of
    /// rows is a zero count, never an error.
    async fn attempt_stats(&self, email: &str, since: DateTime<Utc>)
    -> Result<AttemptStats, Error>;

    /// Remove every failure row for an email in one atomic step,
    /// returning how many were removed
    async fn clear_attempts(&self, email: &str) -> Result<u64, Error>;

    /// Delete attempts older than `before` (retention sweep), returning
    /// how many went away
    async fn cleanup_attempts_before(&self, before: DateTime<Utc>) -> Result<u64, Error>;
}
