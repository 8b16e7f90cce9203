use crate::{Error, repositories::LoginAttemptRepository};
use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;
use tokio::sync::watch;

/// Configuration for account lockout.
///
/// One window does double duty: failures are counted over the trailing
/// `lockout_window`, and a tripped lockout lasts until the newest failure
/// ages out of that same window. Attempt rows are kept for
/// `retention_period` (far longer than the window) for audit, then swept
/// by the cleanup task; sweeping can therefore never unlock a live
/// lockout early.
#[derive(Debug, Clone)]
pub struct LockoutConfig {
    /// Failures within the window that trip the lockout.
    pub max_failed_attempts: u32,
    /// Sliding window for counting, and the lockout duration.
    pub lockout_window: Duration,
    /// How long attempt rows are retained before the cleanup sweep.
    pub retention_period: Duration,
    /// Disabled means: never locked, nothing recorded.
    pub enabled: bool,
}

impl Default for LockoutConfig {
    fn default() -> Self {
        Self {
            max_failed_attempts: 5,
            lockout_window: Duration::minutes(30),
            retention_period: Duration::days(7),
            enabled: true,
        }
    }
}

impl LockoutConfig {
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Self::default()
        }
    }
}

/// Lockout state for one email at one instant.
#[derive(Debug, Clone, PartialEq)]
pub struct LockoutStatus {
    pub failed_attempts: u32,
    pub is_locked: bool,
    pub locked_until: Option<DateTime<Utc>>,
}

impl LockoutStatus {
    fn unlocked() -> Self {
        Self {
            failed_attempts: 0,
            is_locked: false,
            locked_until: None,
        }
    }

    /// Seconds until the lockout lapses; at least 1 while locked.
    pub fn retry_after_seconds(&self) -> Option<i64> {
        self.locked_until
            .filter(|_| self.is_locked)
            .map(|until| (until - Utc::now()).num_seconds().max(1))
    }
}

/// Tracks failed logins per email and decides when an account is locked.
///
/// Counters key on the submitted email whether or not an account exists,
/// so enumeration probes burn the same budget as password guesses. State
/// lives behind [`LoginAttemptRepository`]; this service is pure policy.
pub struct LockoutService<R: LoginAttemptRepository> {
    repository: Arc<R>,
    config: LockoutConfig,
}

impl<R: LoginAttemptRepository> LockoutService<R> {
    pub fn new(repository: Arc<R>) -> Self {
        Self::with_config(repository, LockoutConfig::default())
    }

    pub fn with_config(repository: Arc<R>, config: LockoutConfig) -> Self {
        Self { repository, config }
    }

    pub fn config(&self) -> &LockoutConfig {
        &self.config
    }

    /// Current lockout state for an email.
    pub async fn status(&self, email: &str) -> Result<LockoutStatus, Error> {
        if !self.config.enabled {
            return Ok(LockoutStatus::unlocked());
        }

        let since = Utc::now() - self.config.lockout_window;
        let stats = self.repository.attempt_stats(email, since).await?;

        let is_locked = stats.count >= self.config.max_failed_attempts;
        let locked_until = if is_locked {
            stats.latest_at.map(|latest| latest + self.config.lockout_window)
        } else {
            None
        };

        Ok(LockoutStatus {
            failed_attempts: stats.count,
            is_locked,
            locked_until,
        })
    }

    pub async fn is_locked(&self, email: &str) -> Result<bool, Error> {
        Ok(self.status(email).await?.is_locked)
    }

    /// Record one failure and return the updated state.
    ///
    /// When the returned status is locked and the pre-failure state was
    /// not, this failure tripped the lockout; callers use that edge to
    /// emit the lockout audit event exactly once.
    pub async fn record_failure(
        &self,
        email: &str,
        ip_address: Option<&str>,
    ) -> Result<LockoutStatus, Error> {
        if !self.config.enabled {
            return Ok(LockoutStatus::unlocked());
        }

        self.repository.record_attempt(email, ip_address).await?;
        let status = self.status(email).await?;

        if status.is_locked {
            tracing::warn!(
                email = %email,
                failed_attempts = status.failed_attempts,
                locked_until = ?status.locked_until,
                "account lockout active"
            );
        }

        Ok(status)
    }

    /// Atomically clear the failure counter (successful login, password
    /// reset).
    pub async fn clear(&self, email: &str) -> Result<u64, Error> {
        let cleared = self.repository.clear_attempts(email).await?;
        if cleared > 0 {
            tracing::debug!(email = %email, cleared, "cleared failed login attempts");
        }
        Ok(cleared)
    }

    /// Spawn the hourly retention sweep. The task runs until `true` is
    /// observed on the shutdown channel.
    pub fn start_cleanup_task(
        &self,
        mut shutdown_rx: watch::Receiver<bool>,
    ) -> tokio::task::JoinHandle<()> {
        const CLEANUP_INTERVAL: std::time::Duration = std::time::Duration::from_secs(3600);

        let repository = self.repository.clone();
        let retention = self.config.retention_period;

        tokio::spawn(async move {
            let mut interval = tokio::time::interval(CLEANUP_INTERVAL);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        let cutoff = Utc::now() - retention;
                        match repository.cleanup_attempts_before(cutoff).await {
                            Ok(removed) if removed > 0 => {
                                tracing::info!(removed, "swept old login attempts");
                            }
                            Ok(_) => {}
                            Err(e) => {
                                tracing::warn!(error = %e, "login attempt sweep failed");
                            }
                        }
                    }
                    _ = shutdown_rx.changed() => {
                        if *shutdown_rx.borrow() {
                            tracing::debug!("login attempt sweep task shutting down");
                            break;
                        }
                    }
                }
            }
        })
    }
}
