use crate::{Error, error::RateLimitError, user::UserId};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use std::fmt::Display;
use std::sync::Arc;

/// The sensitive route families the limiter throttles. Routes without a
/// configured rule pass through unlimited.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RouteClass {
    Login,
    Registration,
    PasswordReset,
    Invitation,
}

impl RouteClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            RouteClass::Login => "login",
            RouteClass::Registration => "registration",
            RouteClass::PasswordReset => "password_reset",
            RouteClass::Invitation => "invitation",
        }
    }
}

impl Display for RouteClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Who is being counted. Precedence at the call site: authenticated
/// subject, then origin IP, then the shared unknown bucket.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ClientIdentity {
    Subject(UserId),
    Ip(String),
    Unknown,
}

impl ClientIdentity {
    /// Pick the identity for a request from what the transport knows.
    pub fn from_request(subject: Option<&UserId>, ip_address: Option<&str>) -> Self {
        match (subject, ip_address) {
            (Some(user_id), _) => ClientIdentity::Subject(user_id.clone()),
            (None, Some(ip)) => ClientIdentity::Ip(ip.to_string()),
            (None, None) => ClientIdentity::Unknown,
        }
    }

    /// Stable bucket key, also used as the actor in audit events.
    pub fn bucket(&self) -> String {
        match self {
            ClientIdentity::Subject(user_id) => format!("user:{user_id}"),
            ClientIdentity::Ip(ip) => format!("ip:{ip}"),
            ClientIdentity::Unknown => "unknown".to_string(),
        }
    }
}

/// One (max requests, window) pair for a route class.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RateLimitRule {
    pub max_requests: u32,
    pub window: Duration,
}

impl RateLimitRule {
    pub fn new(max_requests: u32, window: Duration) -> Self {
        Self {
            max_requests,
            window,
        }
    }
}

/// Per-route limiter rules.
///
/// The defaults are the production values: login 5 per 15 minutes,
/// registration and password reset 3 per hour, invitations 10 per hour.
#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    pub login: Option<RateLimitRule>,
    pub registration: Option<RateLimitRule>,
    pub password_reset: Option<RateLimitRule>,
    pub invitation: Option<RateLimitRule>,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            login: Some(RateLimitRule::new(5, Duration::minutes(15))),
            registration: Some(RateLimitRule::new(3, Duration::hours(1))),
            password_reset: Some(RateLimitRule::new(3, Duration::hours(1))),
            invitation: Some(RateLimitRule::new(10, Duration::hours(1))),
        }
    }
}

impl RateLimitConfig {
    /// No limits at all; useful in tests exercising other components.
    pub fn disabled() -> Self {
        Self {
            login: None,
            registration: None,
            password_reset: None,
            invitation: None,
        }
    }

    pub fn rule_for(&self, route: RouteClass) -> Option<RateLimitRule> {
        match route {
            RouteClass::Login => self.login,
            RouteClass::Registration => self.registration,
            RouteClass::PasswordReset => self.password_reset,
            RouteClass::Invitation => self.invitation,
        }
    }
}

/// Outcome of one limiter check.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RateLimitDecision {
    pub allowed: bool,
    /// Slots left in the window after this request.
    pub remaining: u32,
    /// How long until a slot frees up; set only on rejection.
    pub retry_after: Option<Duration>,
}

impl RateLimitDecision {
    fn unlimited() -> Self {
        Self {
            allowed: true,
            remaining: u32::MAX,
            retry_after: None,
        }
    }
}

/// Counter storage for the sliding window.
///
/// `check_and_record` performs the whole prune / check / append sequence
/// for one key atomically, so two concurrent requests cannot both take
/// the last slot. Implementations with a shared backend make the limiter
/// effective across instances; the in-memory default covers a single
/// process.
#[async_trait]
pub trait RateLimitStore: Send + Sync + 'static {
    async fn check_and_record(
        &self,
        key: &str,
        rule: RateLimitRule,
        now: DateTime<Utc>,
    ) -> Result<RateLimitDecision, Error>;

    /// Drop every counter (test isolation).
    async fn clear(&self) -> Result<(), Error>;
}

/// In-memory sliding-window store.
///
/// One dashmap entry per key; the entry lock is the per-key critical
/// section, so unrelated identities never contend.
#[derive(Default)]
pub struct MemoryRateLimitStore {
    counters: DashMap<String, Vec<DateTime<Utc>>>,
}

impl MemoryRateLimitStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RateLimitStore for MemoryRateLimitStore {
    async fn check_and_record(
        &self,
        key: &str,
        rule: RateLimitRule,
        now: DateTime<Utc>,
    ) -> Result<RateLimitDecision, Error> {
        let mut entry = self.counters.entry(key.to_string()).or_default();
        let cutoff = now - rule.window;
        entry.retain(|ts| *ts > cutoff);

        if entry.len() as u32 >= rule.max_requests {
            // Rejected attempts are not recorded; they must not extend
            // the window.
            let retry_after = entry
                .iter()
                .min()
                .map(|oldest| (*oldest + rule.window) - now);
            return Ok(RateLimitDecision {
                allowed: false,
                remaining: 0,
                retry_after,
            });
        }

        entry.push(now);
        Ok(RateLimitDecision {
            allowed: true,
            remaining: rule.max_requests - entry.len() as u32,
            retry_after: None,
        })
    }

    async fn clear(&self) -> Result<(), Error> {
        self.counters.clear();
        Ok(())
    }
}

/// Sliding-window request limiter for the sensitive route families.
///
/// Advisory, not a security boundary: lockout and token validity never
/// depend on it. Sits ahead of the other services so a throttled request
/// does no credential or crypto work at all.
pub struct RateLimiter<S: RateLimitStore> {
    store: Arc<S>,
    config: RateLimitConfig,
}

impl RateLimiter<MemoryRateLimitStore> {
    /// Limiter over the in-memory store with default rules.
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryRateLimitStore::new()), RateLimitConfig::default())
    }
}

impl<S: RateLimitStore> RateLimiter<S> {
    pub fn new(store: Arc<S>, config: RateLimitConfig) -> Self {
        Self { store, config }
    }

    pub fn config(&self) -> &RateLimitConfig {
        &self.config
    }

    /// Check (and on admission, record) one request.
    pub async fn check(
        &self,
        identity: &ClientIdentity,
        route: RouteClass,
    ) -> Result<RateLimitDecision, Error> {
        let Some(rule) = self.config.rule_for(route) else {
            return Ok(RateLimitDecision::unlimited());
        };

        let key = format!("{}:{}", route.as_str(), identity.bucket());
        let decision = self.store.check_and_record(&key, rule, Utc::now()).await?;

        if !decision.allowed {
            tracing::warn!(
                bucket = %identity.bucket(),
                route = %route,
                retry_after_seconds = decision.retry_after.map(|d| d.num_seconds()),
                "rate limit exceeded"
            );
        }
        Ok(decision)
    }

    /// Like [`check`](Self::check) but maps rejection to
    /// [`RateLimitError::Exceeded`] carrying the Retry-After hint.
    pub async fn enforce(
        &self,
        identity: &ClientIdentity,
        route: RouteClass,
    ) -> Result<RateLimitDecision, Error> {
        let decision = self.check(identity, route).await?;
        if !decision.allowed {
            return Err(Error::RateLimit(RateLimitError::Exceeded {
                route: route.as_str().to_string(),
                retry_after_seconds: decision
                    .retry_after
                    .map(|d| d.num_seconds().max(1))
                    .unwrap_or(1),
            }));
        }
        Ok(decision)
    }

    /// Drop all counters.
    pub async fn reset(&self) -> Result<(), Error> {
        self.store.clear().await
    }
}
