//! Security audit events
//!
//! Every security-relevant outcome (login success or failure, lockout,
//! password change, token rotation, throttling) emits exactly one
//! [`SecurityEvent`] on the [`AuditBus`]. Sinks subscribe to forward
//! events to whatever the deployment uses for audit trails; the
//! [`TracingAuditSink`] ships as the default and writes structured log
//! records.
//!
//! Events carry the actor (user ID or submitted email), what happened,
//! and the outcome details. They never carry secrets: no passwords, no
//! raw tokens, only token IDs.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::{
    error::EventError,
    tenant::TenantId,
    user::UserId,
};

/// Why a login attempt failed. Retained for audit even where the client
/// response collapses the distinction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LoginFailureReason {
    UnknownEmail,
    WrongPassword,
    AccountLocked,
    AccountInactive,
}

/// A security-relevant outcome.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum SecurityEvent {
    LoginSucceeded {
        user_id: UserId,
        email: String,
        tenant_id: Option<TenantId>,
        ip_address: Option<String>,
        timestamp: DateTime<Utc>,
    },
    LoginFailed {
        email: String,
        reason: LoginFailureReason,
        failed_attempts: u32,
        ip_address: Option<String>,
        timestamp: DateTime<Utc>,
    },
    AccountLocked {
        email: String,
        failed_attempts: u32,
        locked_until: DateTime<Utc>,
        ip_address: Option<String>,
        timestamp: DateTime<Utc>,
    },
    PasswordChanged {
        user_id: UserId,
        revoked_sessions: u64,
        timestamp: DateTime<Utc>,
    },
    PasswordResetRequested {
        user_id: UserId,
        email: String,
        expires_at: DateTime<Utc>,
        timestamp: DateTime<Utc>,
    },
    PasswordResetCompleted {
        user_id: UserId,
        email: String,
        revoked_sessions: u64,
        timestamp: DateTime<Utc>,
    },
    RefreshRotated {
        user_id: UserId,
        old_token_id: String,
        new_token_id: String,
        timestamp: DateTime<Utc>,
    },
    RefreshReuseDetected {
        user_id: UserId,
        token_id: String,
        timestamp: DateTime<Utc>,
    },
    SessionsRevoked {
        user_id: UserId,
        revoked: u64,
        timestamp: DateTime<Utc>,
    },
    RateLimitExceeded {
        bucket: String,
        route: String,
        retry_after_seconds: i64,
        timestamp: DateTime<Utc>,
    },
    UserRegistered {
        user_id: UserId,
        email: String,
        tenant_id: TenantId,
        timestamp: DateTime<Utc>,
    },
    EmailVerified {
        user_id: UserId,
        email: String,
        timestamp: DateTime<Utc>,
    },
    InvitationIssued {
        invitation_id: String,
        tenant_id: TenantId,
        email: String,
        inviter_id: UserId,
        expires_at: DateTime<Utc>,
        timestamp: DateTime<Utc>,
    },
    InvitationAccepted {
        invitation_id: String,
        tenant_id: TenantId,
        user_id: UserId,
        email: String,
        timestamp: DateTime<Utc>,
    },
    InvitationDeclined {
        invitation_id: String,
        tenant_id: TenantId,
        email: String,
        timestamp: DateTime<Utc>,
    },
    InvitationRevoked {
        invitation_id: String,
        tenant_id: TenantId,
        revoked_by: UserId,
        timestamp: DateTime<Utc>,
    },
}

impl SecurityEvent {
    /// Stable action name, useful as a log field or metric label.
    pub fn action(&self) -> &'static str {
        match self {
            SecurityEvent::LoginSucceeded { .. } => "login_succeeded",
            SecurityEvent::LoginFailed { .. } => "login_failed",
            SecurityEvent::AccountLocked { .. } => "account_locked",
            SecurityEvent::PasswordChanged { .. } => "password_changed",
            SecurityEvent::PasswordResetRequested { .. } => "password_reset_requested",
            SecurityEvent::PasswordResetCompleted { .. } => "password_reset_completed",
            SecurityEvent::RefreshRotated { .. } => "refresh_rotated",
            SecurityEvent::RefreshReuseDetected { .. } => "refresh_reuse_detected",
            SecurityEvent::SessionsRevoked { .. } => "sessions_revoked",
            SecurityEvent::RateLimitExceeded { .. } => "rate_limit_exceeded",
            SecurityEvent::UserRegistered { .. } => "user_registered",
            SecurityEvent::EmailVerified { .. } => "email_verified",
            SecurityEvent::InvitationIssued { .. } => "invitation_issued",
            SecurityEvent::InvitationAccepted { .. } => "invitation_accepted",
            SecurityEvent::InvitationDeclined { .. } => "invitation_declined",
            SecurityEvent::InvitationRevoked { .. } => "invitation_revoked",
        }
    }

    /// The actor the event is about: a user ID where one is known,
    /// otherwise the submitted email.
    pub fn actor(&self) -> String {
        match self {
            SecurityEvent::LoginSucceeded { user_id, .. }
            | SecurityEvent::PasswordChanged { user_id, .. }
            | SecurityEvent::PasswordResetRequested { user_id, .. }
            | SecurityEvent::PasswordResetCompleted { user_id, .. }
            | SecurityEvent::RefreshRotated { user_id, .. }
            | SecurityEvent::RefreshReuseDetected { user_id, .. }
            | SecurityEvent::SessionsRevoked { user_id, .. }
            | SecurityEvent::UserRegistered { user_id, .. }
            | SecurityEvent::EmailVerified { user_id, .. }
            | SecurityEvent::InvitationAccepted { user_id, .. } => user_id.to_string(),
            SecurityEvent::InvitationIssued { inviter_id, .. } => inviter_id.to_string(),
            SecurityEvent::InvitationRevoked { revoked_by, .. } => revoked_by.to_string(),
            SecurityEvent::LoginFailed { email, .. }
            | SecurityEvent::AccountLocked { email, .. }
            | SecurityEvent::InvitationDeclined { email, .. } => email.clone(),
            SecurityEvent::RateLimitExceeded { bucket, .. } => bucket.clone(),
        }
    }
}

/// Receives security events.
#[async_trait]
pub trait AuditSink: Send + Sync {
    async fn record_event(&self, event: &SecurityEvent) -> Result<(), EventError>;
}

/// Fans events out to every registered sink.
#[derive(Default, Clone)]
pub struct AuditBus {
    sinks: Arc<RwLock<Vec<Arc<dyn AuditSink>>>>,
}

impl AuditBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn register(&self, sink: Arc<dyn AuditSink>) {
        self.sinks.write().await.push(sink);
    }

    /// Deliver an event to all sinks, stopping at the first failure.
    pub async fn emit(&self, event: &SecurityEvent) -> Result<(), EventError> {
        let sinks = self.sinks.read().await;
        for sink in sinks.iter() {
            sink.record_event(event).await?;
        }
        Ok(())
    }
}

/// Default sink: structured log records under the `warden::audit` target.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingAuditSink;

#[async_trait]
impl AuditSink for TracingAuditSink {
    async fn record_event(&self, event: &SecurityEvent) -> Result<(), EventError> {
        let payload = serde_json::to_string(event).map_err(|e| EventError::Sink(e.to_string()))?;
        tracing::info!(
            target: "warden::audit",
            action = event.action(),
            actor = %event.actor(),
            %payload,
            "audit event"
        );
        Ok(())
    }
}
