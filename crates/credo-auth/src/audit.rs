//! Best-effort recording into the audit sink and the login-attempt
//! trail.
//!
//! Write failures here are logged and swallowed — auditing is a side
//! channel and must never abort or roll back the operation it describes.

use credo_core::models::audit::CreateAuditEvent;
use credo_core::models::login_attempt::CreateLoginAttempt;
use credo_core::repository::{AuditEventRepository, LoginAttemptRepository};
use tracing::warn;

/// Request metadata attached to audit records.
#[derive(Debug, Clone, Default)]
pub struct RequestMeta {
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub method: Option<String>,
    pub path: Option<String>,
}

pub struct Auditor<A: AuditEventRepository, L: LoginAttemptRepository> {
    events: A,
    attempts: L,
}

impl<A: AuditEventRepository, L: LoginAttemptRepository> Auditor<A, L> {
    pub fn new(events: A, attempts: L) -> Self {
        Self { events, attempts }
    }

    pub fn events(&self) -> &A {
        &self.events
    }

    pub fn attempts(&self) -> &L {
        &self.attempts
    }

    /// Append an audit event, swallowing sink failures.
    pub async fn record(&self, mut event: CreateAuditEvent, meta: &RequestMeta) {
        event.ip_address = event.ip_address.or_else(|| meta.ip_address.clone());
        event.user_agent = event.user_agent.or_else(|| meta.user_agent.clone());
        event.method = event.method.or_else(|| meta.method.clone());
        event.path = event.path.or_else(|| meta.path.clone());

        if let Err(e) = self.events.append(event).await {
            warn!(error = %e, "audit sink write failed; continuing");
        }
    }

    /// Append a login attempt, swallowing sink failures.
    pub async fn record_attempt(&self, attempt: CreateLoginAttempt) {
        if let Err(e) = self.attempts.append(attempt).await {
            warn!(error = %e, "login attempt write failed; continuing");
        }
    }
}
