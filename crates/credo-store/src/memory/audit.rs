//! In-memory audit sink and login-attempt trail. Both are append-only
//! vectors in chronological order.

use std::sync::{Arc, RwLock};

use chrono::{DateTime, Utc};
use credo_core::error::CoreResult;
use credo_core::models::audit::{AuditEvent, CreateAuditEvent};
use credo_core::models::login_attempt::{CreateLoginAttempt, LoginAttempt};
use credo_core::repository::{
    AuditEventRepository, AuditFilter, LoginAttemptRepository, PaginatedResult, Pagination,
};
use uuid::Uuid;

use super::{paginate, read_guard, write_guard};

#[derive(Clone, Default)]
pub struct MemoryAuditEventRepository {
    inner: Arc<RwLock<Vec<AuditEvent>>>,
}

impl MemoryAuditEventRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

fn matches(event: &AuditEvent, filter: &AuditFilter) -> bool {
    if let Some(category) = filter.category {
        if event.category != category {
            return false;
        }
    }
    if let Some(action) = &filter.action {
        if &event.action != action {
            return false;
        }
    }
    if let Some(actor_id) = filter.actor_id {
        if event.actor_id != Some(actor_id) {
            return false;
        }
    }
    if let Some(success) = filter.success {
        if event.success != success {
            return false;
        }
    }
    if let Some(from) = filter.from {
        if event.created_at < from {
            return false;
        }
    }
    if let Some(to) = filter.to {
        if event.created_at > to {
            return false;
        }
    }
    true
}

impl AuditEventRepository for MemoryAuditEventRepository {
    async fn append(&self, input: CreateAuditEvent) -> CoreResult<AuditEvent> {
        let event = AuditEvent {
            id: Uuid::new_v4(),
            category: input.category,
            action: input.action,
            severity: input.severity,
            actor_id: input.actor_id,
            actor_email: input.actor_email,
            ip_address: input.ip_address,
            user_agent: input.user_agent,
            method: input.method,
            path: input.path,
            success: input.success,
            error_message: input.error_message,
            detail: input.detail,
            target_type: input.target_type,
            target_id: input.target_id,
            session_id: input.session_id,
            created_at: Utc::now(),
        };
        let mut events = write_guard(&self.inner)?;
        events.push(event.clone());
        Ok(event)
    }

    async fn list(
        &self,
        filter: AuditFilter,
        pagination: Pagination,
    ) -> CoreResult<PaginatedResult<AuditEvent>> {
        let events = read_guard(&self.inner)?;
        let filtered: Vec<AuditEvent> = events
            .iter()
            .filter(|e| matches(e, &filter))
            .cloned()
            .collect();
        Ok(paginate(&filtered, &pagination))
    }
}

#[derive(Clone, Default)]
pub struct MemoryLoginAttemptRepository {
    inner: Arc<RwLock<Vec<LoginAttempt>>>,
}

impl MemoryLoginAttemptRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

impl LoginAttemptRepository for MemoryLoginAttemptRepository {
    async fn append(&self, input: CreateLoginAttempt) -> CoreResult<LoginAttempt> {
        let attempt = LoginAttempt {
            id: Uuid::new_v4(),
            email: input.email,
            ip_address: input.ip_address,
            user_agent: input.user_agent,
            success: input.success,
            failure_reason: input.failure_reason,
            user_id: input.user_id,
            created_at: Utc::now(),
        };
        let mut attempts = write_guard(&self.inner)?;
        attempts.push(attempt.clone());
        Ok(attempt)
    }

    async fn list_for_email(
        &self,
        email: &str,
        pagination: Pagination,
    ) -> CoreResult<PaginatedResult<LoginAttempt>> {
        let needle = email.trim().to_lowercase();
        let attempts = read_guard(&self.inner)?;
        let filtered: Vec<LoginAttempt> = attempts
            .iter()
            .filter(|a| a.email == needle)
            .cloned()
            .collect();
        Ok(paginate(&filtered, &pagination))
    }

    async fn delete_older_than(&self, cutoff: DateTime<Utc>) -> CoreResult<u64> {
        let mut attempts = write_guard(&self.inner)?;
        let before = attempts.len();
        attempts.retain(|a| a.created_at >= cutoff);
        Ok((before - attempts.len()) as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use credo_core::models::audit::{AuditCategory, AuditSeverity};
    use credo_core::models::login_attempt::FailureReason;

    #[tokio::test]
    async fn audit_filter_narrows_by_category_and_outcome() {
        let repo = MemoryAuditEventRepository::new();
        repo.append(CreateAuditEvent::new(AuditCategory::Auth, "auth.login", true))
            .await
            .unwrap();
        repo.append(CreateAuditEvent::new(AuditCategory::Auth, "auth.login", false))
            .await
            .unwrap();
        repo.append(CreateAuditEvent::new(
            AuditCategory::Security,
            "security.account_locked",
            false,
        ))
        .await
        .unwrap();

        let failures = repo
            .list(
                AuditFilter {
                    category: Some(AuditCategory::Auth),
                    success: Some(false),
                    ..Default::default()
                },
                Pagination::default(),
            )
            .await
            .unwrap();
        assert_eq!(failures.total, 1);
        assert_eq!(failures.items[0].severity, AuditSeverity::Warning);
    }

    #[tokio::test]
    async fn attempt_retention_prunes_by_cutoff() {
        let repo = MemoryLoginAttemptRepository::new();
        repo.append(CreateLoginAttempt {
            email: "a@b.c".into(),
            ip_address: None,
            user_agent: None,
            success: false,
            failure_reason: Some(FailureReason::InvalidCredentials),
            user_id: None,
        })
        .await
        .unwrap();

        assert_eq!(repo.delete_older_than(Utc::now() - chrono::Duration::days(1)).await.unwrap(), 0);
        assert_eq!(repo.delete_older_than(Utc::now() + chrono::Duration::days(1)).await.unwrap(), 1);
    }
}
