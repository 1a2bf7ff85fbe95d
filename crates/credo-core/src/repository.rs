//! Repository trait definitions for data access abstraction.
//!
//! All repository operations are async. Implementations may be backed by
//! any store reachable by primary key and simple predicate queries; the
//! auth layer depends only on these traits.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::CoreResult;
use crate::models::{
    audit::{AuditEvent, CreateAuditEvent},
    login_attempt::{CreateLoginAttempt, LoginAttempt},
    session::{CreateSession, Session},
    user::{CreateUser, UpdateUser, User},
};

/// Pagination parameters for list queries.
#[derive(Debug, Clone)]
pub struct Pagination {
    pub offset: u64,
    pub limit: u64,
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            offset: 0,
            limit: 50,
        }
    }
}

/// A paginated result set.
#[derive(Debug, Clone)]
pub struct PaginatedResult<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub offset: u64,
    pub limit: u64,
}

// ---------------------------------------------------------------------------
// Credential records
// ---------------------------------------------------------------------------

pub trait UserRepository: Send + Sync {
    fn create(&self, input: CreateUser) -> impl Future<Output = CoreResult<User>> + Send;
    fn get_by_id(&self, id: Uuid) -> impl Future<Output = CoreResult<User>> + Send;
    /// Lookup by case-normalized email.
    fn get_by_email(&self, email: &str) -> impl Future<Output = CoreResult<User>> + Send;
    fn get_by_reset_token(&self, token: &str) -> impl Future<Output = CoreResult<User>> + Send;
    fn update(
        &self,
        id: Uuid,
        input: UpdateUser,
    ) -> impl Future<Output = CoreResult<User>> + Send;
    /// Replace the stored refresh-token hash only if it still equals
    /// `expected`. Fails with [`crate::CoreError::Conflict`] when a
    /// concurrent rotation won the race — exactly one of two concurrent
    /// refresh calls may succeed.
    fn compare_and_swap_refresh_token(
        &self,
        id: Uuid,
        expected: &str,
        new_hash: &str,
        new_expires_at: DateTime<Utc>,
    ) -> impl Future<Output = CoreResult<()>> + Send;
    fn list(
        &self,
        pagination: Pagination,
    ) -> impl Future<Output = CoreResult<PaginatedResult<User>>> + Send;
}

// ---------------------------------------------------------------------------
// Sessions
// ---------------------------------------------------------------------------

pub trait SessionRepository: Send + Sync {
    fn create(&self, input: CreateSession) -> impl Future<Output = CoreResult<Session>> + Send;
    fn get_by_token(&self, session_token: &str)
    -> impl Future<Output = CoreResult<Session>> + Send;
    /// Advance the rolling activity clock. `last_activity_at` only moves
    /// forward; a stale timestamp is ignored (last-write-wins).
    fn touch(
        &self,
        session_token: &str,
        at: DateTime<Utc>,
    ) -> impl Future<Output = CoreResult<()>> + Send;
    /// Bind the session to a new refresh-token lineage after rotation.
    fn rebind_refresh(
        &self,
        session_token: &str,
        refresh_token_hash: &str,
    ) -> impl Future<Output = CoreResult<()>> + Send;
    /// Soft-delete: sets `is_active = false`. Idempotent.
    fn revoke(&self, session_token: &str) -> impl Future<Output = CoreResult<()>> + Send;
    /// Revoke every session owned by `user_id`, optionally sparing one.
    fn revoke_for_user(
        &self,
        user_id: Uuid,
        except_token: Option<&str>,
    ) -> impl Future<Output = CoreResult<()>> + Send;
    fn list_for_user(
        &self,
        user_id: Uuid,
    ) -> impl Future<Output = CoreResult<Vec<Session>>> + Send;
    /// Garbage-collect sessions past absolute expiry; returns the count
    /// removed.
    fn delete_expired(&self, now: DateTime<Utc>)
    -> impl Future<Output = CoreResult<u64>> + Send;
}

// ---------------------------------------------------------------------------
// Audit sink (append-only) and login attempts
// ---------------------------------------------------------------------------

/// Query filters for the read-only audit surface.
#[derive(Debug, Clone, Default)]
pub struct AuditFilter {
    pub category: Option<crate::models::audit::AuditCategory>,
    pub action: Option<String>,
    pub actor_id: Option<Uuid>,
    pub success: Option<bool>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
}

pub trait AuditEventRepository: Send + Sync {
    /// Append a new audit event. No update or delete operations exist.
    fn append(
        &self,
        input: CreateAuditEvent,
    ) -> impl Future<Output = CoreResult<AuditEvent>> + Send;
    fn list(
        &self,
        filter: AuditFilter,
        pagination: Pagination,
    ) -> impl Future<Output = CoreResult<PaginatedResult<AuditEvent>>> + Send;
}

pub trait LoginAttemptRepository: Send + Sync {
    fn append(
        &self,
        input: CreateLoginAttempt,
    ) -> impl Future<Output = CoreResult<LoginAttempt>> + Send;
    fn list_for_email(
        &self,
        email: &str,
        pagination: Pagination,
    ) -> impl Future<Output = CoreResult<PaginatedResult<LoginAttempt>>> + Send;
    /// Time-bounded retention; returns the count removed.
    fn delete_older_than(
        &self,
        cutoff: DateTime<Utc>,
    ) -> impl Future<Output = CoreResult<u64>> + Send;
}

// ---------------------------------------------------------------------------
// IP blocklist
// ---------------------------------------------------------------------------

/// Shared block list consulted at the head of the login flow. Kept behind
/// a trait so a process-local map can later be swapped for a distributed
/// cache without touching call sites.
pub trait BlocklistStore: Send + Sync {
    fn block(
        &self,
        ip: &str,
        until: DateTime<Utc>,
    ) -> impl Future<Output = CoreResult<()>> + Send;
    fn is_blocked(
        &self,
        ip: &str,
        now: DateTime<Utc>,
    ) -> impl Future<Output = CoreResult<bool>> + Send;
    fn unblock(&self, ip: &str) -> impl Future<Output = CoreResult<()>> + Send;
}
