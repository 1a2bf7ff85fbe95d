//! In-memory credential-record store.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use chrono::{DateTime, Utc};
use credo_core::error::{CoreError, CoreResult};
use credo_core::models::user::{CreateUser, UpdateUser, User};
use credo_core::repository::{PaginatedResult, Pagination, UserRepository};
use uuid::Uuid;

use super::{paginate, read_guard, write_guard};

/// Map of user ID to record. Email uniqueness is enforced under the
/// write lock; compare-and-swap of the refresh hash happens inside a
/// single critical section.
#[derive(Clone, Default)]
pub struct MemoryUserRepository {
    inner: Arc<RwLock<HashMap<Uuid, User>>>,
}

impl MemoryUserRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

fn not_found(id: impl ToString) -> CoreError {
    CoreError::NotFound {
        entity: "user".into(),
        id: id.to_string(),
    }
}

fn apply(user: &mut User, input: UpdateUser, now: DateTime<Utc>) {
    if let Some(v) = input.password_hash {
        user.password_hash = v;
    }
    if let Some(v) = input.phone {
        user.phone = v;
    }
    if let Some(v) = input.role {
        user.role = v;
    }
    if let Some(v) = input.email_verified {
        user.email_verified = v;
    }
    if let Some(v) = input.verification_pin {
        user.verification_pin = v;
    }
    if let Some(v) = input.verification_pin_expires_at {
        user.verification_pin_expires_at = v;
    }
    if let Some(v) = input.password_reset_token {
        user.password_reset_token = v;
    }
    if let Some(v) = input.password_reset_expires_at {
        user.password_reset_expires_at = v;
    }
    if let Some(v) = input.totp_enabled {
        user.totp_enabled = v;
    }
    if let Some(v) = input.totp_verified {
        user.totp_verified = v;
    }
    if let Some(v) = input.totp_secret {
        user.totp_secret = v;
    }
    if let Some(v) = input.totp_last_used_step {
        user.totp_last_used_step = v;
    }
    if let Some(v) = input.backup_codes {
        user.backup_codes = v;
    }
    if let Some(v) = input.failed_login_attempts {
        user.failed_login_attempts = v;
    }
    if let Some(v) = input.locked_until {
        user.locked_until = v;
    }
    if let Some(v) = input.last_login_at {
        user.last_login_at = v;
    }
    if let Some(v) = input.password_changed_at {
        user.password_changed_at = v;
    }
    if let Some(v) = input.password_expires_at {
        user.password_expires_at = v;
    }
    if let Some(v) = input.password_history {
        user.password_history = v;
    }
    if let Some(v) = input.refresh_token_hash {
        user.refresh_token_hash = v;
    }
    if let Some(v) = input.refresh_token_expires_at {
        user.refresh_token_expires_at = v;
    }
    if let Some(v) = input.is_active {
        user.is_active = v;
    }
    if let Some(v) = input.is_suspended {
        user.is_suspended = v;
    }
    if let Some(v) = input.suspension_reason {
        user.suspension_reason = v;
    }
    user.updated_at = now;
}

impl UserRepository for MemoryUserRepository {
    async fn create(&self, input: CreateUser) -> CoreResult<User> {
        let mut map = write_guard(&self.inner)?;
        let email = input.email.trim().to_lowercase();
        if map.values().any(|u| u.email == email) {
            return Err(CoreError::AlreadyExists {
                entity: "user".into(),
            });
        }

        let now = Utc::now();
        let user = User {
            id: Uuid::new_v4(),
            email,
            password_hash: input.password_hash,
            first_name: input.first_name,
            last_name: input.last_name,
            phone: input.phone,
            role: input.role,
            email_verified: input.email_verified,
            verification_pin: input.verification_pin,
            verification_pin_expires_at: input.verification_pin_expires_at,
            password_reset_token: None,
            password_reset_expires_at: None,
            totp_enabled: false,
            totp_verified: false,
            totp_secret: None,
            totp_last_used_step: None,
            backup_codes: Vec::new(),
            provider: input.provider,
            provider_subject: input.provider_subject,
            failed_login_attempts: 0,
            locked_until: None,
            last_login_at: None,
            password_changed_at: Some(now),
            password_expires_at: None,
            password_history: Vec::new(),
            refresh_token_hash: None,
            refresh_token_expires_at: None,
            is_active: true,
            is_suspended: false,
            suspension_reason: None,
            created_at: now,
            updated_at: now,
        };
        map.insert(user.id, user.clone());
        Ok(user)
    }

    async fn get_by_id(&self, id: Uuid) -> CoreResult<User> {
        let map = read_guard(&self.inner)?;
        map.get(&id).cloned().ok_or_else(|| not_found(id))
    }

    async fn get_by_email(&self, email: &str) -> CoreResult<User> {
        let needle = email.trim().to_lowercase();
        let map = read_guard(&self.inner)?;
        map.values()
            .find(|u| u.email == needle)
            .cloned()
            .ok_or_else(|| not_found(email))
    }

    async fn get_by_reset_token(&self, token: &str) -> CoreResult<User> {
        let map = read_guard(&self.inner)?;
        map.values()
            .find(|u| u.password_reset_token.as_deref() == Some(token))
            .cloned()
            .ok_or_else(|| not_found("reset-token"))
    }

    async fn update(&self, id: Uuid, input: UpdateUser) -> CoreResult<User> {
        let mut map = write_guard(&self.inner)?;
        let user = map.get_mut(&id).ok_or_else(|| not_found(id))?;
        apply(user, input, Utc::now());
        Ok(user.clone())
    }

    async fn compare_and_swap_refresh_token(
        &self,
        id: Uuid,
        expected: &str,
        new_hash: &str,
        new_expires_at: DateTime<Utc>,
    ) -> CoreResult<()> {
        let mut map = write_guard(&self.inner)?;
        let user = map.get_mut(&id).ok_or_else(|| not_found(id))?;
        if user.refresh_token_hash.as_deref() != Some(expected) {
            return Err(CoreError::Conflict {
                message: "refresh token was rotated concurrently".into(),
            });
        }
        user.refresh_token_hash = Some(new_hash.to_string());
        user.refresh_token_expires_at = Some(new_expires_at);
        user.updated_at = Utc::now();
        Ok(())
    }

    async fn list(&self, pagination: Pagination) -> CoreResult<PaginatedResult<User>> {
        let map = read_guard(&self.inner)?;
        let mut users: Vec<User> = map.values().cloned().collect();
        users.sort_by_key(|u| u.created_at);
        Ok(paginate(&users, &pagination))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use credo_core::models::user::{IdentityProvider, Role};

    fn new_user(email: &str) -> CreateUser {
        CreateUser {
            email: email.into(),
            password_hash: Some("$argon2id$fake".into()),
            first_name: "Ada".into(),
            last_name: "Lovelace".into(),
            phone: None,
            role: Role::User,
            provider: IdentityProvider::Local,
            provider_subject: None,
            email_verified: true,
            verification_pin: None,
            verification_pin_expires_at: None,
        }
    }

    #[tokio::test]
    async fn email_is_normalized_and_unique() {
        let repo = MemoryUserRepository::new();
        let created = repo.create(new_user("Ada@Example.COM")).await.unwrap();
        assert_eq!(created.email, "ada@example.com");

        let err = repo.create(new_user("ada@example.com")).await.unwrap_err();
        assert!(matches!(err, CoreError::AlreadyExists { .. }));

        let found = repo.get_by_email("ADA@example.com").await.unwrap();
        assert_eq!(found.id, created.id);
    }

    #[tokio::test]
    async fn update_distinguishes_clear_from_no_change() {
        let repo = MemoryUserRepository::new();
        let user = repo.create(new_user("a@b.c")).await.unwrap();

        let updated = repo
            .update(
                user.id,
                UpdateUser {
                    locked_until: Some(Some(Utc::now())),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert!(updated.locked_until.is_some());

        // No-change leaves the lock in place; explicit clear removes it.
        let updated = repo.update(user.id, UpdateUser::default()).await.unwrap();
        assert!(updated.locked_until.is_some());
        let updated = repo
            .update(
                user.id,
                UpdateUser {
                    locked_until: Some(None),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert!(updated.locked_until.is_none());
    }

    #[tokio::test]
    async fn refresh_cas_rejects_stale_expectation() {
        let repo = MemoryUserRepository::new();
        let user = repo.create(new_user("a@b.c")).await.unwrap();
        repo.update(
            user.id,
            UpdateUser {
                refresh_token_hash: Some(Some("hash-1".into())),
                ..Default::default()
            },
        )
        .await
        .unwrap();

        repo.compare_and_swap_refresh_token(user.id, "hash-1", "hash-2", Utc::now())
            .await
            .unwrap();

        // The old lineage can no longer rotate.
        let err = repo
            .compare_and_swap_refresh_token(user.id, "hash-1", "hash-3", Utc::now())
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::Conflict { .. }));
    }
}
