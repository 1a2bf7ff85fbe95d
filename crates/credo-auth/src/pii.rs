//! PII encryption boundary.
//!
//! [`EncryptedUserRepository`] wraps any [`UserRepository`] and makes the
//! encrypt-on-write / decrypt-on-read contract explicit at the repository
//! seam, instead of hiding it in storage-lifecycle hooks. A value that no
//! longer decrypts (historical key mismatch, corruption) degrades to
//! `None` on read — PII display is best-effort, availability is not.

use chrono::{DateTime, Utc};
use credo_core::error::CoreResult;
use credo_core::models::user::{CreateUser, UpdateUser, User};
use credo_core::repository::{PaginatedResult, Pagination, UserRepository};
use tracing::warn;
use uuid::Uuid;

use crate::fields;

#[derive(Clone)]
pub struct EncryptedUserRepository<R: UserRepository> {
    inner: R,
    /// Master secret for envelope encryption. `None` disables the
    /// boundary and passes values through untouched.
    master: Option<String>,
}

impl<R: UserRepository> EncryptedUserRepository<R> {
    pub fn new(inner: R, master: Option<String>) -> Self {
        Self { inner, master }
    }

    fn seal(&self, value: Option<String>) -> CoreResult<Option<String>> {
        match (&self.master, value) {
            (Some(master), Some(plain)) => {
                let envelope = fields::encrypt_field(master, &plain)?;
                Ok(Some(envelope))
            }
            (_, value) => Ok(value),
        }
    }

    fn open(&self, user: &mut User) {
        let Some(master) = &self.master else { return };
        if let Some(envelope) = user.phone.take() {
            match fields::decrypt_field(master, &envelope) {
                Ok(plain) => user.phone = Some(plain),
                Err(e) => {
                    warn!(user_id = %user.id, error = %e, "phone field failed to decrypt; degrading to null");
                    user.phone = None;
                }
            }
        }
    }
}

impl<R: UserRepository> UserRepository for EncryptedUserRepository<R> {
    async fn create(&self, mut input: CreateUser) -> CoreResult<User> {
        input.phone = self.seal(input.phone)?;
        let mut user = self.inner.create(input).await?;
        self.open(&mut user);
        Ok(user)
    }

    async fn get_by_id(&self, id: Uuid) -> CoreResult<User> {
        let mut user = self.inner.get_by_id(id).await?;
        self.open(&mut user);
        Ok(user)
    }

    async fn get_by_email(&self, email: &str) -> CoreResult<User> {
        let mut user = self.inner.get_by_email(email).await?;
        self.open(&mut user);
        Ok(user)
    }

    async fn get_by_reset_token(&self, token: &str) -> CoreResult<User> {
        let mut user = self.inner.get_by_reset_token(token).await?;
        self.open(&mut user);
        Ok(user)
    }

    async fn update(&self, id: Uuid, mut input: UpdateUser) -> CoreResult<User> {
        if let Some(phone) = input.phone.take() {
            input.phone = Some(self.seal(phone)?);
        }
        let mut user = self.inner.update(id, input).await?;
        self.open(&mut user);
        Ok(user)
    }

    async fn compare_and_swap_refresh_token(
        &self,
        id: Uuid,
        expected: &str,
        new_hash: &str,
        new_expires_at: DateTime<Utc>,
    ) -> CoreResult<()> {
        self.inner
            .compare_and_swap_refresh_token(id, expected, new_hash, new_expires_at)
            .await
    }

    async fn list(&self, pagination: Pagination) -> CoreResult<PaginatedResult<User>> {
        let mut page = self.inner.list(pagination).await?;
        for user in &mut page.items {
            self.open(user);
        }
        Ok(page)
    }
}
