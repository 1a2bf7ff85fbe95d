//! In-memory session store, keyed by the opaque session token.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use chrono::{DateTime, Utc};
use credo_core::error::{CoreError, CoreResult};
use credo_core::models::session::{CreateSession, Session};
use credo_core::repository::SessionRepository;
use uuid::Uuid;

use super::{read_guard, write_guard};

#[derive(Clone, Default)]
pub struct MemorySessionRepository {
    inner: Arc<RwLock<HashMap<String, Session>>>,
}

impl MemorySessionRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Test hook: rewind a session's activity clock. The trait-level
    /// `touch` only ever moves the clock forward, so idle-timeout tests
    /// need a back door to age a session.
    pub fn set_last_activity(
        &self,
        session_token: &str,
        at: DateTime<Utc>,
    ) -> CoreResult<()> {
        let mut map = write_guard(&self.inner)?;
        let session = map
            .get_mut(session_token)
            .ok_or_else(|| not_found(session_token))?;
        session.last_activity_at = at;
        Ok(())
    }
}

fn not_found(token: &str) -> CoreError {
    CoreError::NotFound {
        entity: "session".into(),
        id: token.to_string(),
    }
}

impl SessionRepository for MemorySessionRepository {
    async fn create(&self, input: CreateSession) -> CoreResult<Session> {
        let now = Utc::now();
        let session = Session {
            id: Uuid::new_v4(),
            user_id: input.user_id,
            session_token: input.session_token.clone(),
            refresh_token_hash: input.refresh_token_hash,
            ip_address: input.ip_address,
            user_agent: input.user_agent,
            browser: input.browser,
            os: input.os,
            device_class: input.device_class,
            expires_at: input.expires_at,
            last_activity_at: now,
            is_active: true,
            is_trusted: false,
            flagged_suspicious: false,
            created_at: now,
        };
        let mut map = write_guard(&self.inner)?;
        map.insert(input.session_token, session.clone());
        Ok(session)
    }

    async fn get_by_token(&self, session_token: &str) -> CoreResult<Session> {
        let map = read_guard(&self.inner)?;
        map.get(session_token)
            .cloned()
            .ok_or_else(|| not_found(session_token))
    }

    async fn touch(&self, session_token: &str, at: DateTime<Utc>) -> CoreResult<()> {
        let mut map = write_guard(&self.inner)?;
        let session = map
            .get_mut(session_token)
            .ok_or_else(|| not_found(session_token))?;
        // Forward-only; a stale writer loses silently.
        if at > session.last_activity_at {
            session.last_activity_at = at;
        }
        Ok(())
    }

    async fn rebind_refresh(
        &self,
        session_token: &str,
        refresh_token_hash: &str,
    ) -> CoreResult<()> {
        let mut map = write_guard(&self.inner)?;
        let session = map
            .get_mut(session_token)
            .ok_or_else(|| not_found(session_token))?;
        session.refresh_token_hash = refresh_token_hash.to_string();
        Ok(())
    }

    async fn revoke(&self, session_token: &str) -> CoreResult<()> {
        let mut map = write_guard(&self.inner)?;
        if let Some(session) = map.get_mut(session_token) {
            session.is_active = false;
        }
        Ok(())
    }

    async fn revoke_for_user(
        &self,
        user_id: Uuid,
        except_token: Option<&str>,
    ) -> CoreResult<()> {
        let mut map = write_guard(&self.inner)?;
        for session in map.values_mut() {
            if session.user_id == user_id && Some(session.session_token.as_str()) != except_token
            {
                session.is_active = false;
            }
        }
        Ok(())
    }

    async fn list_for_user(&self, user_id: Uuid) -> CoreResult<Vec<Session>> {
        let map = read_guard(&self.inner)?;
        let mut sessions: Vec<Session> = map
            .values()
            .filter(|s| s.user_id == user_id)
            .cloned()
            .collect();
        sessions.sort_by_key(|s| s.created_at);
        Ok(sessions)
    }

    async fn delete_expired(&self, now: DateTime<Utc>) -> CoreResult<u64> {
        let mut map = write_guard(&self.inner)?;
        let before = map.len();
        map.retain(|_, s| s.expires_at > now);
        Ok((before - map.len()) as u64)
    }
}
