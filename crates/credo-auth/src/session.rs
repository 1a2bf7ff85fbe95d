//! Session management — creation, idle-timeout enforcement, revocation,
//! and refresh-lineage binding.

use chrono::{DateTime, Duration, Utc};
use credo_core::error::{CoreError, CoreResult};
use credo_core::models::session::{CreateSession, DeviceClass, Session};
use credo_core::repository::SessionRepository;
use uuid::Uuid;

use crate::error::AuthError;
use crate::token;

/// Best-effort device description parsed out of a user-agent header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceInfo {
    pub browser: Option<String>,
    pub os: Option<String>,
    pub device_class: DeviceClass,
}

/// Substring-match a user-agent into browser/OS/device class. Never
/// fails; an unrecognized agent simply comes back `Unknown`.
pub fn parse_user_agent(ua: &str) -> DeviceInfo {
    let lower = ua.to_ascii_lowercase();

    let browser = if lower.contains("edg/") || lower.contains("edge") {
        Some("Edge")
    } else if lower.contains("opr/") || lower.contains("opera") {
        Some("Opera")
    } else if lower.contains("chrome") {
        Some("Chrome")
    } else if lower.contains("firefox") {
        Some("Firefox")
    } else if lower.contains("safari") {
        Some("Safari")
    } else if lower.contains("curl") {
        Some("curl")
    } else {
        None
    };

    let os = if lower.contains("windows") {
        Some("Windows")
    } else if lower.contains("android") {
        Some("Android")
    } else if lower.contains("iphone") || lower.contains("ipad") || lower.contains("ios") {
        Some("iOS")
    } else if lower.contains("mac os") || lower.contains("macintosh") {
        Some("macOS")
    } else if lower.contains("linux") {
        Some("Linux")
    } else {
        None
    };

    let device_class = if lower.contains("bot") || lower.contains("spider") || lower.contains("crawl")
    {
        DeviceClass::Bot
    } else if lower.contains("ipad") || lower.contains("tablet") {
        DeviceClass::Tablet
    } else if lower.contains("mobi") || lower.contains("iphone") || lower.contains("android") {
        DeviceClass::Mobile
    } else if browser.is_some() || os.is_some() {
        DeviceClass::Desktop
    } else {
        DeviceClass::Unknown
    };

    DeviceInfo {
        browser: browser.map(String::from),
        os: os.map(String::from),
        device_class,
    }
}

/// Session lifecycle policy.
#[derive(Debug, Clone, Copy)]
pub struct SessionPolicy {
    pub idle_timeout_secs: u64,
    pub absolute_lifetime_secs: u64,
}

/// Tracks one durable session per login and enforces idle timeout.
pub struct SessionManager<S: SessionRepository> {
    repo: S,
    policy: SessionPolicy,
}

impl<S: SessionRepository> SessionManager<S> {
    pub fn new(repo: S, policy: SessionPolicy) -> Self {
        Self { repo, policy }
    }

    pub fn repo(&self) -> &S {
        &self.repo
    }

    /// Create a session for a fresh login. Generates the opaque session
    /// token and parses the user-agent on the way in.
    pub async fn create(
        &self,
        user_id: Uuid,
        refresh_token_hash: String,
        ip_address: Option<String>,
        user_agent: Option<String>,
    ) -> CoreResult<Session> {
        let device = user_agent
            .as_deref()
            .map(parse_user_agent)
            .unwrap_or(DeviceInfo {
                browser: None,
                os: None,
                device_class: DeviceClass::Unknown,
            });

        self.repo
            .create(CreateSession {
                user_id,
                session_token: token::generate_session_token(),
                refresh_token_hash,
                ip_address,
                user_agent,
                browser: device.browser,
                os: device.os,
                device_class: device.device_class,
                expires_at: Utc::now()
                    + Duration::seconds(self.policy.absolute_lifetime_secs as i64),
            })
            .await
    }

    /// Check a session on an authenticated request, strictly before any
    /// authorization decision.
    ///
    /// Past the idle window the session is deactivated and the caller
    /// gets [`AuthError::SessionIdleTimeout`] — a distinguishable code so
    /// clients know to clear credentials. Otherwise the activity clock
    /// advances.
    pub async fn touch(&self, session_token: &str, now: DateTime<Utc>) -> CoreResult<Session> {
        let session = self.get_active(session_token, now).await?;

        let idle = now - session.last_activity_at;
        if idle > Duration::seconds(self.policy.idle_timeout_secs as i64) {
            self.repo.revoke(session_token).await?;
            return Err(AuthError::SessionIdleTimeout.into());
        }

        self.repo.touch(session_token, now).await?;
        Ok(session)
    }

    /// Session must be active and unexpired, and the presented refresh
    /// token must hash-match the stored value — a stolen access token
    /// alone cannot extend a session past rotation.
    pub async fn verify(
        &self,
        session_token: &str,
        presented_refresh_token: &str,
        now: DateTime<Utc>,
    ) -> CoreResult<Session> {
        let session = self.get_active(session_token, now).await?;
        if token::hash_refresh_token(presented_refresh_token) != session.refresh_token_hash {
            return Err(AuthError::SessionInvalid.into());
        }
        Ok(session)
    }

    /// Re-point a session at a rotated refresh token.
    pub async fn rebind_refresh(
        &self,
        session_token: &str,
        refresh_token_hash: &str,
    ) -> CoreResult<()> {
        self.repo
            .rebind_refresh(session_token, refresh_token_hash)
            .await
    }

    /// Idempotent soft revocation.
    pub async fn revoke(&self, session_token: &str) -> CoreResult<()> {
        self.repo.revoke(session_token).await
    }

    /// Revoke every session for a user, optionally sparing the current
    /// one (e.g. on password change).
    pub async fn revoke_all(&self, user_id: Uuid, except_token: Option<&str>) -> CoreResult<()> {
        self.repo.revoke_for_user(user_id, except_token).await
    }

    async fn get_active(&self, session_token: &str, now: DateTime<Utc>) -> CoreResult<Session> {
        let session = self.repo.get_by_token(session_token).await.map_err(|e| {
            match e {
                CoreError::NotFound { .. } => AuthError::SessionInvalid.into(),
                other => other,
            }
        })?;

        if !session.is_active {
            return Err(AuthError::SessionInvalid.into());
        }
        if session.expires_at <= now {
            self.repo.revoke(session_token).await?;
            return Err(AuthError::SessionInvalid.into());
        }
        Ok(session)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_desktop_chrome() {
        let info = parse_user_agent(
            "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
             (KHTML, like Gecko) Chrome/120.0 Safari/537.36",
        );
        assert_eq!(info.browser.as_deref(), Some("Chrome"));
        assert_eq!(info.os.as_deref(), Some("Windows"));
        assert_eq!(info.device_class, DeviceClass::Desktop);
    }

    #[test]
    fn parses_mobile_safari() {
        let info = parse_user_agent(
            "Mozilla/5.0 (iPhone; CPU iPhone OS 17_0 like Mac OS X) \
             AppleWebKit/605.1.15 Version/17.0 Mobile/15E148 Safari/604.1",
        );
        assert_eq!(info.browser.as_deref(), Some("Safari"));
        assert_eq!(info.os.as_deref(), Some("iOS"));
        assert_eq!(info.device_class, DeviceClass::Mobile);
    }

    #[test]
    fn unknown_agent_never_fails() {
        let info = parse_user_agent("???");
        assert_eq!(info.browser, None);
        assert_eq!(info.os, None);
        assert_eq!(info.device_class, DeviceClass::Unknown);
    }

    #[test]
    fn bots_are_classified() {
        let info = parse_user_agent("Googlebot/2.1 (+http://www.google.com/bot.html)");
        assert_eq!(info.device_class, DeviceClass::Bot);
    }
}
