//! Request guard surface exposed to transport collaborators:
//! authentication of incoming requests, role authorization, CSRF token
//! handling, and the password-expiry gate.

use chrono::{DateTime, Duration, Utc};
use credo_core::error::{CoreError, CoreResult};
use credo_core::models::user::{Role, User};
use credo_core::repository::SessionRepository;
use subtle::ConstantTimeEq;
use uuid::Uuid;

use crate::config::AuthConfig;
use crate::error::AuthError;
use crate::session::SessionManager;
use crate::token;

/// Proof of a verified access token plus a live, idle-checked session.
#[derive(Debug, Clone)]
pub struct AuthenticatedIdentity {
    pub user_id: Uuid,
    pub email: String,
    pub role: Role,
    pub session_id: Uuid,
}

/// Authenticate a request: verify the access token, then touch the
/// session so idle timeout is enforced strictly before any authorization
/// decision.
pub async fn authenticate<S: SessionRepository>(
    access_token: &str,
    session_token: &str,
    sessions: &SessionManager<S>,
    config: &AuthConfig,
    now: DateTime<Utc>,
) -> CoreResult<AuthenticatedIdentity> {
    let claims = token::decode_access_token(access_token, config).map_err(CoreError::from)?;
    let session = sessions.touch(session_token, now).await?;

    let user_id = Uuid::parse_str(&claims.sub)
        .map_err(|_| AuthError::TokenInvalid("malformed subject".into()))?;
    if session.user_id != user_id {
        return Err(AuthError::SessionInvalid.into());
    }

    let role = Role::parse(&claims.role)
        .ok_or_else(|| AuthError::TokenInvalid("unknown role claim".into()))?;

    Ok(AuthenticatedIdentity {
        user_id,
        email: claims.email,
        role,
        session_id: session.id,
    })
}

/// Like [`authenticate`] but tolerant: any failure yields `None` instead
/// of an error, for routes that merely personalize when a session exists.
pub async fn optional_authenticate<S: SessionRepository>(
    access_token: Option<&str>,
    session_token: Option<&str>,
    sessions: &SessionManager<S>,
    config: &AuthConfig,
    now: DateTime<Utc>,
) -> Option<AuthenticatedIdentity> {
    let (access, session) = (access_token?, session_token?);
    authenticate(access, session, sessions, config, now).await.ok()
}

/// Role check for an already-authenticated identity.
pub fn authorize(identity: &AuthenticatedIdentity, allowed: &[Role]) -> CoreResult<()> {
    if allowed.contains(&identity.role) {
        Ok(())
    } else {
        Err(CoreError::AuthorizationDenied {
            reason: format!("role {} is not permitted", identity.role.as_str()),
        })
    }
}

/// Mint the client-readable CSRF token mirrored in a request header.
pub fn issue_csrf_token() -> String {
    token::random_token(32)
}

/// Byte-for-byte, constant-time comparison of the CSRF cookie and header
/// values. Required on every state-changing request.
pub fn verify_csrf(cookie_value: &str, header_value: &str) -> bool {
    cookie_value.as_bytes().ct_eq(header_value.as_bytes()).into()
}

/// Outcome of the password-expiry side channel, checked on
/// already-authenticated requests (never inside the login flow itself).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PasswordGate {
    Ok,
    /// Non-blocking advisory attached when expiry is inside the warning
    /// window.
    Warning { days_remaining: i64 },
    /// Blocks everything except the password-change route.
    Expired,
}

/// Evaluate the password-expiry gate for an authenticated user.
pub fn password_gate(user: &User, now: DateTime<Utc>, config: &AuthConfig) -> PasswordGate {
    let Some(expires_at) = user.password_expires_at else {
        return PasswordGate::Ok;
    };
    if expires_at <= now {
        return PasswordGate::Expired;
    }
    let remaining = expires_at - now;
    if remaining <= Duration::days(config.password_expiry_warning_days) {
        PasswordGate::Warning {
            days_remaining: remaining.num_days(),
        }
    } else {
        PasswordGate::Ok
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn csrf_compare() {
        let tok = issue_csrf_token();
        assert!(verify_csrf(&tok, &tok));
        assert!(!verify_csrf(&tok, "different-token"));
        assert!(!verify_csrf(&tok, &tok[..tok.len() - 1]));
    }

    #[test]
    fn authorize_respects_roles() {
        let identity = AuthenticatedIdentity {
            user_id: Uuid::new_v4(),
            email: "a@b.c".into(),
            role: Role::User,
            session_id: Uuid::new_v4(),
        };
        assert!(authorize(&identity, &[Role::User, Role::Admin]).is_ok());
        assert!(matches!(
            authorize(&identity, &[Role::Admin]),
            Err(CoreError::AuthorizationDenied { .. })
        ));
    }
}
