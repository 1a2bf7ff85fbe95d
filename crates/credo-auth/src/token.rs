//! Signed token issuance/verification and random credential material.
//!
//! Access and refresh tokens are HS256 JWTs signed with separate
//! secrets; both carry issuer and audience claims that are validated on
//! every decode. Refresh tokens are never stored raw — only a SHA-256
//! hash lives on the credential record.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::Utc;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use rand::Rng;
use rand::distr::Alphanumeric;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::config::AuthConfig;
use crate::error::AuthError;

/// Claims embedded in every access token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessTokenClaims {
    /// Subject — user ID (UUID string).
    pub sub: String,
    pub email: String,
    pub role: String,
    pub iss: String,
    pub aud: String,
    pub iat: i64,
    pub exp: i64,
    /// Unique token ID.
    pub jti: String,
}

/// Claims embedded in every refresh token — subject only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshTokenClaims {
    pub sub: String,
    pub iss: String,
    pub aud: String,
    pub iat: i64,
    pub exp: i64,
    pub jti: String,
}

/// Claims for the short-lived MFA challenge token handed out between the
/// password check and code verification.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MfaChallengeClaims {
    pub sub: String,
    pub purpose: String,
    pub iss: String,
    pub aud: String,
    pub iat: i64,
    pub exp: i64,
    pub jti: String,
}

fn validation(config: &AuthConfig) -> Validation {
    let mut v = Validation::new(Algorithm::HS256);
    v.set_issuer(&[&config.jwt_issuer]);
    v.set_audience(&[&config.jwt_audience]);
    v.set_required_spec_claims(&["sub", "exp", "iat", "iss", "aud"]);
    v
}

fn map_decode_error(e: jsonwebtoken::errors::Error) -> AuthError {
    match e.kind() {
        jsonwebtoken::errors::ErrorKind::ExpiredSignature => AuthError::TokenExpired,
        _ => AuthError::TokenInvalid(e.to_string()),
    }
}

/// Issue a signed access token.
pub fn issue_access_token(
    user_id: Uuid,
    email: &str,
    role: &str,
    config: &AuthConfig,
) -> Result<String, AuthError> {
    let now = Utc::now().timestamp();
    let claims = AccessTokenClaims {
        sub: user_id.to_string(),
        email: email.to_string(),
        role: role.to_string(),
        iss: config.jwt_issuer.clone(),
        aud: config.jwt_audience.clone(),
        iat: now,
        exp: now + config.access_token_lifetime_secs as i64,
        jti: Uuid::new_v4().to_string(),
    };

    let key = EncodingKey::from_secret(config.access_token_secret.as_bytes());
    jsonwebtoken::encode(&Header::new(Algorithm::HS256), &claims, &key)
        .map_err(|e| AuthError::Crypto(format!("JWT encode: {e}")))
}

/// Decode and verify an access token.
///
/// Expired tokens fail with [`AuthError::TokenExpired`] (prompt a
/// refresh); anything else fails with [`AuthError::TokenInvalid`] (force
/// re-authentication).
pub fn decode_access_token(
    token: &str,
    config: &AuthConfig,
) -> Result<AccessTokenClaims, AuthError> {
    let key = DecodingKey::from_secret(config.access_token_secret.as_bytes());
    jsonwebtoken::decode::<AccessTokenClaims>(token, &key, &validation(config))
        .map(|data| data.claims)
        .map_err(map_decode_error)
}

/// Issue a signed refresh token.
pub fn issue_refresh_token(user_id: Uuid, config: &AuthConfig) -> Result<String, AuthError> {
    let now = Utc::now().timestamp();
    let claims = RefreshTokenClaims {
        sub: user_id.to_string(),
        iss: config.jwt_issuer.clone(),
        aud: config.jwt_audience.clone(),
        iat: now,
        exp: now + config.refresh_token_lifetime_secs as i64,
        jti: Uuid::new_v4().to_string(),
    };

    let key = EncodingKey::from_secret(config.refresh_token_secret.as_bytes());
    jsonwebtoken::encode(&Header::new(Algorithm::HS256), &claims, &key)
        .map_err(|e| AuthError::Crypto(format!("JWT encode: {e}")))
}

/// Decode and verify a refresh token.
pub fn decode_refresh_token(
    token: &str,
    config: &AuthConfig,
) -> Result<RefreshTokenClaims, AuthError> {
    let key = DecodingKey::from_secret(config.refresh_token_secret.as_bytes());
    jsonwebtoken::decode::<RefreshTokenClaims>(token, &key, &validation(config))
        .map(|data| data.claims)
        .map_err(map_decode_error)
}

/// Issue an MFA challenge token, valid for
/// [`AuthConfig::mfa_challenge_lifetime_secs`].
pub fn issue_mfa_challenge(user_id: Uuid, config: &AuthConfig) -> Result<String, AuthError> {
    let now = Utc::now().timestamp();
    let claims = MfaChallengeClaims {
        sub: user_id.to_string(),
        purpose: "mfa".into(),
        iss: config.jwt_issuer.clone(),
        aud: config.jwt_audience.clone(),
        iat: now,
        exp: now + config.mfa_challenge_lifetime_secs as i64,
        jti: Uuid::new_v4().to_string(),
    };

    let key = EncodingKey::from_secret(config.access_token_secret.as_bytes());
    jsonwebtoken::encode(&Header::new(Algorithm::HS256), &claims, &key)
        .map_err(|e| AuthError::Crypto(format!("JWT encode: {e}")))
}

/// Decode and verify an MFA challenge token, including its purpose tag.
pub fn decode_mfa_challenge(
    token: &str,
    config: &AuthConfig,
) -> Result<MfaChallengeClaims, AuthError> {
    let key = DecodingKey::from_secret(config.access_token_secret.as_bytes());
    let claims = jsonwebtoken::decode::<MfaChallengeClaims>(token, &key, &validation(config))
        .map(|data| data.claims)
        .map_err(map_decode_error)?;

    if claims.purpose != "mfa" {
        return Err(AuthError::TokenInvalid("wrong token purpose".into()));
    }
    Ok(claims)
}

/// Generate a cryptographically random opaque session token
/// (32 bytes → base64url-encoded, no padding).
pub fn generate_session_token() -> String {
    let mut rng = rand::rng();
    let bytes: [u8; 32] = rng.random();
    URL_SAFE_NO_PAD.encode(bytes)
}

/// SHA-256 hash of a raw refresh token, hex-encoded.
///
/// This is the value stored on the credential record and the session.
pub fn hash_refresh_token(raw: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(raw.as_bytes());
    hex::encode(hasher.finalize())
}

/// Random token over letters and digits, from the thread-local CSPRNG.
pub fn random_token(length: usize) -> String {
    let mut rng = rand::rng();
    (0..length).map(|_| rng.sample(Alphanumeric) as char).collect()
}

/// Random numeric string, e.g. a 6-digit verification PIN.
pub fn random_otp(length: usize) -> String {
    let mut rng = rand::rng();
    (0..length)
        .map(|_| (b'0' + rng.random_range(0..10u8)) as char)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> AuthConfig {
        AuthConfig {
            access_token_secret: "access-secret-for-tests".into(),
            refresh_token_secret: "refresh-secret-for-tests".into(),
            jwt_issuer: "credo-test".into(),
            jwt_audience: "credo-test-clients".into(),
            ..AuthConfig::default()
        }
    }

    #[test]
    fn access_token_roundtrip() {
        let config = test_config();
        let user_id = Uuid::new_v4();
        let token = issue_access_token(user_id, "alice@example.com", "user", &config).unwrap();
        let claims = decode_access_token(&token, &config).unwrap();
        assert_eq!(claims.sub, user_id.to_string());
        assert_eq!(claims.email, "alice@example.com");
        assert_eq!(claims.role, "user");
        assert_eq!(claims.iss, "credo-test");
    }

    #[test]
    fn access_and_refresh_secrets_are_not_interchangeable() {
        let config = test_config();
        let user_id = Uuid::new_v4();
        let refresh = issue_refresh_token(user_id, &config).unwrap();
        let err = decode_access_token(&refresh, &config).unwrap_err();
        assert!(matches!(err, AuthError::TokenInvalid(_)));
    }

    #[test]
    fn tampered_token_is_invalid() {
        let config = test_config();
        let token = issue_access_token(Uuid::new_v4(), "a@b.c", "user", &config).unwrap();
        let tampered = format!("{token}x");
        assert!(matches!(
            decode_access_token(&tampered, &config),
            Err(AuthError::TokenInvalid(_))
        ));
    }

    #[test]
    fn wrong_issuer_rejected() {
        let config = test_config();
        let mut other = test_config();
        other.jwt_issuer = "someone-else".into();
        let token = issue_access_token(Uuid::new_v4(), "a@b.c", "user", &other).unwrap();
        assert!(matches!(
            decode_access_token(&token, &config),
            Err(AuthError::TokenInvalid(_))
        ));
    }

    #[test]
    fn mfa_challenge_purpose_is_checked() {
        let config = test_config();
        let challenge = issue_mfa_challenge(Uuid::new_v4(), &config).unwrap();
        assert!(decode_mfa_challenge(&challenge, &config).is_ok());

        // An access token is not a challenge token.
        let access = issue_access_token(Uuid::new_v4(), "a@b.c", "user", &config).unwrap();
        assert!(decode_mfa_challenge(&access, &config).is_err());
    }

    #[test]
    fn session_token_is_url_safe() {
        let token = generate_session_token();
        assert_eq!(token.len(), 43);
        assert!(
            token
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        );
    }

    #[test]
    fn refresh_hash_is_deterministic() {
        assert_eq!(hash_refresh_token("tok"), hash_refresh_token("tok"));
        assert_ne!(hash_refresh_token("tok-a"), hash_refresh_token("tok-b"));
    }

    #[test]
    fn otp_is_numeric() {
        let otp = random_otp(6);
        assert_eq!(otp.len(), 6);
        assert!(otp.chars().all(|c| c.is_ascii_digit()));
    }

    #[test]
    fn random_token_alphabet() {
        let tok = random_token(32);
        assert_eq!(tok.len(), 32);
        assert!(tok.chars().all(|c| c.is_ascii_alphanumeric()));
    }
}
