//! Credential record — the durable per-identity user model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Maximum number of retired password hashes kept per user, most recent
/// first. The oldest entry is evicted on overflow.
pub const PASSWORD_HISTORY_CAP: usize = 5;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Admin => "admin",
        }
    }

    pub fn parse(s: &str) -> Option<Role> {
        match s {
            "user" => Some(Role::User),
            "admin" => Some(Role::Admin),
            _ => None,
        }
    }
}

/// Where the identity originates — first-party credentials or the single
/// supported federated provider.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum IdentityProvider {
    Local,
    Google,
}

/// One credential record per identity.
///
/// Secret-bearing fields are excluded from serialized output; they exist
/// only for the store and the auth layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    /// Globally unique, always stored lowercase.
    pub email: String,
    /// `None` for federated-only accounts.
    #[serde(skip_serializing, default)]
    pub password_hash: Option<String>,
    pub first_name: String,
    pub last_name: String,
    /// Phone number. Held as an encryption envelope at rest; the PII
    /// boundary decrypts it on read.
    pub phone: Option<String>,
    pub role: Role,
    pub email_verified: bool,
    #[serde(skip_serializing, default)]
    pub verification_pin: Option<String>,
    pub verification_pin_expires_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing, default)]
    pub password_reset_token: Option<String>,
    pub password_reset_expires_at: Option<DateTime<Utc>>,
    pub totp_enabled: bool,
    pub totp_verified: bool,
    /// AES-256-GCM encrypted TOTP secret (if MFA is enrolled).
    #[serde(skip_serializing, default)]
    pub totp_secret: Option<String>,
    /// Last accepted TOTP time-step, for same-window replay rejection.
    pub totp_last_used_step: Option<u64>,
    /// SHA-256 hashes of unredeemed backup codes.
    #[serde(skip_serializing, default)]
    pub backup_codes: Vec<String>,
    pub provider: IdentityProvider,
    pub provider_subject: Option<String>,
    pub failed_login_attempts: u32,
    pub locked_until: Option<DateTime<Utc>>,
    pub last_login_at: Option<DateTime<Utc>>,
    pub password_changed_at: Option<DateTime<Utc>>,
    pub password_expires_at: Option<DateTime<Utc>>,
    /// Retired password hashes, most recent first, capped at
    /// [`PASSWORD_HISTORY_CAP`].
    #[serde(skip_serializing, default)]
    pub password_history: Vec<String>,
    /// SHA-256 hash of the currently valid refresh token.
    #[serde(skip_serializing, default)]
    pub refresh_token_hash: Option<String>,
    pub refresh_token_expires_at: Option<DateTime<Utc>>,
    pub is_active: bool,
    pub is_suspended: bool,
    pub suspension_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateUser {
    /// Normalized to lowercase before storage.
    pub email: String,
    /// Already-hashed password; `None` for federated accounts.
    pub password_hash: Option<String>,
    pub first_name: String,
    pub last_name: String,
    /// Phone number; the PII boundary encrypts it before it reaches the
    /// store.
    pub phone: Option<String>,
    pub role: Role,
    pub provider: IdentityProvider,
    pub provider_subject: Option<String>,
    pub email_verified: bool,
    pub verification_pin: Option<String>,
    pub verification_pin_expires_at: Option<DateTime<Utc>>,
}

/// Partial update for a credential record.
///
/// `Some(Some(val))` = set, `Some(None)` = clear, `None` = no change.
#[derive(Debug, Clone, Default)]
pub struct UpdateUser {
    pub password_hash: Option<Option<String>>,
    pub phone: Option<Option<String>>,
    pub role: Option<Role>,
    pub email_verified: Option<bool>,
    pub verification_pin: Option<Option<String>>,
    pub verification_pin_expires_at: Option<Option<DateTime<Utc>>>,
    pub password_reset_token: Option<Option<String>>,
    pub password_reset_expires_at: Option<Option<DateTime<Utc>>>,
    pub totp_enabled: Option<bool>,
    pub totp_verified: Option<bool>,
    pub totp_secret: Option<Option<String>>,
    pub totp_last_used_step: Option<Option<u64>>,
    pub backup_codes: Option<Vec<String>>,
    pub failed_login_attempts: Option<u32>,
    pub locked_until: Option<Option<DateTime<Utc>>>,
    pub last_login_at: Option<Option<DateTime<Utc>>>,
    pub password_changed_at: Option<Option<DateTime<Utc>>>,
    pub password_expires_at: Option<Option<DateTime<Utc>>>,
    pub password_history: Option<Vec<String>>,
    pub refresh_token_hash: Option<Option<String>>,
    pub refresh_token_expires_at: Option<Option<DateTime<Utc>>>,
    pub is_active: Option<bool>,
    pub is_suspended: Option<bool>,
    pub suspension_reason: Option<Option<String>>,
}
