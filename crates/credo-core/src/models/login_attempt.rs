//! Login attempt record — lightweight brute-force-analysis trail,
//! distinct from the audit sink.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FailureReason {
    InvalidCredentials,
    AccountLocked,
    AccountSuspended,
    EmailNotVerified,
    #[serde(rename = "invalid_2fa_code")]
    InvalidTwoFactorCode,
}

impl FailureReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureReason::InvalidCredentials => "invalid_credentials",
            FailureReason::AccountLocked => "account_locked",
            FailureReason::AccountSuspended => "account_suspended",
            FailureReason::EmailNotVerified => "email_not_verified",
            FailureReason::InvalidTwoFactorCode => "invalid_2fa_code",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginAttempt {
    pub id: Uuid,
    pub email: String,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub success: bool,
    pub failure_reason: Option<FailureReason>,
    /// Weak reference: present only when the identity exists.
    pub user_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct CreateLoginAttempt {
    pub email: String,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub success: bool,
    pub failure_reason: Option<FailureReason>,
    pub user_id: Option<Uuid>,
}
