//! Session domain model — one row per login device/browser pairing.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Coarse device classification derived from the user-agent string.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum DeviceClass {
    Desktop,
    Mobile,
    Tablet,
    Bot,
    Unknown,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: Uuid,
    pub user_id: Uuid,
    /// Opaque high-entropy token identifying this session.
    pub session_token: String,
    /// SHA-256 hash of the refresh token bound to this session.
    #[serde(skip_serializing, default)]
    pub refresh_token_hash: String,
    pub ip_address: Option<String>,
    /// Raw user-agent header as presented.
    pub user_agent: Option<String>,
    pub browser: Option<String>,
    pub os: Option<String>,
    pub device_class: DeviceClass,
    /// Absolute expiry — the session never authenticates past this,
    /// regardless of activity.
    pub expires_at: DateTime<Utc>,
    /// Rolling activity clock; only ever moves forward.
    pub last_activity_at: DateTime<Utc>,
    pub is_active: bool,
    pub is_trusted: bool,
    pub flagged_suspicious: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct CreateSession {
    pub user_id: Uuid,
    pub session_token: String,
    pub refresh_token_hash: String,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub browser: Option<String>,
    pub os: Option<String>,
    pub device_class: DeviceClass,
    pub expires_at: DateTime<Utc>,
}
