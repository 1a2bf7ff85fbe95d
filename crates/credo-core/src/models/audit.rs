//! Audit event domain model — append-only record of security-relevant
//! decisions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Closed set of audit categories. The auth core emits `Auth`, `User`,
/// and `Security`; the remaining categories belong to collaborating
/// subsystems writing into the same sink.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum AuditCategory {
    Auth,
    User,
    Admin,
    Security,
    Payment,
    Product,
    Order,
    Profile,
    Cart,
    Favorite,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum AuditSeverity {
    Info,
    Warning,
    Error,
    Critical,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEvent {
    pub id: Uuid,
    pub category: AuditCategory,
    pub action: String,
    pub severity: AuditSeverity,
    pub actor_id: Option<Uuid>,
    pub actor_email: Option<String>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub method: Option<String>,
    pub path: Option<String>,
    pub success: bool,
    pub error_message: Option<String>,
    /// Free-form structured payload.
    pub detail: serde_json::Value,
    pub target_type: Option<String>,
    pub target_id: Option<String>,
    pub session_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct CreateAuditEvent {
    pub category: AuditCategory,
    pub action: String,
    pub severity: AuditSeverity,
    pub actor_id: Option<Uuid>,
    pub actor_email: Option<String>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub method: Option<String>,
    pub path: Option<String>,
    pub success: bool,
    pub error_message: Option<String>,
    pub detail: serde_json::Value,
    pub target_type: Option<String>,
    pub target_id: Option<String>,
    pub session_id: Option<Uuid>,
}

impl CreateAuditEvent {
    /// A minimal event skeleton; callers fill in request metadata.
    pub fn new(category: AuditCategory, action: impl Into<String>, success: bool) -> Self {
        Self {
            category,
            action: action.into(),
            severity: if success {
                AuditSeverity::Info
            } else {
                AuditSeverity::Warning
            },
            actor_id: None,
            actor_email: None,
            ip_address: None,
            user_agent: None,
            method: None,
            path: None,
            success,
            error_message: None,
            detail: serde_json::Value::Null,
            target_type: None,
            target_id: None,
            session_id: None,
        }
    }
}
