//! Authentication configuration.

/// All policy knobs for the authentication core.
///
/// Idle timeout and refresh lifetime are independent policy values — the
/// former governs the rolling activity window, the latter the absolute
/// lifetime of a refresh lineage.
#[derive(Debug, Clone)]
pub struct AuthConfig {
    /// HMAC secret for signing access tokens.
    pub access_token_secret: String,
    /// Separate HMAC secret for signing refresh tokens.
    pub refresh_token_secret: String,
    /// JWT issuer (`iss` claim), validated on every decode.
    pub jwt_issuer: String,
    /// JWT audience (`aud` claim), validated on every decode.
    pub jwt_audience: String,
    /// Access token lifetime in seconds (default: 900 = 15 minutes).
    pub access_token_lifetime_secs: u64,
    /// Refresh token lifetime in seconds (default: 604_800 = 7 days).
    pub refresh_token_lifetime_secs: u64,
    /// Idle window after which a session is force-expired
    /// (default: 900 = 15 minutes).
    pub session_idle_timeout_secs: u64,
    /// Absolute session lifetime (default: 604_800 = 7 days).
    pub session_absolute_lifetime_secs: u64,
    /// Optional pepper prepended to passwords before Argon2id hashing.
    pub pepper: Option<String>,
    /// Minimum password length for policy enforcement.
    pub min_password_length: usize,
    /// Master secret for deriving per-call field-encryption keys.
    /// `None` disables PII encryption and MFA secret storage.
    pub field_encryption_secret: Option<String>,
    /// Issuer name shown in authenticator apps.
    pub totp_issuer: String,
    /// MFA challenge token lifetime in seconds (default: 300 = 5 minutes).
    pub mfa_challenge_lifetime_secs: u64,
    /// Number of backup codes issued at MFA enrollment.
    pub backup_code_count: usize,
    /// Max consecutive failed login attempts before lockout (default: 5).
    pub max_failed_login_attempts: u32,
    /// Lockout duration in seconds; policy range is 5–30 minutes
    /// (default: 900 = 15 min).
    pub lockout_duration_secs: u64,
    /// Email-verification PIN lifetime (default: 600 = 10 minutes).
    pub verification_pin_ttl_secs: u64,
    /// Password-reset token lifetime (default: 3600 = 1 hour).
    pub reset_token_ttl_secs: u64,
    /// Days until a password expires (default: 90).
    pub password_max_age_days: i64,
    /// Days before expiry at which the advisory warning starts
    /// (default: 7).
    pub password_expiry_warning_days: i64,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            access_token_secret: String::new(),
            refresh_token_secret: String::new(),
            jwt_issuer: "credo".into(),
            jwt_audience: "credo-clients".into(),
            access_token_lifetime_secs: 900,
            refresh_token_lifetime_secs: 604_800,
            session_idle_timeout_secs: 900,
            session_absolute_lifetime_secs: 604_800,
            pepper: None,
            min_password_length: 8,
            field_encryption_secret: None,
            totp_issuer: "Credo".into(),
            mfa_challenge_lifetime_secs: 300,
            backup_code_count: 10,
            max_failed_login_attempts: 5,
            lockout_duration_secs: 900,
            verification_pin_ttl_secs: 600,
            reset_token_ttl_secs: 3600,
            password_max_age_days: 90,
            password_expiry_warning_days: 7,
        }
    }
}
