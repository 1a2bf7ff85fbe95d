//! Authentication error types.

use credo_core::error::CoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AuthError {
    /// Deliberately covers both unknown identity and wrong password —
    /// callers must not be able to tell which (enumeration resistance).
    #[error("invalid credentials")]
    InvalidCredentials,

    #[error("account is locked")]
    AccountLocked,

    #[error("account is suspended")]
    AccountSuspended,

    #[error("email address is not verified")]
    EmailNotVerified,

    #[error("MFA code required")]
    MfaRequired,

    #[error("invalid MFA code")]
    MfaInvalidCode,

    #[error("MFA is not enrolled for this user")]
    MfaNotEnrolled,

    #[error("verification PIN is invalid or expired")]
    PinInvalid,

    #[error("password reset token is invalid or expired")]
    ResetTokenInvalid,

    #[error("token has expired")]
    TokenExpired,

    #[error("invalid token: {0}")]
    TokenInvalid(String),

    #[error("session expired due to inactivity")]
    SessionIdleTimeout,

    #[error("session is invalid or revoked")]
    SessionInvalid,

    #[error("password has expired")]
    PasswordExpired,

    #[error("password does not meet policy: {0}")]
    PasswordPolicy(String),

    #[error("password was used recently and cannot be reused")]
    PasswordReuse,

    #[error("hashing failure: {0}")]
    Hashing(String),

    #[error("malformed password hash: {0}")]
    InvalidHashFormat(String),

    #[error("encryption failure: {0}")]
    Encryption(String),

    #[error("decryption failure: {0}")]
    Decryption(String),

    #[error("cryptography error: {0}")]
    Crypto(String),
}

impl From<AuthError> for CoreError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::InvalidCredentials
            | AuthError::AccountLocked
            | AuthError::AccountSuspended
            | AuthError::EmailNotVerified
            | AuthError::MfaRequired
            | AuthError::MfaInvalidCode
            | AuthError::MfaNotEnrolled
            | AuthError::PinInvalid
            | AuthError::ResetTokenInvalid
            | AuthError::TokenExpired
            | AuthError::TokenInvalid(_)
            | AuthError::SessionIdleTimeout
            | AuthError::SessionInvalid
            | AuthError::PasswordExpired => CoreError::AuthenticationFailed {
                reason: err.to_string(),
            },
            AuthError::PasswordPolicy(_) | AuthError::PasswordReuse => CoreError::Validation {
                message: err.to_string(),
            },
            AuthError::Hashing(msg)
            | AuthError::InvalidHashFormat(msg)
            | AuthError::Encryption(msg)
            | AuthError::Decryption(msg)
            | AuthError::Crypto(msg) => CoreError::Crypto(msg),
        }
    }
}
