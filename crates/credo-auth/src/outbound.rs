//! Outbound collaborator interfaces: email dispatch, CAPTCHA
//! verification, and the federated identity provider.
//!
//! All three are consumed behind traits; implementations live with the
//! embedding application. Network calls must carry bounded timeouts and
//! fail closed — a verifier timeout is a failure, never a pass.

use credo_core::error::CoreResult;

/// One outbound message. Delivery failure is logged, never fatal.
#[derive(Debug, Clone)]
pub struct Email {
    pub to: String,
    pub subject: String,
    pub html: String,
    pub text: String,
}

pub trait EmailSender: Send + Sync {
    /// Returns whether dispatch was accepted. Must not panic; transport
    /// errors come back as `Ok(false)` or `Err` and are treated alike.
    fn send(&self, email: Email) -> impl Future<Output = CoreResult<bool>> + Send;
}

/// Result of an external CAPTCHA verification.
#[derive(Debug, Clone, Copy)]
pub struct CaptchaOutcome {
    pub success: bool,
    pub score: f32,
}

pub trait CaptchaVerifier: Send + Sync {
    fn verify(&self, token: &str) -> impl Future<Output = CoreResult<CaptchaOutcome>> + Send;
}

/// Identity claims returned by the federated provider for an opaque
/// credential blob.
#[derive(Debug, Clone)]
pub struct FederatedIdentity {
    pub subject_id: String,
    pub email: String,
    pub email_verified: bool,
    pub given_name: Option<String>,
    pub family_name: Option<String>,
    pub picture_url: Option<String>,
}

pub trait FederatedVerifier: Send + Sync {
    fn verify(
        &self,
        credential: &str,
    ) -> impl Future<Output = CoreResult<FederatedIdentity>> + Send;
}
