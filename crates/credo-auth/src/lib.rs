//! Credo Auth — password hashing and strength policy, field-level
//! encryption, JWT issuance/rotation, session management with idle
//! timeout, TOTP MFA with backup codes, lockout policy, and the
//! authentication flow orchestrator.

pub mod audit;
pub mod config;
pub mod error;
pub mod fields;
pub mod guard;
pub mod lockout;
pub mod outbound;
pub mod password;
pub mod pii;
pub mod service;
pub mod session;
pub mod token;
pub mod totp;

pub use config::AuthConfig;
pub use error::AuthError;
pub use guard::{AuthenticatedIdentity, PasswordGate};
pub use service::{
    AuthService, LoginInput, LoginOutcome, MfaEnrollment, RegisterInput, SessionTokens,
};
