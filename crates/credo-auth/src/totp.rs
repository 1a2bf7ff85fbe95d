//! TOTP enrollment/verification and single-use backup codes.

use rand::Rng;
use rand::distr::Alphanumeric;
use sha2::{Digest, Sha256};
use std::time::{SystemTime, UNIX_EPOCH};
use totp_rs::{Algorithm, Secret, TOTP};

use crate::error::AuthError;

const DIGITS: usize = 6;
const STEP_SECS: u64 = 30;
/// ±1 step of clock-drift tolerance.
const SKEW: u8 = 1;

fn build_totp(secret_bytes: Vec<u8>, issuer: &str, account: &str) -> Result<TOTP, AuthError> {
    TOTP::new(
        Algorithm::SHA1, // RFC 6238 default
        DIGITS,
        SKEW,
        STEP_SECS,
        secret_bytes,
        Some(issuer.to_string()),
        account.to_string(),
    )
    .map_err(|e| AuthError::Crypto(format!("TOTP init: {e}")))
}

/// Generate a TOTP enrollment: fresh 160-bit secret + otpauth URI.
///
/// Returns `(base32_secret, otpauth_uri)`. The secret is not trusted
/// until the caller confirms a live code against it.
pub fn generate_enrollment(issuer: &str, account: &str) -> Result<(String, String), AuthError> {
    let secret = Secret::generate_secret();
    let secret_bytes = secret
        .to_bytes()
        .map_err(|e| AuthError::Crypto(format!("secret bytes: {e}")))?;

    let totp = build_totp(secret_bytes, issuer, account)?;

    let base32 = secret.to_encoded().to_string();
    let uri = totp.get_url();

    Ok((base32, uri))
}

/// Verify a time-step code against a base32-encoded secret, with the
/// drift tolerance baked into the generator.
pub fn verify_code(
    base32_secret: &str,
    code: &str,
    issuer: &str,
    account: &str,
) -> Result<bool, AuthError> {
    let secret_bytes = Secret::Encoded(base32_secret.to_string())
        .to_bytes()
        .map_err(|e| AuthError::Crypto(format!("secret decode: {e}")))?;

    let totp = build_totp(secret_bytes, issuer, account)?;
    totp.check_current(code)
        .map_err(|e| AuthError::Crypto(format!("TOTP check: {e}")))
}

/// The current 30-second time-step. Recorded per identity after a
/// successful verification so an exact repeat inside the same window is
/// rejected even though the time check alone would pass.
pub fn current_step() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() / STEP_SECS)
        .unwrap_or(0)
}

/// Generate `count` human-formatted backup codes (`XXXX-XXXX`).
///
/// Callers return these to the user exactly once and store only the
/// hashes from [`hash_backup_code`].
pub fn generate_backup_codes(count: usize) -> Vec<String> {
    fn group(rng: &mut impl Rng) -> String {
        (0..4)
            .map(|_| (rng.sample(Alphanumeric) as char).to_ascii_uppercase())
            .collect()
    }

    let mut rng = rand::rng();
    (0..count)
        .map(|_| format!("{}-{}", group(&mut rng), group(&mut rng)))
        .collect()
}

/// Irreversible hash of a backup code, tolerant of case and the display
/// dash.
pub fn hash_backup_code(code: &str) -> String {
    let canonical: String = code
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .map(|c| c.to_ascii_uppercase())
        .collect();
    let mut hasher = Sha256::new();
    hasher.update(canonical.as_bytes());
    hex::encode(hasher.finalize())
}

/// Linear-scan the hashed set for a presented code. Returns the index of
/// the match so the caller can consume it — each code is single-use.
pub fn find_backup_code(code: &str, hashes: &[String]) -> Option<usize> {
    let presented = hash_backup_code(code);
    hashes.iter().position(|h| *h == presented)
}
