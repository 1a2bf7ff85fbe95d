//! Password hashing, verification, and strength policy using Argon2id.
//!
//! OWASP-recommended parameters (memory: 19 MiB, iterations: 2,
//! parallelism: 1). Salt is randomly generated per hash. An optional
//! pepper (server-side secret) can be prepended before hashing.

use argon2::password_hash::SaltString;
use argon2::password_hash::rand_core::OsRng;
use argon2::{Argon2, PasswordHasher, PasswordVerifier};

use crate::error::AuthError;

/// A syntactically valid Argon2id hash that matches no real password.
/// Verified for unknown identities so the unknown-email and
/// wrong-password paths take comparable time.
const DUMMY_HASH: &str = "$argon2id$v=19$m=19456,t=2,p=1$MDEyMzQ1Njc4OWFiY2RlZg$MDEyMzQ1Njc4OWFiY2RlZjAxMjM0NTY3ODlhYmNkZWY";

fn peppered<'a>(password: &'a str, pepper: Option<&str>, buf: &'a mut String) -> &'a [u8] {
    match pepper {
        Some(p) => {
            buf.push_str(p);
            buf.push_str(password);
            buf.as_bytes()
        }
        None => password.as_bytes(),
    }
}

/// Hash a plaintext password into PHC string format.
pub fn hash_password(password: &str, pepper: Option<&str>) -> Result<String, AuthError> {
    let mut buf = String::new();
    let input = peppered(password, pepper, &mut buf);

    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();
    argon2
        .hash_password(input, &salt)
        .map(|h| h.to_string())
        .map_err(|e| AuthError::Hashing(e.to_string()))
}

/// Verify a plaintext password against an Argon2id PHC-format hash.
///
/// Returns `Ok(true)` on match, `Ok(false)` on mismatch, or
/// `Err(AuthError::InvalidHashFormat)` if the stored hash is malformed.
pub fn verify_password(
    password: &str,
    hash: &str,
    pepper: Option<&str>,
) -> Result<bool, AuthError> {
    let mut buf = String::new();
    let input = peppered(password, pepper, &mut buf);

    let parsed_hash =
        argon2::PasswordHash::new(hash).map_err(|e| AuthError::InvalidHashFormat(e.to_string()))?;

    let argon2 = Argon2::default();
    match argon2.verify_password(input, &parsed_hash) {
        Ok(()) => Ok(true),
        Err(argon2::password_hash::Error::Password) => Ok(false),
        Err(e) => Err(AuthError::InvalidHashFormat(e.to_string())),
    }
}

/// Burn a full verification against a fixed hash. Always returns `false`;
/// used to keep the unknown-identity path from returning early.
pub fn burn_verification(password: &str, pepper: Option<&str>) -> bool {
    verify_password(password, DUMMY_HASH, pepper).unwrap_or(false)
}

/// Enforce the password strength policy: minimum length plus at least one
/// lowercase letter, uppercase letter, digit, and symbol.
pub fn validate_strength(password: &str, min_length: usize) -> Result<(), AuthError> {
    if password.chars().count() < min_length {
        return Err(AuthError::PasswordPolicy(format!(
            "must be at least {min_length} characters"
        )));
    }
    if !password.chars().any(|c| c.is_ascii_lowercase()) {
        return Err(AuthError::PasswordPolicy(
            "must contain a lowercase letter".into(),
        ));
    }
    if !password.chars().any(|c| c.is_ascii_uppercase()) {
        return Err(AuthError::PasswordPolicy(
            "must contain an uppercase letter".into(),
        ));
    }
    if !password.chars().any(|c| c.is_ascii_digit()) {
        return Err(AuthError::PasswordPolicy("must contain a digit".into()));
    }
    if password.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Err(AuthError::PasswordPolicy("must contain a symbol".into()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_verify_roundtrip() {
        let hash = hash_password("correct-horse-battery", None).unwrap();
        assert!(verify_password("correct-horse-battery", &hash, None).unwrap());
        assert!(!verify_password("wrong-password", &hash, None).unwrap());
    }

    #[test]
    fn pepper_changes_verification() {
        let hash = hash_password("hunter2hunter2", Some("server-pepper")).unwrap();
        assert!(verify_password("hunter2hunter2", &hash, Some("server-pepper")).unwrap());
        assert!(!verify_password("hunter2hunter2", &hash, None).unwrap());
    }

    #[test]
    fn same_password_different_salts() {
        let h1 = hash_password("Str0ng!Pass", None).unwrap();
        let h2 = hash_password("Str0ng!Pass", None).unwrap();
        assert_ne!(h1, h2);
    }

    #[test]
    fn malformed_hash_is_an_error() {
        let err = verify_password("anything", "not-a-phc-string", None).unwrap_err();
        assert!(matches!(err, AuthError::InvalidHashFormat(_)));
    }

    #[test]
    fn dummy_hash_never_matches() {
        assert!(!burn_verification("anything", None));
        assert!(!burn_verification("", Some("pepper")));
    }

    #[test]
    fn strength_policy() {
        assert!(validate_strength("Str0ng!Pass", 8).is_ok());
        assert!(matches!(
            validate_strength("short", 8),
            Err(AuthError::PasswordPolicy(_))
        ));
        assert!(validate_strength("alllowercase1!", 8).is_err());
        assert!(validate_strength("NoDigits!!", 8).is_err());
        assert!(validate_strength("NoSymbol123", 8).is_err());
    }
}
