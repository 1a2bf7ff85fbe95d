//! Field-level encryption of PII values with AES-256-GCM.
//!
//! Envelope format (bit-compatible with existing data): four
//! colon-separated lowercase-hex segments,
//! `salt(64B):iv(16B):ciphertext:tag(16B)`. Salt and IV are fresh per
//! call, so two encryptions of the same plaintext are never comparable.
//! The cipher key is derived per call from the master secret and the
//! salt via PBKDF2-HMAC-SHA256, so the master secret never directly
//! touches the cipher.

use aes_gcm::aead::consts::U16;
use aes_gcm::aead::rand_core::RngCore;
use aes_gcm::aead::{Aead, KeyInit, OsRng};
use aes_gcm::aes::Aes256;
use aes_gcm::{AesGcm, Key, Nonce};
use sha2::Sha256;

use crate::error::AuthError;

/// AES-256-GCM with the 16-byte IV the envelope format requires.
type FieldCipher = AesGcm<Aes256, U16>;

const SALT_LEN: usize = 64;
const IV_LEN: usize = 16;
const TAG_LEN: usize = 16;
const KEY_LEN: usize = 32;
const KDF_ROUNDS: u32 = 100_000;

fn derive_key(master: &str, salt: &[u8]) -> [u8; KEY_LEN] {
    let mut key = [0u8; KEY_LEN];
    pbkdf2::pbkdf2_hmac::<Sha256>(master.as_bytes(), salt, KDF_ROUNDS, &mut key);
    key
}

/// Encrypt a single field value into the envelope format.
///
/// Refuses an empty master secret and refuses to re-encrypt a value that
/// already looks like an envelope — double encryption is a programming
/// error, not something to paper over.
pub fn encrypt_field(master: &str, plaintext: &str) -> Result<String, AuthError> {
    if master.is_empty() {
        return Err(AuthError::Encryption("master secret is not set".into()));
    }
    if is_encrypted(plaintext) {
        return Err(AuthError::Encryption("value is already encrypted".into()));
    }

    let mut salt = [0u8; SALT_LEN];
    OsRng.fill_bytes(&mut salt);
    let mut iv = [0u8; IV_LEN];
    OsRng.fill_bytes(&mut iv);

    let key = derive_key(master, &salt);
    let cipher = FieldCipher::new(Key::<FieldCipher>::from_slice(&key));
    let nonce = Nonce::from_slice(&iv);

    let mut sealed = cipher
        .encrypt(nonce, plaintext.as_bytes())
        .map_err(|e| AuthError::Encryption(format!("AES-GCM encrypt: {e}")))?;

    // AEAD output is ciphertext || tag; the envelope keeps them apart.
    let tag = sealed.split_off(sealed.len() - TAG_LEN);

    Ok(format!(
        "{}:{}:{}:{}",
        hex::encode(salt),
        hex::encode(iv),
        hex::encode(&sealed),
        hex::encode(&tag),
    ))
}

/// Decrypt an envelope produced by [`encrypt_field`].
pub fn decrypt_field(master: &str, envelope: &str) -> Result<String, AuthError> {
    if master.is_empty() {
        return Err(AuthError::Decryption("master secret is not set".into()));
    }

    let segments: Vec<&str> = envelope.split(':').collect();
    if segments.len() != 4 || segments.iter().any(|s| s.is_empty()) {
        return Err(AuthError::Decryption("malformed envelope".into()));
    }

    let decode = |s: &str| {
        hex::decode(s).map_err(|e| AuthError::Decryption(format!("bad hex segment: {e}")))
    };
    let salt = decode(segments[0])?;
    let iv = decode(segments[1])?;
    let ciphertext = decode(segments[2])?;
    let tag = decode(segments[3])?;

    if salt.len() != SALT_LEN || iv.len() != IV_LEN || tag.len() != TAG_LEN {
        return Err(AuthError::Decryption("malformed envelope".into()));
    }

    let key = derive_key(master, &salt);
    let cipher = FieldCipher::new(Key::<FieldCipher>::from_slice(&key));
    let nonce = Nonce::from_slice(&iv);

    let mut sealed = ciphertext;
    sealed.extend_from_slice(&tag);

    let plaintext = cipher
        .decrypt(nonce, sealed.as_ref())
        .map_err(|_| AuthError::Decryption("authentication tag mismatch".into()))?;

    String::from_utf8(plaintext)
        .map_err(|e| AuthError::Decryption(format!("invalid UTF-8 plaintext: {e}")))
}

/// Structural check for the envelope format: exactly four non-empty
/// colon-separated segments. Used to make encryption idempotent — this is
/// not a cryptographic guarantee, and a plaintext containing three colons
/// would misclassify.
pub fn is_encrypted(value: &str) -> bool {
    let segments: Vec<&str> = value.split(':').collect();
    segments.len() == 4 && segments.iter().all(|s| !s.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    const MASTER: &str = "test-master-secret";

    #[test]
    fn roundtrip() {
        let envelope = encrypt_field(MASTER, "+1 555 867 5309").unwrap();
        assert!(is_encrypted(&envelope));
        assert_eq!(decrypt_field(MASTER, &envelope).unwrap(), "+1 555 867 5309");
    }

    #[test]
    fn fresh_salt_and_iv_every_call() {
        let e1 = encrypt_field(MASTER, "same-plaintext").unwrap();
        let e2 = encrypt_field(MASTER, "same-plaintext").unwrap();
        assert_ne!(e1, e2);
    }

    #[test]
    fn wrong_master_fails() {
        let envelope = encrypt_field(MASTER, "secret").unwrap();
        let err = decrypt_field("other-master", &envelope).unwrap_err();
        assert!(matches!(err, AuthError::Decryption(_)));
    }

    #[test]
    fn tampered_ciphertext_fails() {
        let envelope = encrypt_field(MASTER, "secret").unwrap();
        let mut segments: Vec<String> = envelope.split(':').map(String::from).collect();
        // Flip a nibble in the ciphertext segment.
        let flipped = if segments[2].starts_with('0') { "1" } else { "0" };
        segments[2].replace_range(0..1, flipped);
        let tampered = segments.join(":");
        assert!(matches!(
            decrypt_field(MASTER, &tampered),
            Err(AuthError::Decryption(_))
        ));
    }

    #[test]
    fn wrong_segment_count_fails() {
        assert!(matches!(
            decrypt_field(MASTER, "aa:bb:cc"),
            Err(AuthError::Decryption(_))
        ));
    }

    #[test]
    fn double_encryption_is_refused() {
        let envelope = encrypt_field(MASTER, "secret").unwrap();
        assert!(matches!(
            encrypt_field(MASTER, &envelope),
            Err(AuthError::Encryption(_))
        ));
    }

    #[test]
    fn empty_master_is_refused() {
        assert!(matches!(
            encrypt_field("", "secret"),
            Err(AuthError::Encryption(_))
        ));
    }

    #[test]
    fn structural_sniff() {
        assert!(!is_encrypted("plain text"));
        assert!(!is_encrypted("a:b:c"));
        assert!(!is_encrypted("a:b::d"));
        // Known caveat: any four non-empty segments classify as encrypted.
        assert!(is_encrypted("a:b:c:d"));
    }
}
