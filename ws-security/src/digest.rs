//! WS-Security password digest computation
//!
//! `digest = base64(sha1(nonce_bytes + created + password))`, where the nonce
//! enters the hash as raw bytes, never as its Base64 text.

use base64::{engine::general_purpose::STANDARD, Engine};
use sha1::{Digest, Sha1};
use subtle::ConstantTimeEq;

use crate::error::WsSecurityError;

/// Compute the password digest from raw nonce bytes
pub fn compute_digest_raw(nonce: &[u8], created: &str, password: &str) -> String {
    let mut hasher = Sha1::new();
    hasher.update(nonce);
    hasher.update(created.as_bytes());
    hasher.update(password.as_bytes());
    STANDARD.encode(hasher.finalize())
}

/// Compute the password digest from a Base64-encoded nonce
///
/// # Arguments
/// * `nonce_b64` - Base64-encoded nonce as carried in the UsernameToken
/// * `created` - ISO 8601 timestamp string from the UsernameToken
/// * `password` - Plaintext password
pub fn compute_digest(
    nonce_b64: &str,
    created: &str,
    password: &str,
) -> Result<String, WsSecurityError> {
    let nonce_bytes = STANDARD
        .decode(nonce_b64)
        .map_err(|_| WsSecurityError::InvalidNonce)?;

    Ok(compute_digest_raw(&nonce_bytes, created, password))
}

/// Verify a password digest using constant-time comparison
pub fn verify_digest(expected: &str, actual: &str) -> bool {
    expected.as_bytes().ct_eq(actual.as_bytes()).into()
}
