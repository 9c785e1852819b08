//! UsernameToken generation
//!
//! Every call to [`UsernameToken::generate`] draws a fresh nonce from the
//! operating system and stamps the current UTC time, so tokens are never
//! reused across requests.

use base64::{engine::general_purpose::STANDARD, Engine};
use chrono::{SecondsFormat, Utc};
use rand::rngs::OsRng;
use rand::RngCore;

use crate::digest;
use crate::error::WsSecurityError;

/// `Type` attribute of `wsse:Password`
pub const PASSWORD_DIGEST_TYPE: &str =
    "http://docs.oasis-open.org/wss/2004/01/oasis-200401-wss-username-token-profile-1.0#PasswordDigest";

/// `EncodingType` attribute of `wsse:Nonce`
pub const BASE64_BINARY_ENCODING: &str =
    "http://docs.oasis-open.org/wss/2004/01/oasis-200401-wss-soap-message-security-1.0#Base64Binary";

/// Raw nonce length. 24 bytes encode to exactly 32 Base64 characters.
pub const NONCE_LEN: usize = 24;

/// A WS-Security UsernameToken with a password digest
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UsernameToken {
    /// The username, in plaintext
    pub username: String,
    /// Base64-encoded password digest
    pub password_digest: String,
    /// Base64-encoded nonce
    pub nonce: String,
    /// ISO 8601 UTC timestamp
    pub created: String,
}

impl UsernameToken {
    /// Generate a fresh token for the given credentials.
    ///
    /// Fails with [`WsSecurityError::RandomSource`] if the OS random source
    /// cannot supply a nonce; no weaker fallback is attempted.
    pub fn generate(username: &str, password: &str) -> Result<Self, WsSecurityError> {
        let mut nonce = [0u8; NONCE_LEN];
        OsRng
            .try_fill_bytes(&mut nonce)
            .map_err(|e| WsSecurityError::RandomSource(e.to_string()))?;

        let created = Utc::now().to_rfc3339_opts(SecondsFormat::Nanos, true);
        Ok(Self::from_parts(username, password, &nonce, &created))
    }

    /// Build a token from a known nonce and timestamp
    pub fn from_parts(username: &str, password: &str, nonce: &[u8], created: &str) -> Self {
        Self {
            username: username.to_string(),
            password_digest: digest::compute_digest_raw(nonce, created, password),
            nonce: STANDARD.encode(nonce),
            created: created.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nonce_is_32_base64_chars() {
        let token = UsernameToken::generate("admin", "pass").unwrap();
        assert_eq!(token.nonce.len(), 32);
        assert_eq!(STANDARD.decode(&token.nonce).unwrap().len(), NONCE_LEN);
    }

    #[test]
    fn test_created_has_nanosecond_precision() {
        let token = UsernameToken::generate("admin", "pass").unwrap();
        assert!(token.created.ends_with('Z'));
        let fraction = token
            .created
            .split('.')
            .nth(1)
            .unwrap()
            .trim_end_matches('Z');
        assert_eq!(fraction.len(), 9);
        assert!(chrono::DateTime::parse_from_rfc3339(&token.created).is_ok());
    }

    #[test]
    fn test_tokens_are_fresh() {
        let a = UsernameToken::generate("admin", "pass").unwrap();
        let b = UsernameToken::generate("admin", "pass").unwrap();
        assert_ne!(a.nonce, b.nonce);
        assert_ne!(a.password_digest, b.password_digest);
    }

    #[test]
    fn test_digest_is_checkable() {
        let token = UsernameToken::generate("admin", "pass").unwrap();
        let expected = digest::compute_digest(&token.nonce, &token.created, "pass").unwrap();
        assert_eq!(token.password_digest, expected);
        assert_eq!(token.username, "admin");
    }

    #[test]
    fn test_from_parts_is_deterministic() {
        let nonce = [7u8; NONCE_LEN];
        let a = UsernameToken::from_parts("u", "p", &nonce, "2024-01-01T00:00:00.000000000Z");
        let b = UsernameToken::from_parts("u", "p", &nonce, "2024-01-01T00:00:00.000000000Z");
        assert_eq!(a, b);
    }
}
