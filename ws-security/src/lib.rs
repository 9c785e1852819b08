//! WS-Security UsernameToken support
//!
//! Generates OASIS WS-Security UsernameToken Profile 1.1 tokens for signing
//! outgoing ONVIF requests, and reads them back for verification.
//!
//! # Example
//!
//! ```rust,ignore
//! use ws_security::UsernameToken;
//!
//! let token = UsernameToken::generate("admin", "secret")?;
//! // token.password_digest == base64(sha1(nonce || created || "secret"))
//! ```

mod digest;
mod error;
mod parse;
mod token;

pub use digest::{compute_digest, compute_digest_raw, verify_digest};
pub use error::WsSecurityError;
pub use token::{UsernameToken, BASE64_BINARY_ENCODING, NONCE_LEN, PASSWORD_DIGEST_TYPE};

use chrono::{DateTime, Utc};

/// `wsse` namespace
pub const WSSE_NS: &str =
    "http://docs.oasis-open.org/wss/2004/01/oasis-200401-wss-wssecurity-secext-1.0.xsd";

/// `wsu` namespace
pub const WSU_NS: &str =
    "http://docs.oasis-open.org/wss/2004/01/oasis-200401-wss-wssecurity-utility-1.0.xsd";

/// Credentials a token is checked against
#[derive(Clone)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Extract the UsernameToken from SOAP XML
pub fn extract_token(xml: &str) -> Result<UsernameToken, WsSecurityError> {
    parse::parse_username_token(xml)
}

/// Validate a UsernameToken against credentials
///
/// Checks the username, the timestamp age (with 30s of tolerated clock skew
/// into the future) and finally the password digest.
pub fn validate_token(
    token: &UsernameToken,
    credentials: &Credentials,
    max_age_secs: u64,
) -> Result<(), WsSecurityError> {
    if token.username != credentials.username {
        return Err(WsSecurityError::InvalidCredentials);
    }

    let created = DateTime::parse_from_rfc3339(&token.created)
        .map_err(|_| WsSecurityError::InvalidTimestamp)?
        .with_timezone(&Utc);

    let age = Utc::now().signed_duration_since(created);
    if age.num_seconds() < -30 {
        return Err(WsSecurityError::InvalidTimestamp);
    }

    let age_secs = age.num_seconds().max(0) as u64;
    if age_secs > max_age_secs {
        return Err(WsSecurityError::Expired {
            age_secs,
            max_secs: max_age_secs,
        });
    }

    let expected = compute_digest(&token.nonce, &token.created, &credentials.password)?;
    if !verify_digest(&token.password_digest, &expected) {
        return Err(WsSecurityError::InvalidCredentials);
    }

    Ok(())
}

/// Extract and validate a UsernameToken in one call
pub fn authenticate(
    xml: &str,
    credentials: &Credentials,
    max_age_secs: u64,
) -> Result<(), WsSecurityError> {
    let token = extract_token(xml)?;
    validate_token(&token, credentials, max_age_secs)
}
