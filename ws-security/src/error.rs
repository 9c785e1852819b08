use thiserror::Error;

#[derive(Debug, Error)]
pub enum WsSecurityError {
    /// The OS random source could not fill a nonce
    #[error("Random source unavailable: {0}")]
    RandomSource(String),

    #[error("Envelope has no wsse:Security header")]
    MissingSecurityHeader,

    #[error("UsernameToken is missing <{0}>")]
    MissingElement(String),

    #[error("Nonce is not valid Base64")]
    InvalidNonce,

    #[error("Created is not an RFC 3339 timestamp")]
    InvalidTimestamp,

    #[error("Token expired (age: {age_secs}s, max: {max_secs}s)")]
    Expired { age_secs: u64, max_secs: u64 },

    /// Username or password digest mismatch
    #[error("Token credentials do not match")]
    InvalidCredentials,

    #[error("Malformed envelope XML: {0}")]
    XmlError(String),
}
