//! HTTP Digest authentication (RFC 2617, with RFC 2069 fallback)
//!
//! A challenge is parsed from a 401 response, answered once and then
//! dropped. Hashing and header rendering are done by `digest_auth`; this
//! module picks the challenge, pins the `cnonce` and assembles the retry
//! headers.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use digest_auth::{AuthContext, AuthorizationHeader, Qop, WwwAuthenticateHeader};
use rand::RngCore;
use reqwest::header::{
    HeaderMap, HeaderName, HeaderValue, ACCEPT, ACCEPT_ENCODING, AUTHORIZATION, CONNECTION,
    CONTENT_TYPE, HOST, USER_AGENT, WWW_AUTHENTICATE,
};
use reqwest::Url;
use tracing::debug;

use crate::error::OnvifError;
use crate::transport::HttpRequest;

pub const SOAP_ACTION: HeaderName = HeaderName::from_static("soapaction");

/// A parsed `WWW-Authenticate: Digest ...` challenge
#[derive(Debug, Clone, PartialEq)]
pub struct DigestChallenge {
    prompt: WwwAuthenticateHeader,
}

impl DigestChallenge {
    /// Parse one header value.
    ///
    /// Returns `None` for other schemes, for challenges without realm or
    /// nonce, and for challenges this client cannot answer (an unknown
    /// algorithm, or a qop list without `auth`).
    pub fn parse(header: &str) -> Option<Self> {
        let (scheme, params) = header.trim().split_once(char::is_whitespace)?;
        if !scheme.eq_ignore_ascii_case("Digest") {
            return None;
        }

        let prompt = match digest_auth::parse(params) {
            Ok(prompt) => prompt,
            Err(e) => {
                debug!(error = %e, "ignoring unusable Digest challenge");
                return None;
            }
        };

        // auth-int would hash the body; only plain auth is answered
        if prompt.qop.as_ref().is_some_and(|qop| !qop.contains(&Qop::AUTH)) {
            return None;
        }
        Some(Self { prompt })
    }

    /// First usable Digest challenge among the response's `WWW-Authenticate` headers
    pub fn from_headers(headers: &HeaderMap) -> Option<Self> {
        headers
            .get_all(WWW_AUTHENTICATE)
            .iter()
            .filter_map(|value| value.to_str().ok())
            .find_map(Self::parse)
    }

    pub fn realm(&self) -> &str {
        &self.prompt.realm
    }

    pub fn nonce(&self) -> &str {
        &self.prompt.nonce
    }

    pub fn opaque(&self) -> Option<&str> {
        self.prompt.opaque.as_deref()
    }

    /// `false` means RFC 2069 mode: no qop, nc or cnonce in the answer
    pub fn offers_qop(&self) -> bool {
        self.prompt.qop.is_some()
    }

    /// Answer the challenge for a POST to `uri`. Each call advances the
    /// nonce count, starting at `00000001`.
    pub fn authorization(
        &mut self,
        username: &str,
        password: &str,
        uri: &str,
        cnonce: &str,
    ) -> Result<AuthorizationHeader, OnvifError> {
        // No body: qop=auth even when auth-int is also offered
        let mut context = AuthContext::new_post(username, password, uri, Option::<&[u8]>::None);
        context.set_custom_cnonce(cnonce);

        self.prompt.respond(&context).map_err(|e| {
            OnvifError::RequestBuild(format!("cannot answer Digest challenge: {}", e))
        })
    }
}

/// Fresh client nonce: 8 random bytes, Base64
pub fn new_cnonce() -> String {
    let mut bytes = [0u8; 8];
    rand::thread_rng().fill_bytes(&mut bytes);
    BASE64.encode(bytes)
}

/// Request-URI for the digest: path plus query
pub fn request_uri(url: &Url) -> String {
    match url.query() {
        Some(query) => format!("{}?{}", url.path(), query),
        None => url.path().to_string(),
    }
}

fn host_header(url: &Url) -> Option<String> {
    let host = url.host_str()?;
    Some(match url.port() {
        Some(port) => format!("{}:{}", host, port),
        None => host.to_string(),
    })
}

fn header_value(name: &str, value: &str) -> Result<HeaderValue, OnvifError> {
    HeaderValue::from_str(value)
        .map_err(|e| OnvifError::RequestBuild(format!("invalid {} header: {}", name, e)))
}

/// Header set for the authenticated retry of `request`
pub fn retry_headers(
    request: &HttpRequest,
    authorization: &str,
    user_agent: &str,
) -> Result<HeaderMap, OnvifError> {
    let mut headers = HeaderMap::new();

    if let Some(host) = host_header(&request.url) {
        headers.insert(HOST, header_value("Host", &host)?);
    }
    headers.insert(USER_AGENT, header_value("User-Agent", user_agent)?);
    headers.insert(ACCEPT, HeaderValue::from_static("*/*"));
    headers.insert(ACCEPT_ENCODING, HeaderValue::from_static("identity"));
    headers.insert(CONNECTION, HeaderValue::from_static("Keep-Alive"));
    headers.insert(AUTHORIZATION, header_value("Authorization", authorization)?);

    if let Some(content_type) = request.headers.get(CONTENT_TYPE) {
        headers.insert(CONTENT_TYPE, content_type.clone());
    }
    if let Some(action) = request.headers.get(&SOAP_ACTION) {
        headers.insert(SOAP_ACTION, action.clone());
    }
    Ok(headers)
}
