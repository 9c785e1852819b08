//! HTTP transport seam
//!
//! The session never builds its own HTTP client. Callers create one
//! transport (normally [`ReqwestTransport`]) and share it between sessions.

use reqwest::blocking::Client;
use reqwest::header::HeaderMap;
use reqwest::{StatusCode, Url};
use tracing::debug;

use crate::config::ClientConfig;
use crate::error::OnvifError;

/// An outbound SOAP request. Always sent as `POST`.
#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub url: Url,
    pub headers: HeaderMap,
    pub body: Vec<u8>,
}

#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Vec<u8>,
}

/// Sends one request and returns the raw response, whatever its status.
///
/// Implementations report connection, DNS and timeout failures as
/// [`OnvifError::Transport`].
pub trait HttpTransport: Send + Sync {
    fn post(&self, request: &HttpRequest) -> Result<HttpResponse, OnvifError>;
}

/// Blocking reqwest transport with a pooled, reusable client
pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    pub fn new(config: &ClientConfig) -> Result<Self, OnvifError> {
        let client = Client::builder()
            .timeout(config.timeout())
            .user_agent(config.user_agent.as_str())
            .build()
            .map_err(|e| OnvifError::Transport(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self { client })
    }
}

impl HttpTransport for ReqwestTransport {
    fn post(&self, request: &HttpRequest) -> Result<HttpResponse, OnvifError> {
        let resp = self
            .client
            .post(request.url.clone())
            .headers(request.headers.clone())
            .body(request.body.clone())
            .send()
            .map_err(|e| transport_error(&request.url, e))?;

        let status = resp.status();
        let headers = resp.headers().clone();
        let body = resp
            .bytes()
            .map_err(|e| transport_error(&request.url, e))?
            .to_vec();

        debug!(url = %request.url, %status, bytes = body.len(), "received response");
        Ok(HttpResponse {
            status,
            headers,
            body,
        })
    }
}

fn transport_error(url: &Url, e: reqwest::Error) -> OnvifError {
    if e.is_timeout() {
        OnvifError::Transport(format!("request to {} timed out", url))
    } else {
        OnvifError::Transport(format!("request to {} failed: {}", url, e))
    }
}
