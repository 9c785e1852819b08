//! Scripted in-memory transport and canned device responses for tests

use std::collections::VecDeque;
use std::sync::Mutex;

use reqwest::header::{HeaderMap, HeaderValue, WWW_AUTHENTICATE};
use reqwest::StatusCode;

use crate::error::OnvifError;
use crate::transport::{HttpRequest, HttpResponse, HttpTransport};

/// Replays queued responses in order and records every request it receives.
/// Once the queue is empty it answers with a transport error.
#[derive(Default)]
pub struct MockTransport {
    responses: Mutex<VecDeque<HttpResponse>>,
    requests: Mutex<Vec<HttpRequest>>,
}

impl MockTransport {
    pub fn new(responses: Vec<HttpResponse>) -> Self {
        Self {
            responses: Mutex::new(responses.into()),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn push(&self, response: HttpResponse) {
        self.responses.lock().unwrap().push_back(response);
    }

    pub fn requests(&self) -> Vec<HttpRequest> {
        self.requests.lock().unwrap().clone()
    }

    /// Body element names of the recorded requests, e.g. `GetProfiles`
    pub fn operations(&self) -> Vec<String> {
        self.requests().iter().map(operation_of).collect()
    }
}

impl HttpTransport for MockTransport {
    fn post(&self, request: &HttpRequest) -> Result<HttpResponse, OnvifError> {
        self.requests.lock().unwrap().push(request.clone());
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| OnvifError::Transport(format!("connection to {} refused", request.url)))
    }
}

pub fn body_text(request: &HttpRequest) -> String {
    String::from_utf8(request.body.clone()).unwrap()
}

/// Local name of the element right after `<soap-env:Body>`
pub fn operation_of(request: &HttpRequest) -> String {
    let body = body_text(request);
    let after = body.split("<soap-env:Body>").nth(1).unwrap_or_default();
    after
        .trim_start_matches('<')
        .split(|c: char| c == '>' || c == '/' || c.is_whitespace())
        .next()
        .unwrap_or_default()
        .rsplit(':')
        .next()
        .unwrap_or_default()
        .to_string()
}

pub fn ok(body: &str) -> HttpResponse {
    HttpResponse {
        status: StatusCode::OK,
        headers: HeaderMap::new(),
        body: body.as_bytes().to_vec(),
    }
}

pub fn status(status: StatusCode, body: &str) -> HttpResponse {
    HttpResponse {
        status,
        headers: HeaderMap::new(),
        body: body.as_bytes().to_vec(),
    }
}

pub const CHALLENGE: &str = r#"Digest realm="IP Camera", nonce="a1b2c3d4", qop="auth", opaque="0pq""#;

pub fn unauthorized(challenge: Option<&str>) -> HttpResponse {
    let mut headers = HeaderMap::new();
    if let Some(challenge) = challenge {
        headers.insert(WWW_AUTHENTICATE, HeaderValue::from_str(challenge).unwrap());
    }
    HttpResponse {
        status: StatusCode::UNAUTHORIZED,
        headers,
        body: Vec::new(),
    }
}

pub fn envelope(body: &str) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<SOAP-ENV:Envelope xmlns:SOAP-ENV="http://www.w3.org/2003/05/soap-envelope"
                   xmlns:tds="http://www.onvif.org/ver10/device/wsdl"
                   xmlns:trt="http://www.onvif.org/ver10/media/wsdl"
                   xmlns:tptz="http://www.onvif.org/ver20/ptz/wsdl"
                   xmlns:tt="http://www.onvif.org/ver10/schema">
<SOAP-ENV:Body>{}</SOAP-ENV:Body>
</SOAP-ENV:Envelope>"#,
        body
    )
}

pub fn capabilities_xml(media: &str, ptz: &str) -> String {
    envelope(&format!(
        "<tds:GetCapabilitiesResponse><tds:Capabilities>\
         <tt:Device><tt:XAddr>http://10.0.0.5/onvif/device_service</tt:XAddr></tt:Device>\
         <tt:Media><tt:XAddr>{}</tt:XAddr></tt:Media>\
         <tt:PTZ><tt:XAddr>{}</tt:XAddr></tt:PTZ>\
         </tds:Capabilities></tds:GetCapabilitiesResponse>",
        media, ptz
    ))
}

pub fn profiles_xml(tokens: &[&str]) -> String {
    let profiles: String = tokens
        .iter()
        .map(|token| {
            format!(
                r#"<trt:Profiles token="{0}" fixed="true"><tt:Name>{0}_name</tt:Name></trt:Profiles>"#,
                token
            )
        })
        .collect();
    envelope(&format!(
        "<trt:GetProfilesResponse>{}</trt:GetProfilesResponse>",
        profiles
    ))
}

pub fn stream_uri_xml(uri: &str) -> String {
    envelope(&format!(
        "<trt:GetStreamUriResponse><trt:MediaUri>\
         <tt:Uri>{}</tt:Uri>\
         <tt:InvalidAfterConnect>false</tt:InvalidAfterConnect>\
         <tt:InvalidAfterReboot>false</tt:InvalidAfterReboot>\
         <tt:Timeout>PT60S</tt:Timeout>\
         </trt:MediaUri></trt:GetStreamUriResponse>",
        uri
    ))
}

pub fn continuous_move_xml() -> String {
    envelope("<tptz:ContinuousMoveResponse/>")
}

pub fn fault_xml(reason: &str) -> String {
    envelope(&format!(
        "<SOAP-ENV:Fault><SOAP-ENV:Code><SOAP-ENV:Value>SOAP-ENV:Sender</SOAP-ENV:Value></SOAP-ENV:Code>\
         <SOAP-ENV:Reason><SOAP-ENV:Text xml:lang=\"en\">{}</SOAP-ENV:Text></SOAP-ENV:Reason></SOAP-ENV:Fault>",
        reason
    ))
}

pub const MEDIA: &str = "http://10.0.0.5/onvif/media";
pub const PTZ: &str = "http://10.0.0.5/onvif/ptz";
pub const RTSP: &str = "rtsp://10.0.0.5:554/Streaming/Channels/101";
