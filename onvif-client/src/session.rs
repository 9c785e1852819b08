//! Per-device session: cached capabilities, profiles and stream URI
//!
//! Every operation ensures its prerequisites first, fetching any that are
//! missing: capabilities before profiles (the media address comes from
//! capabilities), profiles before a stream URI or PTZ move (both use the
//! first profile's token). A response is decoded into a local value and only
//! stored once decoding succeeds, so a failed call never changes the state.

use std::sync::Arc;

use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use reqwest::{StatusCode, Url};
use tracing::{debug, info, warn};

use crate::capabilities::{Capabilities, GetCapabilities};
use crate::config::{ClientConfig, DeviceCredentials};
use crate::digest::{self, DigestChallenge, SOAP_ACTION};
use crate::error::OnvifError;
use crate::media::{GetProfiles, GetStreamUri, MediaProfile, StreamUriInfo};
use crate::ptz::{ContinuousMove, PtzCommand};
use crate::soap::{self, Envelope, FromSoap, SoapBody};
use crate::transport::{HttpRequest, HttpTransport};

pub const SOAP_CONTENT_TYPE: &str = "application/soap+xml; charset=utf-8";

/// How far a session has progressed. Only ever moves forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum SessionState {
    NoCapabilities,
    HasCapabilities,
    HasProfiles,
    HasStreamUri,
}

pub struct DeviceSession {
    credentials: DeviceCredentials,
    config: ClientConfig,
    transport: Arc<dyn HttpTransport>,
    capabilities: Option<Capabilities>,
    profiles: Option<Vec<MediaProfile>>,
    stream_uri: Option<StreamUriInfo>,
}

fn prerequisite(
    operation: &'static str,
    prerequisite: &'static str,
) -> impl FnOnce(OnvifError) -> OnvifError {
    move |source| OnvifError::Prerequisite {
        operation,
        prerequisite,
        source: Box::new(source),
    }
}

impl DeviceSession {
    pub fn new(
        credentials: DeviceCredentials,
        config: ClientConfig,
        transport: Arc<dyn HttpTransport>,
    ) -> Self {
        Self {
            credentials,
            config,
            transport,
            capabilities: None,
            profiles: None,
            stream_uri: None,
        }
    }

    pub fn credentials(&self) -> &DeviceCredentials {
        &self.credentials
    }

    pub fn state(&self) -> SessionState {
        if self.stream_uri.is_some() {
            SessionState::HasStreamUri
        } else if self.profiles.is_some() {
            SessionState::HasProfiles
        } else if self.capabilities.is_some() {
            SessionState::HasCapabilities
        } else {
            SessionState::NoCapabilities
        }
    }

    pub fn capabilities(&self) -> Option<&Capabilities> {
        self.capabilities.as_ref()
    }

    pub fn profiles(&self) -> Option<&[MediaProfile]> {
        self.profiles.as_deref()
    }

    pub fn stream_uri(&self) -> Option<&StreamUriInfo> {
        self.stream_uri.as_ref()
    }

    /// Device capabilities, fetched from the device service on first use.
    /// Sent without a WS-Security header.
    pub fn get_capabilities(&mut self) -> Result<&Capabilities, OnvifError> {
        let caps = match self.capabilities.take() {
            Some(caps) => caps,
            None => {
                let url = self.config.device_service_url(&self.credentials.address);
                let caps: Capabilities =
                    self.call("GetCapabilities", &url, &GetCapabilities::default(), false)?;
                info!(
                    address = %self.credentials.address,
                    media = caps.media_address().unwrap_or("-"),
                    ptz = caps.ptz_address().unwrap_or("-"),
                    "capabilities cached"
                );
                caps
            }
        };
        let caps: &Capabilities = self.capabilities.insert(caps);
        Ok(caps)
    }

    /// Media profiles, fetched from the media service on first use.
    /// An empty list is cached like any other.
    pub fn get_profiles(&mut self) -> Result<&[MediaProfile], OnvifError> {
        let profiles = match self.profiles.take() {
            Some(profiles) => profiles,
            None => {
                let media = self.media_address("GetProfiles")?;
                let profiles: Vec<MediaProfile> =
                    self.call("GetProfiles", &media, &GetProfiles, true)?;
                info!(
                    address = %self.credentials.address,
                    count = profiles.len(),
                    "profiles cached"
                );
                for profile in &profiles {
                    debug!(token = %profile.token, "profile: {}", profile);
                }
                profiles
            }
        };
        let profiles: &Vec<MediaProfile> = self.profiles.insert(profiles);
        Ok(profiles.as_slice())
    }

    /// Stream URI for the first profile, RTP-Unicast over UDP
    pub fn get_stream_uri(&mut self) -> Result<&StreamUriInfo, OnvifError> {
        let info = match self.stream_uri.take() {
            Some(info) => info,
            None => {
                let token = self.first_profile_token("GetStreamUri")?;
                let media = self.media_address("GetStreamUri")?;
                let info: StreamUriInfo = self.call(
                    "GetStreamUri",
                    &media,
                    &GetStreamUri::unicast_udp(&token),
                    true,
                )?;
                info!(address = %self.credentials.address, uri = %info.uri, "stream URI cached");
                info
            }
        };
        let info: &StreamUriInfo = self.stream_uri.insert(info);
        Ok(info)
    }

    /// Start a continuous move on the first profile. Succeeds on HTTP 200;
    /// the response body is not inspected.
    pub fn ptz_continuous_move(&mut self, command: PtzCommand) -> Result<(), OnvifError> {
        let caps = self
            .get_capabilities()
            .map_err(prerequisite("ContinuousMove", "GetCapabilities"))?;
        let ptz = caps.ptz_address().map(str::to_string).ok_or_else(|| {
            OnvifError::Precondition(
                "PTZ unsupported: device reports no PTZ service address".to_string(),
            )
        })?;
        let token = self.first_profile_token("ContinuousMove")?;

        self.send("ContinuousMove", &ptz, &ContinuousMove::new(&token, command), true)?;
        debug!(address = %self.credentials.address, %command, "continuous move accepted");
        Ok(())
    }

    fn media_address(&mut self, operation: &'static str) -> Result<String, OnvifError> {
        let caps = self
            .get_capabilities()
            .map_err(prerequisite(operation, "GetCapabilities"))?;
        caps.media_address().map(str::to_string).ok_or_else(|| {
            OnvifError::Precondition(format!(
                "{}: device reports no media service address",
                operation
            ))
        })
    }

    fn first_profile_token(&mut self, operation: &'static str) -> Result<String, OnvifError> {
        let profiles = self
            .get_profiles()
            .map_err(prerequisite(operation, "GetProfiles"))?;
        profiles
            .first()
            .map(|profile| profile.token.clone())
            .ok_or_else(|| {
                OnvifError::Precondition(format!("{}: device returned no media profiles", operation))
            })
    }

    fn call<B: SoapBody, R: FromSoap>(
        &self,
        operation: &'static str,
        url: &str,
        body: &B,
        authenticated: bool,
    ) -> Result<R, OnvifError> {
        let response = self.send(operation, url, body, authenticated)?;
        R::from_soap(&response)
    }

    fn build_request<B: SoapBody>(
        &self,
        url: Url,
        body: &B,
        authenticated: bool,
    ) -> Result<HttpRequest, OnvifError> {
        let mut envelope = Envelope::new();
        envelope.add_body(body)?;
        if authenticated {
            envelope.add_security_header(&self.credentials.username, &self.credentials.password)?;
        }

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static(SOAP_CONTENT_TYPE));
        if let Some(action) = B::ACTION {
            headers.insert(SOAP_ACTION, HeaderValue::from_static(action));
        }

        Ok(HttpRequest {
            url,
            headers,
            body: envelope.serialize()?,
        })
    }

    /// POST one envelope, answering a single Digest challenge. Returns the
    /// body of a 200 response.
    fn send<B: SoapBody>(
        &self,
        operation: &'static str,
        url: &str,
        body: &B,
        authenticated: bool,
    ) -> Result<Vec<u8>, OnvifError> {
        let url = Url::parse(url).map_err(|e| {
            OnvifError::RequestBuild(format!("{}: invalid service address {:?}: {}", operation, url, e))
        })?;

        let request = self.build_request(url.clone(), body, authenticated)?;
        debug!(operation, url = %request.url, "sending request");
        let mut response = self.transport.post(&request)?;

        if response.status == StatusCode::UNAUTHORIZED {
            warn!(operation, url = %url, "device requested HTTP Digest authentication");
            let mut challenge = DigestChallenge::from_headers(&response.headers).ok_or_else(|| {
                OnvifError::Authentication {
                    operation,
                    reason: "401 without a usable Digest challenge".to_string(),
                }
            })?;

            // Rebuilt so the retry carries a fresh WS-Security token
            let mut retry = self.build_request(url, body, authenticated)?;
            let authorization = challenge
                .authorization(
                    &self.credentials.username,
                    &self.credentials.password,
                    &digest::request_uri(&retry.url),
                    &digest::new_cnonce(),
                )?
                .to_header_string();
            retry.headers = digest::retry_headers(&retry, &authorization, &self.config.user_agent)?;

            response = self.transport.post(&retry)?;
            if response.status == StatusCode::UNAUTHORIZED {
                return Err(OnvifError::Authentication {
                    operation,
                    reason: format!(
                        "credentials for '{}' rejected after Digest retry",
                        self.credentials.username
                    ),
                });
            }
        }

        if response.status != StatusCode::OK {
            let fault = soap::fault_reason(&response.body);
            warn!(
                operation,
                status = %response.status,
                fault = fault.as_deref().unwrap_or("-"),
                "request failed"
            );
            return Err(OnvifError::Status {
                operation,
                status: response.status,
                fault,
            });
        }

        Ok(response.body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Phase;
    use crate::mock::{self, MockTransport, MEDIA, PTZ, RTSP};
    use reqwest::header::AUTHORIZATION;

    fn session(transport: &Arc<MockTransport>) -> DeviceSession {
        DeviceSession::new(
            DeviceCredentials::new("admin", "pass", "10.0.0.5"),
            ClientConfig::default(),
            transport.clone(),
        )
    }

    fn full_device() -> Vec<crate::transport::HttpResponse> {
        vec![
            mock::ok(&mock::capabilities_xml(MEDIA, PTZ)),
            mock::ok(&mock::profiles_xml(&["Profile_1", "Profile_2"])),
            mock::ok(&mock::stream_uri_xml(RTSP)),
        ]
    }

    fn credentials() -> ws_security::Credentials {
        ws_security::Credentials {
            username: "admin".to_string(),
            password: "pass".to_string(),
        }
    }

    /// Value of `key="..."` in an Authorization header
    fn auth_param(header: &str, key: &str) -> String {
        let start = header.find(&format!("{}=\"", key)).unwrap() + key.len() + 2;
        let end = header[start..].find('"').unwrap() + start;
        header[start..end].to_string()
    }

    #[test]
    fn test_stream_uri_fetches_prerequisites_once_in_order() {
        let transport = Arc::new(MockTransport::new(full_device()));
        let mut session = session(&transport);
        assert_eq!(session.state(), SessionState::NoCapabilities);

        assert_eq!(session.get_stream_uri().unwrap().uri, RTSP);
        assert_eq!(session.get_stream_uri().unwrap().uri, RTSP);

        assert_eq!(
            transport.operations(),
            vec!["GetCapabilities", "GetProfiles", "GetStreamUri"]
        );
        let urls: Vec<String> = transport
            .requests()
            .iter()
            .map(|r| r.url.to_string())
            .collect();
        assert_eq!(
            urls,
            vec!["http://10.0.0.5/onvif/device_service", MEDIA, MEDIA]
        );
        assert_eq!(session.state(), SessionState::HasStreamUri);
        assert_eq!(session.profiles().unwrap().len(), 2);
    }

    #[test]
    fn test_stream_uri_uses_first_profile() {
        let transport = Arc::new(MockTransport::new(full_device()));
        session(&transport).get_stream_uri().unwrap();

        let body = mock::body_text(&transport.requests()[2]);
        assert!(body.contains("<trt:ProfileToken>Profile_1</trt:ProfileToken>"));
        assert!(body.contains("<tt:Stream>RTP-Unicast</tt:Stream>"));
        assert!(body.contains("<tt:Protocol>UDP</tt:Protocol>"));
    }

    #[test]
    fn test_security_header_only_on_authenticated_calls() {
        let transport = Arc::new(MockTransport::new(full_device()));
        session(&transport).get_stream_uri().unwrap();
        let requests = transport.requests();

        let capabilities = mock::body_text(&requests[0]);
        assert!(!capabilities.contains("wsse:Security"));
        assert!(ws_security::extract_token(&capabilities).is_err());

        for request in &requests[1..] {
            let body = mock::body_text(request);
            ws_security::authenticate(&body, &credentials(), 300).unwrap();
        }
    }

    #[test]
    fn test_request_headers() {
        let transport = Arc::new(MockTransport::new(full_device()));
        session(&transport).get_stream_uri().unwrap();
        let requests = transport.requests();

        for request in &requests {
            assert_eq!(request.headers[CONTENT_TYPE], SOAP_CONTENT_TYPE);
        }
        assert!(requests[0].headers.get(&SOAP_ACTION).is_none());
        assert_eq!(
            requests[1].headers[&SOAP_ACTION],
            crate::media::GET_PROFILES_ACTION
        );
        assert_eq!(
            requests[2].headers[&SOAP_ACTION],
            crate::media::GET_STREAM_URI_ACTION
        );
    }

    #[test]
    fn test_zero_profiles_is_precondition_failure() {
        let transport = Arc::new(MockTransport::new(vec![
            mock::ok(&mock::capabilities_xml(MEDIA, PTZ)),
            mock::ok(&mock::profiles_xml(&[])),
        ]));
        let mut session = session(&transport);

        let err = session.get_stream_uri().unwrap_err();
        assert_eq!(err.phase(), Phase::Precondition);
        assert_eq!(session.state(), SessionState::HasProfiles);

        let err = session.ptz_continuous_move(PtzCommand::Left).unwrap_err();
        assert_eq!(err.phase(), Phase::Precondition);
        assert_eq!(transport.operations(), vec!["GetCapabilities", "GetProfiles"]);
    }

    #[test]
    fn test_ptz_unsupported_skips_profiles() {
        let transport = Arc::new(MockTransport::new(vec![mock::ok(
            &mock::capabilities_xml(MEDIA, ""),
        )]));
        let mut session = session(&transport);

        let err = session.ptz_continuous_move(PtzCommand::Left).unwrap_err();
        assert!(matches!(&err, OnvifError::Precondition(msg) if msg.contains("PTZ unsupported")));
        assert_eq!(transport.operations(), vec!["GetCapabilities"]);
        assert_eq!(session.state(), SessionState::HasCapabilities);
    }

    #[test]
    fn test_continuous_move() {
        let transport = Arc::new(MockTransport::new(vec![
            mock::ok(&mock::capabilities_xml(MEDIA, PTZ)),
            mock::ok(&mock::profiles_xml(&["Profile_1"])),
            mock::ok(&mock::continuous_move_xml()),
            mock::ok(""),
        ]));
        let mut session = session(&transport);

        session.ptz_continuous_move(PtzCommand::Left).unwrap();
        session.ptz_continuous_move(PtzCommand::Stop).unwrap();
        assert_eq!(session.state(), SessionState::HasProfiles);

        let requests = transport.requests();
        assert_eq!(requests.len(), 4);
        assert_eq!(requests[2].url.as_str(), PTZ);
        assert_eq!(
            requests[2].headers[&SOAP_ACTION],
            crate::ptz::CONTINUOUS_MOVE_ACTION
        );

        let left = mock::body_text(&requests[2]);
        assert!(left.contains("<tptz:ProfileToken>Profile_1</tptz:ProfileToken>"));
        assert!(left.contains(r#"<tt:PanTilt x="1" y="0""#));
        assert!(left.contains("<tptz:Timeout>PT00H01M00S</tptz:Timeout>"));
        ws_security::authenticate(&left, &credentials(), 300).unwrap();

        let stop = mock::body_text(&requests[3]);
        assert!(stop.contains(r#"<tt:PanTilt x="0" y="0""#));
    }

    #[test]
    fn test_digest_retry_uses_session_credentials() {
        let transport = Arc::new(MockTransport::new(vec![
            mock::ok(&mock::capabilities_xml(MEDIA, PTZ)),
            mock::unauthorized(Some(mock::CHALLENGE)),
            mock::ok(&mock::profiles_xml(&["Profile_1"])),
        ]));
        let mut session = session(&transport);
        assert_eq!(session.get_profiles().unwrap().len(), 1);

        let requests = transport.requests();
        assert_eq!(requests.len(), 3);
        assert!(requests[1].headers.get(AUTHORIZATION).is_none());

        let retry = &requests[2];
        let header = retry.headers[AUTHORIZATION].to_str().unwrap();
        assert_eq!(auth_param(header, "username"), "admin");
        assert_eq!(auth_param(header, "uri"), "/onvif/media");
        assert_eq!(auth_param(header, "opaque"), "0pq");

        assert!(header.contains("nc=00000001"));

        let mut challenge = DigestChallenge::parse(mock::CHALLENGE).unwrap();
        let expected = challenge
            .authorization("admin", "pass", "/onvif/media", &auth_param(header, "cnonce"))
            .unwrap();
        assert_eq!(auth_param(header, "response"), expected.response);

        assert_eq!(retry.headers[reqwest::header::HOST], "10.0.0.5");
        assert_eq!(retry.headers[&SOAP_ACTION], crate::media::GET_PROFILES_ACTION);

        // The retried envelope carries its own token
        let first = ws_security::extract_token(&mock::body_text(&requests[1])).unwrap();
        let second = ws_security::extract_token(&mock::body_text(retry)).unwrap();
        assert_ne!(first.nonce, second.nonce);
    }

    #[test]
    fn test_digest_retry_happens_once() {
        let transport = Arc::new(MockTransport::new(vec![
            mock::unauthorized(Some(mock::CHALLENGE)),
            mock::unauthorized(Some(mock::CHALLENGE)),
            mock::unauthorized(Some(mock::CHALLENGE)),
        ]));
        let mut session = session(&transport);

        let err = session.get_capabilities().unwrap_err();
        assert_eq!(err.phase(), Phase::Authentication);
        assert_eq!(transport.requests().len(), 2);
        assert_eq!(session.state(), SessionState::NoCapabilities);
    }

    #[test]
    fn test_401_without_digest_challenge() {
        let transport = Arc::new(MockTransport::new(vec![mock::unauthorized(Some(
            r#"Basic realm="cam""#,
        ))]));
        let err = session(&transport).get_capabilities().unwrap_err();
        assert!(matches!(err, OnvifError::Authentication { .. }));
        assert_eq!(transport.requests().len(), 1);
    }

    #[test]
    fn test_failed_prerequisite_keeps_state() {
        let transport = Arc::new(MockTransport::new(vec![
            mock::ok(&mock::capabilities_xml(MEDIA, PTZ)),
            mock::status(
                StatusCode::BAD_REQUEST,
                &mock::fault_xml("Sender not Authorized"),
            ),
        ]));
        let mut session = session(&transport);

        let err = session.get_stream_uri().unwrap_err();
        assert!(matches!(
            &err,
            OnvifError::Prerequisite { operation: "GetStreamUri", prerequisite: "GetProfiles", .. }
        ));
        assert!(matches!(
            err.root_cause(),
            OnvifError::Status { status, fault: Some(f), .. }
                if *status == StatusCode::BAD_REQUEST && f == "Sender not Authorized"
        ));
        assert_eq!(session.state(), SessionState::HasCapabilities);

        transport.push(mock::ok(&mock::profiles_xml(&["Profile_1"])));
        transport.push(mock::ok(&mock::stream_uri_xml(RTSP)));
        assert_eq!(session.get_stream_uri().unwrap().uri, RTSP);
        assert_eq!(
            transport.operations(),
            vec!["GetCapabilities", "GetProfiles", "GetProfiles", "GetStreamUri"]
        );
    }

    #[test]
    fn test_stream_uri_without_uri_is_not_cached() {
        let transport = Arc::new(MockTransport::new(vec![
            mock::ok(&mock::capabilities_xml(MEDIA, PTZ)),
            mock::ok(&mock::profiles_xml(&["Profile_1"])),
            mock::ok(&mock::stream_uri_xml("")),
        ]));
        let mut session = session(&transport);

        let err = session.get_stream_uri().unwrap_err();
        assert_eq!(err.root_cause().phase(), Phase::Decode);
        assert_eq!(session.state(), SessionState::HasProfiles);
        assert!(session.stream_uri().is_none());

        transport.push(mock::ok(&mock::stream_uri_xml(RTSP)));
        assert_eq!(session.get_stream_uri().unwrap().uri, RTSP);
        assert_eq!(
            transport.operations(),
            vec!["GetCapabilities", "GetProfiles", "GetStreamUri", "GetStreamUri"]
        );
    }

    #[test]
    fn test_profile_without_token_blocks_move() {
        let transport = Arc::new(MockTransport::new(vec![
            mock::ok(&mock::capabilities_xml(MEDIA, PTZ)),
            mock::ok(&mock::envelope(
                "<trt:GetProfilesResponse><trt:Profiles><tt:Name>x</tt:Name></trt:Profiles>\
                 </trt:GetProfilesResponse>",
            )),
        ]));
        let mut session = session(&transport);

        let err = session.ptz_continuous_move(PtzCommand::Left).unwrap_err();
        assert!(matches!(
            &err,
            OnvifError::Prerequisite { operation: "ContinuousMove", prerequisite: "GetProfiles", .. }
        ));
        assert_eq!(err.root_cause().phase(), Phase::Decode);
        assert_eq!(session.state(), SessionState::HasCapabilities);
        assert_eq!(transport.operations(), vec!["GetCapabilities", "GetProfiles"]);
    }

    #[test]
    fn test_decode_failure_leaves_session_empty() {
        let transport = Arc::new(MockTransport::new(vec![mock::ok("<html>not soap")]));
        let mut session = session(&transport);

        let err = session.get_capabilities().unwrap_err();
        assert_eq!(err.phase(), Phase::Decode);
        assert!(session.capabilities().is_none());
    }

    #[test]
    fn test_transport_failure_is_wrapped_by_prerequisite() {
        let transport = Arc::new(MockTransport::default());
        let err = session(&transport).get_stream_uri().unwrap_err();

        assert_eq!(err.phase(), Phase::Prerequisite);
        assert_eq!(err.root_cause().phase(), Phase::Transport);
    }

    #[test]
    fn test_missing_media_address() {
        let transport = Arc::new(MockTransport::new(vec![mock::ok(
            &mock::capabilities_xml("", PTZ),
        )]));
        let err = session(&transport).get_profiles().unwrap_err();
        assert_eq!(err.phase(), Phase::Precondition);
        assert_eq!(transport.requests().len(), 1);
    }
}
