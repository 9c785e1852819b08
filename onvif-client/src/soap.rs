//! SOAP 1.2 envelope construction and fault extraction
//!
//! The envelope root declares the full ONVIF/WS-* namespace set. Request
//! records write their elements with these exact prefixes (`tds`, `trt`,
//! `tptz`, `tt`, `wsse`, `wsu`), so the two must stay in sync.

use quick_xml::events::{BytesDecl, Event};
use quick_xml::Writer;
use tracing::debug;
use ws_security::{UsernameToken, BASE64_BINARY_ENCODING, PASSWORD_DIGEST_TYPE};

use crate::error::OnvifError;
use crate::xml::{self, Node, XmlWriter};

pub const ENVELOPE: &str = "soap-env:Envelope";
pub const HEADER: &str = "soap-env:Header";
pub const BODY: &str = "soap-env:Body";

/// Namespace declarations placed on every envelope root
pub const NAMESPACES: &[(&str, &str)] = &[
    ("xmlns:soap-env", "http://www.w3.org/2003/05/soap-envelope"),
    ("xmlns:soap-enc", "http://www.w3.org/2003/05/soap-encoding"),
    ("xmlns:xsi", "http://www.w3.org/2001/XMLSchema-instance"),
    ("xmlns:xsd", "http://www.w3.org/2001/XMLSchema"),
    ("xmlns:wsa", "http://schemas.xmlsoap.org/ws/2004/08/addressing"),
    ("xmlns:wsdd", "http://schemas.xmlsoap.org/ws/2005/04/discovery"),
    ("xmlns:c14n", "http://www.w3.org/2001/10/xml-exc-c14n#"),
    ("xmlns:ds", "http://www.w3.org/2000/09/xmldsig#"),
    ("xmlns:saml1", "urn:oasis:names:tc:SAML:1.0:assertion"),
    ("xmlns:saml2", "urn:oasis:names:tc:SAML:2.0:assertion"),
    ("xmlns:wsu", ws_security::WSU_NS),
    ("xmlns:xenc", "http://www.w3.org/2001/04/xmlenc#"),
    ("xmlns:wsc", "http://docs.oasis-open.org/ws-sx/ws-secureconversation/200512"),
    ("xmlns:wsse", ws_security::WSSE_NS),
    ("xmlns:xmime", "http://tempuri.org/xmime.xsd"),
    ("xmlns:xop", "http://www.w3.org/2004/08/xop/include"),
    ("xmlns:wsa5", "http://www.w3.org/2005/08/addressing"),
    ("xmlns:wstop", "http://docs.oasis-open.org/wsn/t-1"),
    ("xmlns:tt", "http://www.onvif.org/ver10/schema"),
    ("xmlns:wsrfbf", "http://docs.oasis-open.org/wsrf/bf-2"),
    ("xmlns:wsrfr", "http://docs.oasis-open.org/wsrf/r-2"),
    ("xmlns:tdn", "http://www.onvif.org/ver10/network/wsdl"),
    ("xmlns:tds", "http://www.onvif.org/ver10/device/wsdl"),
    ("xmlns:tev", "http://www.onvif.org/ver10/events/wsdl"),
    ("xmlns:wsnt", "http://docs.oasis-open.org/wsn/b-2"),
    ("xmlns:tmd", "http://www.onvif.org/ver10/deviceIO/wsdl"),
    ("xmlns:tptz", "http://www.onvif.org/ver20/ptz/wsdl"),
    ("xmlns:tr2", "http://www.onvif.org/ver20/media/wsdl"),
    ("xmlns:trt", "http://www.onvif.org/ver10/media/wsdl"),
];

/// A request record that renders itself as the single body element
pub trait SoapBody {
    /// WSDL action URI sent as `SOAPAction`, if the service expects one
    const ACTION: Option<&'static str>;

    fn write_xml(&self, w: &mut XmlWriter) -> Result<(), OnvifError>;
}

/// A response record decoded from a full SOAP envelope
pub trait FromSoap: Sized {
    fn from_soap(xml: &[u8]) -> Result<Self, OnvifError>;
}

/// SOAP envelope under construction
#[derive(Debug, Default)]
pub struct Envelope {
    security: Option<UsernameToken>,
    body: Option<Vec<u8>>,
}

impl Envelope {
    pub fn new() -> Self {
        Self::default()
    }

    /// Render `body` as the only child of `soap-env:Body`.
    ///
    /// An envelope carries exactly one body element; a second call fails.
    pub fn add_body<B: SoapBody>(&mut self, body: &B) -> Result<(), OnvifError> {
        if self.body.is_some() {
            return Err(OnvifError::RequestBuild(
                "envelope already has a body element".to_string(),
            ));
        }
        let mut w = Writer::new(Vec::new());
        body.write_xml(&mut w)?;
        self.body = Some(w.into_inner());
        Ok(())
    }

    /// Generate a fresh UsernameToken and place it in the header
    pub fn add_security_header(&mut self, username: &str, password: &str) -> Result<(), OnvifError> {
        self.add_security_token(UsernameToken::generate(username, password)?);
        Ok(())
    }

    /// Place an existing token in the header, replacing any previous one
    pub fn add_security_token(&mut self, token: UsernameToken) {
        self.security = Some(token);
    }

    /// Render the envelope as a UTF-8 XML document
    pub fn serialize(&self) -> Result<Vec<u8>, OnvifError> {
        let mut w = Writer::new(Vec::new());
        w.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))
            .map_err(|e| OnvifError::RequestBuild(format!("XML write failed: {}", e)))?;

        xml::start(&mut w, ENVELOPE, NAMESPACES)?;

        match &self.security {
            Some(token) => {
                xml::start(&mut w, HEADER, &[])?;
                write_security(&mut w, token)?;
                xml::end(&mut w, HEADER)?;
            }
            None => xml::empty(&mut w, HEADER, &[])?,
        }

        match &self.body {
            Some(body) => {
                xml::start(&mut w, BODY, &[])?;
                xml::raw(&mut w, body);
                xml::end(&mut w, BODY)?;
            }
            None => xml::empty(&mut w, BODY, &[])?,
        }

        xml::end(&mut w, ENVELOPE)?;
        Ok(w.into_inner())
    }
}

fn write_security(w: &mut XmlWriter, token: &UsernameToken) -> Result<(), OnvifError> {
    xml::start(w, "wsse:Security", &[])?;
    xml::start(w, "wsse:UsernameToken", &[])?;
    xml::text_element(w, "wsse:Username", &[], &token.username)?;
    xml::text_element(
        w,
        "wsse:Password",
        &[("Type", PASSWORD_DIGEST_TYPE)],
        &token.password_digest,
    )?;
    xml::text_element(
        w,
        "wsse:Nonce",
        &[("EncodingType", BASE64_BINARY_ENCODING)],
        &token.nonce,
    )?;
    xml::text_element(w, "wsu:Created", &[], &token.created)?;
    xml::end(w, "wsse:UsernameToken")?;
    xml::end(w, "wsse:Security")
}

/// Reason text of a SOAP Fault, if the document carries one.
///
/// Handles both SOAP 1.2 (`Fault/Reason/Text`) and SOAP 1.1 (`faultstring`).
pub fn fault_reason(xml: &[u8]) -> Option<String> {
    let mut reason = None;
    // Best effort: a body that breaks off after the reason still yields it
    let walked = xml::walk(xml, |node| {
        if let Node::Text { path, text } = node {
            if reason.is_none() {
                if let Some(rel) = xml::below(path, "Fault") {
                    if matches!(rel.as_slice(), ["Reason", "Text"] | ["faultstring"]) {
                        reason = Some(text.to_string());
                    }
                }
            }
        }
        Ok(())
    });
    if let Err(e) = walked {
        debug!(error = %e, found = reason.is_some(), "error body is not well-formed XML");
    }
    reason
}
