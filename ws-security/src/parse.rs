//! XML parsing for WS-Security UsernameToken
//!
//! Reads the token back out of a SOAP envelope, matching on local names so the
//! `wsse`/`wsu` prefixes chosen by the sender do not matter.

use quick_xml::events::Event;
use quick_xml::Reader;

use crate::error::WsSecurityError;
use crate::token::UsernameToken;

#[derive(Default)]
struct Fields {
    username: Option<String>,
    password_digest: Option<String>,
    nonce: Option<String>,
    created: Option<String>,
}

/// Parse the UsernameToken out of `Envelope/Header/Security/UsernameToken`
pub fn parse_username_token(xml: &str) -> Result<UsernameToken, WsSecurityError> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut stack: Vec<String> = Vec::new();
    let mut saw_security = false;
    let mut fields = Fields::default();

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => {
                let name = String::from_utf8_lossy(e.local_name().as_ref()).to_string();
                if name == "Security" {
                    saw_security = true;
                }
                stack.push(name);
            }
            Ok(Event::End(_)) => {
                stack.pop();
            }
            Ok(Event::Text(e)) => {
                let in_token = stack.len() >= 2 && stack[stack.len() - 2] == "UsernameToken";
                if !in_token {
                    continue;
                }
                let text = e
                    .unescape()
                    .map_err(|e| WsSecurityError::XmlError(e.to_string()))?
                    .to_string();
                let slot = match stack.last().map(String::as_str) {
                    Some("Username") => &mut fields.username,
                    Some("Password") => &mut fields.password_digest,
                    Some("Nonce") => &mut fields.nonce,
                    Some("Created") => &mut fields.created,
                    _ => continue,
                };
                *slot = Some(text);
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(WsSecurityError::XmlError(e.to_string())),
            _ => {}
        }
    }

    if !saw_security {
        return Err(WsSecurityError::MissingSecurityHeader);
    }

    let missing = |name: &str| WsSecurityError::MissingElement(name.to_string());
    Ok(UsernameToken {
        username: fields.username.ok_or_else(|| missing("Username"))?,
        password_digest: fields.password_digest.ok_or_else(|| missing("Password"))?,
        nonce: fields.nonce.ok_or_else(|| missing("Nonce"))?,
        created: fields.created.ok_or_else(|| missing("Created"))?,
    })
}
