//! quick-xml helpers shared by the record types
//!
//! Writing goes through [`Writer`] with explicit prefixed names. Reading walks
//! the document with [`Reader`], tracking the path of local names so record
//! decoders can match on paths regardless of which prefixes a device picks.

use std::str::FromStr;

use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};

use crate::error::OnvifError;

pub type XmlWriter = Writer<Vec<u8>>;

fn write_failed<E: std::fmt::Display>(e: E) -> OnvifError {
    OnvifError::RequestBuild(format!("XML write failed: {}", e))
}

fn decode_failed<E: std::fmt::Display>(e: E) -> OnvifError {
    OnvifError::Decode(format!("malformed XML: {}", e))
}

fn element<'a>(name: &'a str, attrs: &[(&str, &str)]) -> BytesStart<'a> {
    let mut elem = BytesStart::new(name);
    for attr in attrs {
        elem.push_attribute(*attr);
    }
    elem
}

pub(crate) fn start(w: &mut XmlWriter, name: &str, attrs: &[(&str, &str)]) -> Result<(), OnvifError> {
    w.write_event(Event::Start(element(name, attrs)))
        .map_err(write_failed)
}

pub(crate) fn end(w: &mut XmlWriter, name: &str) -> Result<(), OnvifError> {
    w.write_event(Event::End(BytesEnd::new(name)))
        .map_err(write_failed)
}

pub(crate) fn empty(w: &mut XmlWriter, name: &str, attrs: &[(&str, &str)]) -> Result<(), OnvifError> {
    w.write_event(Event::Empty(element(name, attrs)))
        .map_err(write_failed)
}

/// `<name attrs...>text</name>`, with `text` escaped
pub(crate) fn text_element(
    w: &mut XmlWriter,
    name: &str,
    attrs: &[(&str, &str)],
    text: &str,
) -> Result<(), OnvifError> {
    start(w, name, attrs)?;
    w.write_event(Event::Text(BytesText::new(text)))
        .map_err(write_failed)?;
    end(w, name)
}

/// Append pre-rendered XML verbatim
pub(crate) fn raw(w: &mut XmlWriter, fragment: &[u8]) {
    w.get_mut().extend_from_slice(fragment);
}

/// A node visited by [`walk`]. `path` holds local names from the root down to
/// and including the current element.
pub(crate) enum Node<'a> {
    Open {
        path: &'a [String],
        attrs: &'a [(String, String)],
    },
    Text {
        path: &'a [String],
        text: &'a str,
    },
}

/// Walk a document, calling `visit` for every element and non-blank text run
pub(crate) fn walk<F>(xml: &[u8], mut visit: F) -> Result<(), OnvifError>
where
    F: FnMut(Node<'_>) -> Result<(), OnvifError>,
{
    let text = std::str::from_utf8(xml)
        .map_err(|e| OnvifError::Decode(format!("response is not UTF-8: {}", e)))?;
    let mut reader = Reader::from_str(text);
    reader.config_mut().trim_text(true);

    let mut path: Vec<String> = Vec::new();
    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => {
                let attrs = attributes(&e)?;
                path.push(local_name(&e));
                visit(Node::Open {
                    path: &path,
                    attrs: &attrs,
                })?;
            }
            Ok(Event::Empty(e)) => {
                let attrs = attributes(&e)?;
                path.push(local_name(&e));
                visit(Node::Open {
                    path: &path,
                    attrs: &attrs,
                })?;
                path.pop();
            }
            Ok(Event::Text(e)) => {
                let value = e.unescape().map_err(decode_failed)?;
                if !value.is_empty() {
                    visit(Node::Text {
                        path: &path,
                        text: &value,
                    })?;
                }
            }
            Ok(Event::CData(e)) => {
                let value = String::from_utf8_lossy(&e.into_inner()).to_string();
                visit(Node::Text {
                    path: &path,
                    text: value.trim(),
                })?;
            }
            Ok(Event::End(_)) => {
                path.pop();
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(decode_failed(e)),
            _ => {}
        }
    }

    if !path.is_empty() {
        return Err(OnvifError::Decode(format!(
            "document truncated inside <{}>",
            path.join("/")
        )));
    }
    Ok(())
}

fn local_name(e: &BytesStart<'_>) -> String {
    String::from_utf8_lossy(e.local_name().as_ref()).to_string()
}

fn attributes(e: &BytesStart<'_>) -> Result<Vec<(String, String)>, OnvifError> {
    let mut attrs = Vec::new();
    for attr in e.attributes() {
        let attr = attr.map_err(decode_failed)?;
        let raw_key = attr.key.as_ref();
        if raw_key == b"xmlns" || raw_key.starts_with(b"xmlns:") {
            continue;
        }
        let key = String::from_utf8_lossy(attr.key.local_name().as_ref()).to_string();
        let value = attr.unescape_value().map_err(decode_failed)?.to_string();
        attrs.push((key, value));
    }
    Ok(attrs)
}

/// The part of `path` below the first element named `anchor`
pub(crate) fn below<'p>(path: &'p [String], anchor: &str) -> Option<Vec<&'p str>> {
    let pos = path.iter().position(|seg| seg == anchor)?;
    Some(path[pos + 1..].iter().map(String::as_str).collect())
}

pub(crate) fn attr<'a>(attrs: &'a [(String, String)], name: &str) -> Option<&'a str> {
    attrs
        .iter()
        .find(|(key, _)| key == name)
        .map(|(_, value)| value.as_str())
}

/// xs:boolean
pub(crate) fn parse_bool(field: &str, text: &str) -> Result<bool, OnvifError> {
    match text.trim() {
        "true" | "1" => Ok(true),
        "false" | "0" => Ok(false),
        other => Err(OnvifError::Decode(format!(
            "{}: expected boolean, got {:?}",
            field, other
        ))),
    }
}

pub(crate) fn parse_num<T: FromStr>(field: &str, text: &str) -> Result<T, OnvifError> {
    text.trim().parse().map_err(|_| {
        OnvifError::Decode(format!("{}: expected number, got {:?}", field, text))
    })
}
