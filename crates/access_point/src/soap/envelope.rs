//! SOAP 1.1 envelopes as mutable `xmltree` elements.
//!
//! Elements built here carry their prefix inline in the name (`soapenv:Body`);
//! parsed elements carry it separately. Lookups therefore go by local name.

use std::io::BufReader;
use thiserror::Error;
use xmltree::{Element, EmitterConfig, XMLNode};

pub const SOAP11_ENV_NS: &str = "http://schemas.xmlsoap.org/soap/envelope/";
pub const SOAP_ENV_PREFIX: &str = "soapenv";
pub const CONTENT_TYPE: &str = "text/xml; charset=utf-8";

#[derive(Debug, Error)]
pub enum EnvelopeError {
    #[error("failed to parse SOAP message: {0}")]
    Parse(#[from] xmltree::ParseError),
    #[error("failed to write SOAP message: {0}")]
    Write(#[from] xmltree::Error),
    #[error("expected a SOAP Envelope but found <{0}>")]
    NotAnEnvelope(String),
    #[error("SOAP envelope has no Body")]
    MissingBody,
}

pub fn local_name(name: &str) -> &str {
    name.rsplit(':').next().unwrap_or(name)
}

/// Prefix of an element, whether it was built with an inline prefix or parsed.
pub fn prefix_of(element: &Element) -> Option<&str> {
    match element.name.split_once(':') {
        Some((prefix, _)) => Some(prefix),
        None => element.prefix.as_deref(),
    }
}

pub fn is_named(element: &Element, local: &str) -> bool {
    local_name(&element.name) == local
}

pub fn child_elements(parent: &Element) -> impl Iterator<Item = &Element> {
    parent.children.iter().filter_map(XMLNode::as_element)
}

pub fn find_child<'a>(parent: &'a Element, local: &str) -> Option<&'a Element> {
    child_elements(parent).find(|e| is_named(e, local))
}

pub fn find_children<'a>(parent: &'a Element, local: &'a str) -> impl Iterator<Item = &'a Element> {
    child_elements(parent).filter(move |e| is_named(e, local))
}

pub fn find_child_mut<'a>(parent: &'a mut Element, local: &str) -> Option<&'a mut Element> {
    parent.children.iter_mut().find_map(|n| match n {
        XMLNode::Element(e) if is_named(e, local) => Some(e),
        _ => None,
    })
}

/// Trimmed text content; `None` when empty.
pub fn text_of(element: &Element) -> Option<String> {
    element
        .get_text()
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
}

pub fn child_text(parent: &Element, local: &str) -> Option<String> {
    find_child(parent, local).and_then(text_of)
}

pub fn text_element(name: &str, text: &str) -> Element {
    let mut element = Element::new(name);
    element.children.push(XMLNode::Text(text.to_string()));
    element
}

/// `soapenv:Envelope` holding `payload` as the only Body child. No Header is
/// created; handlers add one when they need it.
pub fn build_envelope(payload: Element) -> Element {
    let mut body = Element::new(&format!("{SOAP_ENV_PREFIX}:Body"));
    body.children.push(XMLNode::Element(payload));

    let mut envelope = Element::new(&format!("{SOAP_ENV_PREFIX}:Envelope"));
    envelope.attributes.insert(
        format!("xmlns:{SOAP_ENV_PREFIX}"),
        SOAP11_ENV_NS.to_string(),
    );
    envelope.children.push(XMLNode::Element(body));
    envelope
}

pub fn write_envelope(envelope: &Element) -> Result<Vec<u8>, EnvelopeError> {
    let mut buf = Vec::new();
    let config = EmitterConfig::new()
        .write_document_declaration(true)
        .perform_indent(false);
    envelope.write_with_config(&mut buf, config)?;
    Ok(buf)
}

pub fn parse_envelope(bytes: &[u8]) -> Result<Element, EnvelopeError> {
    let root = Element::parse(BufReader::new(bytes))?;
    if !is_named(&root, "Envelope") {
        return Err(EnvelopeError::NotAnEnvelope(root.name));
    }
    Ok(root)
}

pub fn body(envelope: &Element) -> Result<&Element, EnvelopeError> {
    find_child(envelope, "Body").ok_or(EnvelopeError::MissingBody)
}

/// First element inside the Body, i.e. the operation payload or a Fault.
pub fn body_payload(envelope: &Element) -> Result<Option<&Element>, EnvelopeError> {
    Ok(child_elements(body(envelope)?).next())
}
