//! Message shapes of the ER>B webservice versions.
//!
//! Both versions wrap the invoice, the attachments and a settings block in one
//! document/literal request element and answer with either a `Success` or an
//! `Error` element. A [`Protocol`] is a zero-sized descriptor carrying the
//! names and URLs that differ between versions.

use crate::soap::envelope::{child_elements, find_child, is_named, local_name, text_element, text_of};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use erb_core::{
    Attachment, DeliveryError, DeliveryResult, DeliverySettings, DeliverySuccess, ErrorDetail,
    InvoiceEncoding, FIELD_DOCUMENT,
};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use xmltree::{Element, XMLNode};

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("response contains neither Success nor Error: <{0}>")]
    Unexpected(String),
}

/// The invoice as it goes on the wire.
#[derive(Debug, Clone, Copy)]
pub struct InvoicePayload<'a> {
    pub bytes: &'a [u8],
    pub encoding: InvoiceEncoding,
}

pub trait Protocol: Send + Sync + 'static {
    /// Version label used in logs, e.g. `1.2`.
    const NAME: &'static str;
    const NAMESPACE: &'static str;
    const PREFIX: &'static str;
    const PRODUCTION_URL: &'static str;
    const TEST_URL: &'static str;
    const SOAP_ACTION: &'static str;
    /// Request element inside the SOAP Body.
    const OPERATION: &'static str;
    const DOCUMENT_ELEMENT: &'static str;
    const ATTACHMENT_ELEMENT: &'static str;
    /// Fault detail entry signalling that the service rejected the document.
    const FAULT_DETAIL: &'static str;
    /// Path from `Error` to the individual `ErrorDetail` elements.
    const ERROR_DETAIL_PATH: &'static [&'static str];
    /// Success children holding the reference the service assigned.
    const DOCUMENT_ID_FIELDS: &'static [&'static str];

    fn request_payload(
        invoice: InvoicePayload<'_>,
        attachments: &[Attachment],
        settings: &DeliverySettings,
    ) -> Element {
        let qname = |local: &str| format!("{}:{local}", Self::PREFIX);

        let mut request = Element::new(&qname(Self::OPERATION));
        request
            .attributes
            .insert(format!("xmlns:{}", Self::PREFIX), Self::NAMESPACE.to_string());

        let mut document = text_element(&qname(Self::DOCUMENT_ELEMENT), &STANDARD.encode(invoice.bytes));
        document
            .attributes
            .insert("encoding".to_string(), invoice.encoding.name().to_string());
        request.children.push(XMLNode::Element(document));

        for attachment in attachments {
            let mut element = text_element(
                &qname(Self::ATTACHMENT_ELEMENT),
                &STANDARD.encode(&attachment.content),
            );
            element
                .attributes
                .insert("name".to_string(), attachment.name.clone());
            element
                .attributes
                .insert("mimeType".to_string(), attachment.mime_type.clone());
            request.children.push(XMLNode::Element(element));
        }

        let mut settings_element = Element::new(&qname("Settings"));
        if let Some(test) = settings.test {
            settings_element.children.push(XMLNode::Element(text_element(
                &qname("Test"),
                if test { "true" } else { "false" },
            )));
        }
        request.children.push(XMLNode::Element(settings_element));
        request
    }

    /// Maps the Body payload of a regular (non-fault) response.
    fn decode_response(payload: &Element) -> Result<DeliveryResult, DecodeError> {
        let outcome = if is_named(payload, "Success") || is_named(payload, "Error") {
            Some(payload)
        } else {
            child_elements(payload).find(|e| is_named(e, "Success") || is_named(e, "Error"))
        };

        match outcome {
            Some(success) if is_named(success, "Success") => {
                let mut fields = Vec::new();
                collect_leaves(success, &mut fields);
                let document_id = Self::DOCUMENT_ID_FIELDS.iter().find_map(|name| {
                    fields
                        .iter()
                        .find(|(k, _)| k == name)
                        .map(|(_, v)| v.clone())
                });
                Ok(DeliveryResult::Success(DeliverySuccess {
                    document_id,
                    fields,
                }))
            }
            Some(error) => Ok(DeliveryResult::Error(decode_error(
                error,
                Self::ERROR_DETAIL_PATH,
            ))),
            None => Err(DecodeError::Unexpected(local_name(&payload.name).to_string())),
        }
    }
}

fn collect_leaves(element: &Element, out: &mut Vec<(String, String)>) {
    for child in child_elements(element) {
        if child_elements(child).next().is_some() {
            collect_leaves(child, out);
        } else if let Some(text) = text_of(child) {
            out.push((local_name(&child.name).to_string(), text));
        }
    }
}

fn detail_elements<'a>(parent: &'a Element, path: &[&str], out: &mut Vec<&'a Element>) {
    match path {
        [] => out.push(parent),
        [head, rest @ ..] => {
            for child in child_elements(parent).filter(|e| is_named(e, head)) {
                detail_elements(child, rest, out);
            }
        }
    }
}

fn decode_error(error: &Element, path: &[&str]) -> DeliveryError {
    let mut elements = Vec::new();
    detail_elements(error, path, &mut elements);

    let details: Vec<ErrorDetail> = elements
        .into_iter()
        .map(|detail| {
            let field = find_child(detail, "Field")
                .and_then(text_of)
                .unwrap_or_else(|| FIELD_DOCUMENT.to_string());
            let message = find_child(detail, "Message")
                .and_then(text_of)
                .or_else(|| text_of(detail))
                .unwrap_or_default();
            ErrorDetail::new(field, message)
        })
        .collect();

    if details.is_empty() {
        let message = text_of(error).unwrap_or_else(|| "the service reported an error".into());
        return DeliveryError::new(FIELD_DOCUMENT, [message]);
    }
    DeliveryError { details }
}

/// Webservice version chosen by name, e.g. from a settings file.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum ProtocolVersion {
    V1_2,
    #[default]
    V2_0,
}

impl ProtocolVersion {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProtocolVersion::V1_2 => "1.2",
            ProtocolVersion::V2_0 => "2.0",
        }
    }
}

impl fmt::Display for ProtocolVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
#[error("unknown webservice version {0:?}, expected 1.2 or 2.0")]
pub struct UnknownVersion(pub String);

impl FromStr for ProtocolVersion {
    type Err = UnknownVersion;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().trim_start_matches(['v', 'V']) {
            "1.2" | "12" | "1" => Ok(ProtocolVersion::V1_2),
            "2.0" | "20" | "2" => Ok(ProtocolVersion::V2_0),
            _ => Err(UnknownVersion(s.to_string())),
        }
    }
}
