//! WS-Security `UsernameToken` header with a plain-text password, as ER>B
//! expects it.

use super::envelope::{find_child_mut, is_named, prefix_of, text_element, SOAP_ENV_PREFIX};
use super::handler::{HandlerError, MessageContext, SoapHandler};
use crate::config::ConfigError;
use std::fmt;
use xmltree::{Element, XMLNode};

pub const WSSE_NS: &str =
    "http://docs.oasis-open.org/wss/2004/01/oasis-200401-wss-wssecurity-secext-1.0.xsd";
pub const WSSE_PREFIX: &str = "wsse";

const MASK: &str = "********";

#[derive(Clone)]
pub struct WsseHeaderHandler {
    username: String,
    password: String,
}

impl WsseHeaderHandler {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Result<Self, ConfigError> {
        let username = username.into();
        let password = password.into();
        if username.trim().is_empty() {
            return Err(ConfigError::EmptyUsername);
        }
        if password.trim().is_empty() {
            return Err(ConfigError::EmptyPassword);
        }
        Ok(Self { username, password })
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    fn security_element(&self) -> Element {
        let mut token = Element::new(&format!("{WSSE_PREFIX}:UsernameToken"));
        token.children.push(XMLNode::Element(text_element(
            &format!("{WSSE_PREFIX}:Username"),
            &self.username,
        )));
        token.children.push(XMLNode::Element(text_element(
            &format!("{WSSE_PREFIX}:Password"),
            &self.password,
        )));

        let mut security = Element::new(&format!("{WSSE_PREFIX}:Security"));
        security
            .attributes
            .insert(format!("xmlns:{WSSE_PREFIX}"), WSSE_NS.to_string());
        security.children.push(XMLNode::Element(token));
        security
    }

    /// Replaces the password in a rendered outbound message for logging.
    pub fn mask_password(&self, message: &str) -> String {
        let open = format!("<{WSSE_PREFIX}:Password>");
        let close = format!("</{WSSE_PREFIX}:Password>");
        let Some(start) = message.find(&open) else {
            return message.to_string();
        };
        let value_start = start + open.len();
        match message[value_start..].find(&close) {
            Some(len) => format!(
                "{}{MASK}{}",
                &message[..value_start],
                &message[value_start + len..]
            ),
            None => message.to_string(),
        }
    }
}

/// Header element of the envelope, inserted in front of the Body when absent.
fn header_mut(envelope: &mut Element) -> Result<&mut Element, HandlerError> {
    if find_child_mut(envelope, "Header").is_none() {
        let prefix = prefix_of(envelope).unwrap_or(SOAP_ENV_PREFIX).to_string();
        let header = Element::new(&format!("{prefix}:Header"));
        let body_pos = envelope
            .children
            .iter()
            .position(|n| matches!(n, XMLNode::Element(e) if is_named(e, "Body")))
            .unwrap_or(0);
        envelope.children.insert(body_pos, XMLNode::Element(header));
    }
    find_child_mut(envelope, "Header").ok_or(HandlerError::Failed {
        handler: "WsseHeaderHandler",
        reason: "could not create SOAP header".into(),
    })
}

impl SoapHandler for WsseHeaderHandler {
    fn handle_message(&self, ctx: &mut MessageContext) -> Result<bool, HandlerError> {
        if !ctx.is_outbound() {
            return Ok(true);
        }
        ctx.ensure_envelope()?;
        let header = header_mut(ctx.envelope_mut())?;
        header.children.push(XMLNode::Element(self.security_element()));
        tracing::trace!(username = %self.username, "added WS-Security header");
        Ok(true)
    }
}

impl fmt::Debug for WsseHeaderHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WsseHeaderHandler")
            .field("username", &self.username)
            .field("password", &MASK)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::soap::envelope::{
        build_envelope, find_child, parse_envelope, write_envelope, SOAP11_ENV_NS,
    };

    fn outbound() -> MessageContext {
        MessageContext::outbound(build_envelope(text_element("Ping", "1")))
    }

    #[test]
    fn adds_username_token_to_outbound_messages() {
        let handler = WsseHeaderHandler::new("alice", "secret").unwrap();
        let mut ctx = outbound();
        assert!(handler.handle_message(&mut ctx).unwrap());

        let xml = String::from_utf8(write_envelope(ctx.envelope()).unwrap()).unwrap();
        let doc = roxmltree::Document::parse(&xml).unwrap();
        let root = doc.root_element();
        let header = root.first_element_child().unwrap();
        assert_eq!(header.tag_name().name(), "Header");
        assert_eq!(header.tag_name().namespace(), Some(SOAP11_ENV_NS));
        assert_eq!(
            header.next_sibling_element().unwrap().tag_name().name(),
            "Body"
        );

        let security = header.first_element_child().unwrap();
        assert_eq!(security.tag_name().name(), "Security");
        assert_eq!(security.tag_name().namespace(), Some(WSSE_NS));
        let token = security.first_element_child().unwrap();
        assert_eq!(token.tag_name().name(), "UsernameToken");
        let values: Vec<_> = token
            .children()
            .filter(|n| n.is_element())
            .map(|n| {
                (
                    n.tag_name().name(),
                    n.tag_name().namespace(),
                    n.text().unwrap_or_default(),
                )
            })
            .collect();
        assert_eq!(
            values,
            vec![
                ("Username", Some(WSSE_NS), "alice"),
                ("Password", Some(WSSE_NS), "secret"),
            ]
        );
    }

    #[test]
    fn reuses_an_existing_header() {
        let handler = WsseHeaderHandler::new("alice", "secret").unwrap();
        let xml = br#"<S:Envelope xmlns:S="http://schemas.xmlsoap.org/soap/envelope/"><S:Header><Trace>1</Trace></S:Header><S:Body/></S:Envelope>"#;
        let mut ctx = MessageContext::outbound(parse_envelope(xml).unwrap());
        handler.handle_message(&mut ctx).unwrap();

        let envelope = ctx.envelope();
        let headers = envelope
            .children
            .iter()
            .filter_map(XMLNode::as_element)
            .filter(|e| e.name == "Header")
            .count();
        assert_eq!(headers, 1);
        let header = find_child(envelope, "Header").unwrap();
        assert!(find_child(header, "Trace").is_some());
        assert!(find_child(header, "Security").is_some());
    }

    #[test]
    fn leaves_inbound_messages_alone() {
        let handler = WsseHeaderHandler::new("alice", "secret").unwrap();
        let envelope = build_envelope(text_element("Pong", "1"));
        let mut ctx = MessageContext::inbound(envelope.clone());
        assert!(handler.handle_message(&mut ctx).unwrap());
        assert_eq!(ctx.envelope(), &envelope);
    }

    #[test]
    fn fails_on_non_envelopes() {
        let handler = WsseHeaderHandler::new("alice", "secret").unwrap();
        let mut ctx = MessageContext::outbound(text_element("Invoice", "x"));
        assert!(handler.handle_message(&mut ctx).is_err());
    }

    #[test]
    fn fault_and_close_never_interfere() {
        let handler = WsseHeaderHandler::new("alice", "secret").unwrap();
        let mut ctx = outbound();
        assert!(handler.handle_fault(&mut ctx));
        handler.close();
    }

    #[test]
    fn rejects_empty_credentials() {
        assert!(matches!(
            WsseHeaderHandler::new("", "secret"),
            Err(ConfigError::EmptyUsername)
        ));
        assert!(matches!(
            WsseHeaderHandler::new("alice", " "),
            Err(ConfigError::EmptyPassword)
        ));
    }

    #[test]
    fn password_is_masked() {
        let handler = WsseHeaderHandler::new("alice", "secret").unwrap();
        assert!(!format!("{handler:?}").contains("secret"));

        let mut ctx = outbound();
        handler.handle_message(&mut ctx).unwrap();
        let xml = String::from_utf8(write_envelope(ctx.envelope()).unwrap()).unwrap();
        let masked = handler.mask_password(&xml);
        assert!(xml.contains("secret"));
        assert!(!masked.contains("secret"));
        assert!(masked.contains("<wsse:Password>********</wsse:Password>"));
    }
}
