//! Turns a parsed invoice tree back into bytes for transmission.
//!
//! All namespaces used in the subtree are declared on the written root element.
//! URIs found in the configured [`NamespacePrefixes`] get the configured prefix,
//! every other URI keeps the prefix it had in the source document. Text and
//! attribute characters the target encoding cannot hold are written as numeric
//! character references; such characters in names or comments are an error.

use crate::encoding::{EncodingError, InvoiceEncoding};
use crate::namespace::NamespacePrefixes;
use quick_xml::escape::escape;
use quick_xml::events::attributes::Attribute;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::name::QName;
use quick_xml::Writer;
use roxmltree::{Node, PI};
use std::borrow::Cow;
use std::string::FromUtf8Error;
use thiserror::Error;

const XML_NS: &str = "http://www.w3.org/XML/1998/namespace";

#[derive(Debug, Error)]
pub enum SerializeError {
    #[error("the node to serialize is neither an element nor a document")]
    NotAnElement,
    #[error("prefix {prefix:?} cannot be bound to both {first} and {second}")]
    PrefixConflict {
        prefix: String,
        first: String,
        second: String,
    },
    #[error("element <{0}> has no namespace but a default namespace is declared")]
    UnqualifiedElement(String),
    #[error("failed to write XML: {0}")]
    Xml(#[from] quick_xml::Error),
    #[error("writer produced invalid UTF-8: {0}")]
    Utf8(#[from] FromUtf8Error),
    #[error(transparent)]
    Encoding(#[from] EncodingError),
}

#[derive(Debug, Clone, Copy, Default)]
pub struct WriterSettings<'a> {
    pub encoding: InvoiceEncoding,
    pub namespace_prefixes: Option<&'a NamespacePrefixes>,
}

impl<'a> WriterSettings<'a> {
    pub fn new(encoding: InvoiceEncoding) -> Self {
        Self {
            encoding,
            namespace_prefixes: None,
        }
    }

    pub fn with_namespace_prefixes(mut self, prefixes: Option<&'a NamespacePrefixes>) -> Self {
        self.namespace_prefixes = prefixes;
        self
    }
}

/// Prefix bindings in declaration order; `None` is the default namespace.
#[derive(Debug, Default)]
struct Bindings {
    entries: Vec<(Option<String>, String)>,
}

impl Bindings {
    fn element_prefix(&self, uri: &str) -> Option<Option<&str>> {
        self.entries
            .iter()
            .find(|(_, u)| u == uri)
            .map(|(p, _)| p.as_deref())
    }

    fn attribute_prefix(&self, uri: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(p, u)| u == uri && p.is_some())
            .and_then(|(p, _)| p.as_deref())
    }

    fn bound_uri(&self, prefix: Option<&str>) -> Option<&str> {
        self.entries
            .iter()
            .find(|(p, _)| p.as_deref() == prefix)
            .map(|(_, u)| u.as_str())
    }

    fn has_default(&self) -> bool {
        self.entries.iter().any(|(p, _)| p.is_none())
    }

    fn bind(&mut self, prefix: Option<&str>, uri: &str) -> Result<(), SerializeError> {
        match self.bound_uri(prefix) {
            Some(existing) if existing == uri => Ok(()),
            Some(existing) => Err(SerializeError::PrefixConflict {
                prefix: prefix.unwrap_or_default().to_string(),
                first: existing.to_string(),
                second: uri.to_string(),
            }),
            None => {
                self.entries.push((prefix.map(str::to_string), uri.to_string()));
                Ok(())
            }
        }
    }

    fn generated_prefix(&self) -> String {
        (0..)
            .map(|n| format!("ns{n}"))
            .find(|p| self.bound_uri(Some(p)).is_none())
            .unwrap_or_else(|| "ns".to_string())
    }

    fn bind_source(&mut self, source: Option<&str>, uri: &str, needs_prefix: bool) {
        let usable = match source {
            Some(p) => self.bound_uri(Some(p)).is_none(),
            None => !needs_prefix && !self.has_default(),
        };
        if usable {
            self.entries.push((source.map(str::to_string), uri.to_string()));
        } else {
            let generated = self.generated_prefix();
            self.entries.push((Some(generated), uri.to_string()));
        }
    }
}

fn source_prefix<'a>(node: Node<'a, '_>, uri: &str, needs_prefix: bool) -> Option<&'a str> {
    let mut matching = node.namespaces().filter(|ns| ns.uri() == uri);
    if needs_prefix {
        matching.find_map(|ns| ns.name())
    } else {
        matching.next().and_then(|ns| ns.name())
    }
}

/// Binds the configured prefix of every mapped URI used in the tree, before any
/// source prefix is taken.
fn bind_mapped(
    bindings: &mut Bindings,
    root: Node<'_, '_>,
    prefixes: &NamespacePrefixes,
) -> Result<(), SerializeError> {
    for node in root.descendants().filter(|n| n.is_element()) {
        let element_uri = node.tag_name().namespace().map(|uri| (uri, false));
        let attribute_uris = node
            .attributes()
            .filter_map(|a| a.namespace())
            .map(|uri| (uri, true));
        for (uri, is_attribute) in element_uri.into_iter().chain(attribute_uris) {
            if uri == XML_NS {
                continue;
            }
            match prefixes.prefix_for(uri) {
                Some("") if !is_attribute => bindings.bind(None, uri)?,
                Some(mapped) if !mapped.is_empty() => bindings.bind(Some(mapped), uri)?,
                _ => {}
            }
        }
    }
    Ok(())
}

fn ensure_bound(bindings: &mut Bindings, node: Node<'_, '_>, uri: &str, is_attribute: bool) {
    if uri == XML_NS {
        return;
    }
    let already = if is_attribute {
        bindings.attribute_prefix(uri).is_some()
    } else {
        bindings.element_prefix(uri).is_some()
    };
    if !already {
        let source = source_prefix(node, uri, is_attribute);
        bindings.bind_source(source, uri, is_attribute);
    }
}

fn collect_bindings(
    root: Node<'_, '_>,
    prefixes: Option<&NamespacePrefixes>,
) -> Result<Bindings, SerializeError> {
    let mut bindings = Bindings::default();
    if let Some(prefixes) = prefixes {
        bind_mapped(&mut bindings, root, prefixes)?;
    }
    for node in root.descendants().filter(|n| n.is_element()) {
        if let Some(uri) = node.tag_name().namespace() {
            ensure_bound(&mut bindings, node, uri, false);
        }
        for attr in node.attributes() {
            if let Some(uri) = attr.namespace() {
                ensure_bound(&mut bindings, node, uri, true);
            }
        }
    }

    if bindings.has_default() {
        if let Some(bare) = root
            .descendants()
            .find(|n| n.is_element() && n.tag_name().namespace().is_none())
        {
            return Err(SerializeError::UnqualifiedElement(
                bare.tag_name().name().to_string(),
            ));
        }
    }
    Ok(bindings)
}

fn qualified(prefix: Option<&str>, local: &str) -> String {
    match prefix {
        Some(p) => format!("{p}:{local}"),
        None => local.to_string(),
    }
}

fn element_name(node: Node<'_, '_>, bindings: &Bindings) -> String {
    let local = node.tag_name().name();
    match node.tag_name().namespace() {
        Some(uri) => qualified(bindings.element_prefix(uri).flatten(), local),
        None => local.to_string(),
    }
}

/// Escapes character data and writes characters `encoding` cannot hold as
/// numeric character references.
fn escape_data(text: &str, encoding: InvoiceEncoding) -> String {
    let escaped = escape(text);
    let mut out = String::with_capacity(escaped.len());
    for ch in escaped.chars() {
        if encoding.can_encode(ch) {
            out.push(ch);
        } else {
            out.push_str(&format!("&#x{:X};", ch as u32));
        }
    }
    out
}

fn processing_instruction(pi: PI<'_>) -> BytesText<'static> {
    let content = match pi.value {
        Some(value) => format!("{} {value}", pi.target),
        None => pi.target.to_string(),
    };
    BytesText::from_escaped(content)
}

fn write_element<W: std::io::Write>(
    writer: &mut Writer<W>,
    node: Node<'_, '_>,
    bindings: &Bindings,
    encoding: InvoiceEncoding,
    is_root: bool,
) -> Result<(), SerializeError> {
    let name = element_name(node, bindings);
    let mut start = BytesStart::new(name.clone());

    if is_root {
        for (prefix, uri) in &bindings.entries {
            let attr = match prefix {
                Some(p) => format!("xmlns:{p}"),
                None => "xmlns".to_string(),
            };
            start.push_attribute((attr.as_str(), uri.as_str()));
        }
    }

    for attr in node.attributes() {
        let qname = match attr.namespace() {
            Some(XML_NS) => format!("xml:{}", attr.name()),
            Some(uri) => qualified(bindings.attribute_prefix(uri), attr.name()),
            None => attr.name().to_string(),
        };
        start.push_attribute(Attribute {
            key: QName(qname.as_bytes()),
            value: Cow::Owned(escape_data(attr.value(), encoding).into_bytes()),
        });
    }

    let children: Vec<Node> = node
        .children()
        .filter(|c| c.is_element() || c.is_text() || c.is_comment() || c.is_pi())
        .collect();
    if children.is_empty() {
        writer.write_event(Event::Empty(start))?;
        return Ok(());
    }

    writer.write_event(Event::Start(start))?;
    for child in children {
        if child.is_element() {
            write_element(writer, child, bindings, encoding, false)?;
        } else if let Some(pi) = child.pi() {
            writer.write_event(Event::PI(processing_instruction(pi)))?;
        } else if let Some(text) = child.text() {
            if child.is_comment() {
                writer.write_event(Event::Comment(BytesText::from_escaped(text)))?;
            } else {
                writer.write_event(Event::Text(BytesText::from_escaped(escape_data(
                    text, encoding,
                ))))?;
            }
        }
    }
    writer.write_event(Event::End(BytesEnd::new(name)))?;
    Ok(())
}

/// Serialize an element (or a whole document) with an XML declaration naming the
/// configured encoding.
pub fn serialize_node(
    node: Node<'_, '_>,
    settings: &WriterSettings<'_>,
) -> Result<Vec<u8>, SerializeError> {
    let element = if node.is_element() {
        node
    } else if node.is_root() {
        node.children()
            .find(|c| c.is_element())
            .ok_or(SerializeError::NotAnElement)?
    } else {
        return Err(SerializeError::NotAnElement);
    };

    let bindings = collect_bindings(element, settings.namespace_prefixes)?;

    let mut writer = Writer::new(Vec::new());
    writer.write_event(Event::Decl(BytesDecl::new(
        "1.0",
        Some(settings.encoding.name()),
        None,
    )))?;
    writer.write_event(Event::Text(BytesText::from_escaped("\n")))?;
    if node.is_root() {
        for pi in node.children().take_while(|c| !c.is_element()).filter_map(|c| c.pi()) {
            writer.write_event(Event::PI(processing_instruction(pi)))?;
            writer.write_event(Event::Text(BytesText::from_escaped("\n")))?;
        }
    }
    write_element(&mut writer, element, &bindings, settings.encoding, true)?;

    let xml = String::from_utf8(writer.into_inner())?;
    let bytes = settings.encoding.encode(&xml)?;
    tracing::trace!(
        encoding = %settings.encoding,
        size = bytes.len(),
        "serialized invoice document"
    );
    Ok(bytes)
}
