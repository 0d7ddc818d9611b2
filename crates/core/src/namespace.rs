use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Mapping from XML prefix to namespace URI, applied when an invoice tree is
/// serialized. A prefix binds exactly one URI and a URI has at most one prefix; the
/// empty prefix stands for the default namespace.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "BTreeMap<String, String>", into = "BTreeMap<String, String>")]
pub struct NamespacePrefixes {
    mappings: Vec<(String, String)>,
}

impl NamespacePrefixes {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder form of [`NamespacePrefixes::add_mapping`].
    pub fn with(mut self, prefix: impl Into<String>, uri: impl Into<String>) -> Self {
        self.add_mapping(prefix, uri);
        self
    }

    /// Adds a mapping, replacing any earlier mapping of the same prefix or URI.
    pub fn add_mapping(&mut self, prefix: impl Into<String>, uri: impl Into<String>) {
        let prefix = prefix.into();
        let uri = uri.into();
        self.mappings.retain(|(p, u)| *p != prefix && *u != uri);
        self.mappings.push((prefix, uri));
    }

    pub fn prefix_for(&self, uri: &str) -> Option<&str> {
        self.mappings
            .iter()
            .find(|(_, u)| u == uri)
            .map(|(p, _)| p.as_str())
    }

    pub fn uri_for(&self, prefix: &str) -> Option<&str> {
        self.mappings
            .iter()
            .find(|(p, _)| p == prefix)
            .map(|(_, u)| u.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.mappings.iter().map(|(p, u)| (p.as_str(), u.as_str()))
    }

    pub fn len(&self) -> usize {
        self.mappings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mappings.is_empty()
    }
}

impl From<BTreeMap<String, String>> for NamespacePrefixes {
    fn from(map: BTreeMap<String, String>) -> Self {
        let mut out = NamespacePrefixes::new();
        for (prefix, uri) in map {
            out.add_mapping(prefix, uri);
        }
        out
    }
}

impl From<NamespacePrefixes> for BTreeMap<String, String> {
    fn from(value: NamespacePrefixes) -> Self {
        value.mappings.into_iter().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn later_mapping_replaces_prefix_and_uri() {
        let ns = NamespacePrefixes::new()
            .with("eb", "http://www.ebinterface.at/schema/6p0/")
            .with("ds", "http://www.w3.org/2000/09/xmldsig#")
            .with("inv", "http://www.ebinterface.at/schema/6p0/");

        assert_eq!(ns.len(), 2);
        assert_eq!(ns.prefix_for("http://www.ebinterface.at/schema/6p0/"), Some("inv"));
        assert_eq!(ns.uri_for("eb"), None);
        assert_eq!(ns.uri_for("ds"), Some("http://www.w3.org/2000/09/xmldsig#"));
    }
}
