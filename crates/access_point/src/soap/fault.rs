use super::envelope::{child_elements, child_text, find_child, is_named, local_name, text_of};
use std::fmt;
use xmltree::Element;

/// A SOAP fault returned instead of a regular response.
#[derive(Debug, Clone)]
pub struct SoapFault {
    pub code: String,
    pub reason: String,
    pub detail: Option<Element>,
}

impl SoapFault {
    /// Reads a SOAP 1.1 (`faultcode`/`faultstring`/`detail`) or SOAP 1.2
    /// (`Code/Value`, `Reason/Text`, `Detail`) fault. Returns `None` when
    /// `element` is not a `Fault`.
    pub fn from_element(element: &Element) -> Option<Self> {
        if !is_named(element, "Fault") {
            return None;
        }

        let code = child_text(element, "faultcode")
            .or_else(|| find_child(element, "Code").and_then(|c| child_text(c, "Value")))
            .unwrap_or_default();
        let reason = child_text(element, "faultstring")
            .or_else(|| find_child(element, "Reason").and_then(|r| child_text(r, "Text")))
            .unwrap_or_default();
        let detail = find_child(element, "detail")
            .or_else(|| find_child(element, "Detail"))
            .cloned();

        Some(Self {
            code: local_name(&code).to_string(),
            reason,
            detail,
        })
    }

    /// First child of the fault detail with the given local name.
    pub fn detail_entry(&self, local: &str) -> Option<&Element> {
        self.detail.as_ref().and_then(|d| find_child(d, local))
    }

    /// `Message` texts below a detail entry, at any depth.
    pub fn detail_messages(&self, local: &str) -> Vec<String> {
        fn collect(element: &Element, out: &mut Vec<String>) {
            for child in child_elements(element) {
                if is_named(child, "Message") {
                    if let Some(text) = text_of(child) {
                        out.push(text);
                    }
                } else {
                    collect(child, out);
                }
            }
        }

        let mut out = Vec::new();
        if let Some(entry) = self.detail_entry(local) {
            collect(entry, &mut out);
        }
        out
    }
}

impl fmt::Display for SoapFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.code.is_empty() {
            write!(f, "{}", self.reason)
        } else {
            write!(f, "{} ({})", self.reason, self.code)
        }
    }
}
