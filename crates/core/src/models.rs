use serde::{Deserialize, Serialize};
use std::fmt;

/// Error field used when the invoice document itself was rejected or could not be
/// serialized.
pub const FIELD_DOCUMENT: &str = "document";
/// Error field used for communication failures with the webservice.
pub const FIELD_WEBSERVICE: &str = "webservice";
/// Error field used for anything not anticipated.
pub const FIELD_GENERAL: &str = "general";
/// Error field used for invalid caller input.
pub const FIELD_ARGUMENT: &str = "argument";

/// A file travelling alongside the invoice (e.g. a PDF rendition).
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    pub name: String,
    pub mime_type: String,
    pub content: Vec<u8>,
}

impl Attachment {
    pub fn new(name: impl Into<String>, mime_type: impl Into<String>, content: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            mime_type: mime_type.into(),
            content,
        }
    }
}

impl fmt::Debug for Attachment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Attachment")
            .field("name", &self.name)
            .field("mime_type", &self.mime_type)
            .field("size", &self.content.len())
            .finish()
    }
}

/// Settings block sent with every delivery.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliverySettings {
    /// When `true` the service only validates the invoice and does not submit it.
    pub test: Option<bool>,
}

impl DeliverySettings {
    pub fn test_only() -> Self {
        Self { test: Some(true) }
    }

    pub fn with_test(mut self, test: bool) -> Self {
        self.test = Some(test);
        self
    }

    pub fn is_test(&self) -> bool {
        self.test.unwrap_or(false)
    }
}

/// Success payload as reported by the service.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliverySuccess {
    /// Reference the service assigned to the uploaded document, if any.
    pub document_id: Option<String>,
    /// Every leaf value of the success element, in document order.
    pub fields: Vec<(String, String)>,
}

impl DeliverySuccess {
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorDetail {
    pub field: String,
    pub message: String,
}

impl ErrorDetail {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ErrorDetail {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryError {
    pub details: Vec<ErrorDetail>,
}

impl DeliveryError {
    /// One detail per message, all under the same field.
    pub fn new<I, S>(field: &str, messages: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            details: messages
                .into_iter()
                .map(|m| ErrorDetail::new(field, m))
                .collect(),
        }
    }

    pub fn fields(&self) -> Vec<&str> {
        let mut out: Vec<&str> = Vec::new();
        for d in &self.details {
            if !out.contains(&d.field.as_str()) {
                out.push(d.field.as_str());
            }
        }
        out
    }

    pub fn messages(&self) -> Vec<&str> {
        self.details.iter().map(|d| d.message.as_str()).collect()
    }
}

impl fmt::Display for DeliveryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.details.iter().map(ToString::to_string).collect();
        write!(f, "{}", parts.join("; "))
    }
}

/// Outcome of a single delivery attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryResult {
    Success(DeliverySuccess),
    Error(DeliveryError),
}

impl DeliveryResult {
    pub fn failure<I, S>(field: &str, messages: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        DeliveryResult::Error(DeliveryError::new(field, messages))
    }

    pub fn is_success(&self) -> bool {
        matches!(self, DeliveryResult::Success(_))
    }

    pub fn success(&self) -> Option<&DeliverySuccess> {
        match self {
            DeliveryResult::Success(s) => Some(s),
            DeliveryResult::Error(_) => None,
        }
    }

    pub fn error(&self) -> Option<&DeliveryError> {
        match self {
            DeliveryResult::Success(_) => None,
            DeliveryResult::Error(e) => Some(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failure_puts_every_message_under_the_field() {
        let result = DeliveryResult::failure(FIELD_DOCUMENT, ["first", "second"]);
        let err = result.error().unwrap();
        assert!(!result.is_success());
        assert!(result.success().is_none());
        assert_eq!(err.fields(), vec!["document"]);
        assert_eq!(err.messages(), vec!["first", "second"]);
        assert_eq!(err.to_string(), "document: first; document: second");
    }

    #[test]
    fn result_serializes_tagged() {
        let ok = DeliveryResult::Success(DeliverySuccess {
            document_id: Some("4711".into()),
            fields: vec![("DocumentID".into(), "4711".into())],
        });
        let json = serde_json::to_value(&ok).unwrap();
        assert_eq!(json["success"]["document_id"], "4711");

        let err = DeliveryResult::failure(FIELD_WEBSERVICE, ["connection refused"]);
        let json = serde_json::to_value(&err).unwrap();
        assert_eq!(json["error"]["details"][0]["field"], "webservice");
    }

    #[test]
    fn settings_test_flag() {
        assert!(!DeliverySettings::default().is_test());
        assert!(DeliverySettings::test_only().is_test());
        assert_eq!(DeliverySettings::default().with_test(false).test, Some(false));
    }

    #[test]
    fn attachment_debug_hides_content() {
        let a = Attachment::new("scan.pdf", "application/pdf", vec![1, 2, 3]);
        let dbg = format!("{a:?}");
        assert!(dbg.contains("size: 3"));
        assert!(!dbg.contains("[1, 2, 3]"));
    }
}
