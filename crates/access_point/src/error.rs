use erb_core::{
    DeliveryError, DeliveryResult, FIELD_ARGUMENT, FIELD_DOCUMENT, FIELD_GENERAL,
    FIELD_WEBSERVICE,
};
use thiserror::Error;

pub const SERIALIZATION_FAILED: &str = "Failed to serialize the specified XML document";

/// Why a delivery did not produce a regular service response.
///
/// Only `InvalidArgument` ever reaches the caller as an `Err`; every other
/// variant is turned into a [`DeliveryResult::Error`] via
/// [`DeliveryFailure::into_result`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DeliveryFailure {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    /// The invoice tree could not be turned into bytes.
    #[error("failed to serialize the invoice: {0}")]
    Serialization(String),
    /// The service rejected the document.
    #[error("document rejected: {}", .0.join("; "))]
    ApplicationFault(Vec<String>),
    /// The webservice could not be reached or answered unintelligibly.
    #[error("webservice call failed: {0}")]
    Transport(String),
    #[error("{0}")]
    Other(String),
}

impl DeliveryFailure {
    pub fn field(&self) -> &'static str {
        match self {
            DeliveryFailure::InvalidArgument(_) => FIELD_ARGUMENT,
            DeliveryFailure::Serialization(_) | DeliveryFailure::ApplicationFault(_) => {
                FIELD_DOCUMENT
            }
            DeliveryFailure::Transport(_) => FIELD_WEBSERVICE,
            DeliveryFailure::Other(_) => FIELD_GENERAL,
        }
    }

    pub fn messages(&self) -> Vec<String> {
        match self {
            DeliveryFailure::Serialization(_) => vec![SERIALIZATION_FAILED.to_string()],
            DeliveryFailure::ApplicationFault(messages) => messages.clone(),
            DeliveryFailure::InvalidArgument(msg)
            | DeliveryFailure::Transport(msg)
            | DeliveryFailure::Other(msg) => vec![msg.clone()],
        }
    }

    pub fn into_result(self) -> DeliveryResult {
        DeliveryResult::Error(DeliveryError::new(self.field(), self.messages()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failures_map_to_fields() {
        let cases = [
            (DeliveryFailure::Serialization("bad char".into()), "document"),
            (DeliveryFailure::ApplicationFault(vec!["x".into()]), "document"),
            (DeliveryFailure::Transport("refused".into()), "webservice"),
            (DeliveryFailure::Other("boom".into()), "general"),
            (DeliveryFailure::InvalidArgument("empty".into()), "argument"),
        ];
        for (failure, field) in cases {
            assert_eq!(failure.field(), field);
            let result = failure.into_result();
            assert_eq!(result.error().unwrap().fields(), vec![field]);
        }
    }

    #[test]
    fn serialization_failure_uses_fixed_message() {
        let result = DeliveryFailure::Serialization("character '€' not representable".into()).into_result();
        assert_eq!(
            result.error().unwrap().messages(),
            vec!["Failed to serialize the specified XML document"]
        );
    }

    #[test]
    fn transport_keeps_the_cause() {
        let result = DeliveryFailure::Transport("connection refused".into()).into_result();
        assert_eq!(result.error().unwrap().messages(), vec!["connection refused"]);
    }
}
