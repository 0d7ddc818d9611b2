//! Moving SOAP messages over HTTP.

use crate::soap::envelope::CONTENT_TYPE;
use async_trait::async_trait;
use thiserror::Error;
use url::Url;

/// Transport-level settings derived from a [`crate::SenderConfig`] for one call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TransportPolicy {
    /// Accept any server certificate. Opt-in only; disables TLS authentication.
    pub trust_all_certificates: bool,
    /// Accept certificates issued for a different host name.
    pub trust_all_hostnames: bool,
    /// Log every request and response body.
    pub debug: bool,
}

impl TransportPolicy {
    pub fn is_permissive(&self) -> bool {
        self.trust_all_certificates || self.trust_all_hostnames
    }
}

#[derive(Debug, Clone)]
pub struct SoapRequest {
    pub endpoint: Url,
    pub soap_action: String,
    pub body: Vec<u8>,
}

#[derive(Debug, Clone)]
pub struct SoapResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("failed to build HTTP client: {0}")]
    Client(String),
    #[error("request to {url} failed: {reason}")]
    Send { url: String, reason: String },
    #[error("{url} answered with HTTP {status}")]
    Status {
        url: String,
        status: u16,
        body: String,
    },
    #[error("failed to read response body: {0}")]
    Body(String),
}

#[async_trait]
pub trait SoapTransport: Send + Sync {
    async fn send(&self, request: SoapRequest) -> Result<SoapResponse, TransportError>;
}

/// Creates the transport used for a single delivery.
pub trait Connector: Send + Sync {
    fn connect(&self, policy: &TransportPolicy) -> Result<Box<dyn SoapTransport>, TransportError>;
}

/// Builds a fresh reqwest client per delivery, with reqwest's default timeouts.
#[derive(Debug, Clone, Copy, Default)]
pub struct HttpConnector;

impl HttpConnector {
    pub fn new() -> Self {
        Self
    }
}

impl Connector for HttpConnector {
    fn connect(&self, policy: &TransportPolicy) -> Result<Box<dyn SoapTransport>, TransportError> {
        Ok(Box::new(HttpTransport::new(*policy)?))
    }
}

pub struct HttpTransport {
    client: reqwest::Client,
    policy: TransportPolicy,
}

impl HttpTransport {
    pub fn new(policy: TransportPolicy) -> Result<Self, TransportError> {
        if policy.is_permissive() {
            tracing::warn!(
                trust_all_certificates = policy.trust_all_certificates,
                trust_all_hostnames = policy.trust_all_hostnames,
                "TLS verification is relaxed for this delivery"
            );
        }
        let client = reqwest::Client::builder()
            .danger_accept_invalid_certs(policy.trust_all_certificates)
            .danger_accept_invalid_hostnames(policy.trust_all_hostnames)
            .build()
            .map_err(|e| TransportError::Client(e.to_string()))?;
        Ok(Self { client, policy })
    }

    pub fn policy(&self) -> &TransportPolicy {
        &self.policy
    }
}

#[async_trait]
impl SoapTransport for HttpTransport {
    async fn send(&self, request: SoapRequest) -> Result<SoapResponse, TransportError> {
        let url = request.endpoint.to_string();
        let resp = self
            .client
            .post(request.endpoint)
            .header(reqwest::header::CONTENT_TYPE, CONTENT_TYPE)
            .header("SOAPAction", format!("\"{}\"", request.soap_action))
            .body(request.body)
            .send()
            .await
            .map_err(|e| TransportError::Send {
                url: url.clone(),
                reason: error_chain(&e),
            })?;

        let status = resp.status();
        let body = resp
            .bytes()
            .await
            .map_err(|e| TransportError::Body(e.to_string()))?
            .to_vec();

        if self.policy.debug {
            tracing::debug!(
                %url,
                status = status.as_u16(),
                body = %String::from_utf8_lossy(&body),
                "SOAP response"
            );
        }

        // SOAP 1.1 reports faults with 500, so that body is still worth decoding.
        if status.is_success() || status == reqwest::StatusCode::INTERNAL_SERVER_ERROR {
            return Ok(SoapResponse {
                status: status.as_u16(),
                body,
            });
        }

        Err(TransportError::Status {
            url,
            status: status.as_u16(),
            body: String::from_utf8_lossy(&body).into_owned(),
        })
    }
}

/// reqwest hides the interesting part (refused, TLS, timeout) in the source chain.
fn error_chain(err: &(dyn std::error::Error + 'static)) -> String {
    let mut out = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        out.push_str(": ");
        out.push_str(&cause.to_string());
        source = cause.source();
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_policy_keeps_validation() {
        let policy = TransportPolicy::default();
        assert!(!policy.is_permissive());
        assert!(HttpTransport::new(policy).is_ok());
    }

    #[test]
    fn permissive_policy_builds_a_client() {
        let policy = TransportPolicy {
            trust_all_certificates: true,
            trust_all_hostnames: true,
            debug: false,
        };
        assert!(policy.is_permissive());
        let transport = HttpTransport::new(policy).unwrap();
        assert!(transport.policy().trust_all_certificates);
    }

    #[test]
    fn error_chain_joins_sources() {
        let inner = std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "connection refused");
        let outer = TransportError::Body(inner.to_string());
        assert_eq!(error_chain(&outer), "failed to read response body: connection refused");
    }
}
