use crate::endpoint::Endpoint;
use crate::transport::TransportPolicy;
use erb_core::{InvoiceEncoding, NamespacePrefixes};
use std::fmt;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("webservice username must not be empty")]
    EmptyUsername,
    #[error("webservice password must not be empty")]
    EmptyPassword,
}

/// Everything a sender needs to know besides the invoice itself.
///
/// Credentials are fixed at construction; the remaining settings have owned
/// builder setters (`with_*`) and in-place setters (`set_*`).
#[derive(Clone)]
pub struct SenderConfig {
    username: String,
    password: String,
    invoice_encoding: InvoiceEncoding,
    debug_mode: bool,
    trust_all_certificates: bool,
    trust_all_hostnames: bool,
    namespace_prefixes: Option<NamespacePrefixes>,
    endpoint: Endpoint,
}

impl SenderConfig {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Result<Self, ConfigError> {
        let username = username.into();
        let password = password.into();
        if username.trim().is_empty() {
            return Err(ConfigError::EmptyUsername);
        }
        if password.trim().is_empty() {
            return Err(ConfigError::EmptyPassword);
        }
        Ok(Self {
            username,
            password,
            invoice_encoding: InvoiceEncoding::default(),
            debug_mode: false,
            trust_all_certificates: false,
            trust_all_hostnames: false,
            namespace_prefixes: None,
            endpoint: Endpoint::default(),
        })
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn password(&self) -> &str {
        &self.password
    }

    pub fn invoice_encoding(&self) -> InvoiceEncoding {
        self.invoice_encoding
    }

    pub fn debug_mode(&self) -> bool {
        self.debug_mode
    }

    pub fn trust_all_certificates(&self) -> bool {
        self.trust_all_certificates
    }

    pub fn trust_all_hostnames(&self) -> bool {
        self.trust_all_hostnames
    }

    pub fn namespace_prefixes(&self) -> Option<&NamespacePrefixes> {
        self.namespace_prefixes.as_ref()
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    pub fn with_invoice_encoding(mut self, encoding: InvoiceEncoding) -> Self {
        self.invoice_encoding = encoding;
        self
    }

    pub fn with_debug_mode(mut self, debug: bool) -> Self {
        self.debug_mode = debug;
        self
    }

    /// Accept any server certificate. Only for test installations with
    /// self-signed certificates.
    pub fn with_trust_all_certificates(mut self, trust: bool) -> Self {
        self.trust_all_certificates = trust;
        self
    }

    pub fn with_trust_all_hostnames(mut self, trust: bool) -> Self {
        self.trust_all_hostnames = trust;
        self
    }

    pub fn with_namespace_prefixes(mut self, prefixes: NamespacePrefixes) -> Self {
        self.namespace_prefixes = Some(prefixes);
        self
    }

    pub fn with_endpoint(mut self, endpoint: Endpoint) -> Self {
        self.endpoint = endpoint;
        self
    }

    pub fn set_invoice_encoding(&mut self, encoding: InvoiceEncoding) -> &mut Self {
        self.invoice_encoding = encoding;
        self
    }

    pub fn set_debug_mode(&mut self, debug: bool) -> &mut Self {
        self.debug_mode = debug;
        self
    }

    pub fn set_trust_all_certificates(&mut self, trust: bool) -> &mut Self {
        self.trust_all_certificates = trust;
        self
    }

    pub fn set_trust_all_hostnames(&mut self, trust: bool) -> &mut Self {
        self.trust_all_hostnames = trust;
        self
    }

    pub fn set_namespace_prefixes(&mut self, prefixes: Option<NamespacePrefixes>) -> &mut Self {
        self.namespace_prefixes = prefixes;
        self
    }

    pub fn set_endpoint(&mut self, endpoint: Endpoint) -> &mut Self {
        self.endpoint = endpoint;
        self
    }

    pub fn transport_policy(&self) -> TransportPolicy {
        TransportPolicy {
            trust_all_certificates: self.trust_all_certificates,
            trust_all_hostnames: self.trust_all_hostnames,
            debug: self.debug_mode,
        }
    }
}

impl fmt::Debug for SenderConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SenderConfig")
            .field("username", &self.username)
            .field("password", &"********")
            .field("invoice_encoding", &self.invoice_encoding)
            .field("debug_mode", &self.debug_mode)
            .field("trust_all_certificates", &self.trust_all_certificates)
            .field("trust_all_hostnames", &self.trust_all_hostnames)
            .field("namespace_prefixes", &self.namespace_prefixes)
            .field("endpoint", &self.endpoint)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_missing_credentials() {
        assert_eq!(SenderConfig::new("", "pw").unwrap_err(), ConfigError::EmptyUsername);
        assert_eq!(SenderConfig::new("   ", "pw").unwrap_err(), ConfigError::EmptyUsername);
        assert_eq!(SenderConfig::new("user", "").unwrap_err(), ConfigError::EmptyPassword);
    }

    #[test]
    fn defaults() {
        let config = SenderConfig::new("user", "pw").unwrap();
        assert_eq!(config.invoice_encoding(), InvoiceEncoding::Utf8);
        assert!(!config.debug_mode());
        assert!(!config.trust_all_certificates());
        assert!(!config.trust_all_hostnames());
        assert!(config.namespace_prefixes().is_none());
        assert_eq!(config.endpoint(), &Endpoint::Production);
        assert_eq!(config.transport_policy(), TransportPolicy::default());
    }

    #[test]
    fn setters_chain() {
        let mut config = SenderConfig::new("user", "pw")
            .unwrap()
            .with_debug_mode(true)
            .with_trust_all_certificates(true)
            .with_endpoint(Endpoint::Test);
        config
            .set_invoice_encoding(InvoiceEncoding::Iso8859_1)
            .set_trust_all_hostnames(true);

        assert_eq!(config.invoice_encoding(), InvoiceEncoding::Iso8859_1);
        assert!(config.endpoint().is_test());
        assert_eq!(
            config.transport_policy(),
            TransportPolicy {
                trust_all_certificates: true,
                trust_all_hostnames: true,
                debug: true,
            }
        );
    }

    #[test]
    fn debug_hides_password() {
        let config = SenderConfig::new("user", "hunter2").unwrap();
        let dbg = format!("{config:?}");
        assert!(dbg.contains("user"));
        assert!(!dbg.contains("hunter2"));
    }
}
