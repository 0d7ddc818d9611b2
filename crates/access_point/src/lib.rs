//! Senders for the ER>B (e-Rechnung an den Bund) SOAP webservice.
//!
//! ```no_run
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! use access_point::{Endpoint, SenderConfig, Ws200Sender};
//! use erb_core::DeliverySettings;
//!
//! let config = SenderConfig::new("user", "secret")?.with_endpoint(Endpoint::Test);
//! let sender = Ws200Sender::new(config);
//! let result = sender
//!     .deliver_invoice(b"<Invoice/>", &[], &DeliverySettings::test_only())
//!     .await?;
//! println!("{result:?}");
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod endpoint;
pub mod error;
pub mod mock;
pub mod protocol;
pub mod sender;
pub mod soap;
pub mod transport;
pub mod ws120;
pub mod ws200;

pub use config::{ConfigError, SenderConfig};
pub use endpoint::Endpoint;
pub use error::DeliveryFailure;
pub use protocol::{DecodeError, Protocol, ProtocolVersion};
pub use sender::InvoiceSender;
pub use transport::{
    Connector, HttpConnector, SoapRequest, SoapResponse, SoapTransport, TransportError,
    TransportPolicy,
};
pub use ws120::{Ws120, Ws120Sender};
pub use ws200::{Ws200, Ws200Sender};
