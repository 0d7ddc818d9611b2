pub mod envelope;
pub mod fault;
pub mod handler;
pub mod wsse;

pub use envelope::EnvelopeError;
pub use fault::SoapFault;
pub use handler::{HandlerChain, HandlerError, MessageContext, SoapHandler};
pub use wsse::WsseHeaderHandler;
