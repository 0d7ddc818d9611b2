//! Message interception around a single SOAP exchange.

use super::envelope::{find_child, is_named};
use std::fmt;
use thiserror::Error;
use xmltree::Element;

#[derive(Debug, Error)]
pub enum HandlerError {
    #[error("message is not a SOAP envelope: {0}")]
    NotAnEnvelope(String),
    #[error("{handler} failed: {reason}")]
    Failed { handler: &'static str, reason: String },
}

/// A message travelling through the chain together with its direction.
#[derive(Debug, Clone)]
pub struct MessageContext {
    outbound: bool,
    envelope: Element,
}

impl MessageContext {
    pub fn outbound(envelope: Element) -> Self {
        Self {
            outbound: true,
            envelope,
        }
    }

    pub fn inbound(envelope: Element) -> Self {
        Self {
            outbound: false,
            envelope,
        }
    }

    pub fn is_outbound(&self) -> bool {
        self.outbound
    }

    pub fn envelope(&self) -> &Element {
        &self.envelope
    }

    pub fn envelope_mut(&mut self) -> &mut Element {
        &mut self.envelope
    }

    pub fn into_envelope(self) -> Element {
        self.envelope
    }

    /// Fails unless the message is an `Envelope` with a `Body`.
    pub fn ensure_envelope(&self) -> Result<(), HandlerError> {
        if !is_named(&self.envelope, "Envelope") {
            return Err(HandlerError::NotAnEnvelope(format!(
                "root element is <{}>",
                self.envelope.name
            )));
        }
        if find_child(&self.envelope, "Body").is_none() {
            return Err(HandlerError::NotAnEnvelope("no Body element".into()));
        }
        Ok(())
    }
}

pub trait SoapHandler: Send + Sync + fmt::Debug {
    /// Returns `false` to stop the remaining handlers from seeing the message.
    fn handle_message(&self, ctx: &mut MessageContext) -> Result<bool, HandlerError>;

    fn handle_fault(&self, _ctx: &mut MessageContext) -> bool {
        true
    }

    fn close(&self) {}
}

/// Ordered handlers. Outbound messages visit them first to last, inbound
/// messages last to first.
#[derive(Debug, Default)]
pub struct HandlerChain {
    handlers: Vec<Box<dyn SoapHandler>>,
}

impl HandlerChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, handler: impl SoapHandler + 'static) -> Self {
        self.push(handler);
        self
    }

    pub fn push(&mut self, handler: impl SoapHandler + 'static) {
        self.handlers.push(Box::new(handler));
    }

    fn ordered(&self, outbound: bool) -> Vec<&Box<dyn SoapHandler>> {
        let mut handlers: Vec<_> = self.handlers.iter().collect();
        if !outbound {
            handlers.reverse();
        }
        handlers
    }

    /// Runs every handler until one declines. Returns whether the whole chain
    /// was traversed.
    pub fn handle_message(&self, ctx: &mut MessageContext) -> Result<bool, HandlerError> {
        for handler in self.ordered(ctx.is_outbound()) {
            if !handler.handle_message(ctx)? {
                tracing::debug!(?handler, "handler stopped message processing");
                return Ok(false);
            }
        }
        Ok(true)
    }

    pub fn handle_fault(&self, ctx: &mut MessageContext) -> bool {
        for handler in self.ordered(ctx.is_outbound()) {
            if !handler.handle_fault(ctx) {
                return false;
            }
        }
        true
    }

    pub fn close(&self) {
        for handler in self.handlers.iter().rev() {
            handler.close();
        }
    }
}
