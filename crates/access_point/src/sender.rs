use crate::config::SenderConfig;
use crate::error::DeliveryFailure;
use crate::protocol::{InvoicePayload, Protocol};
use crate::soap::envelope::{body_payload, build_envelope, parse_envelope, write_envelope};
use crate::soap::{HandlerChain, MessageContext, SoapFault, WsseHeaderHandler};
use crate::transport::{Connector, HttpConnector, SoapRequest};
use erb_core::parsing::compute_sha256_hex;
use erb_core::{serialize_node, Attachment, DeliveryResult, DeliverySettings, WriterSettings};
use std::marker::PhantomData;
use tracing::Instrument;
use url::Url;
use uuid::Uuid;
use xmltree::Element;

/// Delivers invoices to ER>B using the message shapes of `P`.
///
/// Each call builds its own transport through `C` and performs exactly one
/// request; nothing is kept between calls.
pub struct InvoiceSender<P: Protocol, C: Connector = HttpConnector> {
    config: SenderConfig,
    connector: C,
    _protocol: PhantomData<fn() -> P>,
}

impl<P: Protocol> InvoiceSender<P, HttpConnector> {
    pub fn new(config: SenderConfig) -> Self {
        Self::with_connector(config, HttpConnector::new())
    }
}

impl<P: Protocol, C: Connector> InvoiceSender<P, C> {
    pub fn with_connector(config: SenderConfig, connector: C) -> Self {
        Self {
            config,
            connector,
            _protocol: PhantomData,
        }
    }

    pub fn config(&self) -> &SenderConfig {
        &self.config
    }

    pub fn config_mut(&mut self) -> &mut SenderConfig {
        &mut self.config
    }

    pub fn connector(&self) -> &C {
        &self.connector
    }

    pub fn endpoint_url(&self) -> Result<Url, url::ParseError> {
        self.config.endpoint().resolve::<P>()
    }

    /// Serializes `node` with the configured encoding and namespace prefixes
    /// and delivers the result. A tree that cannot be serialized yields an
    /// error result under the `document` field without contacting the service.
    pub async fn deliver_invoice_node(
        &self,
        node: roxmltree::Node<'_, '_>,
        attachments: &[Attachment],
        settings: &DeliverySettings,
    ) -> Result<DeliveryResult, DeliveryFailure> {
        let writer = WriterSettings::new(self.config.invoice_encoding())
            .with_namespace_prefixes(self.config.namespace_prefixes());

        let failure = match serialize_node(node, &writer) {
            Ok(bytes) if !bytes.is_empty() => {
                return self.deliver_invoice(&bytes, attachments, settings).await;
            }
            Ok(_) => DeliveryFailure::Serialization("serializer produced no output".into()),
            Err(e) => DeliveryFailure::Serialization(e.to_string()),
        };
        tracing::error!(
            protocol = P::NAME,
            encoding = %self.config.invoice_encoding(),
            error = %failure,
            "invoice delivery failed"
        );
        Ok(failure.into_result())
    }

    /// Uploads `invoice` with its attachments. Fails only for empty input;
    /// every other problem is reported through the returned [`DeliveryResult`].
    pub async fn deliver_invoice(
        &self,
        invoice: &[u8],
        attachments: &[Attachment],
        settings: &DeliverySettings,
    ) -> Result<DeliveryResult, DeliveryFailure> {
        if invoice.is_empty() {
            return Err(DeliveryFailure::InvalidArgument(
                "invoice document must not be empty".into(),
            ));
        }

        let span = tracing::info_span!(
            "deliver_invoice",
            protocol = P::NAME,
            request_id = %Uuid::new_v4(),
            sha256 = %compute_sha256_hex(invoice),
        );

        async {
            tracing::info!(
                size = invoice.len(),
                attachments = attachments.len(),
                test = settings.is_test(),
                "delivering invoice"
            );
            match self.exchange(invoice, attachments, settings).await {
                Ok(result) => {
                    match &result {
                        DeliveryResult::Success(success) => tracing::info!(
                            document_id = success.document_id.as_deref().unwrap_or("-"),
                            "invoice accepted"
                        ),
                        DeliveryResult::Error(error) => tracing::warn!(
                            %error,
                            "invoice rejected by the service"
                        ),
                    }
                    Ok(result)
                }
                Err(failure) => {
                    tracing::error!(field = failure.field(), error = %failure, "invoice delivery failed");
                    Ok(failure.into_result())
                }
            }
        }
        .instrument(span)
        .await
    }

    async fn exchange(
        &self,
        invoice: &[u8],
        attachments: &[Attachment],
        settings: &DeliverySettings,
    ) -> Result<DeliveryResult, DeliveryFailure> {
        let url = self
            .endpoint_url()
            .map_err(|e| DeliveryFailure::Other(format!("invalid endpoint URL: {e}")))?;
        let payload = P::request_payload(
            InvoicePayload {
                bytes: invoice,
                encoding: self.config.invoice_encoding(),
            },
            attachments,
            settings,
        );

        let wsse = WsseHeaderHandler::new(self.config.username(), self.config.password())
            .map_err(|e| DeliveryFailure::Other(e.to_string()))?;
        let chain = HandlerChain::new().with(wsse.clone());
        let result = self.round_trip(&chain, &wsse, url, payload).await;
        chain.close();
        result
    }

    async fn round_trip(
        &self,
        chain: &HandlerChain,
        wsse: &WsseHeaderHandler,
        url: Url,
        payload: Element,
    ) -> Result<DeliveryResult, DeliveryFailure> {
        let mut outbound = MessageContext::outbound(build_envelope(payload));
        if !chain
            .handle_message(&mut outbound)
            .map_err(|e| DeliveryFailure::Transport(e.to_string()))?
        {
            return Err(DeliveryFailure::Transport(
                "outbound message was stopped by a SOAP handler".into(),
            ));
        }
        let body = write_envelope(outbound.envelope())
            .map_err(|e| DeliveryFailure::Other(e.to_string()))?;

        let policy = self.config.transport_policy();
        if policy.debug {
            tracing::debug!(
                %url,
                request = %wsse.mask_password(&String::from_utf8_lossy(&body)),
                "SOAP request"
            );
        }

        let transport = self
            .connector
            .connect(&policy)
            .map_err(|e| DeliveryFailure::Other(e.to_string()))?;
        let response = transport
            .send(SoapRequest {
                endpoint: url,
                soap_action: P::SOAP_ACTION.to_string(),
                body,
            })
            .await
            .map_err(|e| DeliveryFailure::Transport(e.to_string()))?;

        let envelope = parse_envelope(&response.body).map_err(|e| {
            DeliveryFailure::Transport(format!("HTTP {}: {e}", response.status))
        })?;
        let mut inbound = MessageContext::inbound(envelope);

        let fault = body_payload(inbound.envelope())
            .map_err(|e| DeliveryFailure::Transport(e.to_string()))?
            .and_then(SoapFault::from_element);
        if let Some(fault) = fault {
            chain.handle_fault(&mut inbound);
            return Err(fault_failure::<P>(&fault));
        }

        // 500 is only accepted from the transport because it may carry a fault.
        if response.status == 500 {
            return Err(DeliveryFailure::Transport(
                "HTTP 500 without a SOAP fault in the response".into(),
            ));
        }

        chain
            .handle_message(&mut inbound)
            .map_err(|e| DeliveryFailure::Transport(e.to_string()))?;
        let envelope = inbound.into_envelope();
        let payload = body_payload(&envelope)
            .map_err(|e| DeliveryFailure::Transport(e.to_string()))?
            .ok_or_else(|| DeliveryFailure::Transport("SOAP response body is empty".into()))?;
        P::decode_response(payload).map_err(|e| DeliveryFailure::Transport(e.to_string()))
    }
}

/// Faults carrying the version's rejection detail are the service refusing the
/// document; any other fault is a communication problem.
fn fault_failure<P: Protocol>(fault: &SoapFault) -> DeliveryFailure {
    if fault.detail_entry(P::FAULT_DETAIL).is_none() {
        return DeliveryFailure::Transport(fault.to_string());
    }
    let mut messages = fault.detail_messages(P::FAULT_DETAIL);
    if messages.is_empty() {
        messages.push(if fault.reason.is_empty() {
            "the service rejected the document".to_string()
        } else {
            fault.reason.clone()
        });
    }
    DeliveryFailure::ApplicationFault(messages)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Ws120, Ws200};

    fn fault(detail: Option<&str>, reason: &str) -> SoapFault {
        let detail = detail.map(|xml| {
            Element::parse(format!("<detail>{xml}</detail>").as_bytes()).unwrap()
        });
        SoapFault {
            code: "Server".into(),
            reason: reason.into(),
            detail,
        }
    }

    #[test]
    fn rejection_detail_is_version_specific() {
        let upload = fault(
            Some("<UploadException><Message>Invalid UID</Message></UploadException>"),
            "rejected",
        );
        assert_eq!(
            fault_failure::<Ws120>(&upload),
            DeliveryFailure::ApplicationFault(vec!["Invalid UID".into()])
        );
        assert!(matches!(
            fault_failure::<Ws200>(&upload),
            DeliveryFailure::Transport(_)
        ));
    }

    #[test]
    fn rejection_without_messages_uses_reason() {
        let delivery = fault(Some("<DeliverInvoiceFault/>"), "Invoice is a duplicate");
        assert_eq!(
            fault_failure::<Ws200>(&delivery),
            DeliveryFailure::ApplicationFault(vec!["Invoice is a duplicate".into()])
        );
    }

    #[test]
    fn unknown_fault_is_a_transport_failure() {
        let failure = fault_failure::<Ws200>(&fault(None, "Internal error"));
        assert_eq!(failure.field(), "webservice");
        assert_eq!(failure.messages(), vec!["Internal error (Server)"]);
    }
}
