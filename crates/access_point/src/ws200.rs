//! ER>B Webservice 2.0, "invoice delivery". Attachments are always embedded.

use crate::protocol::Protocol;
use crate::sender::InvoiceSender;
use crate::transport::HttpConnector;

#[derive(Debug, Clone, Copy, Default)]
pub struct Ws200;

impl Protocol for Ws200 {
    const NAME: &'static str = "2.0";
    const NAMESPACE: &'static str = "http://erb.eproc.brz.gv.at/ws/invoicedelivery/201306/";
    const PREFIX: &'static str = "del";
    const PRODUCTION_URL: &'static str = "https://txm.portal.at/at.gv.bmf.erb/V2";
    const TEST_URL: &'static str = "https://txm.portal.at/at.gv.bmf.erb.test/V2";
    const SOAP_ACTION: &'static str = "";
    const OPERATION: &'static str = "Delivery";
    const DOCUMENT_ELEMENT: &'static str = "Invoice";
    const ATTACHMENT_ELEMENT: &'static str = "EmbeddedAttachment";
    const FAULT_DETAIL: &'static str = "DeliverInvoiceFault";
    const ERROR_DETAIL_PATH: &'static [&'static str] = &["ErrorDetail"];
    const DOCUMENT_ID_FIELDS: &'static [&'static str] = &["InvoiceID", "DocumentID", "DeliveryID"];
}

pub type Ws200Sender<C = HttpConnector> = InvoiceSender<Ws200, C>;
