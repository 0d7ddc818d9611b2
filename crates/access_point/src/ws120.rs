//! ER>B Webservice 1.2, "document upload".

use crate::protocol::Protocol;
use crate::sender::InvoiceSender;
use crate::transport::HttpConnector;

#[derive(Debug, Clone, Copy, Default)]
pub struct Ws120;

impl Protocol for Ws120 {
    const NAME: &'static str = "1.2";
    const NAMESPACE: &'static str = "http://erb.eproc.brz.gv.at/ws/documentupload/20121205/";
    const PREFIX: &'static str = "upl";
    const PRODUCTION_URL: &'static str = "https://txm.portal.at/at.gv.bmf.erb/V1";
    const TEST_URL: &'static str = "https://txm.portal.at/at.gv.bmf.erb.test/V1";
    const SOAP_ACTION: &'static str = "";
    const OPERATION: &'static str = "uploadDocument";
    const DOCUMENT_ELEMENT: &'static str = "Document";
    const ATTACHMENT_ELEMENT: &'static str = "Attachment";
    const FAULT_DETAIL: &'static str = "UploadException";
    const ERROR_DETAIL_PATH: &'static [&'static str] = &["ErrorDetails", "ErrorDetail"];
    const DOCUMENT_ID_FIELDS: &'static [&'static str] = &["DocumentID"];
}

pub type Ws120Sender<C = HttpConnector> = InvoiceSender<Ws120, C>;
