//! Domain types shared by the ER>B webservice senders.

pub mod encoding;
pub mod models;
pub mod namespace;
pub mod parsing;
pub mod serialize;

pub use encoding::{EncodingError, InvoiceEncoding};
pub use models::{
    Attachment, DeliveryError, DeliveryResult, DeliverySettings, DeliverySuccess, ErrorDetail,
    FIELD_ARGUMENT, FIELD_DOCUMENT, FIELD_GENERAL, FIELD_WEBSERVICE,
};
pub use namespace::NamespacePrefixes;
pub use serialize::{serialize_node, SerializeError, WriterSettings};
