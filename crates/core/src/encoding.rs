//! Character encodings accepted for the invoice document.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EncodingError {
    #[error("unsupported invoice encoding: {0}")]
    Unsupported(String),
    #[error("character {ch:?} at byte {position} cannot be represented in {encoding}")]
    Unmappable {
        ch: char,
        position: usize,
        encoding: &'static str,
    },
}

/// Encoding of the invoice bytes. The XSD of both webservice versions defaults to
/// UTF-8.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum InvoiceEncoding {
    #[default]
    Utf8,
    Iso8859_1,
    UsAscii,
}

impl InvoiceEncoding {
    /// Canonical name, as written into the `encoding` attribute and the XML
    /// declaration.
    pub fn name(self) -> &'static str {
        match self {
            InvoiceEncoding::Utf8 => "UTF-8",
            InvoiceEncoding::Iso8859_1 => "ISO-8859-1",
            InvoiceEncoding::UsAscii => "US-ASCII",
        }
    }

    fn max_char(self) -> u32 {
        match self {
            InvoiceEncoding::Utf8 => char::MAX as u32,
            InvoiceEncoding::Iso8859_1 => 0xFF,
            InvoiceEncoding::UsAscii => 0x7F,
        }
    }

    pub fn can_encode(self, ch: char) -> bool {
        ch as u32 <= self.max_char()
    }

    /// Encode `text`, failing on the first character the encoding cannot hold.
    pub fn encode(self, text: &str) -> Result<Vec<u8>, EncodingError> {
        if self == InvoiceEncoding::Utf8 {
            return Ok(text.as_bytes().to_vec());
        }
        let mut out = Vec::with_capacity(text.len());
        for (position, ch) in text.char_indices() {
            if !self.can_encode(ch) {
                return Err(EncodingError::Unmappable {
                    ch,
                    position,
                    encoding: self.name(),
                });
            }
            out.push(ch as u8);
        }
        Ok(out)
    }

    pub fn decode(self, bytes: &[u8]) -> Result<String, EncodingError> {
        match self {
            InvoiceEncoding::Utf8 => String::from_utf8(bytes.to_vec())
                .map_err(|e| EncodingError::Unsupported(format!("invalid UTF-8: {e}"))),
            InvoiceEncoding::Iso8859_1 => Ok(bytes.iter().map(|&b| b as char).collect()),
            InvoiceEncoding::UsAscii => {
                if let Some(position) = bytes.iter().position(|b| !b.is_ascii()) {
                    return Err(EncodingError::Unmappable {
                        ch: char::REPLACEMENT_CHARACTER,
                        position,
                        encoding: self.name(),
                    });
                }
                Ok(bytes.iter().map(|&b| b as char).collect())
            }
        }
    }
}

impl fmt::Display for InvoiceEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for InvoiceEncoding {
    type Err = EncodingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace('_', "-");
        match normalized.as_str() {
            "utf-8" | "utf8" => Ok(InvoiceEncoding::Utf8),
            "iso-8859-1" | "iso8859-1" | "latin1" | "latin-1" => Ok(InvoiceEncoding::Iso8859_1),
            "us-ascii" | "ascii" => Ok(InvoiceEncoding::UsAscii),
            _ => Err(EncodingError::Unsupported(s.to_string())),
        }
    }
}

impl TryFrom<String> for InvoiceEncoding {
    type Error = EncodingError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<InvoiceEncoding> for String {
    fn from(value: InvoiceEncoding) -> Self {
        value.name().to_string()
    }
}
