use anyhow::{bail, Result};
use sha2::{Digest, Sha256};

pub fn compute_sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    let digest = hasher.finalize();
    hex::encode(digest)
}

fn find_element<'a, 'input: 'a>(
    node: roxmltree::Node<'a, 'input>,
    path: &[&str],
) -> Option<roxmltree::Node<'a, 'input>> {
    if path.is_empty() {
        return Some(node);
    }
    for child in node.children() {
        if child.is_element() && child.tag_name().name() == path[0] {
            if path.len() == 1 {
                return Some(child);
            }
            if let Some(found) = find_element(child, &path[1..]) {
                return Some(found);
            }
        }
    }
    None
}

fn get_text_at_path(doc: &roxmltree::Document, path: &[&str]) -> Option<String> {
    find_element(doc.root_element(), path)
        .and_then(|n| n.text())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

/// Invoice syntaxes ER>B accepts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InvoiceFormat {
    /// ebInterface with its version as found in the namespace, e.g. `6p0`.
    EbInterface(String),
    Ubl,
    Unknown,
}

#[derive(Debug, Clone)]
pub struct InvoiceSummary {
    pub format: InvoiceFormat,
    pub invoice_number: Option<String>,
    pub issue_date: Option<String>,
    pub currency_code: Option<String>,
    pub biller_name: Option<String>,
}

fn detect_format(root: roxmltree::Node) -> InvoiceFormat {
    let ns = root.tag_name().namespace().unwrap_or_default();
    if let Some(rest) = ns.strip_prefix("http://www.ebinterface.at/schema/") {
        return InvoiceFormat::EbInterface(rest.trim_end_matches('/').to_string());
    }
    if ns.starts_with("urn:oasis:names:specification:ubl:schema:xsd:") {
        return InvoiceFormat::Ubl;
    }
    InvoiceFormat::Unknown
}

/// Extracts the few fields worth logging before a delivery.
pub fn summarize_invoice(xml: &str) -> Result<InvoiceSummary> {
    let doc = roxmltree::Document::parse(xml)?;
    if !doc.root_element().tag_name().name().ends_with("Invoice")
        && doc.root_element().tag_name().name() != "CreditNote"
    {
        bail!(
            "unexpected root element <{}>",
            doc.root_element().tag_name().name()
        );
    }

    let format = detect_format(doc.root_element());
    let summary = match format {
        InvoiceFormat::Ubl => InvoiceSummary {
            invoice_number: get_text_at_path(&doc, &["ID"]),
            issue_date: get_text_at_path(&doc, &["IssueDate"]),
            currency_code: get_text_at_path(&doc, &["DocumentCurrencyCode"]),
            biller_name: get_text_at_path(
                &doc,
                &["AccountingSupplierParty", "Party", "PartyName", "Name"],
            )
            .or_else(|| {
                get_text_at_path(
                    &doc,
                    &[
                        "AccountingSupplierParty",
                        "Party",
                        "PartyLegalEntity",
                        "RegistrationName",
                    ],
                )
            }),
            format,
        },
        _ => InvoiceSummary {
            invoice_number: get_text_at_path(&doc, &["InvoiceNumber"]),
            issue_date: get_text_at_path(&doc, &["InvoiceDate"]),
            currency_code: doc
                .root_element()
                .attributes()
                .find(|a| a.name() == "InvoiceCurrency")
                .map(|a| a.value().to_string()),
            biller_name: get_text_at_path(&doc, &["Biller", "Address", "Name"]),
            format,
        },
    };
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sha256_of_empty_input() {
        assert_eq!(
            compute_sha256_hex(b""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn summarizes_ebinterface() {
        let xml = r#"<eb:Invoice xmlns:eb="http://www.ebinterface.at/schema/4p0/" eb:InvoiceCurrency="EUR">
  <eb:InvoiceNumber>993433000298</eb:InvoiceNumber>
  <eb:InvoiceDate>2005-01-03</eb:InvoiceDate>
  <eb:Biller><eb:Address><eb:Name>Schrauben Willi</eb:Name></eb:Address></eb:Biller>
</eb:Invoice>"#;
        let s = summarize_invoice(xml).unwrap();
        assert_eq!(s.format, InvoiceFormat::EbInterface("4p0".into()));
        assert_eq!(s.invoice_number.as_deref(), Some("993433000298"));
        assert_eq!(s.issue_date.as_deref(), Some("2005-01-03"));
        assert_eq!(s.currency_code.as_deref(), Some("EUR"));
        assert_eq!(s.biller_name.as_deref(), Some("Schrauben Willi"));
    }

    #[test]
    fn summarizes_ubl() {
        let xml = r#"<Invoice xmlns="urn:oasis:names:specification:ubl:schema:xsd:Invoice-2"
  xmlns:cbc="urn:oasis:names:specification:ubl:schema:xsd:CommonBasicComponents-2"
  xmlns:cac="urn:oasis:names:specification:ubl:schema:xsd:CommonAggregateComponents-2">
  <cbc:ID>INV-1</cbc:ID>
  <cbc:IssueDate>2024-03-01</cbc:IssueDate>
  <cbc:DocumentCurrencyCode>EUR</cbc:DocumentCurrencyCode>
  <cac:AccountingSupplierParty><cac:Party><cac:PartyName><cbc:Name>ACME</cbc:Name></cac:PartyName></cac:Party></cac:AccountingSupplierParty>
</Invoice>"#;
        let s = summarize_invoice(xml).unwrap();
        assert_eq!(s.format, InvoiceFormat::Ubl);
        assert_eq!(s.invoice_number.as_deref(), Some("INV-1"));
        assert_eq!(s.biller_name.as_deref(), Some("ACME"));
    }

    #[test]
    fn rejects_non_invoice_roots() {
        assert!(summarize_invoice("<Order/>").is_err());
        assert!(summarize_invoice("not xml").is_err());
    }
}
