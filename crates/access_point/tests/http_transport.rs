use access_point::{Endpoint, SenderConfig, Ws120Sender, Ws200Sender};
use anyhow::Result;
use erb_core::DeliverySettings;
use url::Url;
use wiremock::matchers::{body_string_contains, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const INVOICE: &[u8] = br#"<Invoice xmlns="urn:oasis:names:specification:ubl:schema:xsd:Invoice-2"/>"#;

fn config(server_uri: &str, path: &str) -> Result<SenderConfig> {
    let url = Url::parse(&format!("{server_uri}{path}"))?;
    Ok(SenderConfig::new("alice", "secret")?.with_endpoint(Endpoint::Custom(url)))
}

#[tokio::test]
async fn posts_one_soap_request_with_credentials() -> Result<()> {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/at.gv.bmf.erb/V2"))
        .and(header("SOAPAction", "\"\""))
        .and(header("Content-Type", "text/xml; charset=utf-8"))
        .and(body_string_contains("<wsse:Username>alice</wsse:Username>"))
        .and(body_string_contains("<wsse:Password>secret</wsse:Password>"))
        .and(body_string_contains("<del:Test>true</del:Test>"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            r#"<S:Envelope xmlns:S="http://schemas.xmlsoap.org/soap/envelope/"><S:Body><DeliveryResponse><Success><InvoiceID>4711</InvoiceID></Success></DeliveryResponse></S:Body></S:Envelope>"#,
        ))
        .expect(1)
        .mount(&server)
        .await;

    let sender = Ws200Sender::new(config(&server.uri(), "/at.gv.bmf.erb/V2")?);
    let result = sender
        .deliver_invoice(INVOICE, &[], &DeliverySettings::test_only())
        .await?;

    assert_eq!(
        result.success().and_then(|s| s.document_id.as_deref()),
        Some("4711")
    );
    Ok(())
}

#[tokio::test]
async fn http_500_fault_is_decoded() -> Result<()> {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500).set_body_string(
            r#"<S:Envelope xmlns:S="http://schemas.xmlsoap.org/soap/envelope/"><S:Body><S:Fault><faultcode>S:Server</faultcode><faultstring>rejected</faultstring><detail><UploadException><Message>Unbekannter Rechnungsempfänger</Message></UploadException></detail></S:Fault></S:Body></S:Envelope>"#,
        ))
        .expect(1)
        .mount(&server)
        .await;

    let sender = Ws120Sender::new(config(&server.uri(), "/at.gv.bmf.erb/V1")?);
    let result = sender
        .deliver_invoice(INVOICE, &[], &DeliverySettings::default())
        .await?;

    let error = result.error().expect("error result");
    assert_eq!(error.fields(), vec!["document"]);
    assert_eq!(error.messages(), vec!["Unbekannter Rechnungsempfänger"]);
    Ok(())
}

#[tokio::test]
async fn other_http_status_is_a_webservice_error() -> Result<()> {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(503).set_body_string("Service Unavailable"))
        .expect(1)
        .mount(&server)
        .await;

    let sender = Ws200Sender::new(config(&server.uri(), "/V2")?);
    let result = sender
        .deliver_invoice(INVOICE, &[], &DeliverySettings::default())
        .await?;

    let error = result.error().expect("error result");
    assert_eq!(error.fields(), vec!["webservice"]);
    assert!(error.messages()[0].contains("503"));
    Ok(())
}

#[tokio::test]
async fn unreachable_server_is_a_webservice_error() -> Result<()> {
    let uri = {
        let server = MockServer::start().await;
        server.uri()
    };

    let sender = Ws200Sender::new(config(&uri, "/V2")?);
    let result = sender
        .deliver_invoice(INVOICE, &[], &DeliverySettings::default())
        .await?;

    let error = result.error().expect("error result");
    assert_eq!(error.fields(), vec!["webservice"]);
    assert!(error.messages()[0].contains(&uri));
    Ok(())
}
