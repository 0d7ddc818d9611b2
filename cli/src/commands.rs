use crate::SendArgs;
use access_point::{
    Connector, Endpoint, InvoiceSender, Protocol, ProtocolVersion, SenderConfig, Ws120, Ws200,
};
use anyhow::{anyhow, bail, Context, Result};
use config::{AppConfig, WebserviceSettings};
use erb_core::parsing::summarize_invoice;
use erb_core::{Attachment, DeliveryResult, DeliverySettings, InvoiceEncoding, NamespacePrefixes};
use serde::Serialize;
use std::io::BufRead;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

#[derive(Debug, Serialize)]
struct FileResult {
    path: String,
    #[serde(flatten)]
    result: DeliveryResult,
}

fn load_config() -> AppConfig {
    config::load().unwrap_or_else(|e| {
        tracing::warn!("{e:#}; using default settings");
        AppConfig::default()
    })
}

fn username(settings: &WebserviceSettings, explicit: Option<String>) -> Result<String> {
    explicit
        .or_else(|| settings.username.clone())
        .ok_or_else(|| anyhow!("No webservice username; run `erb-send config set username <name>`"))
}

/// Translates stored settings into a sender configuration.
pub fn sender_config(settings: &WebserviceSettings, password: String) -> Result<SenderConfig> {
    let username = username(settings, None)?;
    let encoding: InvoiceEncoding = settings
        .invoice_encoding
        .parse()
        .context("Invalid invoice_encoding setting")?;
    let endpoint: Endpoint = settings
        .endpoint
        .parse()
        .with_context(|| format!("Invalid endpoint setting {:?}", settings.endpoint))?;

    let mut cfg = SenderConfig::new(username, password)?
        .with_invoice_encoding(encoding)
        .with_debug_mode(settings.debug_mode)
        .with_trust_all_certificates(settings.trust_all_certificates)
        .with_trust_all_hostnames(settings.trust_all_hostnames)
        .with_endpoint(endpoint);
    if !settings.namespaces.is_empty() {
        let prefixes: NamespacePrefixes = settings.namespaces.clone().into();
        cfg.set_namespace_prefixes(Some(prefixes));
    }
    Ok(cfg)
}

fn guess_mime_type(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());
    match ext.as_deref() {
        Some("pdf") => "application/pdf",
        Some("xml") => "text/xml",
        Some("txt") => "text/plain",
        Some("png") => "image/png",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("tif") | Some("tiff") => "image/tiff",
        _ => "application/octet-stream",
    }
}

fn collect_invoices(paths: &[PathBuf]) -> Vec<PathBuf> {
    let mut result = Vec::new();
    for path in paths {
        if !path.is_dir() {
            result.push(path.clone());
            continue;
        }
        let mut found: Vec<PathBuf> = WalkDir::new(path)
            .into_iter()
            .filter_map(Result::ok)
            .filter(|entry| entry.file_type().is_file())
            .filter(|entry| {
                entry
                    .path()
                    .extension()
                    .and_then(|e| e.to_str())
                    .map(|ext| ext.eq_ignore_ascii_case("xml"))
                    .unwrap_or(false)
            })
            .map(|entry| entry.into_path())
            .collect();
        found.sort();
        result.extend(found);
    }
    result
}

async fn read_attachments(args: &SendArgs) -> Result<Vec<Attachment>> {
    let mut attachments = Vec::with_capacity(args.attachments.len());
    for path in &args.attachments {
        let content = tokio::fs::read(path)
            .await
            .with_context(|| format!("Failed to read attachment {}", path.display()))?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        let mime = args
            .mime
            .clone()
            .unwrap_or_else(|| guess_mime_type(path).to_string());
        attachments.push(Attachment::new(name, mime, content));
    }
    Ok(attachments)
}

async fn deliver_file<P: Protocol, C: Connector>(
    sender: &InvoiceSender<P, C>,
    path: &Path,
    attachments: &[Attachment],
    settings: &DeliverySettings,
) -> DeliveryResult {
    let bytes = match tokio::fs::read(path).await {
        Ok(bytes) => bytes,
        Err(e) => {
            tracing::error!(path = %path.display(), "failed to read invoice: {e}");
            return DeliveryResult::failure(erb_core::FIELD_ARGUMENT, [e.to_string()]);
        }
    };

    let encoding = sender.config().invoice_encoding();
    let text = encoding.decode(&bytes);
    match text.as_deref().map_err(|e| anyhow!("{e}")).and_then(summarize_invoice) {
        Ok(summary) => tracing::info!(
            path = %path.display(),
            format = ?summary.format,
            invoice_number = summary.invoice_number.as_deref().unwrap_or("-"),
            biller = summary.biller_name.as_deref().unwrap_or("-"),
            "sending invoice"
        ),
        Err(e) => tracing::warn!(path = %path.display(), "could not inspect invoice: {e:#}"),
    }

    // Without a prefix mapping the file goes out byte for byte.
    if sender.config().namespace_prefixes().is_none() {
        return sender
            .deliver_invoice(&bytes, attachments, settings)
            .await
            .unwrap_or_else(|failure| failure.into_result());
    }

    let text = match text {
        Ok(text) => text,
        Err(e) => {
            return DeliveryResult::failure(
                erb_core::FIELD_DOCUMENT,
                [format!("Invoice is not valid {encoding}: {e}")],
            )
        }
    };
    match roxmltree::Document::parse(&text) {
        Ok(doc) => sender
            .deliver_invoice_node(doc.root(), attachments, settings)
            .await
            .unwrap_or_else(|failure| failure.into_result()),
        Err(e) => DeliveryResult::failure(
            erb_core::FIELD_DOCUMENT,
            [format!("Invoice is not well-formed XML: {e}")],
        ),
    }
}

async fn deliver_all<P: Protocol>(
    config: SenderConfig,
    files: &[PathBuf],
    attachments: &[Attachment],
    settings: &DeliverySettings,
) -> Result<bool> {
    let sender = InvoiceSender::<P>::new(config);
    let endpoint = sender.endpoint_url()?;
    tracing::info!(protocol = P::NAME, %endpoint, files = files.len(), "starting delivery");

    let mut all_ok = true;
    for path in files {
        let result = deliver_file(&sender, path, attachments, settings).await;
        all_ok &= result.is_success();
        let line = FileResult {
            path: path.display().to_string(),
            result,
        };
        println!("{}", serde_json::to_string(&line)?);
    }
    Ok(all_ok)
}

/// Returns whether every invoice was accepted.
pub async fn send(args: SendArgs) -> Result<bool> {
    let cfg = load_config();
    let ws = &cfg.webservice;
    let user = username(ws, None)?;
    let password = config::webservice_password(&user)?;

    let mut sender_cfg = sender_config(ws, password)?;
    if args.test_endpoint {
        sender_cfg.set_endpoint(Endpoint::Test);
    }
    let version: ProtocolVersion = args
        .protocol
        .as_deref()
        .unwrap_or(&ws.protocol)
        .parse()?;

    let files = collect_invoices(&args.paths);
    if files.is_empty() {
        bail!("No invoice files found");
    }
    let attachments = read_attachments(&args).await?;
    let settings = DeliverySettings::default().with_test(args.test_only);

    match version {
        ProtocolVersion::V1_2 => deliver_all::<Ws120>(sender_cfg, &files, &attachments, &settings).await,
        ProtocolVersion::V2_0 => deliver_all::<Ws200>(sender_cfg, &files, &attachments, &settings).await,
    }
}

pub fn show_config() -> Result<()> {
    let cfg = load_config();
    if let Ok(path) = config::config_path() {
        tracing::info!(path = %path.display(), "settings file");
    }
    println!("{}", serde_json::to_string_pretty(&cfg)?);
    Ok(())
}

pub fn set_config(key: &str, value: &str) -> Result<()> {
    let mut cfg = load_config();
    cfg.set(key, value)?;
    // reject values a sender could not use later
    match key.strip_prefix("webservice.").unwrap_or(key) {
        "protocol" => {
            value.parse::<ProtocolVersion>()?;
        }
        "endpoint" => {
            value
                .parse::<Endpoint>()
                .with_context(|| format!("Invalid endpoint {value:?}"))?;
        }
        "invoice_encoding" => {
            value.parse::<InvoiceEncoding>()?;
        }
        _ => {}
    }
    config::store(&cfg)?;
    tracing::info!(key, "Settings updated");
    Ok(())
}

pub fn set_password(username_arg: Option<String>) -> Result<()> {
    let cfg = load_config();
    let user = username(&cfg.webservice, username_arg)?;
    eprintln!("Password for {user}:");
    let mut line = String::new();
    std::io::stdin()
        .lock()
        .read_line(&mut line)
        .context("Failed to read password")?;
    let password = line.trim_end_matches(['\r', '\n']);
    if password.is_empty() {
        bail!("Password must not be empty");
    }
    config::store_secret(&user, password)?;
    tracing::info!(username = %user, "Password stored in keychain");
    Ok(())
}

pub fn delete_password(username_arg: Option<String>) -> Result<()> {
    let cfg = load_config();
    let user = username(&cfg.webservice, username_arg)?;
    config::delete_secret(&user)?;
    tracing::info!(username = %user, "Password removed from keychain");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use access_point::mock::MockConnector;
    use std::collections::BTreeMap;

    fn settings() -> WebserviceSettings {
        WebserviceSettings {
            username: Some("alice".into()),
            ..WebserviceSettings::default()
        }
    }

    #[test]
    fn stored_settings_become_sender_config() {
        let mut ws = settings();
        ws.endpoint = "test".into();
        ws.invoice_encoding = "latin1".into();
        ws.trust_all_certificates = true;
        ws.namespaces = BTreeMap::from([(
            "eb".to_string(),
            "http://www.ebinterface.at/schema/6p0/".to_string(),
        )]);

        let cfg = sender_config(&ws, "secret".into()).unwrap();
        assert_eq!(cfg.username(), "alice");
        assert!(cfg.endpoint().is_test());
        assert_eq!(cfg.invoice_encoding(), InvoiceEncoding::Iso8859_1);
        assert!(cfg.trust_all_certificates());
        assert!(!cfg.trust_all_hostnames());
        assert_eq!(
            cfg.namespace_prefixes()
                .and_then(|p| p.prefix_for("http://www.ebinterface.at/schema/6p0/")),
            Some("eb")
        );
    }

    #[test]
    fn missing_username_or_password_is_an_error() {
        assert!(sender_config(&WebserviceSettings::default(), "secret".into()).is_err());
        assert!(sender_config(&settings(), String::new()).is_err());
    }

    #[test]
    fn bad_endpoint_is_reported() {
        let mut ws = settings();
        ws.endpoint = "staging".into();
        assert!(sender_config(&ws, "secret".into()).is_err());
    }

    fn prefixed_sender(
        encoding: InvoiceEncoding,
    ) -> (InvoiceSender<Ws200, MockConnector>, MockConnector) {
        let mut ws = settings();
        ws.namespaces = BTreeMap::from([(
            "eb".to_string(),
            "http://www.ebinterface.at/schema/4p0/".to_string(),
        )]);
        let cfg = sender_config(&ws, "secret".into())
            .unwrap()
            .with_invoice_encoding(encoding);
        let connector = MockConnector::new();
        (
            InvoiceSender::with_connector(cfg, connector.clone()),
            connector,
        )
    }

    async fn write_invoice(name: &str, bytes: &[u8]) -> PathBuf {
        let path = std::env::temp_dir().join(format!("{name}-{}.xml", std::process::id()));
        tokio::fs::write(&path, bytes).await.unwrap();
        path
    }

    const LATIN1_INVOICE: &[u8] = b"<?xml version=\"1.0\" encoding=\"ISO-8859-1\"?>\n<Invoice xmlns=\"http://www.ebinterface.at/schema/4p0/\"><Biller><Address><Street>Stra\xdfe 1</Street></Address></Biller></Invoice>";

    #[tokio::test]
    async fn latin1_file_is_read_in_configured_encoding() {
        let path = write_invoice("erb-latin1", LATIN1_INVOICE).await;
        let (sender, connector) = prefixed_sender(InvoiceEncoding::Iso8859_1);

        let result = deliver_file(&sender, &path, &[], &DeliverySettings::default()).await;
        tokio::fs::remove_file(&path).await.ok();

        assert!(result.is_success(), "{result:?}");
        assert_eq!(connector.call_count(), 1);
    }

    #[tokio::test]
    async fn undecodable_file_is_a_document_error() {
        let path = write_invoice("erb-ascii", LATIN1_INVOICE).await;
        let (sender, connector) = prefixed_sender(InvoiceEncoding::UsAscii);

        let result = deliver_file(&sender, &path, &[], &DeliverySettings::default()).await;
        tokio::fs::remove_file(&path).await.ok();

        assert_eq!(result.error().unwrap().fields(), vec!["document"]);
        assert_eq!(connector.call_count(), 0);
    }

    #[test]
    fn mime_types_from_extension() {
        assert_eq!(guess_mime_type(Path::new("scan.PDF")), "application/pdf");
        assert_eq!(guess_mime_type(Path::new("notes")), "application/octet-stream");
    }
}
