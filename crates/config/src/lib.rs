use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

const APP_NAME: &str = "erb-sender";
const KEYCHAIN_SERVICE: &str = "at.gv.erb.sender.credentials";

/// Overrides the keychain, e.g. on build servers.
pub const PASSWORD_ENV: &str = "ERB_WS_PASSWORD";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub webservice: WebserviceSettings,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebserviceSettings {
    pub username: Option<String>,
    #[serde(default = "default_protocol")]
    pub protocol: String, // "1.2" | "2.0"
    #[serde(default = "default_endpoint")]
    pub endpoint: String, // "production" | "test" | URL
    #[serde(default = "default_encoding")]
    pub invoice_encoding: String,
    #[serde(default)]
    pub debug_mode: bool,
    #[serde(default)]
    pub trust_all_certificates: bool,
    #[serde(default)]
    pub trust_all_hostnames: bool,
    /// prefix -> namespace URI used when serializing invoice documents
    #[serde(default)]
    pub namespaces: BTreeMap<String, String>,
}

impl Default for WebserviceSettings {
    fn default() -> Self {
        Self {
            username: None,
            protocol: default_protocol(),
            endpoint: default_endpoint(),
            invoice_encoding: default_encoding(),
            debug_mode: false,
            trust_all_certificates: false,
            trust_all_hostnames: false,
            namespaces: BTreeMap::new(),
        }
    }
}

fn default_protocol() -> String {
    "2.0".to_string()
}

fn default_endpoint() -> String {
    "production".to_string()
}

fn default_encoding() -> String {
    "UTF-8".to_string()
}

fn parse_bool(key: &str, value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "yes" | "on" | "1" => Ok(true),
        "false" | "no" | "off" | "0" => Ok(false),
        other => bail!("{key} expects true or false, got {other:?}"),
    }
}

impl AppConfig {
    /// Updates one setting by its dotted name, e.g. `webservice.endpoint` or
    /// `webservice.namespaces.eb`. The `webservice.` prefix may be omitted.
    pub fn set(&mut self, key: &str, value: &str) -> Result<()> {
        let key = key.strip_prefix("webservice.").unwrap_or(key);
        let ws = &mut self.webservice;
        match key {
            "username" => {
                ws.username = Some(value.trim().to_string()).filter(|u| !u.is_empty());
            }
            "protocol" => ws.protocol = value.trim().to_string(),
            "endpoint" => ws.endpoint = value.trim().to_string(),
            "invoice_encoding" => ws.invoice_encoding = value.trim().to_string(),
            "debug_mode" => ws.debug_mode = parse_bool(key, value)?,
            "trust_all_certificates" => ws.trust_all_certificates = parse_bool(key, value)?,
            "trust_all_hostnames" => ws.trust_all_hostnames = parse_bool(key, value)?,
            _ => match key.strip_prefix("namespaces.") {
                Some(prefix) if value.trim().is_empty() => {
                    ws.namespaces.remove(prefix);
                }
                Some(prefix) => {
                    ws.namespaces
                        .insert(prefix.to_string(), value.trim().to_string());
                }
                None => bail!("unknown setting {key:?}"),
            },
        }
        Ok(())
    }
}

pub fn load() -> Result<AppConfig> {
    let cfg: AppConfig = confy::load(APP_NAME, None).context("Failed to load app config")?;
    Ok(cfg)
}

pub fn store(cfg: &AppConfig) -> Result<()> {
    confy::store(APP_NAME, None, cfg).context("Failed to store app config")?;
    Ok(())
}

pub fn config_path() -> Result<std::path::PathBuf> {
    confy::get_configuration_file_path(APP_NAME, None).context("Failed to locate app config")
}

/// Store a secret in the OS keychain
pub fn store_secret(key: &str, value: &str) -> Result<()> {
    let entry = keyring::Entry::new(KEYCHAIN_SERVICE, key)?;
    entry.set_password(value)?;
    Ok(())
}

/// Retrieve a secret from the OS keychain
pub fn get_secret(key: &str) -> Result<String> {
    let entry = keyring::Entry::new(KEYCHAIN_SERVICE, key)?;
    let password = entry.get_password()?;
    Ok(password)
}

/// Delete a secret from the OS keychain
pub fn delete_secret(key: &str) -> Result<()> {
    let entry = keyring::Entry::new(KEYCHAIN_SERVICE, key)?;
    entry.delete_password()?;
    Ok(())
}

/// Webservice password for `username`, from the environment or the keychain.
pub fn webservice_password(username: &str) -> Result<String> {
    if let Ok(password) = std::env::var(PASSWORD_ENV) {
        tracing::debug!("using webservice password from {}", PASSWORD_ENV);
        return Ok(password);
    }
    get_secret(username).with_context(|| {
        format!("No password for {username:?} in {PASSWORD_ENV} or the OS keychain")
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_fields_fall_back_to_defaults() {
        let cfg: AppConfig =
            serde_json::from_str(r#"{"webservice":{"username":"alice","debug_mode":true}}"#)
                .unwrap();
        assert_eq!(cfg.webservice.username.as_deref(), Some("alice"));
        assert_eq!(cfg.webservice.protocol, "2.0");
        assert_eq!(cfg.webservice.endpoint, "production");
        assert_eq!(cfg.webservice.invoice_encoding, "UTF-8");
        assert!(cfg.webservice.debug_mode);
        assert!(!cfg.webservice.trust_all_certificates);

        let empty: AppConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(empty, AppConfig::default());
    }

    #[test]
    fn set_updates_named_settings() {
        let mut cfg = AppConfig::default();
        cfg.set("webservice.username", "alice").unwrap();
        cfg.set("protocol", "1.2").unwrap();
        cfg.set("trust_all_hostnames", "yes").unwrap();
        cfg.set("namespaces.eb", "http://www.ebinterface.at/schema/6p0/")
            .unwrap();

        assert_eq!(cfg.webservice.username.as_deref(), Some("alice"));
        assert_eq!(cfg.webservice.protocol, "1.2");
        assert!(cfg.webservice.trust_all_hostnames);
        assert_eq!(
            cfg.webservice.namespaces.get("eb").map(String::as_str),
            Some("http://www.ebinterface.at/schema/6p0/")
        );

        cfg.set("namespaces.eb", "").unwrap();
        assert!(cfg.webservice.namespaces.is_empty());
    }

    #[test]
    fn set_rejects_unknown_keys_and_bad_flags() {
        let mut cfg = AppConfig::default();
        assert!(cfg.set("provider.kind", "mock").is_err());
        assert!(cfg.set("debug_mode", "maybe").is_err());
        assert_eq!(cfg, AppConfig::default());
    }
}
