//! Server configuration.
//!
//! Values come from the environment (optionally via a `.env` file loaded in
//! `main`). Per-invocation settings such as the OCR URL may still be supplied
//! in the node inputs; the values here are fallbacks.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use tracing::info;

const DEFAULT_BIND_ADDR: &str = "0.0.0.0:3000";
const DEFAULT_STORAGE_PATH: &str = "storage";
const DEFAULT_OCR_TIMEOUT_SECS: u64 = 120;

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind_addr: String,
    /// Root of `<organizationId>/<flowId>/<key>` stored files.
    pub file_storage_path: PathBuf,
    /// OCR endpoint used when a request does not name one.
    pub default_ocr_url: Option<String>,
    /// Transport-level timeout for the OCR call.
    pub ocr_timeout: Duration,
}

impl ServerConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let ocr_timeout_secs = match lookup("OCR_TIMEOUT_SECS") {
            Some(raw) => raw
                .trim()
                .parse::<u64>()
                .with_context(|| format!("Invalid OCR_TIMEOUT_SECS: {:?}", raw))?,
            None => DEFAULT_OCR_TIMEOUT_SECS,
        };

        let config = Self {
            bind_addr: lookup("BIND_ADDR").unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string()),
            file_storage_path: lookup("FILE_STORAGE_PATH")
                .unwrap_or_else(|| DEFAULT_STORAGE_PATH.to_string())
                .into(),
            default_ocr_url: lookup("CUSTOM_OCR_URL").filter(|url| !url.trim().is_empty()),
            ocr_timeout: Duration::from_secs(ocr_timeout_secs),
        };

        info!(
            "Config: bind={}, storage={:?}, default OCR URL set={}, timeout={}s",
            config.bind_addr,
            config.file_storage_path,
            config.default_ocr_url.is_some(),
            ocr_timeout_secs
        );
        Ok(config)
    }

    /// HTTP client shared by every remote OCR call.
    pub fn http_client(&self) -> Result<reqwest::Client> {
        reqwest::Client::builder()
            .timeout(self.ocr_timeout)
            .build()
            .context("Failed to build HTTP client")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = ServerConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.bind_addr, "0.0.0.0:3000");
        assert_eq!(config.file_storage_path, PathBuf::from("storage"));
        assert!(config.default_ocr_url.is_none());
        assert_eq!(config.ocr_timeout, Duration::from_secs(120));
    }

    #[test]
    fn test_overrides() {
        let config = ServerConfig::from_lookup(lookup(&[
            ("BIND_ADDR", "127.0.0.1:8080"),
            ("FILE_STORAGE_PATH", "/data"),
            ("CUSTOM_OCR_URL", "http://ocr.local/parse"),
            ("OCR_TIMEOUT_SECS", "5"),
        ]))
        .unwrap();
        assert_eq!(config.bind_addr, "127.0.0.1:8080");
        assert_eq!(config.default_ocr_url.as_deref(), Some("http://ocr.local/parse"));
        assert_eq!(config.ocr_timeout, Duration::from_secs(5));
    }

    #[test]
    fn test_invalid_timeout() {
        let err = ServerConfig::from_lookup(lookup(&[("OCR_TIMEOUT_SECS", "soon")])).unwrap_err();
        assert!(err.to_string().contains("OCR_TIMEOUT_SECS"));
    }

    #[test]
    fn test_blank_ocr_url_is_unset() {
        let config = ServerConfig::from_lookup(lookup(&[("CUSTOM_OCR_URL", " ")])).unwrap();
        assert!(config.default_ocr_url.is_none());
    }
}
