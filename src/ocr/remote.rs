//! Custom OCR endpoint strategy.

use anyhow::Context;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use reqwest::multipart::{Form, Part};
use serde_json::Value;
use tracing::{debug, info};

use super::normalize::normalize_pages;
use super::PageExtractor;
use crate::document::{Document, Usage};
use crate::error::{LoaderError, Result};
use crate::source::RawFile;

pub const FILENAME_HEADER: &str = "X-Filename";

pub struct RemoteOcr {
    url: String,
    api_key: String,
    usage: Usage,
    client: reqwest::Client,
}

impl RemoteOcr {
    pub fn new(client: reqwest::Client, url: &str, api_key: &str, usage: Usage) -> Self {
        Self {
            url: url.to_string(),
            api_key: api_key.to_string(),
            usage,
            client,
        }
    }

    /// One POST, no retry. Returns the raw page array.
    async fn request_pages(&self, file: &RawFile) -> anyhow::Result<Vec<Value>> {
        // Every upload is labelled as PDF, whatever the file really is.
        let part = Part::bytes(file.bytes.clone())
            .file_name(file.filename.clone())
            .mime_str("application/pdf")?;
        let form = Form::new().part("files", part);

        info!(
            "RemoteOcr: sending {} ({} bytes) to {}",
            file.filename,
            file.bytes.len(),
            self.url
        );

        let response = self
            .client
            .post(&self.url)
            .bearer_auth(&self.api_key)
            .header(FILENAME_HEADER, BASE64.encode(file.filename.as_bytes()))
            .multipart(form)
            .send()
            .await
            .context("request failed")?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            anyhow::bail!("OCR API error ({}): {}", status, text);
        }

        let raw_text = response.text().await.context("failed to read response body")?;
        debug!(
            "RemoteOcr: raw response ({} bytes): {}",
            raw_text.len(),
            raw_text.chars().take(500).collect::<String>()
        );

        let body: Value =
            serde_json::from_str(&raw_text).context("response is not valid JSON")?;
        match body {
            Value::Array(pages) => Ok(pages),
            _ => anyhow::bail!("expected array of pages"),
        }
    }
}

#[async_trait::async_trait]
impl PageExtractor for RemoteOcr {
    fn name(&self) -> &str {
        "custom_ocr"
    }

    async fn extract(&self, file: &RawFile) -> Result<Vec<Document>> {
        let pages = self
            .request_pages(file)
            .await
            .map_err(|e| LoaderError::remote(format!("{} ({}): {:#}", self.url, file.filename, e)))?;

        info!("RemoteOcr: {} returned {} pages", file.filename, pages.len());
        Ok(normalize_pages(&pages, &file.filename, self.usage))
    }
}
