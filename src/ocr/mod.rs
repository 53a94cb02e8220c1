//! Extraction strategies.
//!
//! Defines the [`PageExtractor`] capability and the [`ExtractionStrategy`]
//! chosen once per invocation: the remote OCR endpoint when both its URL and
//! API key are configured, local PDF text extraction otherwise.

pub mod local;
pub mod normalize;
pub mod remote;

use crate::document::{Document, Usage};
use crate::error::Result;
use crate::source::RawFile;

pub use local::LocalPdfExtractor;
pub use remote::RemoteOcr;

/// Async capability implemented by each extraction backend.
#[async_trait::async_trait]
pub trait PageExtractor: Send + Sync {
    fn name(&self) -> &str;
    async fn extract(&self, file: &RawFile) -> Result<Vec<Document>>;
}

/// Known strategies, selected from invocation-wide configuration.
pub enum ExtractionStrategy {
    Remote(RemoteOcr),
    Local(LocalPdfExtractor),
}

impl ExtractionStrategy {
    /// Remote OCR only when both `ocr_url` and `api_key` are non-empty.
    pub fn select(
        client: reqwest::Client,
        ocr_url: Option<&str>,
        api_key: Option<&str>,
        usage: Usage,
        legacy_build: bool,
    ) -> Self {
        fn non_empty(value: Option<&str>) -> Option<&str> {
            value.map(str::trim).filter(|v| !v.is_empty())
        }

        match (non_empty(ocr_url), non_empty(api_key)) {
            (Some(url), Some(key)) => Self::Remote(RemoteOcr::new(client, url, key, usage)),
            _ => Self::Local(LocalPdfExtractor::new(usage, legacy_build)),
        }
    }
}

#[async_trait::async_trait]
impl PageExtractor for ExtractionStrategy {
    fn name(&self) -> &str {
        match self {
            Self::Remote(remote) => remote.name(),
            Self::Local(local) => local.name(),
        }
    }

    async fn extract(&self, file: &RawFile) -> Result<Vec<Document>> {
        match self {
            Self::Remote(remote) => remote.extract(file).await,
            Self::Local(local) => local.extract(file).await,
        }
    }
}
