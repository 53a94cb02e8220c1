//! Local text extraction using lopdf.

use serde_json::{json, Map, Value};
use tracing::{info, warn};

use super::PageExtractor;
use crate::document::{is_pdf, Document, Usage};
use crate::error::{LoaderError, Result};
use crate::source::RawFile;

pub struct LocalPdfExtractor {
    usage: Usage,
    /// Tolerate pages whose text cannot be extracted instead of failing.
    legacy_build: bool,
}

impl LocalPdfExtractor {
    pub fn new(usage: Usage, legacy_build: bool) -> Self {
        Self {
            usage,
            legacy_build,
        }
    }
}

#[async_trait::async_trait]
impl PageExtractor for LocalPdfExtractor {
    fn name(&self) -> &str {
        "local_pdf"
    }

    async fn extract(&self, file: &RawFile) -> Result<Vec<Document>> {
        if !is_pdf(&file.filename) && !file.bytes.starts_with(b"%PDF") {
            info!("LocalPdfExtractor: {} is not a PDF, reading as text", file.filename);
            let text = String::from_utf8_lossy(&file.bytes).to_string();
            return Ok(vec![Document::new(text, source_metadata(&file.filename))]);
        }

        let data = file.bytes.clone();
        let legacy_build = self.legacy_build;
        let pages = tokio::task::spawn_blocking(move || extract_pdf_pages(&data, legacy_build))
            .await
            .map_err(|e| LoaderError::Extraction(format!("PDF extraction task failed: {}", e)))??;

        info!(
            "LocalPdfExtractor: {} has {} pages",
            file.filename,
            pages.len()
        );

        Ok(build_documents(&file.filename, pages, self.usage))
    }
}

fn source_metadata(filename: &str) -> Map<String, Value> {
    let mut metadata = Map::new();
    metadata.insert("source".to_string(), Value::String(filename.to_string()));
    metadata
}

/// Text of every physical page, in page order.
fn extract_pdf_pages(data: &[u8], legacy_build: bool) -> Result<Vec<String>> {
    let doc = lopdf::Document::load_from(std::io::Cursor::new(data))
        .map_err(|e| LoaderError::Extraction(format!("failed to load PDF: {}", e)))?;

    let page_numbers: Vec<u32> = doc.get_pages().into_keys().collect();
    collect_pages(&page_numbers, legacy_build, |page_num| {
        doc.extract_text(&[page_num])
    })
}

/// Run `extract` over every page. Failing pages become empty text when
/// `legacy_build` is set and abort the file otherwise.
fn collect_pages<F, E>(page_numbers: &[u32], legacy_build: bool, mut extract: F) -> Result<Vec<String>>
where
    F: FnMut(u32) -> std::result::Result<String, E>,
    E: std::fmt::Display,
{
    let mut pages = Vec::with_capacity(page_numbers.len());
    for &page_num in page_numbers {
        match extract(page_num) {
            Ok(text) => pages.push(text),
            Err(e) if legacy_build => {
                warn!("LocalPdfExtractor: page {} unreadable: {}", page_num, e);
                pages.push(String::new());
            }
            Err(e) => {
                return Err(LoaderError::Extraction(format!(
                    "failed to extract page {}: {}",
                    page_num, e
                )))
            }
        }
    }

    Ok(pages)
}

fn build_documents(filename: &str, pages: Vec<String>, usage: Usage) -> Vec<Document> {
    let total_pages = pages.len();
    let mut metadata = source_metadata(filename);
    metadata.insert("pdf".to_string(), json!({ "totalPages": total_pages }));

    match usage {
        Usage::PerFile => vec![Document::new(pages.join("\n\n"), metadata)],
        Usage::PerPage => pages
            .into_iter()
            .enumerate()
            .map(|(index, text)| {
                let mut page_metadata = metadata.clone();
                page_metadata.insert("loc".to_string(), json!({ "pageNumber": index + 1 }));
                Document::new(text, page_metadata)
            })
            .collect(),
    }
}
