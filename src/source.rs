//! Resolves the upload value of an invocation into raw file buffers.
//!
//! Two encodings are accepted:
//! - storage references: `FILE-STORAGE::<key>` or `FILE-STORAGE::["a.pdf","b.pdf"]`
//! - inline data URIs: `data:<mime>;base64,<payload>,filename:<name>`, either
//!   alone or as a JSON list of such strings.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use tracing::debug;

use crate::error::{LoaderError, Result};
use crate::storage::FileStorage;

pub const FILE_STORAGE_PREFIX: &str = "FILE-STORAGE::";

const DEFAULT_FILENAME: &str = "document";

/// One uploaded file, ready for extraction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawFile {
    pub bytes: Vec<u8>,
    pub filename: String,
}

/// Where stored files live for this invocation.
#[derive(Debug, Clone, Default)]
pub struct StorageScope {
    pub organization_id: String,
    pub flow_id: String,
}

/// Resolve an upload value into files, preserving list order.
pub async fn resolve_files(
    upload: &str,
    storage: &dyn FileStorage,
    scope: &StorageScope,
) -> Result<Vec<RawFile>> {
    if let Some(rest) = upload.strip_prefix(FILE_STORAGE_PREFIX) {
        let keys = split_list(rest)?;
        let mut files = Vec::with_capacity(keys.len());
        for key in keys {
            debug!("SourceResolver: fetching stored file {}", key);
            let bytes = storage
                .get_file(&key, &scope.organization_id, &scope.flow_id)
                .await?;
            files.push(RawFile {
                bytes,
                filename: key,
            });
        }
        return Ok(files);
    }

    split_list(upload)?
        .iter()
        .map(|entry| decode_data_uri(entry))
        .collect()
}

/// Parse a bracketed JSON list literal, or treat the value as a single entry.
/// Empty entries are dropped.
fn split_list(value: &str) -> Result<Vec<String>> {
    let trimmed = value.trim();
    let entries = if trimmed.starts_with('[') && trimmed.ends_with(']') {
        serde_json::from_str::<Vec<String>>(trimmed)
            .map_err(|e| LoaderError::Input(format!("invalid upload list: {}", e)))?
    } else {
        vec![trimmed.to_string()]
    };

    Ok(entries.into_iter().filter(|e| !e.is_empty()).collect())
}

/// Decode one inline data URI into a [`RawFile`].
pub fn decode_data_uri(uri: &str) -> Result<RawFile> {
    let (prefix, rest) = uri
        .split_once(',')
        .ok_or_else(|| LoaderError::Input("data URI is missing a payload".to_string()))?;

    // Host uploads append the original name as a trailing `,filename:<name>` segment.
    let named = rest
        .rsplit_once(",filename:")
        .map(|(payload, name)| (payload, name.to_string()));
    let (payload, filename) = named.unwrap_or_else(|| (rest, filename_from_prefix(prefix)));

    let bytes = BASE64
        .decode(payload.trim())
        .map_err(|e| LoaderError::Input(format!("invalid base64 payload for {}: {}", filename, e)))?;

    Ok(RawFile { bytes, filename })
}

/// `data:application/pdf;name=report.pdf;base64` → `report.pdf`; otherwise a
/// default name with an extension guessed from the media type.
fn filename_from_prefix(prefix: &str) -> String {
    let body = prefix.strip_prefix("data:").unwrap_or(prefix);
    let mut params = body.split(';');
    let mime = params.next().unwrap_or_default();

    for param in params {
        if let Some((name, value)) = param.split_once('=') {
            if matches!(name.trim(), "name" | "filename") && !value.is_empty() {
                return value.trim_matches('"').to_string();
            }
        }
    }

    match extension_for_mime(mime) {
        Some(ext) => format!("{}.{}", DEFAULT_FILENAME, ext),
        None => DEFAULT_FILENAME.to_string(),
    }
}

fn extension_for_mime(mime: &str) -> Option<&'static str> {
    match mime {
        "application/pdf" => Some("pdf"),
        "text/plain" => Some("txt"),
        "text/markdown" => Some("md"),
        "image/png" => Some("png"),
        "image/jpeg" => Some("jpg"),
        "image/tiff" => Some("tiff"),
        _ => None,
    }
}
