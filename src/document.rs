//! Canonical document type produced by every extraction path.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One logical unit of extracted text (a page, a whole file or a split chunk).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    pub page_content: String,
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

impl Document {
    pub fn new(page_content: impl Into<String>, metadata: Map<String, Value>) -> Self {
        Self {
            page_content: page_content.into(),
            metadata,
        }
    }

    /// Shallow-merge `overlay` into this document's metadata. Overlay keys win.
    pub fn merge_metadata(&mut self, overlay: &Map<String, Value>) {
        merge_into(&mut self.metadata, overlay);
    }
}

/// Shallow merge, `overlay` wins on key collision.
pub fn merge_into(target: &mut Map<String, Value>, overlay: &Map<String, Value>) {
    for (key, value) in overlay {
        target.insert(key.clone(), value.clone());
    }
}

/// Whether extraction yields one document per page or one per file.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Usage {
    #[default]
    #[serde(rename = "perPage")]
    PerPage,
    #[serde(rename = "perFile")]
    PerFile,
}

/// Case-insensitive `.pdf` suffix check.
pub fn is_pdf(filename: &str) -> bool {
    filename.to_lowercase().ends_with(".pdf")
}
