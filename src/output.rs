//! Final shaping of a loader invocation's result.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::document::Document;
use crate::error::{LoaderError, Result};

/// Which output the caller asked for. Anything other than `document` means text.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputChannel {
    #[default]
    Document,
    #[serde(other)]
    Text,
}

/// Result of one invocation.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum LoaderOutput {
    Documents(Vec<Document>),
    Text(String),
}

/// Parse the caller's metadata overlay. Accepts an object or a JSON-encoded
/// string; empty values mean no overlay.
pub fn parse_metadata_overlay(value: Option<&Value>) -> Result<Option<Map<String, Value>>> {
    let parsed = match value {
        None | Some(Value::Null) => return Ok(None),
        Some(Value::String(raw)) if raw.trim().is_empty() => return Ok(None),
        Some(Value::String(raw)) => serde_json::from_str::<Value>(raw)?,
        Some(other) => other.clone(),
    };

    match parsed {
        Value::Object(map) => Ok(Some(map)),
        Value::Null => Ok(None),
        other => Err(LoaderError::Metadata(serde::de::Error::custom(format!(
            "metadata must be a JSON object, got {}",
            other
        )))),
    }
}

/// Merge the overlay onto every document, then render the requested channel.
pub fn finalize(
    mut documents: Vec<Document>,
    overlay: Option<&Map<String, Value>>,
    channel: OutputChannel,
) -> LoaderOutput {
    if let Some(overlay) = overlay {
        for document in &mut documents {
            document.merge_metadata(overlay);
        }
    }

    match channel {
        OutputChannel::Document => LoaderOutput::Documents(documents),
        OutputChannel::Text => LoaderOutput::Text(escape_characters(&concat_text(&documents))),
    }
}

/// Every document's content followed by a newline.
pub fn concat_text(documents: &[Document]) -> String {
    documents
        .iter()
        .map(|d| format!("{}\n", d.page_content))
        .collect()
}

/// Newlines become the two-character sequence `\n` so the text survives as a
/// single-line string value downstream.
pub fn escape_characters(text: &str) -> String {
    text.replace('\n', "\\n")
}
