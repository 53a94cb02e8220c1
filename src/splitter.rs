//! Text splitting applied to extracted documents.

use std::collections::VecDeque;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Map, Value};

use crate::document::Document;
use crate::error::{LoaderError, Result};

/// Re-chunks documents after extraction. Implementations must keep input order.
#[async_trait]
pub trait TextSplitter: Send + Sync {
    async fn split_documents(&self, documents: Vec<Document>) -> Result<Vec<Document>>;
}

const SEPARATORS: [&str; 4] = ["\n\n", "\n", " ", ""];

/// Splitter settings as they arrive from the host.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SplitterSettings {
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    #[serde(default = "default_chunk_overlap")]
    pub chunk_overlap: usize,
}

fn default_chunk_size() -> usize {
    1000
}

fn default_chunk_overlap() -> usize {
    200
}

/// Splits on paragraphs, then lines, then words, then characters until every
/// chunk fits `chunk_size` characters, merging small pieces back together with
/// up to `chunk_overlap` characters carried between neighbours.
#[derive(Debug, Clone)]
pub struct RecursiveCharacterSplitter {
    chunk_size: usize,
    chunk_overlap: usize,
}

impl RecursiveCharacterSplitter {
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Result<Self> {
        if chunk_size == 0 || chunk_overlap >= chunk_size {
            return Err(LoaderError::Input(format!(
                "chunk overlap ({}) must be smaller than chunk size ({})",
                chunk_overlap, chunk_size
            )));
        }
        Ok(Self {
            chunk_size,
            chunk_overlap,
        })
    }

    pub fn from_settings(settings: SplitterSettings) -> Result<Self> {
        Self::new(settings.chunk_size, settings.chunk_overlap)
    }

    pub fn split_text(&self, text: &str) -> Vec<String> {
        self.split_recursive(text, &SEPARATORS)
    }

    fn split_recursive(&self, text: &str, separators: &[&str]) -> Vec<String> {
        let position = separators
            .iter()
            .position(|s| s.is_empty() || text.contains(s))
            .unwrap_or(separators.len().saturating_sub(1));
        let separator = separators.get(position).copied().unwrap_or("");
        let remaining = separators.get(position + 1..).unwrap_or(&[]);

        let pieces: Vec<String> = if separator.is_empty() {
            text.chars().map(String::from).collect()
        } else {
            text.split(separator)
                .filter(|p| !p.is_empty())
                .map(String::from)
                .collect()
        };

        let mut chunks = Vec::new();
        let mut fitting: Vec<String> = Vec::new();
        for piece in pieces {
            if char_len(&piece) <= self.chunk_size {
                fitting.push(piece);
                continue;
            }
            if !fitting.is_empty() {
                chunks.extend(self.merge(&fitting, separator));
                fitting.clear();
            }
            if remaining.is_empty() {
                chunks.push(piece);
            } else {
                chunks.extend(self.split_recursive(&piece, remaining));
            }
        }
        if !fitting.is_empty() {
            chunks.extend(self.merge(&fitting, separator));
        }
        chunks
    }

    fn merge(&self, pieces: &[String], separator: &str) -> Vec<String> {
        let separator_len = char_len(separator);
        let mut chunks = Vec::new();
        let mut current: VecDeque<&str> = VecDeque::new();
        let mut total = 0;

        for piece in pieces {
            let len = char_len(piece);
            let joined_len = |current: &VecDeque<&str>| {
                if current.is_empty() {
                    0
                } else {
                    separator_len
                }
            };

            if total + len + joined_len(&current) > self.chunk_size && !current.is_empty() {
                push_chunk(&mut chunks, &current, separator);
                while total > self.chunk_overlap
                    || (total + len + joined_len(&current) > self.chunk_size && total > 0)
                {
                    let Some(front) = current.pop_front() else {
                        break;
                    };
                    let removed = char_len(front) + if current.is_empty() { 0 } else { separator_len };
                    total = total.saturating_sub(removed);
                }
            }

            current.push_back(piece);
            total += len + if current.len() > 1 { separator_len } else { 0 };
        }

        if !current.is_empty() {
            push_chunk(&mut chunks, &current, separator);
        }
        chunks
    }
}

fn push_chunk(chunks: &mut Vec<String>, current: &VecDeque<&str>, separator: &str) {
    let joined = current.iter().copied().collect::<Vec<_>>().join(separator);
    let trimmed = joined.trim();
    if !trimmed.is_empty() {
        chunks.push(trimmed.to_string());
    }
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}

/// Record the 1-based line range a chunk occupies in its parent text, keeping
/// any existing `loc` fields (such as `pageNumber`).
fn with_line_range(mut metadata: Map<String, Value>, from: usize, to: usize) -> Map<String, Value> {
    let mut loc = match metadata.remove("loc") {
        Some(Value::Object(loc)) => loc,
        _ => Map::new(),
    };
    loc.insert("lines".to_string(), json!({ "from": from, "to": to }));
    metadata.insert("loc".to_string(), Value::Object(loc));
    metadata
}

#[async_trait]
impl TextSplitter for RecursiveCharacterSplitter {
    async fn split_documents(&self, documents: Vec<Document>) -> Result<Vec<Document>> {
        let mut result = Vec::new();

        for document in documents {
            let text = &document.page_content;
            let mut search_from = 0;

            for chunk in self.split_text(text) {
                let metadata = match text[search_from..].find(chunk.as_str()) {
                    Some(offset) => {
                        let start = search_from + offset;
                        let from = text[..start].matches('\n').count() + 1;
                        let to = from + chunk.matches('\n').count();
                        search_from = start + chunk.chars().next().map_or(1, char::len_utf8);
                        with_line_range(document.metadata.clone(), from, to)
                    }
                    None => document.metadata.clone(),
                };
                result.push(Document::new(chunk, metadata));
            }
        }

        Ok(result)
    }
}
