//! Turns an OCR endpoint's page array into canonical documents.
//!
//! Entries may be plain strings or objects carrying the text under
//! `pageContent`, `text` or `content`, an optional `metadata` object and an
//! optional `lines` range.

use serde_json::{json, Map, Value};

use crate::document::{is_pdf, merge_into, Document, Usage};

/// Normalize a response array for `filename` according to `usage`.
pub fn normalize_pages(entries: &[Value], filename: &str, usage: Usage) -> Vec<Document> {
    match usage {
        Usage::PerFile => vec![merge_file(entries, filename)],
        Usage::PerPage => split_pages(entries, filename),
    }
}

fn base_metadata(filename: &str) -> Map<String, Value> {
    let mut metadata = Map::new();
    metadata.insert("source".to_string(), Value::String(filename.to_string()));
    metadata.insert("custom_ocr".to_string(), Value::Bool(true));
    metadata
}

/// Text of one entry; unknown shapes yield an empty string.
pub fn entry_text(entry: &Value) -> &str {
    match entry {
        Value::String(text) => text.as_str(),
        Value::Object(fields) => ["pageContent", "text", "content"]
            .iter()
            .find_map(|key| fields.get(*key).and_then(Value::as_str))
            .unwrap_or(""),
        _ => "",
    }
}

fn entry_metadata(entry: &Value) -> Option<&Map<String, Value>> {
    entry.get("metadata").and_then(Value::as_object)
}

fn page_break(page_number: usize) -> String {
    format!("<PAGE_BREAK>{}</PAGE_BREAK>", page_number)
}

fn merge_file(entries: &[Value], filename: &str) -> Document {
    let content = entries
        .iter()
        .enumerate()
        .map(|(index, entry)| {
            let text = entry_text(entry);
            if index == 0 {
                text.to_string()
            } else {
                format!("{}\n\n{}", page_break(index + 1), text)
            }
        })
        .collect::<Vec<_>>()
        .join("\n\n");

    let mut metadata = base_metadata(filename);
    if let Some(first) = entries.first().and_then(entry_metadata) {
        merge_into(&mut metadata, first);
    }

    Document::new(content, metadata)
}

fn split_pages(entries: &[Value], filename: &str) -> Vec<Document> {
    let pdf = is_pdf(filename);

    entries
        .iter()
        .enumerate()
        .map(|(index, entry)| {
            let text = entry_text(entry);
            let mut metadata = base_metadata(filename);
            let page_metadata = entry_metadata(entry);
            if let Some(extra) = page_metadata {
                merge_into(&mut metadata, extra);
            }

            if pdf {
                let lines = entry
                    .get("lines")
                    .filter(|v| !v.is_null())
                    .or_else(|| {
                        page_metadata
                            .and_then(|m| m.get("lines"))
                            .filter(|v| !v.is_null())
                    })
                    .cloned()
                    .unwrap_or_else(|| json!({ "from": 1, "to": text.split('\n').count() }));
                metadata.insert(
                    "loc".to_string(),
                    json!({ "pageNumber": index + 1, "lines": lines }),
                );
            }

            Document::new(text, metadata)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_per_page_pdf_strings() {
        let entries = vec![json!("page one"), json!("page two")];
        let docs = normalize_pages(&entries, "doc.pdf", Usage::PerPage);

        assert_eq!(docs.len(), 2);
        for (i, doc) in docs.iter().enumerate() {
            assert_eq!(doc.metadata["source"], "doc.pdf");
            assert_eq!(doc.metadata["custom_ocr"], true);
            assert_eq!(doc.metadata["loc"]["pageNumber"], i + 1);
            assert_eq!(doc.metadata["loc"]["lines"], json!({"from": 1, "to": 1}));
        }
        assert_eq!(docs[1].page_content, "page two");
    }

    #[test]
    fn test_per_file_inserts_page_breaks() {
        let entries = vec![json!("page one"), json!("page two")];
        let docs = normalize_pages(&entries, "doc.pdf", Usage::PerFile);

        assert_eq!(docs.len(), 1);
        assert_eq!(
            docs[0].page_content,
            "page one\n\n<PAGE_BREAK>2</PAGE_BREAK>\n\npage two"
        );
        assert_eq!(docs[0].metadata["source"], "doc.pdf");
        assert!(docs[0].metadata.get("loc").is_none());
    }

    #[test]
    fn test_per_file_merges_first_entry_metadata_only() {
        let entries = vec![
            json!({"text": "a", "metadata": {"lang": "en"}}),
            json!({"text": "b", "metadata": {"lang": "fr", "other": 1}}),
            json!({"text": "c"}),
        ];
        let docs = normalize_pages(&entries, "scan.png", Usage::PerFile);

        assert_eq!(
            docs[0].page_content,
            "a\n\n<PAGE_BREAK>2</PAGE_BREAK>\n\nb\n\n<PAGE_BREAK>3</PAGE_BREAK>\n\nc"
        );
        assert_eq!(docs[0].metadata["lang"], "en");
        assert!(docs[0].metadata.get("other").is_none());
    }

    #[test]
    fn test_text_field_priority() {
        assert_eq!(entry_text(&json!({"pageContent": "p", "text": "t", "content": "c"})), "p");
        assert_eq!(entry_text(&json!({"text": "t", "content": "c"})), "t");
        assert_eq!(entry_text(&json!({"content": "c"})), "c");
        assert_eq!(entry_text(&json!({"other": "x"})), "");
        assert_eq!(entry_text(&json!(42)), "");
    }

    #[test]
    fn test_lines_priority() {
        let entries = vec![
            json!({"text": "x", "lines": {"from": 3, "to": 9}, "metadata": {"lines": {"from": 5, "to": 6}}}),
            json!({"text": "y", "metadata": {"lines": {"from": 5, "to": 6}}}),
            json!({"text": "one\ntwo\nthree"}),
        ];
        let docs = normalize_pages(&entries, "a.PDF", Usage::PerPage);

        assert_eq!(docs[0].metadata["loc"]["lines"], json!({"from": 3, "to": 9}));
        assert_eq!(docs[1].metadata["loc"]["lines"], json!({"from": 5, "to": 6}));
        assert_eq!(docs[2].metadata["loc"]["lines"], json!({"from": 1, "to": 3}));
        assert_eq!(docs[2].metadata["loc"]["pageNumber"], 3);
    }

    #[test]
    fn test_null_lines_fall_back_to_computed_range() {
        let entries = vec![
            json!({"text": "a\nb", "lines": null}),
            json!({"text": "c", "lines": null, "metadata": {"lines": null}}),
            json!({"text": "d", "lines": null, "metadata": {"lines": {"from": 4, "to": 4}}}),
        ];
        let docs = normalize_pages(&entries, "doc.pdf", Usage::PerPage);

        assert_eq!(docs[0].metadata["loc"]["lines"], json!({"from": 1, "to": 2}));
        assert_eq!(docs[1].metadata["loc"]["lines"], json!({"from": 1, "to": 1}));
        assert_eq!(docs[2].metadata["loc"]["lines"], json!({"from": 4, "to": 4}));
    }

    #[test]
    fn test_per_page_non_pdf_has_no_location() {
        let entries = vec![json!({"content": "hi", "metadata": {"confidence": 0.9}})];
        let docs = normalize_pages(&entries, "photo.jpg", Usage::PerPage);

        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].page_content, "hi");
        assert_eq!(docs[0].metadata["confidence"], 0.9);
        assert!(docs[0].metadata.get("loc").is_none());
    }

    #[test]
    fn test_empty_array() {
        assert!(normalize_pages(&[], "a.pdf", Usage::PerPage).is_empty());
        let merged = normalize_pages(&[], "a.pdf", Usage::PerFile);
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].page_content, "");
    }
}
