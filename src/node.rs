//! Loader node inputs and the descriptor the host renders its form from.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::credential::CREDENTIAL_NAME;
use crate::document::Usage;
use crate::output::OutputChannel;
use crate::splitter::SplitterSettings;

pub const NODE_NAME: &str = "customOcrLoader";

/// Upload-carrying input names, in lookup order.
pub const UPLOAD_FIELDS: [&str; 3] = ["pdfFile", "file", "fileUpload"];

/// Per-invocation node inputs as sent by the host.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoaderInputs {
    #[serde(default)]
    pub pdf_file: Option<String>,
    #[serde(default)]
    pub file: Option<String>,
    #[serde(default)]
    pub file_upload: Option<String>,
    #[serde(default)]
    pub ocr_url: Option<String>,
    #[serde(default)]
    pub usage: Usage,
    #[serde(default)]
    pub legacy_build: bool,
    #[serde(default)]
    pub metadata: Option<Value>,
    #[serde(default)]
    pub text_splitter: Option<SplitterSettings>,
    #[serde(default)]
    pub output: OutputChannel,
}

impl LoaderInputs {
    /// First non-empty upload value, checked in [`UPLOAD_FIELDS`] order.
    pub fn upload(&self) -> Option<&str> {
        [&self.pdf_file, &self.file, &self.file_upload]
            .into_iter()
            .filter_map(|v| v.as_deref())
            .find(|v| !v.trim().is_empty())
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeDescriptor {
    pub label: &'static str,
    pub name: &'static str,
    pub version: f32,
    #[serde(rename = "type")]
    pub node_type: &'static str,
    pub category: &'static str,
    pub description: &'static str,
    pub credential: NodeInput,
    pub inputs: Vec<NodeInput>,
    pub outputs: Vec<NodeOutput>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeInput {
    pub label: &'static str,
    pub name: &'static str,
    #[serde(rename = "type")]
    pub input_type: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub options: Option<Vec<&'static str>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_type: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub credential_names: Option<Vec<&'static str>>,
    pub optional: bool,
}

impl NodeInput {
    fn new(label: &'static str, name: &'static str, input_type: &'static str) -> Self {
        Self {
            label,
            name,
            input_type,
            default: None,
            options: None,
            file_type: None,
            credential_names: None,
            optional: true,
        }
    }

    fn required(mut self) -> Self {
        self.optional = false;
        self
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeOutput {
    pub label: &'static str,
    pub name: &'static str,
    pub base_classes: Vec<&'static str>,
}

pub fn descriptor() -> NodeDescriptor {
    NodeDescriptor {
        label: "Custom OCR Loader",
        name: NODE_NAME,
        version: 1.0,
        node_type: "Document",
        category: "Document Loaders",
        description: "Load documents through a custom OCR endpoint, falling back to local PDF text extraction",
        credential: NodeInput {
            credential_names: Some(vec![CREDENTIAL_NAME]),
            ..NodeInput::new("Connect Credential", "credential", "credential")
        },
        inputs: vec![
            NodeInput {
                file_type: Some(".pdf,.png,.jpg,.jpeg,.tiff,.txt"),
                ..NodeInput::new("File", "pdfFile", "file").required()
            },
            NodeInput::new("OCR URL", "ocrUrl", "string"),
            NodeInput::new("Text Splitter", "textSplitter", "TextSplitter"),
            NodeInput {
                default: Some(json!("perPage")),
                options: Some(vec!["perPage", "perFile"]),
                ..NodeInput::new("Usage", "usage", "options")
            },
            NodeInput {
                default: Some(json!(false)),
                ..NodeInput::new("Use Legacy Build", "legacyBuild", "boolean")
            },
            NodeInput::new("Additional Metadata", "metadata", "json"),
        ],
        outputs: vec![
            NodeOutput {
                label: "Document",
                name: "document",
                base_classes: vec!["Document", "json"],
            },
            NodeOutput {
                label: "Text",
                name: "text",
                base_classes: vec!["string", "json"],
            },
        ],
    }
}
