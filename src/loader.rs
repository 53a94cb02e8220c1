//! Top-level loader invocation.

use std::sync::Arc;

use serde_json::{Map, Value};
use tracing::{debug, info, Instrument, Span};

use crate::credential::CredentialStore;
use crate::document::Document;
use crate::error::{LoaderError, Result};
use crate::node::{LoaderInputs, UPLOAD_FIELDS};
use crate::ocr::{ExtractionStrategy, PageExtractor};
use crate::output::{finalize, parse_metadata_overlay, LoaderOutput};
use crate::source::{resolve_files, RawFile, StorageScope};
use crate::splitter::{RecursiveCharacterSplitter, TextSplitter};
use crate::storage::FileStorage;

/// Host-supplied identity of one invocation.
#[derive(Debug, Clone, Default)]
pub struct InvocationContext {
    pub organization_id: String,
    pub flow_id: String,
    pub credential_id: Option<String>,
}

impl InvocationContext {
    fn scope(&self) -> StorageScope {
        StorageScope {
            organization_id: self.organization_id.clone(),
            flow_id: self.flow_id.clone(),
        }
    }
}

/// Stateless between invocations; collaborators are shared.
#[derive(Clone)]
pub struct DocumentLoader {
    client: reqwest::Client,
    storage: Arc<dyn FileStorage>,
    credentials: Arc<dyn CredentialStore>,
    span: Span,
}

impl DocumentLoader {
    pub fn new(
        client: reqwest::Client,
        storage: Arc<dyn FileStorage>,
        credentials: Arc<dyn CredentialStore>,
    ) -> Self {
        Self {
            client,
            storage,
            credentials,
            span: Span::none(),
        }
    }

    /// Parent span every invocation's span is attached to.
    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    /// Resolve the upload, extract, split and shape the output. Uses the
    /// recursive splitter when the inputs carry splitter settings.
    pub async fn load(&self, inputs: &LoaderInputs, ctx: &InvocationContext) -> Result<LoaderOutput> {
        let splitter = inputs
            .text_splitter
            .map(RecursiveCharacterSplitter::from_settings)
            .transpose()?;
        self.load_with_splitter(
            inputs,
            ctx,
            splitter.as_ref().map(|s| s as &dyn TextSplitter),
        )
        .await
    }

    pub async fn load_with_splitter(
        &self,
        inputs: &LoaderInputs,
        ctx: &InvocationContext,
        splitter: Option<&dyn TextSplitter>,
    ) -> Result<LoaderOutput> {
        let span = self.invocation_span(ctx);
        async {
            let upload = inputs.upload().ok_or_else(|| {
                LoaderError::Input(format!(
                    "no file uploaded (expected one of {:?})",
                    UPLOAD_FIELDS
                ))
            })?;
            let overlay = parse_metadata_overlay(inputs.metadata.as_ref())?;
            let files = resolve_files(upload, self.storage.as_ref(), &ctx.scope()).await?;
            self.run(files, inputs, ctx, splitter, overlay).await
        }
        .instrument(span)
        .await
    }

    /// Same pipeline for files that arrived already decoded.
    pub async fn load_files(
        &self,
        files: Vec<RawFile>,
        inputs: &LoaderInputs,
        ctx: &InvocationContext,
        splitter: Option<&dyn TextSplitter>,
    ) -> Result<LoaderOutput> {
        if files.is_empty() {
            return Err(LoaderError::Input("no file uploaded".to_string()));
        }
        let overlay = parse_metadata_overlay(inputs.metadata.as_ref())?;
        let span = self.invocation_span(ctx);
        self.run(files, inputs, ctx, splitter, overlay)
            .instrument(span)
            .await
    }

    fn invocation_span(&self, ctx: &InvocationContext) -> Span {
        tracing::info_span!(
            parent: &self.span,
            "custom_ocr_load",
            organization_id = %ctx.organization_id,
            flow_id = %ctx.flow_id
        )
    }

    async fn run(
        &self,
        files: Vec<RawFile>,
        inputs: &LoaderInputs,
        ctx: &InvocationContext,
        splitter: Option<&dyn TextSplitter>,
        overlay: Option<Map<String, Value>>,
    ) -> Result<LoaderOutput> {
        let api_key = match &ctx.credential_id {
            Some(id) => Some(self.credentials.get(id)?.api_key),
            None => None,
        };

        let strategy = ExtractionStrategy::select(
            self.client.clone(),
            inputs.ocr_url.as_deref(),
            api_key.as_deref(),
            inputs.usage,
            inputs.legacy_build,
        );
        info!(
            "Loading {} file(s) with {} ({:?})",
            files.len(),
            strategy.name(),
            inputs.usage
        );

        let mut documents: Vec<Document> = Vec::new();
        for file in &files {
            let mut extracted = strategy.extract(file).await?;
            if let Some(splitter) = splitter {
                extracted = splitter.split_documents(extracted).await?;
            }
            debug!("{}: {} document(s)", file.filename, extracted.len());
            documents.extend(extracted);
        }

        info!("Loaded {} document(s)", documents.len());
        Ok(finalize(documents, overlay.as_ref(), inputs.output))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credential::{CredentialData, MemoryCredentialStore};
    use crate::document::Usage;
    use crate::output::OutputChannel;
    use crate::storage::MemoryFileStorage;
    use axum::{routing::post, Json, Router};
    use serde_json::json;

    fn loader(storage: MemoryFileStorage, credentials: MemoryCredentialStore) -> DocumentLoader {
        DocumentLoader::new(reqwest::Client::new(), Arc::new(storage), Arc::new(credentials))
    }

    fn ctx(credential_id: Option<&str>) -> InvocationContext {
        InvocationContext {
            organization_id: "org".to_string(),
            flow_id: "flow".to_string(),
            credential_id: credential_id.map(String::from),
        }
    }

    fn text_storage() -> MemoryFileStorage {
        let storage = MemoryFileStorage::new();
        storage.insert("a.txt", "org", "flow", b"alpha".to_vec());
        storage.insert("b.txt", "org", "flow", b"beta".to_vec());
        storage
    }

    async fn ocr_server() -> String {
        let router = Router::new().route(
            "/ocr",
            post(|| async { Json(json!(["page one", "page two"])) }),
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{}/ocr", addr)
    }

    #[tokio::test]
    async fn test_missing_upload_is_input_error() {
        let loader = loader(MemoryFileStorage::new(), MemoryCredentialStore::new());
        let err = loader
            .load(&LoaderInputs::default(), &ctx(None))
            .await
            .unwrap_err();
        assert!(matches!(err, LoaderError::Input(_)));
    }

    #[tokio::test]
    async fn test_local_path_with_overlay_and_text_output() {
        let loader = loader(text_storage(), MemoryCredentialStore::new());
        let inputs = LoaderInputs {
            file: Some(r#"FILE-STORAGE::["a.txt","b.txt"]"#.to_string()),
            metadata: Some(json!({"tag": "x"})),
            ..Default::default()
        };

        let LoaderOutput::Documents(docs) = loader.load(&inputs, &ctx(None)).await.unwrap() else {
            panic!("expected documents");
        };
        assert_eq!(docs.len(), 2);
        assert_eq!(docs[0].page_content, "alpha");
        assert_eq!(docs[1].metadata["source"], "b.txt");
        assert!(docs.iter().all(|d| d.metadata["tag"] == "x"));

        let text_inputs = LoaderInputs {
            output: OutputChannel::Text,
            ..inputs
        };
        let output = loader.load(&text_inputs, &ctx(None)).await.unwrap();
        assert_eq!(output, LoaderOutput::Text("alpha\\nbeta\\n".to_string()));
    }

    #[tokio::test]
    async fn test_remote_path_uses_credential() {
        let credentials = MemoryCredentialStore::new();
        credentials.insert(
            "cred",
            CredentialData {
                api_key: "k".to_string(),
            },
        );
        let storage = MemoryFileStorage::new();
        storage.insert("doc.pdf", "org", "flow", b"%PDF".to_vec());
        let loader = loader(storage, credentials);

        let inputs = LoaderInputs {
            pdf_file: Some("FILE-STORAGE::doc.pdf".to_string()),
            ocr_url: Some(ocr_server().await),
            usage: Usage::PerPage,
            ..Default::default()
        };

        let LoaderOutput::Documents(docs) = loader.load(&inputs, &ctx(Some("cred"))).await.unwrap()
        else {
            panic!("expected documents");
        };
        assert_eq!(docs.len(), 2);
        assert_eq!(docs[0].metadata["custom_ocr"], true);
        assert_eq!(docs[1].metadata["loc"]["pageNumber"], 2);
    }

    #[tokio::test]
    async fn test_splitter_runs_after_extraction() {
        let storage = MemoryFileStorage::new();
        storage.insert("long.txt", "org", "flow", b"one two\n\nthree four".to_vec());
        let loader = loader(storage, MemoryCredentialStore::new());

        let inputs: LoaderInputs = serde_json::from_value(json!({
            "file": "FILE-STORAGE::long.txt",
            "textSplitter": {"chunkSize": 10, "chunkOverlap": 0}
        }))
        .unwrap();

        let LoaderOutput::Documents(docs) = loader.load(&inputs, &ctx(None)).await.unwrap() else {
            panic!("expected documents");
        };
        let contents: Vec<_> = docs.iter().map(|d| d.page_content.as_str()).collect();
        assert_eq!(contents, vec!["one two", "three four"]);
        assert_eq!(docs[1].metadata["loc"]["lines"], json!({"from": 3, "to": 3}));
    }

    #[tokio::test]
    async fn test_invalid_metadata_aborts() {
        let loader = loader(text_storage(), MemoryCredentialStore::new());
        let inputs = LoaderInputs {
            file: Some("FILE-STORAGE::a.txt".to_string()),
            metadata: Some(json!("{oops")),
            ..Default::default()
        };
        let err = loader.load(&inputs, &ctx(None)).await.unwrap_err();
        assert!(matches!(err, LoaderError::Metadata(_)));
    }

    #[tokio::test]
    async fn test_invalid_metadata_fails_before_storage_fetch() {
        let loader = loader(MemoryFileStorage::new(), MemoryCredentialStore::new());
        let inputs = LoaderInputs {
            file: Some("FILE-STORAGE::not-stored.pdf".to_string()),
            metadata: Some(json!("{oops")),
            ..Default::default()
        };
        let err = loader.load(&inputs, &ctx(None)).await.unwrap_err();
        assert!(matches!(err, LoaderError::Metadata(_)), "{}", err);
    }

    #[tokio::test]
    async fn test_unknown_credential_aborts() {
        let loader = loader(text_storage(), MemoryCredentialStore::new());
        let inputs = LoaderInputs {
            file: Some("FILE-STORAGE::a.txt".to_string()),
            ..Default::default()
        };
        let err = loader.load(&inputs, &ctx(Some("missing"))).await.unwrap_err();
        assert!(matches!(err, LoaderError::Credential(_)));
    }

    #[tokio::test]
    async fn test_load_files_requires_a_file() {
        let loader = loader(MemoryFileStorage::new(), MemoryCredentialStore::new());
        let err = loader
            .load_files(Vec::new(), &LoaderInputs::default(), &ctx(None), None)
            .await
            .unwrap_err();
        assert!(matches!(err, LoaderError::Input(_)));
    }
}
