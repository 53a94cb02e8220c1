//! Custom OCR loader - HTTP surface for the document loader node.

use std::sync::Arc;

use axum::{
    extract::{DefaultBodyLimit, Multipart, Query, State},
    http::StatusCode,
    response::Json,
    routing::{get, post},
    Router,
};
use custom_ocr_loader::config::ServerConfig;
use custom_ocr_loader::credential::{self, EnvCredentialStore, API_KEY_ENV, CREDENTIAL_NAME};
use custom_ocr_loader::node::{self, LoaderInputs};
use custom_ocr_loader::source::RawFile;
use custom_ocr_loader::splitter::{RecursiveCharacterSplitter, TextSplitter};
use custom_ocr_loader::storage::LocalFileStorage;
use custom_ocr_loader::{DocumentLoader, InvocationContext, LoaderError, LoaderOutput};
use serde::Deserialize;
use serde_json::{json, Value};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Application state shared across handlers.
#[derive(Clone)]
struct AppState {
    loader: DocumentLoader,
    config: Arc<ServerConfig>,
    /// Credential used when a request names none.
    default_credential: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "custom_ocr_loader=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = ServerConfig::from_env()?;
    let client = config.http_client()?;
    let storage = LocalFileStorage::new(config.file_storage_path.clone());

    let loader = DocumentLoader::new(client, Arc::new(storage), Arc::new(EnvCredentialStore))
        .with_span(tracing::info_span!("loader"));

    let default_credential = std::env::var(API_KEY_ENV)
        .ok()
        .filter(|key| !key.is_empty())
        .map(|_| CREDENTIAL_NAME.to_string());
    info!("Default OCR credential configured: {}", default_credential.is_some());

    let bind_addr = config.bind_addr.clone();
    let state = AppState {
        loader,
        config: Arc::new(config),
        default_credential,
    };

    let app = Router::new()
        .route("/health", get(health))
        .route("/node", get(node_descriptor))
        .route("/credential", get(credential_schema))
        .route("/load", post(load))
        .route("/upload", post(upload))
        .layer(DefaultBodyLimit::max(100 * 1024 * 1024)) // 100MB
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state);

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    info!("Server listening on http://{}", bind_addr);
    axum::serve(listener, app).await?;

    Ok(())
}

// ============================================================================
// Handlers
// ============================================================================

async fn health() -> &'static str {
    "ok"
}

async fn node_descriptor() -> Json<node::NodeDescriptor> {
    Json(node::descriptor())
}

async fn credential_schema() -> Json<credential::CredentialSchema> {
    Json(credential::custom_ocr_credential())
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct LoadRequest {
    inputs: LoaderInputs,
    #[serde(default)]
    organization_id: String,
    #[serde(default)]
    flow_id: String,
    #[serde(default)]
    credential_id: Option<String>,
}

/// Run the loader on a storage reference or inline data URI upload.
async fn load(
    State(state): State<AppState>,
    Json(request): Json<LoadRequest>,
) -> Result<Json<Value>, (StatusCode, String)> {
    let inputs = with_default_url(request.inputs, &state.config);
    let ctx = InvocationContext {
        organization_id: request.organization_id,
        flow_id: request.flow_id,
        credential_id: request.credential_id.or_else(|| state.default_credential.clone()),
    };

    let output = state.loader.load(&inputs, &ctx).await.map_err(error_response)?;
    Ok(Json(render(output)))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct UploadQuery {
    credential_id: Option<String>,
}

/// Multipart variant: a `file` field plus an optional `inputs` JSON field.
async fn upload(
    State(state): State<AppState>,
    Query(query): Query<UploadQuery>,
    mut multipart: Multipart,
) -> Result<Json<Value>, (StatusCode, String)> {
    let mut files = Vec::new();
    let mut inputs = LoaderInputs::default();

    while let Some(field) = multipart.next_field().await.map_err(|e| {
        (StatusCode::BAD_REQUEST, format!("Multipart error: {}", e))
    })? {
        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some("file") => {
                let filename = field.file_name().unwrap_or("document").to_string();
                let bytes = field.bytes().await.map_err(|e| {
                    (StatusCode::BAD_REQUEST, format!("Failed to read file: {}", e))
                })?;
                info!("Received file: {} ({} bytes)", filename, bytes.len());
                files.push(RawFile {
                    bytes: bytes.to_vec(),
                    filename,
                });
            }
            Some("inputs") => {
                let raw = field.text().await.map_err(|e| {
                    (StatusCode::BAD_REQUEST, format!("Failed to read inputs: {}", e))
                })?;
                inputs = serde_json::from_str(&raw).map_err(|e| {
                    (StatusCode::BAD_REQUEST, format!("Invalid inputs: {}", e))
                })?;
            }
            _ => {}
        }
    }

    let inputs = with_default_url(inputs, &state.config);
    let ctx = InvocationContext {
        credential_id: query.credential_id.or_else(|| state.default_credential.clone()),
        ..Default::default()
    };
    let splitter = inputs
        .text_splitter
        .map(RecursiveCharacterSplitter::from_settings)
        .transpose()
        .map_err(error_response)?;

    let output = state
        .loader
        .load_files(
            files,
            &inputs,
            &ctx,
            splitter.as_ref().map(|s| s as &dyn TextSplitter),
        )
        .await
        .map_err(error_response)?;
    Ok(Json(render(output)))
}

// ============================================================================
// Helper functions
// ============================================================================

fn with_default_url(mut inputs: LoaderInputs, config: &ServerConfig) -> LoaderInputs {
    if inputs.ocr_url.as_deref().map_or(true, |url| url.trim().is_empty()) {
        inputs.ocr_url = config.default_ocr_url.clone();
    }
    inputs
}

fn render(output: LoaderOutput) -> Value {
    match output {
        LoaderOutput::Documents(documents) => json!(documents),
        LoaderOutput::Text(text) => json!({ "text": text }),
    }
}

fn error_response(e: LoaderError) -> (StatusCode, String) {
    let status = match &e {
        LoaderError::Input(_) | LoaderError::Metadata(_) => StatusCode::BAD_REQUEST,
        LoaderError::RemoteOcr(_) => StatusCode::BAD_GATEWAY,
        LoaderError::Storage(_) | LoaderError::Credential(_) | LoaderError::Extraction(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };
    error!("Load failed: {}", e);
    (status, e.to_string())
}
