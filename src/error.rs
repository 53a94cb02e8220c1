//! Error kinds surfaced by a loader invocation.

/// Every failure aborts the whole invocation; nothing is retried.
#[derive(Debug, thiserror::Error)]
pub enum LoaderError {
    /// No upload could be resolved, or an upload payload could not be decoded.
    #[error("input error: {0}")]
    Input(String),

    /// Anything that went wrong while calling or interpreting the OCR endpoint.
    #[error("remote OCR error: {0}")]
    RemoteOcr(String),

    /// The metadata overlay was not valid JSON.
    #[error("invalid metadata: {0}")]
    Metadata(#[from] serde_json::Error),

    #[error("storage error: {0}")]
    Storage(String),

    #[error("credential error: {0}")]
    Credential(String),

    /// Local extraction (PDF parsing) failed.
    #[error("extraction failed: {0}")]
    Extraction(String),
}

impl LoaderError {
    pub fn remote(msg: impl Into<String>) -> Self {
        Self::RemoteOcr(msg.into())
    }
}

pub type Result<T, E = LoaderError> = std::result::Result<T, E>;
