//! File storage collaborators used to resolve `FILE-STORAGE::` references.
//!
//! Stored files are addressed by `(key, organization_id, flow_id)`.

use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use tracing::debug;

use crate::error::{LoaderError, Result};

/// Source of raw bytes for previously uploaded files.
#[async_trait]
pub trait FileStorage: Send + Sync {
    async fn get_file(&self, key: &str, organization_id: &str, flow_id: &str) -> Result<Vec<u8>>;
}

/// Reads files from `<base>/<organization_id>/<flow_id>/<key>` on local disk.
#[derive(Debug, Clone)]
pub struct LocalFileStorage {
    base: PathBuf,
}

impl LocalFileStorage {
    pub fn new(base: impl Into<PathBuf>) -> Self {
        Self { base: base.into() }
    }

    fn resolve(&self, key: &str, organization_id: &str, flow_id: &str) -> Result<PathBuf> {
        let mut path = self.base.clone();
        for segment in [organization_id, flow_id, key] {
            if !is_plain_segment(segment) {
                return Err(LoaderError::Storage(format!(
                    "invalid storage path segment: {:?}",
                    segment
                )));
            }
            path.push(segment);
        }
        Ok(path)
    }
}

/// A single non-empty path component with no parent/root references.
fn is_plain_segment(segment: &str) -> bool {
    let mut components = Path::new(segment).components();
    matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    )
}

#[async_trait]
impl FileStorage for LocalFileStorage {
    async fn get_file(&self, key: &str, organization_id: &str, flow_id: &str) -> Result<Vec<u8>> {
        let path = self.resolve(key, organization_id, flow_id)?;
        debug!("LocalFileStorage: reading {:?}", path);
        tokio::fs::read(&path)
            .await
            .map_err(|e| LoaderError::Storage(format!("failed to read {}: {}", key, e)))
    }
}

/// In-memory storage, keyed the same way as [`LocalFileStorage`].
#[derive(Debug, Clone, Default)]
pub struct MemoryFileStorage {
    inner: Arc<RwLock<HashMap<(String, String, String), Vec<u8>>>>,
}

impl MemoryFileStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, key: &str, organization_id: &str, flow_id: &str, data: Vec<u8>) {
        let mut store = self.inner.write().unwrap_or_else(|e| e.into_inner());
        store.insert(
            (
                organization_id.to_string(),
                flow_id.to_string(),
                key.to_string(),
            ),
            data,
        );
    }
}

#[async_trait]
impl FileStorage for MemoryFileStorage {
    async fn get_file(&self, key: &str, organization_id: &str, flow_id: &str) -> Result<Vec<u8>> {
        let store = self.inner.read().unwrap_or_else(|e| e.into_inner());
        store
            .get(&(
                organization_id.to_string(),
                flow_id.to_string(),
                key.to_string(),
            ))
            .cloned()
            .ok_or_else(|| LoaderError::Storage(format!("file not found: {}", key)))
    }
}
