//! Credential schema for the OCR endpoint and the stores that hold it.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use serde::{Deserialize, Serialize};

use crate::error::{LoaderError, Result};

pub const CREDENTIAL_NAME: &str = "customOcrApi";
pub const API_KEY_ENV: &str = "CUSTOM_OCR_API_KEY";

/// Describes the credential the loader node asks the host to collect.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CredentialSchema {
    pub label: &'static str,
    pub name: &'static str,
    pub version: f32,
    pub description: &'static str,
    pub inputs: Vec<CredentialInput>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CredentialInput {
    pub label: &'static str,
    pub name: &'static str,
    #[serde(rename = "type")]
    pub input_type: &'static str,
}

pub fn custom_ocr_credential() -> CredentialSchema {
    CredentialSchema {
        label: "Custom OCR API",
        name: CREDENTIAL_NAME,
        version: 1.0,
        description: "API key sent as a bearer token to a custom OCR endpoint",
        inputs: vec![CredentialInput {
            label: "API Key",
            name: "apiKey",
            input_type: "password",
        }],
    }
}

/// Decrypted credential values.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CredentialData {
    #[serde(default)]
    pub api_key: String,
}

pub trait CredentialStore: Send + Sync {
    fn get(&self, credential_id: &str) -> Result<CredentialData>;
}

/// Credentials registered at runtime, keyed by credential id.
#[derive(Debug, Clone, Default)]
pub struct MemoryCredentialStore {
    credentials: Arc<RwLock<HashMap<String, CredentialData>>>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, credential_id: impl Into<String>, data: CredentialData) {
        self.credentials
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(credential_id.into(), data);
    }
}

impl CredentialStore for MemoryCredentialStore {
    fn get(&self, credential_id: &str) -> Result<CredentialData> {
        self.credentials
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(credential_id)
            .cloned()
            .ok_or_else(|| LoaderError::Credential(format!("unknown credential: {}", credential_id)))
    }
}

/// Serves every credential id from `CUSTOM_OCR_API_KEY`.
#[derive(Debug, Clone, Default)]
pub struct EnvCredentialStore;

impl CredentialStore for EnvCredentialStore {
    fn get(&self, _credential_id: &str) -> Result<CredentialData> {
        let api_key = std::env::var(API_KEY_ENV)
            .map_err(|_| LoaderError::Credential(format!("{} not set", API_KEY_ENV)))?;
        Ok(CredentialData { api_key })
    }
}
