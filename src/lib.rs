//! Custom OCR document loader.
//!
//! Resolves an uploaded file, sends it to a configured OCR endpoint (or falls
//! back to local PDF text extraction) and normalizes the result into a list of
//! `{ pageContent, metadata }` documents.

pub mod config;
pub mod credential;
pub mod document;
pub mod error;
pub mod loader;
pub mod node;
pub mod ocr;
pub mod output;
pub mod source;
pub mod splitter;
pub mod storage;

pub use document::{Document, Usage};
pub use error::LoaderError;
pub use loader::{DocumentLoader, InvocationContext};
pub use node::LoaderInputs;
pub use output::{LoaderOutput, OutputChannel};
