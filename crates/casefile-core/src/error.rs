//! Error types for the reprocessing pipeline.
//!
//! Per-key failures (`StoreError` on fetch/write, `ExtractionError`,
//! `AnalysisError`) are absorbed by workers and turned into counters.
//! Only `ReprocessError` ever reaches a caller.

use thiserror::Error;

/// Failure talking to the document store.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Failed to list document keys: {0}")]
    List(#[source] std::io::Error),

    #[error("Failed to read document '{key}': {source}")]
    Read {
        key: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Document '{key}' is corrupt: {source}")]
    Corrupt {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to write document '{key}': {message}")]
    Write { key: String, message: String },

    #[error("Invalid document key '{0}'")]
    InvalidKey(String),
}

/// Failure turning raw content into text.
#[derive(Error, Debug)]
pub enum ExtractionError {
    #[error("Unsupported document type: {0}")]
    Unsupported(String),

    #[error("Failed to parse PDF: {0}")]
    Pdf(String),

    #[error("Extraction timed out after {0}s")]
    Timeout(u64),

    #[error("Extraction cancelled")]
    Cancelled,

    #[error("Extraction task failed: {0}")]
    Task(String),
}

/// Failure producing an analysis for a document.
#[derive(Error, Debug)]
pub enum AnalysisError {
    #[error("Analysis request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Analysis provider returned {status}: {message}")]
    Provider { status: u16, message: String },

    #[error("Could not parse analysis response: {0}")]
    Parse(String),

    #[error("Analysis timed out after {0}s")]
    Timeout(u64),

    #[error("Analyzer not configured: {0}")]
    NotConfigured(String),
}

/// Errors surfaced to callers of the reprocessing entry points.
#[derive(Error, Debug)]
pub enum ReprocessError {
    /// Listing keys failed, so the whole run is aborted.
    #[error("Cannot enumerate documents: {0}")]
    ListKeys(#[source] StoreError),

    #[error("Document not found: {0}")]
    NotFound(String),

    #[error("Cannot read document: {0}")]
    Fetch(#[source] StoreError),

    #[error("Cannot write document: {0}")]
    Write(#[source] StoreError),
}
