//! Document storage.
//!
//! Every ingested document lives under a `doc-{id}` key as one
//! [`DocumentRecord`]. The pipeline only needs list/get/set, so storage is
//! expressed as the [`DocumentStore`] trait and injected where needed.

mod fs;
mod memory;

pub use fs::FsDocumentStore;
pub use memory::MemoryDocumentStore;

use std::path::Path;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::StoreError;

/// Key prefix shared by all document records.
pub const DOCUMENT_KEY_PREFIX: &str = "doc-";

/// Fallback mime type when none was recorded at ingest.
pub const DEFAULT_MIME_TYPE: &str = "application/pdf";

/// Check whether a store key belongs to the document namespace.
pub fn is_document_key(key: &str) -> bool {
    key.len() > DOCUMENT_KEY_PREFIX.len() && key.starts_with(DOCUMENT_KEY_PREFIX)
}

/// Build a fresh document key.
pub fn new_document_key() -> String {
    format!("{}{}", DOCUMENT_KEY_PREFIX, uuid::Uuid::new_v4())
}

/// Severity assigned by analysis.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Severity {
    Low,
    #[default]
    Medium,
    High,
    Critical,
}

impl Severity {
    /// Parse a severity label as produced by a model. Case-insensitive.
    pub fn parse_lenient(label: &str) -> Option<Self> {
        match label.trim().to_ascii_lowercase().as_str() {
            "low" => Some(Severity::Low),
            "medium" | "moderate" => Some(Severity::Medium),
            "high" => Some(Severity::High),
            "critical" | "severe" => Some(Severity::Critical),
            _ => None,
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Severity::Low => write!(f, "Low"),
            Severity::Medium => write!(f, "Medium"),
            Severity::High => write!(f, "High"),
            Severity::Critical => write!(f, "Critical"),
        }
    }
}

/// One stored document with its extracted text and derived analysis.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentRecord {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub mime_type: Option<String>,
    /// Original file bytes, base64 on disk
    #[serde(default, with = "base64_bytes", skip_serializing_if = "Option::is_none")]
    pub raw_content: Option<Vec<u8>>,
    /// Extracted text; empty means not yet extracted
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub severity: Severity,
    #[serde(default)]
    pub entities: Vec<String>,
    #[serde(default)]
    pub legal_codes: Vec<String>,
    #[serde(default)]
    pub violations: Vec<String>,
    #[serde(default)]
    pub contradictions: Vec<String>,
    /// Cached completeness flag, recomputed on every write
    #[serde(default)]
    pub needs_review: bool,
    #[serde(default)]
    pub last_modified: Option<DateTime<Utc>>,
}

impl DocumentRecord {
    /// Mime type used for extraction.
    pub fn effective_mime_type(&self) -> &str {
        self.mime_type
            .as_deref()
            .filter(|m| !m.is_empty())
            .unwrap_or(DEFAULT_MIME_TYPE)
    }

    /// Whether raw bytes are available for re-extraction.
    pub fn has_raw_content(&self) -> bool {
        self.raw_content.as_ref().is_some_and(|raw| !raw.is_empty())
    }
}

/// Keyed persistent storage for document records.
///
/// Implementations serialize get/set per key; the pipeline adds no locking of
/// its own beyond giving each key to a single worker.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// All keys in the store, including ones outside the document namespace.
    async fn list_keys(&self) -> Result<Vec<String>, StoreError>;

    /// Fetch one record. `Ok(None)` when the key does not exist.
    async fn get(&self, key: &str) -> Result<Option<DocumentRecord>, StoreError>;

    /// Replace the record stored under `key`.
    async fn set(&self, key: &str, record: &DocumentRecord) -> Result<(), StoreError>;
}

/// Ingest a file from disk as a new document that still needs processing.
pub async fn import_file(store: &dyn DocumentStore, path: &Path) -> anyhow::Result<DocumentRecord> {
    use anyhow::Context;

    let raw = tokio::fs::read(path)
        .await
        .with_context(|| format!("Failed to read {}", path.display()))?;

    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| "unknown".to_string());
    let mime_type = mime_guess::from_path(path)
        .first()
        .map(|m| m.essence_str().to_string());

    let key = new_document_key();
    let record = DocumentRecord {
        id: key.clone(),
        name,
        mime_type,
        raw_content: Some(raw),
        needs_review: true,
        last_modified: Some(Utc::now()),
        ..Default::default()
    };

    store.set(&key, &record).await?;
    tracing::info!(doc_id = %key, name = %record.name, "Imported document");

    Ok(record)
}

mod base64_bytes {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &Option<Vec<u8>>, s: S) -> Result<S::Ok, S::Error> {
        match bytes {
            Some(b) => s.serialize_str(&STANDARD.encode(b)),
            None => s.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Vec<u8>>, D::Error> {
        let encoded: Option<String> = Option::deserialize(d)?;
        encoded
            .map(|e| STANDARD.decode(e).map_err(serde::de::Error::custom))
            .transpose()
    }
}
