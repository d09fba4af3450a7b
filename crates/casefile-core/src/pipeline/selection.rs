//! Which documents need reprocessing.

use serde::{Deserialize, Serialize};

use crate::storage::{is_document_key, DocumentRecord, DocumentStore};

/// Minimum extracted text length for a document to count as extracted.
pub const MIN_TEXT_CHARS: usize = 100;

/// Text length in characters.
pub fn text_len(text: &str) -> usize {
    text.chars().count()
}

/// The cached `needs_review` flag as a function of the derived fields.
pub fn needs_review(text: &str, summary: &str) -> bool {
    text_len(text) < MIN_TEXT_CHARS || summary.is_empty()
}

/// Whether a record should be picked up by a failed-only run.
///
/// A missing record counts as incomplete.
pub fn is_incomplete(record: Option<&DocumentRecord>) -> bool {
    match record {
        None => true,
        Some(r) => r.needs_review || r.summary.is_empty() || text_len(&r.text) < MIN_TEXT_CHARS,
    }
}

/// Whether a record satisfies the completeness invariant.
pub fn is_complete(record: &DocumentRecord) -> bool {
    !is_incomplete(Some(record))
}

/// Completeness breakdown of a store.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreStatus {
    pub total: usize,
    pub complete: usize,
    pub incomplete: usize,
    pub unreadable: usize,
}

/// Classify every document in `store`.
pub async fn scan_status(store: &dyn DocumentStore) -> anyhow::Result<StoreStatus> {
    let keys = store.list_keys().await?;
    let mut status = StoreStatus::default();

    for key in keys.iter().filter(|k| is_document_key(k)) {
        status.total += 1;
        match store.get(key).await {
            Ok(Some(record)) if is_complete(&record) => status.complete += 1,
            Ok(_) => status.incomplete += 1,
            Err(e) => {
                tracing::warn!(doc_id = %key, error = %e, "Unreadable document");
                status.unreadable += 1;
            }
        }
    }

    Ok(status)
}
