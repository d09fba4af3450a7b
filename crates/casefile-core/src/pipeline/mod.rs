//! Document reprocessing pipeline.
//!
//! # Architecture
//!
//! ```text
//! reprocess_all(options)
//!       │
//!       ▼
//!  list_keys ──► doc-* filter ──► (failed_only) selection policy
//!                                        │
//!                                        ▼
//!                               SharedQueue<key>
//!                      ┌─────────────┼─────────────┐
//!                      ▼             ▼             ▼
//!                  worker 0      worker 1  ...  worker N-1
//!                      │
//!                      ▼
//!    get ─► extract (if needed) ─► analyze ─► merge ─► set
//!                      │
//!                      ▼
//!              ProgressTracker ──► ProgressSink
//! ```
//!
//! `reprocess_one` runs the same get/refresh/set path for a single key.

mod merge;
mod progress;
mod selection;
mod types;
mod workers;

pub use merge::merge_record;
pub use progress::{ChannelSink, NoopSink, ProgressSink, ProgressSnapshot, ProgressTracker};
pub use selection::{
    is_complete, is_incomplete, needs_review, scan_status, text_len, StoreStatus, MIN_TEXT_CHARS,
};
pub use types::{KeyOutcome, ReprocessOptions, ReprocessSummary, Timeouts, DEFAULT_CONCURRENCY};

use std::sync::Arc;

use chrono::Utc;
use tokio_util::sync::CancellationToken;

use crate::analyze::{analyze_with_timeout, Analyzer};
use crate::error::ReprocessError;
use crate::extract::{extract_with_timeout, TextExtractor};
use crate::storage::{is_document_key, DocumentRecord, DocumentStore};

use workers::{spawn_reprocess_workers, SharedQueue};

/// Re-extracts and re-analyzes stored documents.
///
/// Holds only injected capabilities; every run builds its own queue and
/// counters and drops them when it returns.
#[derive(Clone)]
pub struct Reprocessor {
    store: Arc<dyn DocumentStore>,
    extractor: Arc<dyn TextExtractor>,
    analyzer: Arc<dyn Analyzer>,
    timeouts: Timeouts,
}

impl Reprocessor {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        extractor: Arc<dyn TextExtractor>,
        analyzer: Arc<dyn Analyzer>,
    ) -> Self {
        Self {
            store,
            extractor,
            analyzer,
            timeouts: Timeouts::default(),
        }
    }

    pub fn with_timeouts(mut self, timeouts: Timeouts) -> Self {
        self.timeouts = timeouts;
        self
    }

    pub fn store(&self) -> &Arc<dyn DocumentStore> {
        &self.store
    }

    /// Reprocess every candidate document in the store.
    ///
    /// Per-document failures are counted, never returned. The only error is
    /// failing to list the store's keys.
    pub async fn reprocess_all(
        &self,
        options: ReprocessOptions,
        sink: Arc<dyn ProgressSink>,
    ) -> Result<ReprocessSummary, ReprocessError> {
        let keys = self
            .store
            .list_keys()
            .await
            .map_err(ReprocessError::ListKeys)?;

        let keys: Vec<String> = keys.into_iter().filter(|k| is_document_key(k)).collect();
        let scanned = keys.len();

        let candidates = if options.failed_only {
            self.select_incomplete(keys).await
        } else {
            keys
        };

        let worker_count = options.worker_count();
        tracing::info!(
            scanned,
            candidates = candidates.len(),
            failed_only = options.failed_only,
            workers = worker_count,
            analyzer = self.analyzer.name(),
            "Reprocess started"
        );

        let progress = ProgressTracker::new(candidates.len(), sink);
        progress.start().await;

        let mut workers = spawn_reprocess_workers(
            worker_count,
            SharedQueue::new(candidates),
            self.clone(),
            progress.clone(),
            options.cancel.clone(),
            options.failed_only,
        );

        let mut cancelled = false;
        while let Some(result) = workers.join_next().await {
            match result {
                Ok(observed_cancel) => cancelled |= observed_cancel,
                Err(e) => tracing::error!(error = %e, "Reprocess worker aborted"),
            }
        }

        let counts = progress.snapshot().await;
        let summary = ReprocessSummary {
            total: counts.total,
            processed: counts.processed,
            updated: counts.updated,
            skipped: counts.skipped,
            failed: counts.failed,
            cancelled,
        };

        tracing::info!(
            total = summary.total,
            processed = summary.processed,
            updated = summary.updated,
            skipped = summary.skipped,
            failed = summary.failed,
            cancelled = summary.cancelled,
            "Reprocess finished"
        );

        Ok(summary)
    }

    /// Reprocess a single document and return what was written.
    pub async fn reprocess_one(&self, key: &str) -> Result<DocumentRecord, ReprocessError> {
        let prior = self
            .store
            .get(key)
            .await
            .map_err(ReprocessError::Fetch)?
            .ok_or_else(|| ReprocessError::NotFound(key.to_string()))?;

        let updated = self.refresh(&prior, false, &CancellationToken::new()).await;

        self.store
            .set(key, &updated)
            .await
            .map_err(ReprocessError::Write)?;

        tracing::info!(doc_id = %key, needs_review = updated.needs_review, "Document reprocessed");
        Ok(updated)
    }

    /// Keep the keys whose records are incomplete. Unreadable keys are dropped.
    async fn select_incomplete(&self, keys: Vec<String>) -> Vec<String> {
        let mut selected = Vec::new();

        for key in keys {
            match self.store.get(&key).await {
                Ok(record) if is_incomplete(record.as_ref()) => selected.push(key),
                Ok(_) => {}
                Err(e) => {
                    tracing::warn!(doc_id = %key, error = %e, "Dropping unreadable document from scan");
                }
            }
        }

        selected
    }

    /// Full pass for one dequeued key, ending in a terminal outcome.
    pub(crate) async fn process_key(
        &self,
        key: &str,
        failed_only: bool,
        cancel: &CancellationToken,
    ) -> KeyOutcome {
        let prior = match self.store.get(key).await {
            Ok(Some(record)) => record,
            Ok(None) => {
                tracing::debug!(doc_id = %key, "Document missing, skipping");
                return KeyOutcome::Skipped;
            }
            Err(e) => {
                tracing::warn!(doc_id = %key, error = %e, "Document unreadable, skipping");
                return KeyOutcome::Skipped;
            }
        };

        let updated = self.refresh(&prior, failed_only, cancel).await;

        match self.store.set(key, &updated).await {
            Ok(()) => {
                tracing::debug!(doc_id = %key, needs_review = updated.needs_review, "Document updated");
                KeyOutcome::Updated
            }
            Err(e) => {
                tracing::error!(doc_id = %key, error = %e, "Write-back failed");
                KeyOutcome::Failed
            }
        }
    }

    /// Re-extract (when needed) and re-analyze, then merge into `prior`.
    ///
    /// Never fails: extraction and analysis errors fall back to what the
    /// record already had.
    async fn refresh(
        &self,
        prior: &DocumentRecord,
        force_extract: bool,
        cancel: &CancellationToken,
    ) -> DocumentRecord {
        let mut text = prior.text.clone();
        let needs_extraction = text_len(&text) < MIN_TEXT_CHARS;

        if prior.has_raw_content() && (needs_extraction || force_extract) {
            let raw = prior.raw_content.as_deref().unwrap_or_default();
            match extract_with_timeout(
                self.extractor.as_ref(),
                raw,
                prior.effective_mime_type(),
                cancel,
                self.timeouts.extract,
            )
            .await
            {
                Ok(extracted) if !extracted.trim().is_empty() => text = extracted,
                Ok(_) => {
                    tracing::debug!(doc_id = %prior.id, "Extraction produced no text, keeping prior text");
                }
                Err(e) => {
                    tracing::warn!(doc_id = %prior.id, error = %e, "Extraction failed, keeping prior text");
                }
            }
        }

        let analysis =
            match analyze_with_timeout(self.analyzer.as_ref(), &text, prior, self.timeouts.analyze)
                .await
            {
                Ok(analysis) => Some(analysis),
                Err(e) => {
                    tracing::warn!(doc_id = %prior.id, error = %e, "Analysis failed, keeping prior findings");
                    None
                }
            };

        merge_record(prior, text, analysis, Utc::now())
    }
}
