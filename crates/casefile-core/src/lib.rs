//! Casefile Core - Business logic for case document reprocessing
//!
//! This crate contains all the core functionality for Casefile, including:
//! - Document storage (JSON file per key, or in memory)
//! - Text extraction (lopdf for PDFs, UTF-8 for text formats)
//! - Document analysis (OpenAI, Anthropic, or an offline heuristic)
//! - The reprocessing pipeline: selection, worker pool, merge, progress

pub mod analyze;
pub mod config;
pub mod error;
pub mod extract;
pub mod pipeline;
pub mod storage;

use std::sync::Arc;

pub use analyze::{build_analyzer, Analysis, Analyzer, ProviderConfig};
pub use config::{Config, Settings};
pub use error::{AnalysisError, ExtractionError, ReprocessError, StoreError};
pub use extract::{DefaultExtractor, TextExtractor};
pub use pipeline::{
    ProgressSink, ProgressSnapshot, ReprocessOptions, ReprocessSummary, Reprocessor, StoreStatus,
};
pub use storage::{DocumentRecord, DocumentStore, FsDocumentStore, MemoryDocumentStore};

/// Wire a reprocessor over the on-disk store described by `config`.
pub fn open_reprocessor(config: &Config, settings: &Settings) -> anyhow::Result<Reprocessor> {
    let store = FsDocumentStore::open(&config.store_dir)?;
    let analyzer = build_analyzer(&settings.analyzer);

    tracing::debug!(
        store = %config.store_dir.display(),
        analyzer = analyzer.name(),
        "Reprocessor ready"
    );

    Ok(
        Reprocessor::new(Arc::new(store), Arc::new(DefaultExtractor::new()), analyzer)
            .with_timeouts(settings.timeouts()),
    )
}
