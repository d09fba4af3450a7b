use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use casefile_core::pipeline::scan_status;
use casefile_core::storage::{import_file, Severity};
use casefile_core::{
    open_reprocessor, Config, DocumentRecord, ProgressSink, ReprocessOptions, ReprocessSummary,
    Reprocessor, Settings, StoreStatus,
};

use crate::error::{CommandError, CommandResult, ResultExt};

/// Application state shared across commands
#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub settings: Settings,
    pub reprocessor: Reprocessor,
    /// Cancellation token of the batch run in progress, if any
    pub active_run: Arc<Mutex<Option<CancellationToken>>>,
}

impl AppState {
    pub fn new(config: Config) -> anyhow::Result<Self> {
        config.ensure_dirs()?;
        let settings = Settings::load(&config.settings_file);
        let reprocessor = open_reprocessor(&config, &settings)?;

        Ok(Self {
            config,
            settings,
            reprocessor,
            active_run: Arc::new(Mutex::new(None)),
        })
    }
}

/// Document metadata returned to callers
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentInfo {
    pub id: String,
    pub name: String,
    pub mime_type: String,
    pub text_chars: usize,
    pub summary: String,
    pub severity: Severity,
    pub needs_review: bool,
    pub last_modified: Option<String>,
}

impl From<&DocumentRecord> for DocumentInfo {
    fn from(record: &DocumentRecord) -> Self {
        Self {
            id: record.id.clone(),
            name: record.name.clone(),
            mime_type: record.effective_mime_type().to_string(),
            text_chars: record.text.chars().count(),
            summary: record.summary.clone(),
            severity: record.severity,
            needs_review: record.needs_review,
            last_modified: record.last_modified.map(|t| t.to_rfc3339()),
        }
    }
}

type RunSlot = Arc<Mutex<Option<CancellationToken>>>;

fn lock_slot(slot: &RunSlot) -> MutexGuard<'_, Option<CancellationToken>> {
    slot.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Claims the run slot for one batch and frees it when dropped, including
/// when the run's future is dropped or unwinds.
struct ActiveRun {
    slot: RunSlot,
}

impl ActiveRun {
    fn claim(slot: &RunSlot) -> CommandResult<(Self, CancellationToken)> {
        let mut active = lock_slot(slot);
        if active.is_some() {
            return Err(CommandError::busy());
        }
        let token = CancellationToken::new();
        *active = Some(token.clone());
        Ok((Self { slot: slot.clone() }, token))
    }
}

impl Drop for ActiveRun {
    fn drop(&mut self) {
        *lock_slot(&self.slot) = None;
    }
}

/// Overrides for a batch run; unset fields come from settings
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ReprocessRequest {
    pub failed_only: Option<bool>,
    pub concurrency: Option<usize>,
}

/// Run a batch reprocess. Only one batch may run at a time.
pub async fn reprocess_all(
    state: &AppState,
    request: ReprocessRequest,
    sink: Arc<dyn ProgressSink>,
) -> CommandResult<ReprocessSummary> {
    let (_run, cancel) = ActiveRun::claim(&state.active_run)?;

    let options = ReprocessOptions::default()
        .failed_only(request.failed_only.unwrap_or(state.settings.failed_only))
        .concurrency(request.concurrency.unwrap_or(state.settings.concurrency))
        .cancel_token(cancel);

    Ok(state.reprocessor.reprocess_all(options, sink).await?)
}

/// Cancel the batch run in progress. Returns false if nothing was running.
pub async fn cancel_reprocess(state: &AppState) -> bool {
    match lock_slot(&state.active_run).as_ref() {
        Some(token) => {
            token.cancel();
            tracing::info!("Cancelled reprocess run");
            true
        }
        None => false,
    }
}

/// Reprocess a single document
pub async fn reprocess_one(state: &AppState, doc_id: &str) -> CommandResult<DocumentInfo> {
    let record = state.reprocessor.reprocess_one(doc_id).await?;
    Ok(DocumentInfo::from(&record))
}

/// Import files as new documents. Files that cannot be read are logged and skipped.
pub async fn import_documents(
    state: &AppState,
    paths: Vec<PathBuf>,
) -> CommandResult<Vec<DocumentInfo>> {
    let store = state.reprocessor.store();
    let mut imported = Vec::with_capacity(paths.len());

    for path in &paths {
        match import_file(store.as_ref(), path).await {
            Ok(record) => imported.push(DocumentInfo::from(&record)),
            Err(e) => tracing::error!(path = %path.display(), error = %e, "Import failed"),
        }
    }

    if imported.is_empty() && !paths.is_empty() {
        return Err(CommandError::storage("No files could be imported"));
    }

    Ok(imported)
}

/// Completeness report for the store
pub async fn store_status(state: &AppState) -> CommandResult<StoreStatus> {
    scan_status(state.reprocessor.store().as_ref())
        .await
        .storage_err()
}
