//! Pipeline options and results.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

/// Default number of concurrent workers.
pub const DEFAULT_CONCURRENCY: usize = 3;

/// Options for one batch run.
#[derive(Debug, Clone)]
pub struct ReprocessOptions {
    /// Only process documents the selection policy flags as incomplete.
    pub failed_only: bool,
    /// Worker count; values below 1 are treated as 1.
    pub concurrency: usize,
    /// Cooperative cancellation, checked before each key is pulled.
    pub cancel: CancellationToken,
}

impl Default for ReprocessOptions {
    fn default() -> Self {
        Self {
            failed_only: true,
            concurrency: DEFAULT_CONCURRENCY,
            cancel: CancellationToken::new(),
        }
    }
}

impl ReprocessOptions {
    pub fn failed_only(mut self, failed_only: bool) -> Self {
        self.failed_only = failed_only;
        self
    }

    pub fn concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }

    pub fn cancel_token(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub(crate) fn worker_count(&self) -> usize {
        self.concurrency.max(1)
    }
}

/// Upper bounds for the slow external calls made per document.
#[derive(Debug, Clone, Copy)]
pub struct Timeouts {
    pub extract: Duration,
    pub analyze: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            extract: Duration::from_secs(120),
            analyze: Duration::from_secs(180),
        }
    }
}

/// Final counts for a batch run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReprocessSummary {
    pub total: usize,
    pub processed: usize,
    pub updated: usize,
    pub skipped: usize,
    pub failed: usize,
    pub cancelled: bool,
}

/// Terminal outcome for one dequeued key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyOutcome {
    /// Record rewritten.
    Updated,
    /// Record absent or unreadable; nothing written.
    Skipped,
    /// Write-back failed.
    Failed,
}
