//! Progress reporting for a reprocessing run.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, Mutex};

use super::types::KeyOutcome;

/// Point-in-time view of a run's counters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressSnapshot {
    pub total: usize,
    pub processed: usize,
    pub updated: usize,
    pub skipped: usize,
    pub failed: usize,
    /// Key whose outcome produced this snapshot
    pub current_id: Option<String>,
}

/// Receives progress snapshots.
///
/// Calls are serialized by the tracker, so implementations need no locking
/// of their own. A panicking sink is contained and does not stop the run.
pub trait ProgressSink: Send + Sync {
    fn on_progress(&self, snapshot: &ProgressSnapshot);
}

impl<F> ProgressSink for F
where
    F: Fn(&ProgressSnapshot) + Send + Sync,
{
    fn on_progress(&self, snapshot: &ProgressSnapshot) {
        self(snapshot)
    }
}

/// Discards everything.
pub struct NoopSink;

impl ProgressSink for NoopSink {
    fn on_progress(&self, _snapshot: &ProgressSnapshot) {}
}

/// Forwards snapshots to a channel. Drops snapshots when the receiver lags.
pub struct ChannelSink {
    tx: mpsc::Sender<ProgressSnapshot>,
}

impl ChannelSink {
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<ProgressSnapshot>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Self { tx }, rx)
    }
}

impl ProgressSink for ChannelSink {
    fn on_progress(&self, snapshot: &ProgressSnapshot) {
        let _ = self.tx.try_send(snapshot.clone());
    }
}

/// Shared counters for one run.
///
/// Counters only grow. Every update emits a snapshot while the counter lock
/// is held, so the sink sees snapshots in counter order.
#[derive(Clone)]
pub struct ProgressTracker {
    state: Arc<Mutex<ProgressSnapshot>>,
    sink: Arc<dyn ProgressSink>,
}

impl ProgressTracker {
    pub fn new(total: usize, sink: Arc<dyn ProgressSink>) -> Self {
        Self {
            state: Arc::new(Mutex::new(ProgressSnapshot {
                total,
                ..Default::default()
            })),
            sink,
        }
    }

    /// Emit the initial snapshot before any work starts.
    pub async fn start(&self) {
        let state = self.state.lock().await;
        emit(self.sink.as_ref(), &state);
    }

    /// Count a terminal outcome for `key` and emit.
    pub async fn record(&self, key: &str, outcome: KeyOutcome) {
        let mut state = self.state.lock().await;

        match outcome {
            KeyOutcome::Updated => state.updated += 1,
            KeyOutcome::Skipped => state.skipped += 1,
            KeyOutcome::Failed => state.failed += 1,
        }
        state.processed += 1;
        state.current_id = Some(key.to_string());

        emit(self.sink.as_ref(), &state);
    }

    /// Current counters.
    pub async fn snapshot(&self) -> ProgressSnapshot {
        self.state.lock().await.clone()
    }
}

fn emit(sink: &dyn ProgressSink, snapshot: &ProgressSnapshot) {
    if catch_unwind(AssertUnwindSafe(|| sink.on_progress(snapshot))).is_err() {
        tracing::warn!(processed = snapshot.processed, "Progress sink panicked, ignoring");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_counters_and_snapshots() {
        let seen = Arc::new(std::sync::Mutex::new(Vec::new()));
        let sink_seen = seen.clone();
        let tracker = ProgressTracker::new(
            3,
            Arc::new(move |s: &ProgressSnapshot| sink_seen.lock().unwrap().push(s.clone())),
        );

        tracker.start().await;
        tracker.record("doc-1", KeyOutcome::Updated).await;
        tracker.record("doc-2", KeyOutcome::Skipped).await;
        tracker.record("doc-3", KeyOutcome::Failed).await;

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 4);
        assert_eq!(seen[0].processed, 0);
        assert_eq!(seen[0].current_id, None);
        assert_eq!(seen[3].processed, 3);
        assert_eq!(seen[3].current_id.as_deref(), Some("doc-3"));

        let last = tracker.snapshot().await;
        assert_eq!((last.updated, last.skipped, last.failed), (1, 1, 1));
        assert_eq!(last.processed, last.updated + last.skipped + last.failed);
    }

    #[tokio::test]
    async fn test_panicking_sink_is_contained() {
        let tracker = ProgressTracker::new(
            1,
            Arc::new(|_: &ProgressSnapshot| panic!("render failed")),
        );

        tracker.start().await;
        tracker.record("doc-1", KeyOutcome::Updated).await;

        assert_eq!(tracker.snapshot().await.processed, 1);
    }

    #[tokio::test]
    async fn test_channel_sink() {
        let (sink, mut rx) = ChannelSink::new(8);
        let tracker = ProgressTracker::new(1, Arc::new(sink));

        tracker.start().await;
        tracker.record("doc-1", KeyOutcome::Skipped).await;

        assert_eq!(rx.recv().await.unwrap().processed, 0);
        let last = rx.recv().await.unwrap();
        assert_eq!(last.skipped, 1);
        assert_eq!(last.current_id.as_deref(), Some("doc-1"));
    }
}
