//! Worker pool for batch reprocessing.

use std::collections::VecDeque;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use tokio::sync::Mutex;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use super::progress::ProgressTracker;
use super::types::KeyOutcome;
use super::Reprocessor;

/// Result of asking the queue for work.
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum Pull<T> {
    Item(T),
    /// Nothing left.
    Drained,
    /// Work remains but the run was cancelled.
    Cancelled,
}

/// Queue shared by all workers of a run. Each item is handed out once.
pub(crate) struct SharedQueue<T> {
    items: Arc<Mutex<VecDeque<T>>>,
}

impl<T> SharedQueue<T> {
    pub fn new(items: impl IntoIterator<Item = T>) -> Self {
        Self {
            items: Arc::new(Mutex::new(items.into_iter().collect())),
        }
    }

    /// Take the next item unless the queue is empty or `cancel` is set.
    pub async fn pull(&self, cancel: &CancellationToken) -> Pull<T> {
        let mut items = self.items.lock().await;
        if items.is_empty() {
            return Pull::Drained;
        }
        if cancel.is_cancelled() {
            return Pull::Cancelled;
        }
        match items.pop_front() {
            Some(item) => Pull::Item(item),
            None => Pull::Drained,
        }
    }
}

impl<T> Clone for SharedQueue<T> {
    fn clone(&self) -> Self {
        Self {
            items: self.items.clone(),
        }
    }
}

/// Spawn `count` workers draining `queue`.
///
/// Each task resolves to `true` if it stopped because of cancellation.
pub(crate) fn spawn_reprocess_workers(
    count: usize,
    queue: SharedQueue<String>,
    reprocessor: Reprocessor,
    progress: ProgressTracker,
    cancel: CancellationToken,
    failed_only: bool,
) -> JoinSet<bool> {
    let mut workers = JoinSet::new();

    for i in 0..count {
        let queue = queue.clone();
        let reprocessor = reprocessor.clone();
        let progress = progress.clone();
        let cancel = cancel.clone();

        workers.spawn(async move {
            tracing::debug!(worker = i, "Reprocess worker started");

            let observed_cancel = loop {
                let key = match queue.pull(&cancel).await {
                    Pull::Item(key) => key,
                    Pull::Drained => break false,
                    Pull::Cancelled => break true,
                };

                // A panic inside one document must not take the worker down
                let outcome = AssertUnwindSafe(reprocessor.process_key(&key, failed_only, &cancel))
                    .catch_unwind()
                    .await
                    .unwrap_or_else(|_| {
                        tracing::error!(doc_id = %key, "Reprocess panicked");
                        KeyOutcome::Failed
                    });

                progress.record(&key, outcome).await;
            };

            if observed_cancel {
                tracing::info!(worker = i, "Reprocess worker cancelled");
            } else {
                tracing::debug!(worker = i, "Reprocess worker stopped");
            }
            observed_cancel
        });
    }

    workers
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_queue_hands_out_each_item_once() {
        let queue = SharedQueue::new(0..100);
        let cancel = CancellationToken::new();

        let mut handles = Vec::new();
        for _ in 0..4 {
            let queue = queue.clone();
            let cancel = cancel.clone();
            handles.push(tokio::spawn(async move {
                let mut taken = Vec::new();
                while let Pull::Item(i) = queue.pull(&cancel).await {
                    taken.push(i);
                    tokio::task::yield_now().await;
                }
                taken
            }));
        }

        let mut all: Vec<i32> = Vec::new();
        for handle in handles {
            all.extend(handle.await.unwrap());
        }
        all.sort();
        assert_eq!(all, (0..100).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn test_cancel_reported_only_with_work_left() {
        let cancel = CancellationToken::new();
        cancel.cancel();

        let queue = SharedQueue::new(["doc-1".to_string()]);
        assert_eq!(queue.pull(&cancel).await, Pull::Cancelled);

        let empty: SharedQueue<String> = SharedQueue::new([]);
        assert_eq!(empty.pull(&cancel).await, Pull::Drained);
    }
}
