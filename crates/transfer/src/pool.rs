//! Bounded worker pool for transfer batches.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use futures::stream::{self, StreamExt};

use swiftdesk_client::{ClientError, ObjectStore};
use swiftdesk_common::{ProgressCallback, DEFAULT_TRANSFER_CONCURRENCY};

use crate::task::{BatchProgress, BatchSummary, TaskKind, TaskOutcome, TransferError, TransferTask};

/// Options controlling batch execution.
#[derive(Debug, Clone)]
pub struct TransferOptions {
    /// Maximum number of tasks in flight at once. The bound is explicit:
    /// a 500-file batch never opens 500 connections.
    pub max_concurrency: usize,
}

impl Default for TransferOptions {
    fn default() -> Self {
        Self {
            max_concurrency: DEFAULT_TRANSFER_CONCURRENCY,
        }
    }
}

impl TransferOptions {
    /// Set the maximum number of concurrent tasks (minimum 1).
    pub fn with_max_concurrency(mut self, max_concurrency: usize) -> Self {
        self.max_concurrency = max_concurrency.max(1);
        self
    }
}

/// Execute a batch of tasks with bounded parallelism.
///
/// Every task yields exactly one [`TaskOutcome`]: a failure never aborts its
/// siblings and never escapes the pool. After each outcome the callback
/// receives a [`BatchProgress`] snapshot; returning `false` cancels the
/// batch — in-flight tasks run to completion, not-yet-started tasks finish
/// immediately as `Cancelled`, so the completion counter still reaches
/// `total` exactly once per task.
///
/// There is no automatic retry; callers re-submit failed tasks from the
/// summary's error list.
pub async fn run_batch(
    store: &dyn ObjectStore,
    tasks: Vec<TransferTask>,
    options: &TransferOptions,
    progress: &dyn ProgressCallback<BatchProgress>,
) -> BatchSummary {
    let total: u64 = tasks.len() as u64;
    let cancelled: AtomicBool = AtomicBool::new(false);
    let completed: AtomicU64 = AtomicU64::new(0);
    let errors_so_far: AtomicU64 = AtomicU64::new(0);

    let outcomes: Vec<TaskOutcome> = stream::iter(tasks)
        .map(|task: TransferTask| {
            let cancelled: &AtomicBool = &cancelled;
            async move {
                if cancelled.load(Ordering::SeqCst) {
                    return TaskOutcome::Cancelled;
                }
                match execute_task(store, &task).await {
                    Ok(bytes) => TaskOutcome::Completed { bytes },
                    Err(err) => {
                        log::warn!("transfer failed for {}/{}: {}", task.container, task.object, err);
                        TaskOutcome::Failed(TransferError::from_client(&task, &err))
                    }
                }
            }
        })
        .buffer_unordered(options.max_concurrency.max(1))
        .map(|outcome: TaskOutcome| {
            let done: u64 = completed.fetch_add(1, Ordering::SeqCst) + 1;
            if matches!(outcome, TaskOutcome::Failed(_)) {
                errors_so_far.fetch_add(1, Ordering::SeqCst);
            }
            let snapshot: BatchProgress = BatchProgress {
                completed: done,
                total,
                errors_so_far: errors_so_far.load(Ordering::SeqCst),
            };
            if !progress.on_progress(&snapshot) {
                cancelled.store(true, Ordering::SeqCst);
            }
            outcome
        })
        .collect()
        .await;

    let mut summary: BatchSummary = BatchSummary {
        total: outcomes.len(),
        ..BatchSummary::default()
    };
    for outcome in outcomes {
        summary.completed += 1;
        match outcome {
            TaskOutcome::Completed { bytes } => summary.bytes_transferred += bytes,
            TaskOutcome::Failed(err) => summary.errors.push(err),
            TaskOutcome::Cancelled => summary.cancelled += 1,
        }
    }
    summary
}

/// Run one task to completion, returning the bytes moved.
async fn execute_task(store: &dyn ObjectStore, task: &TransferTask) -> Result<u64, ClientError> {
    match &task.kind {
        TaskKind::Upload { local_path } => {
            let size: u64 = tokio::fs::metadata(local_path)
                .await
                .map_err(|e| ClientError::Io {
                    path: local_path.display().to_string(),
                    message: e.to_string(),
                })?
                .len();
            store
                .put_object_from_file(&task.container, &task.object, local_path)
                .await?;
            Ok(size)
        }
        TaskKind::Download { dest_path } => {
            store
                .get_object_to_file(&task.container, &task.object, dest_path)
                .await
        }
        TaskKind::Delete => {
            store.delete_object(&task.container, &task.object).await?;
            Ok(0)
        }
    }
}
