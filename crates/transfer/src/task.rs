//! Transfer task and batch result types.

use std::path::PathBuf;

use thiserror::Error;

use swiftdesk_client::ClientError;

/// What a task does with its object.
#[derive(Debug, Clone)]
pub enum TaskKind {
    /// Upload a local file to the object.
    Upload { local_path: PathBuf },
    /// Download the object to a local path.
    Download { dest_path: PathBuf },
    /// Delete the object.
    Delete,
}

/// One remote operation against one object.
///
/// Batches are flat lists of these; the pool gives no ordering guarantee
/// between tasks in a batch.
#[derive(Debug, Clone)]
pub struct TransferTask {
    pub container: String,
    pub object: String,
    pub kind: TaskKind,
}

impl TransferTask {
    pub fn upload(
        container: impl Into<String>,
        object: impl Into<String>,
        local_path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            container: container.into(),
            object: object.into(),
            kind: TaskKind::Upload {
                local_path: local_path.into(),
            },
        }
    }

    pub fn download(
        container: impl Into<String>,
        object: impl Into<String>,
        dest_path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            container: container.into(),
            object: object.into(),
            kind: TaskKind::Download {
                dest_path: dest_path.into(),
            },
        }
    }

    pub fn delete(container: impl Into<String>, object: impl Into<String>) -> Self {
        Self {
            container: container.into(),
            object: object.into(),
            kind: TaskKind::Delete,
        }
    }
}

/// A failed task, with enough identity to re-submit it.
#[derive(Error, Debug, Clone)]
#[error("{container}/{object}: {message}")]
pub struct TransferError {
    pub container: String,
    pub object: String,
    pub message: String,
    pub retryable: bool,
}

impl TransferError {
    pub(crate) fn from_client(task: &TransferTask, err: &ClientError) -> Self {
        Self {
            container: task.container.clone(),
            object: task.object.clone(),
            message: err.to_string(),
            retryable: err.is_retryable(),
        }
    }
}

/// Terminal state of one task. Every submitted task yields exactly one of
/// these, including tasks skipped after cancellation.
#[derive(Debug, Clone)]
pub enum TaskOutcome {
    Completed { bytes: u64 },
    Failed(TransferError),
    Cancelled,
}

/// Progress snapshot reported after each task finishes.
#[derive(Debug, Clone)]
pub struct BatchProgress {
    /// Tasks that have reached a terminal state (success, failure, or
    /// cancelled).
    pub completed: u64,
    pub total: u64,
    pub errors_so_far: u64,
}

impl BatchProgress {
    pub fn percent(&self) -> u8 {
        if self.total == 0 {
            return 100;
        }
        ((self.completed * 100) / self.total) as u8
    }
}

/// Final accounting for a batch. `completed == total` always holds on
/// return from the pool.
#[derive(Debug, Clone, Default)]
pub struct BatchSummary {
    pub total: usize,
    pub completed: usize,
    pub cancelled: usize,
    pub errors: Vec<TransferError>,
    pub bytes_transferred: u64,
}

impl BatchSummary {
    /// Every task reached a terminal state.
    pub fn is_complete(&self) -> bool {
        self.completed == self.total
    }

    /// Every task succeeded: nothing failed, nothing was cancelled.
    pub fn succeeded(&self) -> bool {
        self.is_complete() && self.errors.is_empty() && self.cancelled == 0
    }

    pub fn percent(&self) -> u8 {
        if self.total == 0 {
            return 100;
        }
        ((self.completed * 100) / self.total) as u8
    }
}
