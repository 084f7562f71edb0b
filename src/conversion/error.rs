//! Error types for the conversion pipeline.

use std::time::Duration;

use rawdrop_common::{TaskId, WorkerId};

/// Why the queue refused a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum RejectReason {
    /// The buffer is full and the policy is `reject`.
    #[error("conversion queue is full")]
    QueueFull,
    /// The policy is `block` and no space freed up within the submit timeout.
    #[error("timed out waiting for space in the conversion queue")]
    Timeout,
    /// Intake was closed because the pool is shutting down.
    #[error("conversion pool is shutting down")]
    ShuttingDown,
}

/// Error returned by [`TaskQueue::submit`](super::TaskQueue::submit).
#[derive(Debug, thiserror::Error)]
pub enum SubmitError {
    #[error("task {task} rejected: {reason}")]
    Rejected { task: TaskId, reason: RejectReason },
}

impl SubmitError {
    pub(crate) fn rejected(task: TaskId, reason: RejectReason) -> Self {
        Self::Rejected { task, reason }
    }

    /// The rejection reason.
    pub fn reason(&self) -> RejectReason {
        match self {
            Self::Rejected { reason, .. } => *reason,
        }
    }
}

/// Outcome of a conversion that did not produce a JPEG.
#[derive(Debug, thiserror::Error)]
pub enum ConversionError {
    /// The codec returned an error.
    #[error("conversion of task {task} failed: {cause}")]
    Failed {
        task: TaskId,
        #[source]
        cause: rawdrop_codec::Error,
    },

    /// The codec panicked. The panic was contained to this task.
    #[error("conversion of task {task} faulted: {message}")]
    Fault { task: TaskId, message: String },

    /// The codec ran longer than the per-task limit.
    #[error("conversion of task {task} exceeded {limit:?}")]
    TimedOut { task: TaskId, limit: Duration },
}

impl ConversionError {
    /// Task the error belongs to.
    pub fn task(&self) -> TaskId {
        match self {
            Self::Failed { task, .. } | Self::Fault { task, .. } | Self::TimedOut { task, .. } => {
                *task
            }
        }
    }
}

/// Errors raised while building or starting the worker pool.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PoolError {
    #[error("worker pool size must be at least 1")]
    ZeroWorkers,

    #[error("queue capacity must be at least 1")]
    ZeroCapacity,

    #[error("JPEG quality must be between 1 and 100, got {0}")]
    InvalidQuality(u8),

    #[error("{0} was already started")]
    AlreadyStarted(WorkerId),

    #[error("worker pool was already started")]
    PoolAlreadyStarted,
}
