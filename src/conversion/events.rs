//! Conversion lifecycle events.
//!
//! Broadcast on a `tokio::sync::broadcast` channel. Subscribers that fall
//! behind lose the oldest events; the pipeline never waits on them.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use rawdrop_common::{TaskId, WorkerId};
use serde::Serialize;
use tokio::sync::broadcast;

/// Default capacity of the event channel.
pub const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Something that happened to a conversion task.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event_type", rename_all = "snake_case")]
pub enum ConversionEvent {
    /// A task was accepted into the queue.
    Queued {
        task: TaskId,
        source: PathBuf,
        at: DateTime<Utc>,
    },
    /// A worker picked the task up.
    Started { task: TaskId, worker: WorkerId },
    /// The JPEG was written.
    Completed {
        task: TaskId,
        worker: WorkerId,
        output: PathBuf,
        elapsed_ms: u64,
    },
    /// Conversion failed, faulted or timed out.
    Failed {
        task: TaskId,
        worker: WorkerId,
        error: String,
    },
}

impl ConversionEvent {
    pub fn queued(task: TaskId, source: PathBuf) -> Self {
        Self::Queued {
            task,
            source,
            at: Utc::now(),
        }
    }

    pub fn started(task: TaskId, worker: WorkerId) -> Self {
        Self::Started { task, worker }
    }

    pub fn completed(task: TaskId, worker: WorkerId, output: PathBuf, elapsed_ms: u64) -> Self {
        Self::Completed {
            task,
            worker,
            output,
            elapsed_ms,
        }
    }

    pub fn failed(task: TaskId, worker: WorkerId, error: String) -> Self {
        Self::Failed {
            task,
            worker,
            error,
        }
    }

    /// Task the event is about.
    pub fn task(&self) -> TaskId {
        match self {
            Self::Queued { task, .. }
            | Self::Started { task, .. }
            | Self::Completed { task, .. }
            | Self::Failed { task, .. } => *task,
        }
    }

    /// Whether the task has reached a final state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed { .. } | Self::Failed { .. })
    }
}

/// Sender half shared by the service and its workers.
pub type EventSender = broadcast::Sender<ConversionEvent>;

/// Publish without caring whether anyone listens.
pub(crate) fn emit(tx: &EventSender, event: ConversionEvent) {
    let _ = tx.send(event);
}
