//! Bounded dispatch queue between the upload path and the workers.
//!
//! Producers call [`TaskQueue::submit`]; workers compete for tasks through
//! [`TaskQueue::recv`]. The receiver sits behind a fair tokio mutex so waiting
//! workers are served in arrival order. Closing intake is guarded by a lock
//! that every admission holds, so once [`TaskQueue::close`] returns no further
//! task can enter the buffer.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, Mutex};
use tokio_util::sync::CancellationToken;

use super::error::{PoolError, RejectReason, SubmitError};
use super::task::ConversionTask;

/// What `submit` does when the buffer is full.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackpressurePolicy {
    /// Fail immediately with [`RejectReason::QueueFull`].
    #[default]
    Reject,
    /// Wait up to the submit timeout for space, then fail with
    /// [`RejectReason::Timeout`].
    Block,
}

impl std::fmt::Display for BackpressurePolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Reject => f.write_str("reject"),
            Self::Block => f.write_str("block"),
        }
    }
}

/// FIFO of pending conversion tasks with a fixed capacity.
pub struct TaskQueue {
    tx: mpsc::Sender<ConversionTask>,
    rx: Arc<Mutex<mpsc::Receiver<ConversionTask>>>,
    capacity: usize,
    policy: BackpressurePolicy,
    submit_timeout: Duration,
    intake: CancellationToken,
    gate: RwLock<()>,
}

impl TaskQueue {
    /// Create a queue holding at most `capacity` tasks.
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::ZeroCapacity`] when `capacity` is 0.
    pub fn new(
        capacity: usize,
        policy: BackpressurePolicy,
        submit_timeout: Duration,
    ) -> Result<Self, PoolError> {
        if capacity == 0 {
            return Err(PoolError::ZeroCapacity);
        }

        let (tx, rx) = mpsc::channel(capacity);
        Ok(Self {
            tx,
            rx: Arc::new(Mutex::new(rx)),
            capacity,
            policy,
            submit_timeout,
            intake: CancellationToken::new(),
            gate: RwLock::new(()),
        })
    }

    /// Offer a task to the queue according to the backpressure policy.
    pub async fn submit(&self, task: ConversionTask) -> Result<(), SubmitError> {
        self.submit_with(task, |_| {}).await
    }

    /// Like [`submit`](Self::submit), calling `on_admit` once space is
    /// reserved and before any worker can see the task.
    ///
    /// `on_admit` runs under the admission lock and must not block.
    pub async fn submit_with<F>(&self, task: ConversionTask, on_admit: F) -> Result<(), SubmitError>
    where
        F: FnOnce(&ConversionTask),
    {
        let id = task.id();
        if self.intake.is_cancelled() {
            return Err(SubmitError::rejected(id, RejectReason::ShuttingDown));
        }

        let permit = match self.policy {
            BackpressurePolicy::Reject => self.tx.try_reserve().map_err(|e| match e {
                mpsc::error::TrySendError::Full(()) => {
                    SubmitError::rejected(id, RejectReason::QueueFull)
                }
                mpsc::error::TrySendError::Closed(()) => {
                    SubmitError::rejected(id, RejectReason::ShuttingDown)
                }
            })?,
            BackpressurePolicy::Block => tokio::select! {
                _ = self.intake.cancelled() => {
                    return Err(SubmitError::rejected(id, RejectReason::ShuttingDown));
                }
                reserved = tokio::time::timeout(self.submit_timeout, self.tx.reserve()) => {
                    match reserved {
                        Ok(Ok(permit)) => permit,
                        Ok(Err(_)) => {
                            return Err(SubmitError::rejected(id, RejectReason::ShuttingDown));
                        }
                        Err(_) => {
                            return Err(SubmitError::rejected(id, RejectReason::Timeout));
                        }
                    }
                }
            },
        };

        let _gate = self.gate.read();
        if self.intake.is_cancelled() {
            return Err(SubmitError::rejected(id, RejectReason::ShuttingDown));
        }
        on_admit(&task);
        permit.send(task);
        Ok(())
    }

    /// Wait for the next task. Cancel-safe.
    ///
    /// Returns `None` only once the queue has been dropped by every producer.
    pub async fn recv(&self) -> Option<ConversionTask> {
        self.rx.lock().await.recv().await
    }

    /// Stop accepting new tasks. Already queued tasks stay receivable.
    ///
    /// Idempotent.
    pub fn close(&self) {
        let _gate = self.gate.write();
        self.intake.cancel();
    }

    /// Whether intake is still open.
    pub fn is_accepting(&self) -> bool {
        !self.intake.is_cancelled()
    }

    /// Number of tasks waiting in the buffer.
    pub fn depth(&self) -> usize {
        self.capacity - self.tx.capacity()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn policy(&self) -> BackpressurePolicy {
        self.policy
    }
}

impl std::fmt::Debug for TaskQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskQueue")
            .field("capacity", &self.capacity)
            .field("depth", &self.depth())
            .field("policy", &self.policy)
            .field("accepting", &self.is_accepting())
            .finish()
    }
}
