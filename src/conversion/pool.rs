//! Fixed-size pool of conversion workers.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use rawdrop_common::WorkerId;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use super::error::PoolError;
use super::worker::{Worker, WorkerContext, WorkerState};

/// How often the drain phase re-checks the queue depth.
const DRAIN_POLL_INTERVAL: Duration = Duration::from_millis(25);

/// What happened during [`WorkerPool::stop_all`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StopReport {
    /// Tasks still queued when the drain period ended.
    pub abandoned: usize,
    /// Workers that had not exited when the join bound expired.
    pub unfinished_workers: usize,
}

/// Owns the workers for the lifetime of the process.
pub struct WorkerPool {
    ctx: Arc<WorkerContext>,
    workers: Mutex<Vec<Worker>>,
    handles: Mutex<Vec<JoinHandle<()>>>,
    started: AtomicBool,
    stopped: AtomicBool,
}

impl WorkerPool {
    pub(crate) fn new(ctx: Arc<WorkerContext>) -> Self {
        Self {
            ctx,
            workers: Mutex::new(Vec::new()),
            handles: Mutex::new(Vec::new()),
            started: AtomicBool::new(false),
            stopped: AtomicBool::new(false),
        }
    }

    /// Spawn `n` workers.
    ///
    /// # Errors
    ///
    /// Fails when `n` is 0 or the pool was already started.
    pub fn start(&self, n: usize) -> Result<(), PoolError> {
        if n == 0 {
            return Err(PoolError::ZeroWorkers);
        }
        if self.started.swap(true, Ordering::AcqRel) {
            return Err(PoolError::PoolAlreadyStarted);
        }

        let mut workers = self.workers.lock();
        let mut handles = self.handles.lock();
        for index in 0..n {
            let worker = Worker::new(WorkerId::new(index), Arc::clone(&self.ctx));
            handles.push(worker.start()?);
            workers.push(worker);
        }

        info!(workers = n, "Conversion worker pool started");
        Ok(())
    }

    /// Close intake, drain for up to `drain_timeout`, then stop every worker.
    ///
    /// Returns `None` when the pool was already stopped.
    pub async fn stop_all(&self, drain_timeout: Duration) -> Option<StopReport> {
        if self.stopped.swap(true, Ordering::AcqRel) {
            debug!("Worker pool already stopped");
            return None;
        }

        self.ctx.queue.close();
        info!(
            queued = self.ctx.queue.depth(),
            drain_timeout_ms = drain_timeout.as_millis() as u64,
            "Stopping conversion worker pool"
        );

        let deadline = Instant::now() + drain_timeout;
        while self.ctx.queue.depth() > 0 && self.has_live_workers() && Instant::now() < deadline {
            tokio::time::sleep(DRAIN_POLL_INTERVAL).await;
        }

        for worker in self.workers.lock().iter() {
            worker.stop();
        }

        let abandoned = self.ctx.queue.depth();
        if abandoned > 0 {
            warn!(abandoned, "Queued conversions abandoned at shutdown");
        }

        // In-flight conversions are not cancellable; give them one more drain
        // period to finish before detaching.
        let handles = std::mem::take(&mut *self.handles.lock());
        let mut unfinished_workers = 0;
        match tokio::time::timeout(drain_timeout, futures::future::join_all(handles)).await {
            Ok(results) => {
                for result in results {
                    if let Err(e) = result {
                        warn!(error = %e, "Worker task ended abnormally");
                    }
                }
            }
            Err(_) => {
                unfinished_workers = self
                    .states()
                    .into_iter()
                    .filter(|s| *s != WorkerState::Stopped)
                    .count();
                warn!(
                    unfinished_workers,
                    "Workers still converting after shutdown bound; detaching"
                );
            }
        }

        info!(abandoned, "Conversion worker pool stopped");
        Some(StopReport {
            abandoned,
            unfinished_workers,
        })
    }

    /// Number of workers spawned.
    pub fn size(&self) -> usize {
        self.workers.lock().len()
    }

    /// Current state of every worker, in id order.
    pub fn states(&self) -> Vec<WorkerState> {
        self.workers.lock().iter().map(Worker::state).collect()
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::Acquire)
    }

    fn has_live_workers(&self) -> bool {
        self.states().iter().any(|s| *s != WorkerState::Stopped)
    }
}

impl std::fmt::Debug for WorkerPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerPool")
            .field("size", &self.size())
            .field("stopped", &self.is_stopped())
            .finish()
    }
}
