//! A single long-lived conversion worker.

use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::Arc;

use rawdrop_common::WorkerId;
use serde::Serialize;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::error::{ConversionError, PoolError};
use super::events::{emit, ConversionEvent};
use super::queue::TaskQueue;
use super::runner::ConversionRunner;
use super::stats::PoolCounters;
use super::task::ConversionTask;

/// Observable worker state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkerState {
    Idle,
    Running,
    Stopped,
}

impl WorkerState {
    fn from_u8(v: u8) -> Self {
        match v {
            0 => Self::Idle,
            1 => Self::Running,
            _ => Self::Stopped,
        }
    }
}

/// Everything a worker loop needs, shared across the pool.
pub(crate) struct WorkerContext {
    pub queue: Arc<TaskQueue>,
    pub runner: Arc<ConversionRunner>,
    pub counters: Arc<PoolCounters>,
    pub events: broadcast::Sender<ConversionEvent>,
}

/// Handle to one worker: its stop signal and observable state.
pub struct Worker {
    id: WorkerId,
    stop: CancellationToken,
    state: Arc<AtomicU8>,
    started: AtomicBool,
    ctx: Arc<WorkerContext>,
}

impl Worker {
    pub(crate) fn new(id: WorkerId, ctx: Arc<WorkerContext>) -> Self {
        Self {
            id,
            stop: CancellationToken::new(),
            state: Arc::new(AtomicU8::new(WorkerState::Idle as u8)),
            started: AtomicBool::new(false),
            ctx,
        }
    }

    pub fn id(&self) -> WorkerId {
        self.id
    }

    pub fn state(&self) -> WorkerState {
        WorkerState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// Spawn the worker loop on the current runtime.
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::AlreadyStarted`] on a second call.
    pub fn start(&self) -> Result<JoinHandle<()>, PoolError> {
        if self.started.swap(true, Ordering::AcqRel) {
            return Err(PoolError::AlreadyStarted(self.id));
        }

        let id = self.id;
        let stop = self.stop.clone();
        let state = Arc::clone(&self.state);
        let ctx = Arc::clone(&self.ctx);

        Ok(tokio::spawn(async move {
            let _guard = LossGuard {
                id,
                state: Arc::clone(&state),
                counters: Arc::clone(&ctx.counters),
            };
            run_loop(id, &stop, &state, &ctx).await;
        }))
    }

    /// Ask the worker to exit after its current task, if any.
    ///
    /// Non-blocking and idempotent.
    pub fn stop(&self) {
        self.stop.cancel();
    }
}

impl std::fmt::Debug for Worker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Worker")
            .field("id", &self.id)
            .field("state", &self.state())
            .finish()
    }
}

async fn run_loop(id: WorkerId, stop: &CancellationToken, state: &AtomicU8, ctx: &WorkerContext) {
    debug!(worker = %id, "Worker started");

    loop {
        let task = tokio::select! {
            biased;
            _ = stop.cancelled() => break,
            task = ctx.queue.recv() => task,
        };

        let Some(task) = task else {
            break;
        };

        state.store(WorkerState::Running as u8, Ordering::Release);
        process(id, task, ctx).await;
        state.store(WorkerState::Idle as u8, Ordering::Release);
    }

    state.store(WorkerState::Stopped as u8, Ordering::Release);
    debug!(worker = %id, "Worker stopped");
}

async fn process(id: WorkerId, task: ConversionTask, ctx: &WorkerContext) {
    PoolCounters::incr(&ctx.counters.in_flight);
    emit(&ctx.events, ConversionEvent::started(task.id(), id));
    info!(
        worker = %id,
        task = %task.id(),
        source = %task.source_path().display(),
        codec = ctx.runner.codec_name(),
        "Conversion started"
    );

    let (result, elapsed) = ctx.runner.run(&task).await;
    let elapsed_ms = u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX);

    match result {
        Ok(output) => {
            PoolCounters::incr(&ctx.counters.completed);
            info!(
                worker = %id,
                task = %task.id(),
                output = %output.display(),
                elapsed_ms,
                "Conversion completed"
            );
            emit(
                &ctx.events,
                ConversionEvent::completed(task.id(), id, output, elapsed_ms),
            );
        }
        Err(err) => {
            match &err {
                ConversionError::Failed { .. } => {
                    PoolCounters::incr(&ctx.counters.failed);
                    warn!(worker = %id, task = %task.id(), elapsed_ms, error = %err, "Conversion failed");
                }
                ConversionError::Fault { .. } => {
                    PoolCounters::incr(&ctx.counters.faults);
                    error!(worker = %id, task = %task.id(), elapsed_ms, error = %err, "Codec panicked");
                }
                ConversionError::TimedOut { .. } => {
                    PoolCounters::incr(&ctx.counters.timeouts);
                    error!(worker = %id, task = %task.id(), elapsed_ms, error = %err, "Conversion timed out");
                }
            }
            emit(
                &ctx.events,
                ConversionEvent::failed(task.id(), id, err.to_string()),
            );
        }
    }

    PoolCounters::decr(&ctx.counters.in_flight);
}

/// Records a worker whose loop ended by unwinding.
///
/// A worker future dropped by runtime shutdown is not a loss.
struct LossGuard {
    id: WorkerId,
    state: Arc<AtomicU8>,
    counters: Arc<PoolCounters>,
}

impl Drop for LossGuard {
    fn drop(&mut self) {
        if std::thread::panicking() {
            self.state
                .store(WorkerState::Stopped as u8, Ordering::Release);
            PoolCounters::incr(&self.counters.workers_lost);
            error!(worker = %self.id, "Worker lost; pool is running below its configured size");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conversion::queue::BackpressurePolicy;
    use rawdrop_codec::RawCodec;
    use std::path::{Path, PathBuf};
    use std::time::Duration;

    struct Immediate;

    impl RawCodec for Immediate {
        fn name(&self) -> &'static str {
            "instant"
        }

        fn convert(&self, _source: &Path, dest_dir: &Path, _quality: u8) -> rawdrop_codec::Result<PathBuf> {
            Ok(dest_dir.join("out.jpg"))
        }
    }

    fn context() -> Arc<WorkerContext> {
        let (events, _) = broadcast::channel(16);
        Arc::new(WorkerContext {
            queue: Arc::new(
                TaskQueue::new(4, BackpressurePolicy::Reject, Duration::ZERO).unwrap(),
            ),
            runner: Arc::new(ConversionRunner::new(Arc::new(Immediate), Duration::from_secs(5))),
            counters: Arc::new(PoolCounters::default()),
            events,
        })
    }

    #[tokio::test]
    async fn test_start_twice_is_error() {
        let worker = Worker::new(WorkerId::new(0), context());
        let handle = worker.start().unwrap();
        assert_eq!(
            worker.start().unwrap_err(),
            PoolError::AlreadyStarted(WorkerId::new(0))
        );
        worker.stop();
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn test_processes_then_stops() {
        let ctx = context();
        let mut events = ctx.events.subscribe();
        let worker = Worker::new(WorkerId::new(3), Arc::clone(&ctx));
        assert_eq!(worker.state(), WorkerState::Idle);
        let handle = worker.start().unwrap();

        let task = ConversionTask::new("/m/a.nef", "/m", 100).unwrap();
        ctx.queue.submit(task.clone()).await.unwrap();

        loop {
            let event = events.recv().await.unwrap();
            if event.is_terminal() {
                assert_eq!(event.task(), task.id());
                break;
            }
        }

        worker.stop();
        worker.stop();
        handle.await.unwrap();
        assert_eq!(worker.state(), WorkerState::Stopped);
        assert_eq!(ctx.counters.completed.load(Ordering::Relaxed), 1);
        assert_eq!(ctx.counters.workers_lost.load(Ordering::Relaxed), 0);
    }

    #[test]
    fn test_runtime_shutdown_is_not_a_lost_worker() {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        let ctx = context();
        let worker = Worker::new(WorkerId::new(0), Arc::clone(&ctx));

        rt.block_on(async {
            let _handle = worker.start().unwrap();
            tokio::task::yield_now().await;
        });
        drop(rt);

        assert_eq!(ctx.counters.workers_lost.load(Ordering::Relaxed), 0);
    }

    #[tokio::test]
    async fn test_pending_stop_wins_over_queued_tasks() {
        let ctx = context();
        for name in ["a.nef", "b.nef"] {
            ctx.queue
                .submit(ConversionTask::new(format!("/m/{name}"), "/m", 100).unwrap())
                .await
                .unwrap();
        }

        let worker = Worker::new(WorkerId::new(0), Arc::clone(&ctx));
        worker.stop();
        worker.start().unwrap().await.unwrap();

        assert_eq!(ctx.queue.depth(), 2);
        assert_eq!(ctx.counters.completed.load(Ordering::Relaxed), 0);
    }
}
