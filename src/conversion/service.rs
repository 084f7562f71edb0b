//! The explicit handle to the conversion pipeline.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use rawdrop_codec::RawCodec;
use tokio::sync::broadcast;
use tracing::{debug, warn};

use super::error::{PoolError, SubmitError};
use super::events::{emit, ConversionEvent, EVENT_CHANNEL_CAPACITY};
use super::pool::{StopReport, WorkerPool};
use super::queue::{BackpressurePolicy, TaskQueue};
use super::runner::ConversionRunner;
use super::stats::{Gauges, PoolCounters, PoolStats};
use super::task::ConversionTask;
use super::worker::{WorkerContext, WorkerState};
use crate::config::ConversionConfig;

/// Runtime settings for [`ConversionService`].
#[derive(Debug, Clone)]
pub struct ServiceSettings {
    pub max_workers: usize,
    pub queue_capacity: usize,
    pub backpressure: BackpressurePolicy,
    pub submit_timeout: Duration,
    pub task_timeout: Duration,
    pub drain_timeout: Duration,
    pub jpeg_quality: u8,
}

impl Default for ServiceSettings {
    fn default() -> Self {
        Self::from(&ConversionConfig::default())
    }
}

impl From<&ConversionConfig> for ServiceSettings {
    fn from(config: &ConversionConfig) -> Self {
        Self {
            max_workers: config.max_workers,
            queue_capacity: config.queue_capacity,
            backpressure: config.backpressure,
            submit_timeout: Duration::from_millis(config.submit_timeout_ms),
            task_timeout: Duration::from_secs(config.task_timeout_secs),
            drain_timeout: Duration::from_secs(config.drain_timeout_secs),
            jpeg_quality: config.jpeg_quality,
        }
    }
}

/// Queue, worker pool, statistics and event bus behind one handle.
///
/// Constructed once at startup and shared through `Arc`. There is no global
/// instance.
pub struct ConversionService {
    queue: Arc<TaskQueue>,
    pool: WorkerPool,
    counters: Arc<PoolCounters>,
    events: broadcast::Sender<ConversionEvent>,
    settings: ServiceSettings,
    started_at: DateTime<Utc>,
}

impl ConversionService {
    /// Build the pipeline without spawning workers.
    ///
    /// # Errors
    ///
    /// Rejects a zero pool size, zero queue capacity or out-of-range quality.
    pub fn new(settings: ServiceSettings, codec: Arc<dyn RawCodec>) -> Result<Self, PoolError> {
        if settings.max_workers == 0 {
            return Err(PoolError::ZeroWorkers);
        }
        if !(1..=100).contains(&settings.jpeg_quality) {
            return Err(PoolError::InvalidQuality(settings.jpeg_quality));
        }

        let queue = Arc::new(TaskQueue::new(
            settings.queue_capacity,
            settings.backpressure,
            settings.submit_timeout,
        )?);
        let counters = Arc::new(PoolCounters::default());
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let runner = Arc::new(ConversionRunner::new(codec, settings.task_timeout));

        let pool = WorkerPool::new(Arc::new(WorkerContext {
            queue: Arc::clone(&queue),
            runner,
            counters: Arc::clone(&counters),
            events: events.clone(),
        }));

        Ok(Self {
            queue,
            pool,
            counters,
            events,
            settings,
            started_at: Utc::now(),
        })
    }

    /// Build the pipeline and spawn `max_workers` workers.
    pub fn start(settings: ServiceSettings, codec: Arc<dyn RawCodec>) -> Result<Self, PoolError> {
        let service = Self::new(settings, codec)?;
        service.pool.start(service.settings.max_workers)?;
        Ok(service)
    }

    /// Task for `source`, converted next to it at the configured quality.
    pub fn task_for(&self, source: impl Into<PathBuf>) -> rawdrop_common::Result<ConversionTask> {
        let source = source.into();
        let dest = source
            .parent()
            .map(|p| p.to_path_buf())
            .unwrap_or_default();
        ConversionTask::new(source, dest, self.settings.jpeg_quality)
    }

    /// Hand a task to the workers.
    ///
    /// The task is counted and its `Queued` event sent before any worker can
    /// dequeue it, so `Queued` always precedes `Started` on the event bus.
    pub async fn submit(&self, task: ConversionTask) -> Result<(), SubmitError> {
        let id = task.id();
        let source = task.source_path().to_path_buf();

        let admitted = self
            .queue
            .submit_with(task, |task| {
                PoolCounters::incr(&self.counters.submitted);
                emit(
                    &self.events,
                    ConversionEvent::queued(task.id(), task.source_path().to_path_buf()),
                );
            })
            .await;

        match admitted {
            Ok(()) => {
                debug!(task = %id, source = %source.display(), depth = self.queue.depth(), "Conversion queued");
                Ok(())
            }
            Err(e) => {
                PoolCounters::incr(&self.counters.rejected);
                warn!(task = %id, source = %source.display(), reason = %e.reason(), "Conversion rejected");
                Err(e)
            }
        }
    }

    /// Subscribe to lifecycle events.
    pub fn subscribe(&self) -> broadcast::Receiver<ConversionEvent> {
        self.events.subscribe()
    }

    pub fn stats(&self) -> PoolStats {
        let states = self.pool.states();
        self.counters.snapshot(Gauges {
            workers: states.len(),
            busy_workers: states
                .iter()
                .filter(|s| **s == WorkerState::Running)
                .count(),
            queue_depth: self.queue.depth(),
            queue_capacity: self.queue.capacity(),
            accepting: self.queue.is_accepting(),
            started_at: self.started_at,
        })
    }

    pub fn worker_states(&self) -> Vec<WorkerState> {
        self.pool.states()
    }

    pub fn settings(&self) -> &ServiceSettings {
        &self.settings
    }

    /// Stop the pool using the configured drain timeout.
    pub async fn shutdown(&self) -> Option<StopReport> {
        self.stop_all(self.settings.drain_timeout).await
    }

    /// Stop the pool. A second call is a no-op returning `None`.
    pub async fn stop_all(&self, drain_timeout: Duration) -> Option<StopReport> {
        self.pool.stop_all(drain_timeout).await
    }
}

impl std::fmt::Debug for ConversionService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConversionService")
            .field("queue", &self.queue)
            .field("pool", &self.pool)
            .field("settings", &self.settings)
            .finish()
    }
}
