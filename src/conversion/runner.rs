//! Fault boundary around a single codec call.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use rawdrop_codec::RawCodec;
use tokio::task::JoinError;

use super::error::ConversionError;
use super::task::ConversionTask;

/// Runs the codec for one task on the blocking pool.
///
/// A codec error, a panic and an overrun of the per-task limit each map to a
/// distinct [`ConversionError`]; none of them escape to the calling worker.
/// A timed-out codec call keeps running on its blocking thread until it
/// returns on its own; its result is discarded.
pub struct ConversionRunner {
    codec: Arc<dyn RawCodec>,
    task_timeout: Duration,
}

impl ConversionRunner {
    pub fn new(codec: Arc<dyn RawCodec>, task_timeout: Duration) -> Self {
        Self {
            codec,
            task_timeout,
        }
    }

    /// Name of the codec backend.
    pub fn codec_name(&self) -> &'static str {
        self.codec.name()
    }

    pub fn task_timeout(&self) -> Duration {
        self.task_timeout
    }

    /// Convert `task`, returning the JPEG path and the time it took.
    pub async fn run(&self, task: &ConversionTask) -> (Result<PathBuf, ConversionError>, Duration) {
        let codec = Arc::clone(&self.codec);
        let source = task.source_path().to_path_buf();
        let dest_dir = task.destination_dir().to_path_buf();
        let quality = task.quality();

        let started = Instant::now();
        let handle =
            tokio::task::spawn_blocking(move || codec.convert(&source, &dest_dir, quality));

        let result = match tokio::time::timeout(self.task_timeout, handle).await {
            Ok(Ok(Ok(output))) => Ok(output),
            Ok(Ok(Err(cause))) => Err(ConversionError::Failed {
                task: task.id(),
                cause,
            }),
            Ok(Err(join_error)) => Err(ConversionError::Fault {
                task: task.id(),
                message: panic_message(join_error),
            }),
            Err(_) => Err(ConversionError::TimedOut {
                task: task.id(),
                limit: self.task_timeout,
            }),
        };

        (result, started.elapsed())
    }
}

impl std::fmt::Debug for ConversionRunner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConversionRunner")
            .field("codec", &self.codec.name())
            .field("task_timeout", &self.task_timeout)
            .finish()
    }
}

fn panic_message(err: JoinError) -> String {
    if !err.is_panic() {
        return err.to_string();
    }

    let payload = err.into_panic();
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
