//! Asynchronous RAW conversion pipeline.
//!
//! Uploads hand [`ConversionTask`]s to a bounded [`TaskQueue`]; a fixed
//! [`WorkerPool`] drains it, running the codec through a [`ConversionRunner`]
//! fault boundary. [`ConversionService`] ties the pieces together.

mod error;
mod events;
mod pool;
mod queue;
mod runner;
mod service;
mod stats;
mod task;
mod worker;

use std::sync::Arc;

use anyhow::{Context, Result};
use rawdrop_codec::{DcrawCodec, EmbeddedPreviewCodec, RawCodec};

pub use error::{ConversionError, PoolError, RejectReason, SubmitError};
pub use events::ConversionEvent;
pub use pool::{StopReport, WorkerPool};
pub use queue::{BackpressurePolicy, TaskQueue};
pub use runner::ConversionRunner;
pub use service::{ConversionService, ServiceSettings};
pub use stats::PoolStats;
pub use task::{ConversionTask, DEFAULT_QUALITY};
pub use worker::{Worker, WorkerState};

use crate::config::{CodecKind, Config};

/// Build the codec backend selected in the configuration.
pub fn codec_from_config(config: &Config) -> Result<Arc<dyn RawCodec>> {
    Ok(match config.conversion.codec {
        CodecKind::Embedded => Arc::new(EmbeddedPreviewCodec::new()),
        CodecKind::Dcraw => Arc::new(
            DcrawCodec::locate(config.tools.dcraw_path.as_deref())
                .context("dcraw backend selected but dcraw is not available")?,
        ),
    })
}
