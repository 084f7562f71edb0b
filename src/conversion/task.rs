//! The unit of work handed from the upload path to the workers.

use std::path::{Path, PathBuf};

use rawdrop_codec::{MAX_QUALITY, MIN_QUALITY};
use rawdrop_common::{Error, Result, TaskId};
use serde::Serialize;

/// Default JPEG quality.
pub const DEFAULT_QUALITY: u8 = MAX_QUALITY;

/// One RAW file waiting to be converted.
///
/// Built once the upload is fully written and synced, consumed by exactly one
/// worker, then dropped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConversionTask {
    id: TaskId,
    source_path: PathBuf,
    destination_dir: PathBuf,
    quality: u8,
}

impl ConversionTask {
    /// Create a task.
    ///
    /// The source must be an absolute path so the conversion does not depend
    /// on the worker's current directory. Qualities outside `1..=100` are
    /// rejected.
    pub fn new(
        source_path: impl Into<PathBuf>,
        destination_dir: impl Into<PathBuf>,
        quality: u8,
    ) -> Result<Self> {
        let source_path = source_path.into();
        if !source_path.is_absolute() {
            return Err(Error::invalid_input(format!(
                "conversion source must be an absolute path, got {}",
                source_path.display()
            )));
        }
        if !(MIN_QUALITY..=MAX_QUALITY).contains(&quality) {
            return Err(Error::invalid_input(format!(
                "JPEG quality must be between {MIN_QUALITY} and {MAX_QUALITY}, got {quality}"
            )));
        }

        Ok(Self {
            id: TaskId::new(),
            source_path,
            destination_dir: destination_dir.into(),
            quality,
        })
    }

    pub fn id(&self) -> TaskId {
        self.id
    }

    pub fn source_path(&self) -> &Path {
        &self.source_path
    }

    pub fn destination_dir(&self) -> &Path {
        &self.destination_dir
    }

    pub fn quality(&self) -> u8 {
        self.quality
    }
}
