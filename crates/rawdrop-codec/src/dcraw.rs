//! Backend that demosaics sensor data through the `dcraw` CLI.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Command;

use image::ImageFormat;

use crate::encode::write_jpeg;
use crate::tools::get_tool_path;
use crate::{Error, RawCodec, Result};

const TOOL: &str = "dcraw";

/// Runs `dcraw -c -w <file>` and encodes the PPM it writes to stdout.
#[derive(Debug, Clone)]
pub struct DcrawCodec {
    program: PathBuf,
}

impl DcrawCodec {
    /// Locate `dcraw`, preferring `configured` over a PATH lookup.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ToolNotFound`] when neither location has it.
    pub fn locate(configured: Option<&Path>) -> Result<Self> {
        Ok(Self {
            program: get_tool_path(TOOL, configured)?,
        })
    }

    /// Use a specific executable without checking that it exists.
    pub fn with_program(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    /// Arguments for one conversion. The path is passed through unchanged,
    /// so non-UTF-8 file names survive.
    fn args(source: &Path) -> Vec<OsString> {
        vec![
            // Write to stdout
            OsString::from("-c"),
            // Camera white balance
            OsString::from("-w"),
            source.as_os_str().to_owned(),
        ]
    }
}

impl RawCodec for DcrawCodec {
    fn name(&self) -> &'static str {
        TOOL
    }

    fn convert(&self, source: &Path, dest_dir: &Path, quality: u8) -> Result<PathBuf> {
        if !source.exists() {
            return Err(Error::file_not_found(source));
        }

        let args = Self::args(source);

        #[cfg(feature = "tracing")]
        tracing::debug!(program = %self.program.display(), ?args, "Running dcraw");

        let output = Command::new(&self.program)
            .args(&args)
            .output()
            .map_err(|e| Error::tool_failed(TOOL, e.to_string()))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(Error::tool_failed(
                TOOL,
                format!("exited with {}: {}", output.status, stderr.trim()),
            ));
        }

        let img = image::load_from_memory_with_format(&output.stdout, ImageFormat::Pnm)?;
        write_jpeg(&img, source, dest_dir, quality)
    }
}
