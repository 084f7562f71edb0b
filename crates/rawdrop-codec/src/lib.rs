//! # rawdrop-codec
//!
//! RAW-to-JPEG conversion backends.
//!
//! Every backend implements [`RawCodec`], a synchronous and possibly slow
//! operation that reads one RAW file and writes one JPEG into a destination
//! directory:
//!
//! - [`EmbeddedPreviewCodec`] (feature `embedded`) pulls the full-size JPEG
//!   preview a camera stores inside every NEF and re-encodes it at the
//!   requested quality. Pure Rust, no external tools.
//! - [`DcrawCodec`] (feature `dcraw`) demosaics the sensor data through the
//!   `dcraw` CLI.
//!
//! ## Example
//!
//! ```no_run
//! use rawdrop_codec::{EmbeddedPreviewCodec, RawCodec};
//! use std::path::Path;
//!
//! let codec = EmbeddedPreviewCodec::new();
//! let jpeg = codec.convert(Path::new("/photos/DSC_0042.NEF"), Path::new("/photos"), 100)?;
//! println!("wrote {}", jpeg.display());
//! # Ok::<(), rawdrop_codec::Error>(())
//! ```

mod encode;
mod error;
pub mod tools;

#[cfg(feature = "embedded")]
mod embedded;
#[cfg(feature = "embedded")]
pub mod tiff;

#[cfg(feature = "dcraw")]
mod dcraw;

use std::path::{Path, PathBuf};

pub use encode::{output_file_name, write_jpeg, MAX_QUALITY, MIN_QUALITY};
pub use error::{Error, Result};
pub use tools::{check_tool, check_tools, get_tool_path, require_tool, ToolInfo};

#[cfg(feature = "embedded")]
pub use embedded::EmbeddedPreviewCodec;

#[cfg(feature = "dcraw")]
pub use dcraw::DcrawCodec;

/// A RAW-to-JPEG conversion capability.
///
/// Implementations are called from a blocking thread and may take seconds per
/// file. They must not panic on malformed input, but callers still treat a
/// panic as a contained failure.
pub trait RawCodec: Send + Sync {
    /// Short backend name used in logs.
    fn name(&self) -> &'static str;

    /// Convert `source` into a JPEG written inside `dest_dir`.
    ///
    /// Returns the path of the JPEG that was created. Existing files are never
    /// overwritten; a numbered suffix is chosen instead.
    fn convert(&self, source: &Path, dest_dir: &Path, quality: u8) -> Result<PathBuf>;
}
