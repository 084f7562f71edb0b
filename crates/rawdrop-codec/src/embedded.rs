//! Pure Rust backend that re-encodes the camera's embedded JPEG preview.

use std::io::Cursor;
use std::path::{Path, PathBuf};

use image::codecs::jpeg::JpegDecoder;
use image::{DynamicImage, ImageDecoder, ImageFormat};

use crate::encode::write_jpeg;
use crate::tiff::{embedded_jpegs, scan_jpeg_markers};
use crate::{Error, RawCodec, Result};

/// Extracts the largest JPEG embedded in a RAW file.
///
/// Nikon writes a full-resolution preview into every NEF, so this produces a
/// camera-rendered JPEG without demosaicing the sensor data.
#[derive(Debug, Clone, Copy, Default)]
pub struct EmbeddedPreviewCodec;

impl EmbeddedPreviewCodec {
    pub fn new() -> Self {
        Self
    }
}

impl RawCodec for EmbeddedPreviewCodec {
    fn name(&self) -> &'static str {
        "embedded-preview"
    }

    fn convert(&self, source: &Path, dest_dir: &Path, quality: u8) -> Result<PathBuf> {
        if !source.exists() {
            return Err(Error::file_not_found(source));
        }

        let data = std::fs::read(source)?;
        let preview = largest_preview(&data).ok_or_else(|| Error::NoPreview {
            path: source.to_path_buf(),
        })?;

        #[cfg(feature = "tracing")]
        tracing::debug!(
            source = %source.display(),
            preview_bytes = preview.len(),
            "Decoding embedded preview"
        );

        let img: DynamicImage = image::load_from_memory_with_format(preview, ImageFormat::Jpeg)?;
        write_jpeg(&img, source, dest_dir, quality)
    }
}

/// Pick the embedded JPEG with the most pixels.
///
/// TIFF directory entries are preferred; a raw marker scan is the fallback for
/// files whose directories are damaged.
fn largest_preview(data: &[u8]) -> Option<&[u8]> {
    let mut candidates: Vec<&[u8]> = embedded_jpegs(data)
        .iter()
        .map(|jpeg| jpeg.bytes(data))
        .collect();

    if candidates.is_empty() {
        candidates = scan_jpeg_markers(data)
            .into_iter()
            .map(|start| &data[start..])
            .collect();
    }

    candidates
        .into_iter()
        .filter_map(|bytes| jpeg_pixels(bytes).map(|pixels| (pixels, bytes)))
        .max_by_key(|(pixels, _)| *pixels)
        .map(|(_, bytes)| bytes)
}

/// Pixel count from a JPEG header, without decoding the scan data.
fn jpeg_pixels(bytes: &[u8]) -> Option<u64> {
    let decoder = JpegDecoder::new(Cursor::new(bytes)).ok()?;
    let (w, h) = decoder.dimensions();
    Some(u64::from(w) * u64::from(h))
}
