//! JPEG output shared by every backend.

use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use image::codecs::jpeg::JpegEncoder;
use image::{DynamicImage, ExtendedColorType};
use rawdrop_common::paths::create_exclusive;

use crate::{Error, Result};

/// Lowest accepted JPEG quality.
pub const MIN_QUALITY: u8 = 1;
/// Highest accepted JPEG quality.
pub const MAX_QUALITY: u8 = 100;

/// Name of the JPEG produced for `source` (`DSC_0042.NEF` -> `DSC_0042.jpg`).
pub fn output_file_name(source: &Path) -> String {
    let stem = source
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("converted");
    format!("{stem}.jpg")
}

/// Encode `img` as a JPEG at `quality` into a fresh file in `dest_dir`.
///
/// A partially written file is removed again when encoding fails.
pub fn write_jpeg(img: &DynamicImage, source: &Path, dest_dir: &Path, quality: u8) -> Result<PathBuf> {
    check_quality(quality)?;

    let rgb = img.to_rgb8();
    let (path, file) = create_exclusive(dest_dir, &output_file_name(source))?;

    let result = (|| -> Result<()> {
        let mut writer = BufWriter::new(file);
        JpegEncoder::new_with_quality(&mut writer, quality).encode(
            rgb.as_raw(),
            rgb.width(),
            rgb.height(),
            ExtendedColorType::Rgb8,
        )?;
        writer.flush()?;
        writer.get_ref().sync_all()?;
        Ok(())
    })();

    if let Err(e) = result {
        let _ = std::fs::remove_file(&path);
        return Err(e);
    }

    Ok(path)
}

fn check_quality(quality: u8) -> Result<()> {
    if !(MIN_QUALITY..=MAX_QUALITY).contains(&quality) {
        return Err(Error::InvalidInput(format!(
            "JPEG quality must be between {MIN_QUALITY} and {MAX_QUALITY}, got {quality}"
        )));
    }
    Ok(())
}
