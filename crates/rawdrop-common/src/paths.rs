//! Path utilities for RAW detection and collision-safe file naming.
//!
//! Uploaded files keep their client-supplied name. When that name is already
//! taken in the media directory a numbered suffix is inserted before the
//! extension (`photo.NEF`, `photo(1).NEF`, `photo(2).NEF`, ...). Creation goes
//! through `create_new`, so two concurrent writers can never end up sharing a
//! path: the loser of the race simply moves on to the next suffix.

use std::fs::{File, OpenOptions};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use crate::{Error, Result};

/// Camera RAW extensions that are queued for JPEG conversion.
const RAW_EXTENSIONS: &[&str] = &["nef", "nrw"];

/// List of browser-viewable image extensions.
const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif", "webp", "bmp"];

/// Upper bound on numbered suffixes tried before giving up.
pub const MAX_NAME_ATTEMPTS: u32 = 10_000;

/// Check if a path has a camera RAW extension (case-insensitive).
///
/// # Examples
///
/// ```
/// use std::path::Path;
/// use rawdrop_common::paths::is_raw_file;
///
/// assert!(is_raw_file(Path::new("DSC_0042.NEF")));
/// assert!(is_raw_file(Path::new("/media/dsc_0042.nef")));
/// assert!(!is_raw_file(Path::new("DSC_0042.JPG")));
/// ```
pub fn is_raw_file(path: &Path) -> bool {
    has_extension(path, RAW_EXTENSIONS)
}

/// Check if a path has a browser-viewable image extension.
pub fn is_image_file(path: &Path) -> bool {
    has_extension(path, IMAGE_EXTENSIONS)
}

fn has_extension(path: &Path, extensions: &[&str]) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| extensions.contains(&ext.to_lowercase().as_str()))
        .unwrap_or(false)
}

/// Reduce a client-supplied file name to a bare file name.
///
/// Any directory components (either separator style) are discarded so an
/// upload can never escape the media directory.
///
/// # Errors
///
/// Returns [`Error::InvalidInput`] when nothing usable remains.
pub fn sanitize_file_name(raw: &str) -> Result<String> {
    let name = raw
        .rsplit(|c: char| c == '/' || c == '\\')
        .next()
        .unwrap_or_default()
        .trim();

    if name.is_empty() || name == "." || name == ".." {
        return Err(Error::invalid_input(format!("unusable file name: {raw:?}")));
    }

    Ok(name.to_string())
}

/// Build the `n`th candidate name for `name`.
///
/// Candidate `0` is the name itself; later candidates insert `(n)` before the
/// extension.
///
/// ```
/// use rawdrop_common::paths::numbered_file_name;
///
/// assert_eq!(numbered_file_name("photo.NEF", 0), "photo.NEF");
/// assert_eq!(numbered_file_name("photo.NEF", 2), "photo(2).NEF");
/// assert_eq!(numbered_file_name("README", 1), "README(1)");
/// ```
pub fn numbered_file_name(name: &str, n: u32) -> String {
    if n == 0 {
        return name.to_string();
    }

    let path = Path::new(name);
    let stem = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or(name);

    match path.extension().and_then(|e| e.to_str()) {
        Some(ext) => format!("{stem}({n}).{ext}"),
        None => format!("{stem}({n})"),
    }
}

/// Create a new file named after `name` inside `dir` without overwriting
/// anything.
///
/// Returns the path that was actually created together with the open handle.
pub fn create_exclusive(dir: &Path, name: &str) -> Result<(PathBuf, File)> {
    for n in 0..MAX_NAME_ATTEMPTS {
        let candidate = dir.join(numbered_file_name(name, n));
        match OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&candidate)
        {
            Ok(file) => return Ok((candidate, file)),
            Err(e) if e.kind() == ErrorKind::AlreadyExists => continue,
            Err(e) => return Err(e.into()),
        }
    }

    Err(Error::NameExhausted {
        name: name.to_string(),
        attempts: MAX_NAME_ATTEMPTS,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_raw_file() {
        assert!(is_raw_file(Path::new("a.nef")));
        assert!(is_raw_file(Path::new("a.NEF")));
        assert!(is_raw_file(Path::new("a.Nrw")));
        assert!(!is_raw_file(Path::new("a.jpg")));
        assert!(!is_raw_file(Path::new("nef")));
        assert!(!is_raw_file(Path::new("")));
    }

    #[test]
    fn test_is_image_file() {
        assert!(is_image_file(Path::new("a.JPG")));
        assert!(is_image_file(Path::new("a.webp")));
        assert!(!is_image_file(Path::new("a.nef")));
    }

    #[test]
    fn test_sanitize_strips_directories() {
        assert_eq!(sanitize_file_name("photo.NEF").unwrap(), "photo.NEF");
        assert_eq!(sanitize_file_name("../../etc/passwd").unwrap(), "passwd");
        assert_eq!(
            sanitize_file_name("C:\\Users\\me\\DSC_1.NEF").unwrap(),
            "DSC_1.NEF"
        );
        assert_eq!(sanitize_file_name("  spaced.nef ").unwrap(), "spaced.nef");
    }

    #[test]
    fn test_sanitize_rejects_empty() {
        assert!(sanitize_file_name("").is_err());
        assert!(sanitize_file_name("dir/").is_err());
        assert!(sanitize_file_name("..").is_err());
        assert!(sanitize_file_name(".").is_err());
    }

    #[test]
    fn test_numbered_file_name() {
        assert_eq!(numbered_file_name("a.nef", 0), "a.nef");
        assert_eq!(numbered_file_name("a.nef", 1), "a(1).nef");
        assert_eq!(numbered_file_name("a.tar.gz", 3), "a.tar(3).gz");
        assert_eq!(numbered_file_name(".hidden", 1), ".hidden(1)");
    }

    #[test]
    fn test_create_exclusive_numbers_collisions() {
        let dir = tempfile::tempdir().unwrap();

        let (first, _) = create_exclusive(dir.path(), "photo.NEF").unwrap();
        let (second, _) = create_exclusive(dir.path(), "photo.NEF").unwrap();
        let (third, _) = create_exclusive(dir.path(), "photo.NEF").unwrap();

        assert_eq!(first, dir.path().join("photo.NEF"));
        assert_eq!(second, dir.path().join("photo(1).NEF"));
        assert_eq!(third, dir.path().join("photo(2).NEF"));
    }

    #[test]
    fn test_create_exclusive_fills_gaps() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.nef"), b"x").unwrap();
        std::fs::write(dir.path().join("a(2).nef"), b"x").unwrap();

        let (path, _) = create_exclusive(dir.path(), "a.nef").unwrap();
        assert_eq!(path, dir.path().join("a(1).nef"));
    }

    #[test]
    fn test_create_exclusive_missing_dir() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope");
        let err = create_exclusive(&missing, "a.nef").unwrap_err();
        assert!(matches!(err, Error::Io(_)));
    }

    #[test]
    fn test_create_exclusive_concurrent_writers_get_distinct_paths() {
        let dir = tempfile::tempdir().unwrap();
        let base = dir.path().to_path_buf();

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let base = base.clone();
                std::thread::spawn(move || create_exclusive(&base, "same.nef").unwrap().0)
            })
            .collect();

        let mut paths: Vec<PathBuf> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        paths.sort();
        paths.dedup();
        assert_eq!(paths.len(), 8);
    }
}
