use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use rawdrop_common::paths::{numbered_file_name, sanitize_file_name, MAX_NAME_ATTEMPTS};
use rawdrop_common::{Error, Result};
use tokio::fs::{File, OpenOptions};
use tokio::io::AsyncWriteExt;

/// The media directory.
#[derive(Debug, Clone)]
pub struct MediaStore {
    root: PathBuf,
}

impl MediaStore {
    /// Open the media directory, creating it if needed.
    ///
    /// The root is canonicalized, so every stored path is absolute regardless
    /// of the process's working directory.
    ///
    /// # Errors
    ///
    /// Fails when the path cannot be created or is not a directory.
    pub async fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        tokio::fs::create_dir_all(&root).await?;
        let root = tokio::fs::canonicalize(&root).await?;

        let meta = tokio::fs::metadata(&root).await?;
        if !meta.is_dir() {
            return Err(Error::invalid_input(format!(
                "media path is not a directory: {}",
                root.display()
            )));
        }
        if meta.permissions().readonly() {
            return Err(Error::invalid_input(format!(
                "media directory is read-only: {}",
                root.display()
            )));
        }

        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Reserve a fresh file for a client-supplied name.
    ///
    /// The name is reduced to its final component. If it is taken, `name(1).ext`,
    /// `name(2).ext` and so on are tried; creation is exclusive so concurrent
    /// uploads of the same name never share a file.
    pub async fn create(&self, client_name: &str) -> Result<StoredFile> {
        let name = sanitize_file_name(client_name)?;

        for n in 0..MAX_NAME_ATTEMPTS {
            let candidate = self.root.join(numbered_file_name(&name, n));
            match OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&candidate)
                .await
            {
                Ok(file) => {
                    return Ok(StoredFile {
                        path: candidate,
                        file,
                        written: 0,
                    })
                }
                Err(e) if e.kind() == ErrorKind::AlreadyExists => continue,
                Err(e) => return Err(e.into()),
            }
        }

        Err(Error::NameExhausted {
            name,
            attempts: MAX_NAME_ATTEMPTS,
        })
    }
}

/// A file being written into the media directory.
#[derive(Debug)]
pub struct StoredFile {
    path: PathBuf,
    file: File,
    written: u64,
}

impl StoredFile {
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Bytes written so far.
    pub fn written(&self) -> u64 {
        self.written
    }

    pub async fn write_chunk(&mut self, chunk: &[u8]) -> Result<()> {
        self.file.write_all(chunk).await?;
        self.written += chunk.len() as u64;
        Ok(())
    }

    /// Flush and fsync, returning the final path.
    ///
    /// On failure the file is removed before the error is returned.
    pub async fn finish(mut self) -> Result<PathBuf> {
        match self.sync().await {
            Ok(()) => Ok(self.path),
            Err(e) => {
                self.discard().await;
                Err(e)
            }
        }
    }

    async fn sync(&mut self) -> Result<()> {
        self.file.flush().await?;
        self.file.sync_all().await?;
        Ok(())
    }

    /// Remove the partially written file.
    pub async fn discard(self) {
        let StoredFile { path, file, .. } = self;
        drop(file);
        if let Err(e) = tokio::fs::remove_file(&path).await {
            tracing::warn!(path = %path.display(), error = %e, "Failed to remove partial upload");
        }
    }
}
