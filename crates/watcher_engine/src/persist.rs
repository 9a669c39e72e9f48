use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;
use thiserror::Error;

use crate::filename::resolve_destination;

#[derive(Debug, Error)]
pub enum PersistError {
    #[error("output directory missing or not writable: {0}")]
    OutputDir(String),
    #[error("invalid destination: {0}")]
    Destination(String),
    #[error("io error: {0}")]
    Io(#[from] io::Error),
}

/// Ensure output directory exists; create if missing.
pub fn ensure_output_dir(dir: &Path) -> Result<(), PersistError> {
    if dir.exists() {
        let meta = fs::metadata(dir).map_err(|e| PersistError::OutputDir(e.to_string()))?;
        if !meta.is_dir() {
            return Err(PersistError::OutputDir(format!(
                "{} is not a directory",
                dir.display()
            )));
        }
    } else {
        fs::create_dir_all(dir).map_err(|e| PersistError::OutputDir(e.to_string()))?;
    }
    Ok(())
}

/// Writes files below `root` through a temp file and rename, so readers
/// never observe a partially written file.
#[derive(Debug, Clone)]
pub struct AtomicFileWriter {
    root: PathBuf,
}

impl AtomicFileWriter {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Writes `content` to the `/`-separated `destination` below the root,
    /// creating intermediate folders. Returns the final path.
    pub fn write(&self, destination: &str, content: &[u8]) -> Result<PathBuf, PersistError> {
        let target = resolve_destination(&self.root, destination)
            .map_err(|err| PersistError::Destination(err.message))?;
        let parent = target.parent().unwrap_or(&self.root);
        ensure_output_dir(parent)?;

        let mut tmp = NamedTempFile::new_in(parent)?;
        tmp.write_all(content)?;
        tmp.flush()?;
        tmp.as_file_mut().sync_all()?;
        tmp.persist(&target).map_err(|e| PersistError::Io(e.error))?;
        Ok(target)
    }
}
