//! Atomic payload writes
//!
//! Bodies are written to a temp file in the target directory and renamed into
//! place, so a payload on disk is always complete. Writing the same task twice
//! leaves one file with the last body.

use crate::downloader::task::FetchTask;
use crate::output::{OutputError, OutputLayout, OutputResult};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Writes fetched bodies under an [`OutputLayout`]
#[derive(Debug, Clone)]
pub struct PayloadWriter {
    layout: OutputLayout,
}

impl PayloadWriter {
    /// Writer for `layout`
    pub fn new(layout: OutputLayout) -> Self {
        Self { layout }
    }

    /// Layout in use
    pub fn layout(&self) -> &OutputLayout {
        &self.layout
    }

    /// Persist `body` as the payload of `task` and return its path
    pub fn write(&self, task: &FetchTask, body: &[u8]) -> OutputResult<PathBuf> {
        let path = self.layout.payload_path(task);
        let dir = self.layout.window_dir(task);
        ensure_dir(&dir)?;

        let mut temp_file = tempfile::NamedTempFile::new_in(&dir).map_err(|e| {
            OutputError::IoError(format!("Failed to create temp file in {}: {e}", dir.display()))
        })?;
        temp_file
            .write_all(body)
            .map_err(|e| OutputError::IoError(format!("Failed to write temp file: {e}")))?;
        temp_file
            .flush()
            .map_err(|e| OutputError::IoError(format!("Failed to flush temp file: {e}")))?;
        temp_file.persist(&path).map_err(|e| {
            OutputError::IoError(format!("Failed to persist {}: {e}", path.display()))
        })?;

        debug!(path = %path.display(), bytes = body.len(), "Payload written");
        Ok(path)
    }
}

/// Create `dir` and its parents. Another worker creating it first is fine.
fn ensure_dir(dir: &Path) -> OutputResult<()> {
    match std::fs::create_dir_all(dir) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::AlreadyExists && dir.is_dir() => Ok(()),
        Err(e) => Err(OutputError::InvalidPath {
            path: dir.display().to_string(),
            message: e.to_string(),
        }),
    }
}
