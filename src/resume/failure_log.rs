//! Durable log of abandoned tasks
//!
//! One task descriptor per line. Runs append to it; `retry-failed` reads it as
//! its task list and rewrites it with whatever is still failing.

use crate::downloader::task::FetchTask;
use crate::resume::checkpoint::{parse_tasks, render_tasks};
use crate::resume::store::{atomic_write, read_bounded};
use crate::resume::ResumeError;
use fd_lock::RwLock;
use std::collections::HashSet;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Failure log file name
pub const FAILURE_LOG_FILE: &str = "failed.jsonl";

/// Append-only list of abandoned tasks
#[derive(Debug, Clone)]
pub struct FailureLog {
    path: PathBuf,
}

impl FailureLog {
    /// Log at `{state_dir}/failed.jsonl`
    pub fn in_dir(state_dir: impl AsRef<Path>) -> Self {
        Self::new(state_dir.as_ref().join(FAILURE_LOG_FILE))
    }

    /// Log at an explicit path
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Log file path
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append `tasks`, one line each
    pub fn append(&self, tasks: &[FetchTask]) -> Result<(), ResumeError> {
        if tasks.is_empty() {
            return Ok(());
        }
        let body = render_tasks(tasks)?;
        self.ensure_parent()?;

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| ResumeError::IoError(format!("Failed to open failure log: {e}")))?;
        let mut lock = RwLock::new(file);
        let mut guard = lock
            .write()
            .map_err(|e| ResumeError::LockError(format!("Failed to lock failure log: {e}")))?;

        guard
            .write_all(body.as_bytes())
            .map_err(|e| ResumeError::IoError(format!("Failed to append to failure log: {e}")))?;
        guard
            .flush()
            .map_err(|e| ResumeError::IoError(format!("Failed to flush failure log: {e}")))?;

        info!(
            path = %self.path.display(),
            count = tasks.len(),
            "Recorded abandoned tasks in failure log"
        );
        Ok(())
    }

    /// All logged tasks in file order (empty when the log does not exist)
    pub fn read(&self) -> Result<Vec<FetchTask>, ResumeError> {
        let body = match read_bounded(&self.path) {
            Ok(body) => body,
            Err(ResumeError::IoError(_)) if !self.path.exists() => return Ok(Vec::new()),
            Err(e) => return Err(e),
        };
        parse_tasks(FAILURE_LOG_FILE, &body)
    }

    /// Logged tasks with repeats removed, first occurrence kept
    pub fn read_unique(&self) -> Result<Vec<FetchTask>, ResumeError> {
        let mut seen = HashSet::new();
        Ok(self
            .read()?
            .into_iter()
            .filter(|task| seen.insert(task.clone()))
            .collect())
    }

    /// Atomically replace the log with `tasks`
    pub fn replace(&self, tasks: &[FetchTask]) -> Result<(), ResumeError> {
        self.ensure_parent()?;
        atomic_write(&self.path, render_tasks(tasks)?.as_bytes())?;
        debug!(path = %self.path.display(), count = tasks.len(), "Failure log rewritten");
        Ok(())
    }

    /// Number of logged tasks
    pub fn len(&self) -> Result<usize, ResumeError> {
        Ok(self.read()?.len())
    }

    /// Whether the log has no entries
    pub fn is_empty(&self) -> Result<bool, ResumeError> {
        Ok(self.len()? == 0)
    }

    fn ensure_parent(&self) -> Result<(), ResumeError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| ResumeError::IoError(e.to_string()))?;
        }
        Ok(())
    }
}
