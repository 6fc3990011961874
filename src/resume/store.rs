//! Checkpoint persistence with atomic writes and file locking

use crate::resume::checkpoint::Checkpoint;
use crate::resume::ResumeError;
use fd_lock::RwLock;
use std::fs::{File, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Progress file name (completed count, total count)
pub const PROGRESS_FILE: &str = "progress.txt";

/// Deferred task list file name
pub const DEFERRED_FILE: &str = "deferred.jsonl";

const CHECKPOINT_LOCK_FILE: &str = "checkpoint.lock";

/// Maximum allowed state file size (256 MB) to prevent memory exhaustion
pub const MAX_STATE_FILE_SIZE: u64 = 256 * 1024 * 1024;

/// Reads and writes the checkpoint inside a state directory
#[derive(Debug, Clone)]
pub struct CheckpointStore {
    dir: PathBuf,
}

impl CheckpointStore {
    /// Store rooted at `dir` (created on first save)
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// State directory
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of `progress.txt`
    pub fn progress_path(&self) -> PathBuf {
        self.dir.join(PROGRESS_FILE)
    }

    /// Path of `deferred.jsonl`
    pub fn deferred_path(&self) -> PathBuf {
        self.dir.join(DEFERRED_FILE)
    }

    /// Persist `checkpoint`, replacing any previous one
    ///
    /// The deferred list is replaced before the progress file, so a crash
    /// between the two leaves the new list with the old counts.
    pub fn save(&self, checkpoint: &Checkpoint) -> Result<(), ResumeError> {
        debug!(
            dir = %self.dir.display(),
            completed = checkpoint.completed,
            total = checkpoint.total,
            deferred = checkpoint.deferred.len(),
            "Saving checkpoint"
        );

        std::fs::create_dir_all(&self.dir).map_err(|e| ResumeError::IoError(e.to_string()))?;
        let deferred = checkpoint.render_deferred()?;

        let mut lock = RwLock::new(self.open_lock_file()?);
        let _guard = lock
            .write()
            .map_err(|e| ResumeError::LockError(format!("Failed to acquire write lock: {e}")))?;

        atomic_write(&self.deferred_path(), deferred.as_bytes())?;
        atomic_write(&self.progress_path(), checkpoint.render_progress().as_bytes())?;

        info!(
            completed = checkpoint.completed,
            total = checkpoint.total,
            deferred = checkpoint.deferred.len(),
            "Checkpoint saved"
        );
        Ok(())
    }

    /// Load the checkpoint, or `None` when no checkpoint exists
    pub fn load(&self) -> Result<Option<Checkpoint>, ResumeError> {
        let progress_path = self.progress_path();
        if !progress_path.exists() {
            debug!(dir = %self.dir.display(), "No checkpoint found");
            return Ok(None);
        }

        let lock = RwLock::new(self.open_lock_file()?);
        let _guard = lock
            .read()
            .map_err(|e| ResumeError::LockError(format!("Failed to acquire read lock: {e}")))?;

        let progress = read_bounded(&progress_path)?;
        let deferred = match read_bounded(&self.deferred_path()) {
            Ok(body) => body,
            Err(ResumeError::IoError(_)) if !self.deferred_path().exists() => String::new(),
            Err(e) => return Err(e),
        };

        let checkpoint = Checkpoint::parse(&progress, &deferred)?;
        info!(
            completed = checkpoint.completed,
            total = checkpoint.total,
            deferred = checkpoint.deferred.len(),
            "Checkpoint loaded"
        );
        Ok(Some(checkpoint))
    }

    /// Remove the checkpoint files
    pub fn clear(&self) -> Result<(), ResumeError> {
        if !self.dir.exists() {
            return Ok(());
        }

        let mut lock = RwLock::new(self.open_lock_file()?);
        let _guard = lock
            .write()
            .map_err(|e| ResumeError::LockError(format!("Failed to acquire write lock: {e}")))?;

        for path in [self.progress_path(), self.deferred_path()] {
            match std::fs::remove_file(&path) {
                Ok(()) => debug!(path = %path.display(), "Removed checkpoint file"),
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => return Err(ResumeError::IoError(e.to_string())),
            }
        }
        info!("Checkpoint cleared");
        Ok(())
    }

    fn open_lock_file(&self) -> Result<File, ResumeError> {
        std::fs::create_dir_all(&self.dir).map_err(|e| ResumeError::IoError(e.to_string()))?;
        OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(false)
            .open(self.dir.join(CHECKPOINT_LOCK_FILE))
            .map_err(|e| ResumeError::LockError(format!("Failed to create lock file: {e}")))
    }
}

/// Replace `path` with `contents` through a synced temp file in the same
/// directory
pub(crate) fn atomic_write(path: &Path, contents: &[u8]) -> Result<(), ResumeError> {
    let parent_dir = path.parent().unwrap_or_else(|| Path::new("."));
    let mut temp_file = tempfile::NamedTempFile::new_in(parent_dir)
        .map_err(|e| ResumeError::IoError(format!("Failed to create temp file: {e}")))?;

    temp_file
        .write_all(contents)
        .map_err(|e| ResumeError::IoError(format!("Failed to write to temp file: {e}")))?;
    temp_file
        .flush()
        .map_err(|e| ResumeError::IoError(format!("Failed to flush temp file: {e}")))?;
    temp_file
        .as_file()
        .sync_all()
        .map_err(|e| ResumeError::IoError(format!("Failed to sync temp file: {e}")))?;
    temp_file
        .persist(path)
        .map_err(|e| ResumeError::IoError(format!("Failed to persist temp file: {e}")))?;

    // Fsync parent directory so the rename is durable
    if let Ok(dir) = File::open(parent_dir) {
        let _ = dir.sync_all();
    }
    Ok(())
}

/// Read a state file, refusing anything over [`MAX_STATE_FILE_SIZE`]
pub(crate) fn read_bounded(path: &Path) -> Result<String, ResumeError> {
    let metadata = std::fs::metadata(path).map_err(|e| ResumeError::IoError(e.to_string()))?;
    if metadata.len() > MAX_STATE_FILE_SIZE {
        return Err(ResumeError::StateTooLarge {
            size: metadata.len(),
            max: MAX_STATE_FILE_SIZE,
        });
    }
    std::fs::read_to_string(path).map_err(|e| ResumeError::IoError(e.to_string()))
}
