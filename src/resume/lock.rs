//! Exclusive run lock on the state directory
//!
//! Implements advisory file locking using fd-lock. The guard returned by
//! [`RunLock::try_hold`] borrows the lock, so the lock is held exactly as long
//! as the guard is in scope.

use super::ResumeError;
use fd_lock::{RwLock, RwLockWriteGuard};
use std::fs::{File, OpenOptions};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Lock file name inside the state directory
pub const RUN_LOCK_FILE: &str = "run.lock";

/// Run lock wrapper
pub struct RunLock {
    lock: RwLock<File>,
    path: PathBuf,
}

impl std::fmt::Debug for RunLock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RunLock").field("path", &self.path).finish()
    }
}

impl RunLock {
    /// Open (creating if needed) `{state_dir}/run.lock`
    pub fn open(state_dir: &Path) -> Result<Self, ResumeError> {
        std::fs::create_dir_all(state_dir).map_err(|e| ResumeError::IoError(e.to_string()))?;

        let path = state_dir.join(RUN_LOCK_FILE);
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)
            .map_err(|e| ResumeError::LockError(format!("Failed to open lock file: {e}")))?;

        Ok(Self {
            lock: RwLock::new(file),
            path,
        })
    }

    /// Lock file path
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Try to take the exclusive lock without blocking
    ///
    /// Fails with [`ResumeError::Locked`] when another process holds it.
    pub fn try_hold(&mut self) -> Result<RwLockWriteGuard<'_, File>, ResumeError> {
        let dir_label = self
            .path
            .parent()
            .unwrap_or(&self.path)
            .display()
            .to_string();
        match self.lock.try_write() {
            Ok(guard) => {
                debug!(path = %dir_label, "Run lock acquired");
                Ok(guard)
            }
            Err(e) if e.kind() == ErrorKind::WouldBlock => Err(ResumeError::Locked(dir_label)),
            Err(e) => Err(ResumeError::LockError(format!("Failed to acquire lock: {e}"))),
        }
    }
}
