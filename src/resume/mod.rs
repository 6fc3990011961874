//! Durable run state
//!
//! Everything a later process needs to pick up where this one stopped lives in
//! the state directory:
//!
//! - `progress.txt` and `deferred.jsonl`: the [`Checkpoint`] written by
//!   [`CheckpointStore`]
//! - `failed.jsonl`: the [`FailureLog`] of abandoned tasks
//! - `run.lock`: the [`RunLock`] held for the duration of a run
//!
//! Whole-file rewrites are atomic (temp file + rename) and coordinated with
//! fd-lock advisory locks.

pub mod checkpoint;
pub mod failure_log;
pub mod lock;
pub mod store;

pub use checkpoint::Checkpoint;
pub use failure_log::FailureLog;
pub use lock::RunLock;
pub use store::CheckpointStore;

/// Resume state errors
#[derive(Debug, thiserror::Error)]
pub enum ResumeError {
    /// IO error
    #[error("IO error: {0}")]
    IoError(String),

    /// Lock error
    #[error("lock error: {0}")]
    LockError(String),

    /// Another run holds the state directory
    #[error("another run is using state directory {0}")]
    Locked(String),

    /// A state file could not be parsed
    #[error("corrupt state file {file} at line {line}: {message}")]
    Corrupt {
        /// File name
        file: String,
        /// 1-based line number
        line: usize,
        /// Parse error
        message: String,
    },

    /// Serialization error
    #[error("serialization error: {0}")]
    SerializationError(String),

    /// State file too large
    #[error("state file too large: {size} bytes (max: {max} bytes)")]
    StateTooLarge {
        /// Actual file size in bytes
        size: u64,
        /// Maximum allowed size in bytes
        max: u64,
    },
}

impl From<crate::downloader::task::TaskError> for ResumeError {
    fn from(err: crate::downloader::task::TaskError) -> Self {
        ResumeError::SerializationError(err.to_string())
    }
}
