//! Payload persistence

pub mod path;
pub mod writer;

pub use path::{sanitize_station_id, OutputLayout};
pub use writer::PayloadWriter;

/// Output writer errors
#[derive(Debug, thiserror::Error)]
pub enum OutputError {
    /// IO error
    #[error("IO error: {0}")]
    IoError(String),

    /// Path could not be created or is unusable
    #[error("invalid output path {path}: {message}")]
    InvalidPath {
        /// Offending path
        path: String,
        /// Reason
        message: String,
    },
}

/// Result type for output operations
pub type OutputResult<T> = Result<T, OutputError>;
