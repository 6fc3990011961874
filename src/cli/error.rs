//! CLI error types and conversions

use crate::catalog::CatalogError;
use crate::downloader::{DownloadError, TaskError};
use crate::fetcher::FetcherError;
use crate::resume::ResumeError;

/// CLI errors
#[derive(Debug, thiserror::Error)]
pub enum CliError {
    /// Catalog could not be read
    #[error("catalog error: {0}")]
    CatalogError(#[from] CatalogError),

    /// Task generation failed
    #[error("task error: {0}")]
    TaskError(#[from] TaskError),

    /// Run failed
    #[error("download error: {0}")]
    DownloadError(#[from] DownloadError),

    /// Provider client could not be set up
    #[error("fetcher error: {0}")]
    FetcherError(#[from] FetcherError),

    /// State directory could not be read
    #[error("resume error: {0}")]
    ResumeError(#[from] ResumeError),

    /// Invalid argument
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Result could not be printed
    #[error("output error: {0}")]
    OutputError(String),
}
