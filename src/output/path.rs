//! Directory layout of downloaded payloads
//!
//! Payloads are grouped by report type, then by date window:
//!
//! ```text
//! data/
//!   hourly/
//!     2016-01-01_2016-01-31/
//!       725030-14732.json
//!       725033-94728.json
//!     2016-02-01_2016-03-01/
//!       ...
//!   daily/
//!     ...
//! ```
//!
//! The path is derived from the task fields, never parsed back from it.

use crate::downloader::task::FetchTask;
use std::path::{Path, PathBuf};

/// Maps tasks to payload paths under an output root
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputLayout {
    root_dir: PathBuf,
}

impl OutputLayout {
    /// Layout rooted at `root_dir`
    pub fn new(root_dir: impl Into<PathBuf>) -> Self {
        Self {
            root_dir: root_dir.into(),
        }
    }

    /// Output root
    pub fn root(&self) -> &Path {
        &self.root_dir
    }

    /// Full path of the task's payload:
    /// `{root}/{report_type}/{start}_{end}/{station_id}.json`
    pub fn payload_path(&self, task: &FetchTask) -> PathBuf {
        self.root_dir.join(task.relative_path())
    }

    /// Directory holding the task's payload
    pub fn window_dir(&self, task: &FetchTask) -> PathBuf {
        self.root_dir
            .join(task.report_type.as_str())
            .join(task.window_label())
    }
}

/// Make a station identifier safe to use as a file name
///
/// ASCII letters, digits, `-`, `_` and `.` are kept; every other byte is
/// percent-encoded, `%` included, so distinct identifiers never share a file.
/// The result never contains a path separator (`725030-14732` stays as is,
/// `a/b` becomes `a%2Fb`).
pub fn sanitize_station_id(station_id: &str) -> String {
    let mut out = String::with_capacity(station_id.len());
    for byte in station_id.bytes() {
        if byte.is_ascii_alphanumeric() || matches!(byte, b'-' | b'_' | b'.') {
            out.push(char::from(byte));
        } else {
            out.push_str(&format!("%{byte:02X}"));
        }
    }
    out
}
