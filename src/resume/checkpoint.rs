//! Checkpoint contents and their on-disk text formats

use crate::downloader::task::FetchTask;
use crate::resume::ResumeError;
use serde::Serialize;

/// Progress of a job across runs
///
/// `completed` counts tasks that earlier runs admitted, `total` is the size
/// of the whole job, and `deferred` holds the tasks still to run, in the order
/// the quota split produced them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Checkpoint {
    /// Tasks already handled
    pub completed: u64,
    /// Tasks in the whole job
    pub total: u64,
    /// Tasks left for a later run
    pub deferred: Vec<FetchTask>,
}

impl Checkpoint {
    /// Create a checkpoint
    pub fn new(completed: u64, total: u64, deferred: Vec<FetchTask>) -> Self {
        Self {
            completed,
            total,
            deferred,
        }
    }

    /// Whether nothing is left to resume
    pub fn is_finished(&self) -> bool {
        self.deferred.is_empty()
    }

    /// Completion percentage (0-100)
    pub fn percentage(&self) -> f64 {
        if self.total == 0 {
            return 100.0;
        }
        (self.completed as f64 * 100.0 / self.total as f64).min(100.0)
    }

    /// `progress.txt` contents: completed count, then total count
    pub fn render_progress(&self) -> String {
        format!("{}\n{}\n", self.completed, self.total)
    }

    /// `deferred.jsonl` contents: one task descriptor per line
    pub fn render_deferred(&self) -> Result<String, ResumeError> {
        render_tasks(&self.deferred)
    }

    /// Rebuild a checkpoint from the two file bodies
    pub fn parse(progress: &str, deferred: &str) -> Result<Self, ResumeError> {
        let (completed, total) = parse_progress(progress)?;
        let deferred = parse_tasks("deferred.jsonl", deferred)?;
        Ok(Self {
            completed,
            total,
            deferred,
        })
    }
}

fn parse_progress(body: &str) -> Result<(u64, u64), ResumeError> {
    let mut lines = body.lines().map(str::trim).filter(|l| !l.is_empty());
    let mut next_count = |line: usize, name: &str| -> Result<u64, ResumeError> {
        let raw = lines.next().ok_or_else(|| ResumeError::Corrupt {
            file: "progress.txt".to_string(),
            line,
            message: format!("missing {name} count"),
        })?;
        raw.parse().map_err(|e| ResumeError::Corrupt {
            file: "progress.txt".to_string(),
            line,
            message: format!("invalid {name} count '{raw}': {e}"),
        })
    };

    let completed = next_count(1, "completed")?;
    let total = next_count(2, "total")?;
    Ok((completed, total))
}

/// Serialize tasks as JSON lines
pub(crate) fn render_tasks(tasks: &[FetchTask]) -> Result<String, ResumeError> {
    let mut out = String::with_capacity(tasks.len() * 96);
    for task in tasks {
        out.push_str(&task.to_descriptor()?);
        out.push('\n');
    }
    Ok(out)
}

/// Parse JSON lines written by [`render_tasks`], skipping blank lines
pub(crate) fn parse_tasks(file: &str, body: &str) -> Result<Vec<FetchTask>, ResumeError> {
    body.lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(idx, line)| {
            FetchTask::from_descriptor(line).map_err(|e| ResumeError::Corrupt {
                file: file.to_string(),
                line: idx + 1,
                message: e.to_string(),
            })
        })
        .collect()
}
