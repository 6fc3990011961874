//! Human and JSON rendering of run results

use super::{CliError, OutputFormat};
use crate::downloader::{RunMode, RunSummary};
use crate::resume::Checkpoint;
use serde::Serialize;
use std::path::Path;

/// State directory overview printed by `status`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatusReport {
    /// State directory
    pub state_dir: String,
    /// Tasks completed in the checkpointed job
    pub completed: Option<u64>,
    /// Tasks in the checkpointed job
    pub total: Option<u64>,
    /// Completion percentage of the checkpointed job
    pub percentage: Option<f64>,
    /// Tasks waiting for `resume`
    pub deferred: usize,
    /// Entries in the failure log
    pub failed: usize,
}

impl StatusReport {
    /// Build a report from what the state directory holds
    pub fn new(state_dir: &Path, checkpoint: Option<&Checkpoint>, failed: usize) -> Self {
        Self {
            state_dir: state_dir.display().to_string(),
            completed: checkpoint.map(|c| c.completed),
            total: checkpoint.map(|c| c.total),
            percentage: checkpoint.map(Checkpoint::percentage),
            deferred: checkpoint.map_or(0, |c| c.deferred.len()),
            failed,
        }
    }
}

fn to_json<T: Serialize>(value: &T) -> Result<String, CliError> {
    serde_json::to_string(value).map_err(|e| CliError::OutputError(e.to_string()))
}

/// Print the end-of-run summary
pub fn print_run_summary(
    summary: &RunSummary,
    format: OutputFormat,
    failure_log: &Path,
) -> Result<(), CliError> {
    match format {
        OutputFormat::Json => {
            let output = serde_json::json!({
                "success": true,
                "summary": summary,
                "percentage": summary.percentage(),
                "needs_resume": summary.needs_resume(),
                "failure_log": failure_log.display().to_string(),
            });
            println!("{}", to_json(&output)?);
        }
        OutputFormat::Human => {
            println!("\n{} finished", capitalize(summary.mode.as_str()));
            println!(
                "Progress: {}/{} tasks ({:.1}%)",
                summary.carried_over + summary.downloaded + summary.empty,
                summary.total,
                summary.percentage()
            );
            println!("Downloaded: {}", summary.downloaded);
            println!("Empty: {}", summary.empty);
            if summary.resolved > 0 {
                println!(
                    "Recovered after retry: {} ({} round(s))",
                    summary.resolved, summary.retry_rounds
                );
            }
            if summary.abandoned > 0 {
                println!(
                    "Failed and abandoned: {} (recorded in {})",
                    summary.abandoned,
                    failure_log.display()
                );
            }
            println!("Elapsed: {:.1}s", summary.elapsed_secs);

            if summary.interrupted > 0 {
                println!("Interrupted: {} task(s) never started", summary.interrupted);
            }
            if summary.needs_resume() {
                match summary.quota_reset_at {
                    Some(reset) => println!(
                        "{} task(s) deferred. Run `weather-archive-downloader resume` after the quota resets at {}.",
                        summary.deferred,
                        reset.format("%Y-%m-%d %H:%M:%S UTC")
                    ),
                    None => println!(
                        "{} task(s) deferred. Run `weather-archive-downloader resume` to continue.",
                        summary.deferred
                    ),
                }
            } else if summary.mode == RunMode::RetryFailed && summary.deferred > 0 {
                println!(
                    "{} task(s) left in the failure log for another `retry-failed`.",
                    summary.deferred
                );
            }
            if summary.abandoned > 0 {
                println!("Run `weather-archive-downloader retry-failed` to try the failed tasks again.");
            }
        }
    }
    Ok(())
}

/// Print why there was nothing to run
pub fn print_nothing_to_do(reason: &str, format: OutputFormat) -> Result<(), CliError> {
    match format {
        OutputFormat::Json => {
            let output = serde_json::json!({
                "success": true,
                "nothing_to_do": reason,
            });
            println!("{}", to_json(&output)?);
        }
        OutputFormat::Human => println!("Nothing to do: {reason}"),
    }
    Ok(())
}

/// Print a failed run
pub fn print_failure(error: &CliError, format: OutputFormat) -> Result<(), CliError> {
    match format {
        OutputFormat::Json => {
            let output = serde_json::json!({
                "success": false,
                "error": error.to_string(),
            });
            println!("{}", to_json(&output)?);
        }
        OutputFormat::Human => {
            eprintln!("\nRun failed!");
            eprintln!("Error: {error}");
        }
    }
    Ok(())
}

/// Print the `status` report
pub fn print_status(report: &StatusReport, format: OutputFormat) -> Result<(), CliError> {
    match format {
        OutputFormat::Json => println!("{}", to_json(report)?),
        OutputFormat::Human => {
            println!("State directory: {}", report.state_dir);
            match (report.completed, report.total, report.percentage) {
                (Some(completed), Some(total), Some(percentage)) => {
                    println!("Checkpoint: {completed}/{total} tasks ({percentage:.1}%)");
                    println!("Deferred: {}", report.deferred);
                }
                _ => println!("Checkpoint: none"),
            }
            println!("Failure log: {} task(s)", report.failed);
        }
    }
    Ok(())
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
