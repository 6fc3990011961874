//! Progress reporting for long-running downloads.
//!
//! Workers report every finished task to the shared run state; this module
//! decides when a progress line is worth logging and formats it with a
//! percentage, throughput and remaining-time estimate.

use std::time::{Duration, Instant};

const DEFAULT_UPDATE_INTERVAL: Duration = Duration::from_secs(60);
const MIN_RUN_DURATION: Duration = Duration::from_secs(30);
const DEFAULT_PERCENTAGE_STEP: f64 = 10.0;

/// Progress tracking state for one run.
#[derive(Debug, Clone)]
pub struct ProgressState {
    /// Tasks finished in this process (any outcome).
    pub tasks_finished: u64,
    /// Tasks completed before this process started (resumed runs).
    pub carried_over: u64,
    /// Total tasks of the whole job.
    pub total_expected: u64,
    /// Timestamp when the run started.
    pub start_time: Instant,
    /// Last time progress was reported.
    pub last_update: Instant,
    /// Minimum interval between progress updates.
    pub update_interval: Duration,
    /// Current throughput (tasks per second).
    pub current_rate: f64,
    /// Last reported completion percentage (0-100).
    pub last_reported_percentage: f64,
    /// Minimum percentage delta required to emit a new update.
    pub min_percentage_step: f64,
}

impl ProgressState {
    /// Create a tracker for a job of `total_expected` tasks.
    pub fn new(total_expected: u64, carried_over: u64) -> Self {
        let now = Instant::now();
        let mut state = Self {
            tasks_finished: 0,
            carried_over,
            total_expected,
            start_time: now,
            last_update: now,
            update_interval: DEFAULT_UPDATE_INTERVAL,
            current_rate: 0.0,
            last_reported_percentage: 0.0,
            min_percentage_step: DEFAULT_PERCENTAGE_STEP,
        };
        state.last_reported_percentage = state.percentage();
        state
    }

    /// Override the reporting cadence.
    pub fn with_cadence(mut self, update_interval: Duration, min_percentage_step: f64) -> Self {
        self.update_interval = update_interval;
        self.min_percentage_step = min_percentage_step;
        self
    }

    /// Count finished tasks and refresh the rate.
    pub fn update(&mut self, finished: u64) {
        self.tasks_finished = self.tasks_finished.saturating_add(finished);
        let elapsed = self.start_time.elapsed().as_secs_f64();
        if elapsed > 0.0 {
            self.current_rate = self.tasks_finished as f64 / elapsed;
        }
    }

    /// Whether a progress line should be emitted based on time or percentage.
    pub fn should_emit_update(&self) -> bool {
        if self.tasks_finished == 0 {
            return false;
        }

        if self.percentage() - self.last_reported_percentage >= self.min_percentage_step {
            return true;
        }

        self.start_time.elapsed() >= MIN_RUN_DURATION
            && self.last_update.elapsed() >= self.update_interval
    }

    /// Call after emitting a progress line.
    pub fn mark_emitted(&mut self) {
        self.last_update = Instant::now();
        self.last_reported_percentage = self.percentage();
    }

    /// Job completion percentage (0-100), counting work from earlier runs.
    pub fn percentage(&self) -> f64 {
        if self.total_expected == 0 {
            return 100.0;
        }
        let done = self.carried_over.saturating_add(self.tasks_finished);
        (done as f64 * 100.0 / self.total_expected as f64).min(100.0)
    }

    /// Estimate remaining time from the current rate.
    pub fn estimate_remaining(&self) -> Option<Duration> {
        if self.current_rate <= 0.0 {
            return None;
        }
        let done = self.carried_over.saturating_add(self.tasks_finished);
        let remaining = self.total_expected.saturating_sub(done);
        if remaining == 0 {
            return None;
        }
        Some(Duration::from_secs_f64(remaining as f64 / self.current_rate))
    }

    /// Human-readable progress string for logging.
    pub fn format_progress(&self) -> String {
        let done = self.carried_over.saturating_add(self.tasks_finished);
        let mut parts = vec![format!(
            "[PROGRESS] {} of {} tasks - {:.2}% complete",
            done,
            self.total_expected,
            self.percentage()
        )];

        if self.current_rate > 0.0 {
            parts.push(format!("at {:.1} tasks/sec", self.current_rate));
        }

        if let Some(remaining) = self.estimate_remaining() {
            parts.push(format!("- ~{} remaining", format_duration(remaining)));
        }

        parts.join(" ")
    }
}

/// Short human duration ("42s", "7m", "1.5h")
pub fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs();
    if secs < 60 {
        format!("{secs}s")
    } else if secs < 3600 {
        format!("{}m", secs / 60)
    } else {
        format!("{:.1}h", secs as f64 / 3600.0)
    }
}
