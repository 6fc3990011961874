//! Continue/stop decisions between retry rounds
//!
//! The executor runs failed tasks again in rounds. Before each round it asks a
//! [`RetryPolicy`] whether to go on. Policies never touch the terminal; the
//! interactive variant delegates to a [`ConfirmPrompt`] supplied by the caller.

use async_trait::async_trait;
use std::sync::Arc;
use tracing::info;

/// Outcome of a policy check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Run another round
    Continue,
    /// Abandon everything still pending
    Stop,
}

/// Decides whether another retry round runs
#[async_trait]
pub trait RetryPolicy: Send + Sync {
    /// Called before round `rounds_completed + 1` with `pending` tasks waiting
    async fn decide(&self, rounds_completed: u32, pending: usize) -> RetryDecision;
}

/// Asks the operator whether to keep retrying
#[async_trait]
pub trait ConfirmPrompt: Send + Sync {
    /// Return `true` to keep retrying
    async fn confirm(&self, rounds_completed: u32, pending: usize) -> bool;
}

/// Unattended policy: at most `max_rounds` rounds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoundBudget {
    /// Rounds allowed
    pub max_rounds: u32,
}

impl RoundBudget {
    /// Policy allowing `max_rounds` rounds
    pub fn new(max_rounds: u32) -> Self {
        Self { max_rounds }
    }
}

#[async_trait]
impl RetryPolicy for RoundBudget {
    async fn decide(&self, rounds_completed: u32, _pending: usize) -> RetryDecision {
        if rounds_completed < self.max_rounds {
            RetryDecision::Continue
        } else {
            info!(max_rounds = self.max_rounds, "Retry round budget spent");
            RetryDecision::Stop
        }
    }
}

/// Interactive policy: ask after every `round_size` rounds
pub struct ConfirmEvery {
    round_size: u32,
    prompt: Arc<dyn ConfirmPrompt>,
}

impl ConfirmEvery {
    /// Ask `prompt` after every `round_size` rounds (at least 1)
    pub fn new(round_size: u32, prompt: Arc<dyn ConfirmPrompt>) -> Self {
        Self {
            round_size: round_size.max(1),
            prompt,
        }
    }

    /// Rounds between questions
    pub fn round_size(&self) -> u32 {
        self.round_size
    }
}

impl std::fmt::Debug for ConfirmEvery {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConfirmEvery")
            .field("round_size", &self.round_size)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl RetryPolicy for ConfirmEvery {
    async fn decide(&self, rounds_completed: u32, pending: usize) -> RetryDecision {
        if rounds_completed == 0 || rounds_completed % self.round_size != 0 {
            return RetryDecision::Continue;
        }

        if self.prompt.confirm(rounds_completed, pending).await {
            info!(rounds_completed, pending, "Operator chose to keep retrying");
            RetryDecision::Continue
        } else {
            info!(rounds_completed, pending, "Operator stopped retries");
            RetryDecision::Stop
        }
    }
}
