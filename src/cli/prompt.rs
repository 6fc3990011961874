//! Terminal continue/stop prompt for interactive retry rounds

use crate::downloader::ConfirmPrompt;
use async_trait::async_trait;
use dialoguer::Confirm;
use tracing::warn;

/// Asks on the terminal whether to keep retrying.
///
/// A prompt that cannot be shown (no terminal, closed stdin) counts as "stop".
#[derive(Debug, Default, Clone, Copy)]
pub struct TerminalPrompt;

#[async_trait]
impl ConfirmPrompt for TerminalPrompt {
    async fn confirm(&self, rounds_completed: u32, pending: usize) -> bool {
        let question = format!(
            "{pending} task(s) still failing after {rounds_completed} retry round(s). Keep retrying?"
        );

        let answer = tokio::task::spawn_blocking(move || {
            Confirm::new().with_prompt(question).default(true).interact()
        })
        .await;

        match answer {
            Ok(Ok(keep_going)) => keep_going,
            Ok(Err(e)) => {
                warn!(error = %e, "Retry prompt unavailable, stopping retries");
                false
            }
            Err(e) => {
                warn!(error = %e, "Retry prompt task failed, stopping retries");
                false
            }
        }
    }
}
