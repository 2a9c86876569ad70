//! Sweep progress tracking and summary reporting

use crate::ProviderKind;
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Counters for one provider's sweep
#[derive(Debug, Clone, Serialize)]
pub struct SweepProgress {
    /// Provider the sweep ran against
    pub provider: ProviderKind,
    /// When the sweep started
    pub started_at: DateTime<Utc>,
    /// Tasks that reached a terminal outcome this run
    pub attempted: u64,
    /// Tasks committed with a successful answer
    pub succeeded: u64,
    /// Tasks committed as failed-terminal
    pub failed: u64,
    /// Tasks skipped this run (request build failure); retried next run
    pub skipped: u64,
    /// Throttle signals absorbed across all tasks
    pub throttle_retries: u64,
    /// Tasks still outstanding when the sweep ended
    pub outstanding: u64,
}

impl SweepProgress {
    /// Fresh counters for a provider sweep starting now.
    pub fn start(provider: ProviderKind) -> Self {
        Self {
            provider,
            started_at: Utc::now(),
            attempted: 0,
            succeeded: 0,
            failed: 0,
            skipped: 0,
            throttle_retries: 0,
            outstanding: 0,
        }
    }

    /// Record a committed outcome.
    pub fn record_outcome(&mut self, success: bool) {
        self.attempted += 1;
        if success {
            self.succeeded += 1;
        } else {
            self.failed += 1;
        }
    }

    /// Record a skip (task not committed, retried next run).
    pub fn record_skip(&mut self) {
        self.skipped += 1;
    }

    /// Record one absorbed throttle signal.
    pub fn record_throttle(&mut self) {
        self.throttle_retries += 1;
    }

    /// Human-readable one-line summary for the end of a sweep.
    pub fn format_summary(&self) -> String {
        format!(
            "[{}] attempted {} ({} succeeded, {} failed), skipped {}, \
             absorbed {} throttles, {} still outstanding",
            self.provider,
            self.attempted,
            self.succeeded,
            self.failed,
            self.skipped,
            self.throttle_retries,
            self.outstanding
        )
    }
}
