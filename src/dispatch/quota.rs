//! Per-provider quota governance
//!
//! Tracks recent usage in a trailing window and blocks admission until a
//! request fits under the provider's limit. Enforcement is by blocking, not
//! by dropping or reordering: for any trailing window, the sum of recorded
//! costs after admission never exceeds the configured limit.

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::{sleep_until, Instant};
use tracing::{debug, warn};

/// Length of the trailing quota window.
/// Provider rate limits are universally expressed per minute.
pub const QUOTA_WINDOW: Duration = Duration::from_secs(60);

/// Safety cushion added when sleeping until the oldest entry ages out.
/// 200ms absorbs clock skew between our window and the provider's.
pub const ADMIT_CUSHION: Duration = Duration::from_millis(200);

/// Which resource a provider's quota counts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuotaDimension {
    /// Limit on total tokens consumed per window
    TokensPerMinute,
    /// Limit on request count per window
    RequestsPerMinute,
}

impl std::fmt::Display for QuotaDimension {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            QuotaDimension::TokensPerMinute => "tokens/min",
            QuotaDimension::RequestsPerMinute => "requests/min",
        };
        write!(f, "{s}")
    }
}

/// One provider's quota rule
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct QuotaSpec {
    /// Counted resource
    pub dimension: QuotaDimension,
    /// Maximum cost per trailing window
    pub limit: u64,
}

/// Blocks admission until a request's cost fits under the quota window.
///
/// One instance per provider; instances share no state, so independent
/// providers can run concurrently without coordination.
#[derive(Debug)]
pub struct QuotaGovernor {
    spec: QuotaSpec,
    window: Duration,
    cushion: Duration,
    entries: Mutex<VecDeque<(Instant, u64)>>,
}

impl QuotaGovernor {
    /// Create a governor for a quota rule with the standard 60s window.
    pub fn new(spec: QuotaSpec) -> Self {
        Self {
            spec,
            window: QUOTA_WINDOW,
            cushion: ADMIT_CUSHION,
            entries: Mutex::new(VecDeque::new()),
        }
    }

    /// Override the window length (tests only need shorter windows).
    pub fn with_window(mut self, window: Duration) -> Self {
        self.window = window;
        self
    }

    /// The quota rule this governor enforces
    pub fn spec(&self) -> QuotaSpec {
        self.spec
    }

    /// Suspend until `cost` fits under the limit, given committed usage.
    ///
    /// Wakes when the oldest window entry would have aged out (plus the
    /// cushion), then re-checks: another admission may have landed while we
    /// slept, so a single blind sleep-and-proceed is not sound.
    pub async fn admit(&self, cost: u64) {
        loop {
            let wake_at = {
                let mut entries = self.entries.lock().await;
                Self::evict(&mut entries, self.window);

                let used: u64 = entries.iter().map(|(_, c)| c).sum();
                if used.saturating_add(cost) <= self.spec.limit {
                    return;
                }

                match entries.front() {
                    Some((oldest, _)) => {
                        debug!(
                            used,
                            cost,
                            limit = self.spec.limit,
                            "Quota window full; waiting for headroom"
                        );
                        *oldest + self.window + self.cushion
                    }
                    None => {
                        // A single request larger than the whole limit can
                        // never fit; blocking forever would livelock, so it
                        // is admitted alone into an empty window.
                        warn!(
                            cost,
                            limit = self.spec.limit,
                            "Request cost exceeds the full quota limit; admitting into an empty window"
                        );
                        return;
                    }
                }
            };

            sleep_until(wake_at).await;
        }
    }

    /// Record the actual measured cost of an executed request.
    ///
    /// Admission estimates are never recorded; the measured cost corrects
    /// for estimation error going forward.
    pub async fn record(&self, actual_cost: u64) {
        let mut entries = self.entries.lock().await;
        Self::evict(&mut entries, self.window);
        entries.push_back((Instant::now(), actual_cost));
    }

    /// Committed usage within the current trailing window.
    pub async fn used(&self) -> u64 {
        let mut entries = self.entries.lock().await;
        Self::evict(&mut entries, self.window);
        entries.iter().map(|(_, c)| c).sum()
    }

    /// Drop entries older than the trailing window.
    fn evict(entries: &mut VecDeque<(Instant, u64)>, window: Duration) {
        let now = Instant::now();
        while let Some((stamp, _)) = entries.front() {
            if now.duration_since(*stamp) > window {
                entries.pop_front();
            } else {
                break;
            }
        }
    }
}
