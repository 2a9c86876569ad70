//! Throttle retry policy
//!
//! Throttling is backpressure, not failure: the policy waits out the
//! provider's hint plus a cushion and re-admits the same task. By default
//! there is no retry cap - quota windows always clear eventually - but a
//! configurable maximum is available for callers worried about a provider
//! that throttles persistently for non-quota reasons.

use crate::provider::ThrottleSignal;
use std::time::Duration;

/// Cushion added on top of a provider's retry hint.
/// 300ms keeps us clear of the window edge the hint points at.
pub const RETRY_CUSHION: Duration = Duration::from_millis(300);

/// Decides how long to wait after a throttle signal, and whether to keep
/// retrying at all.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    cushion: Duration,
    max_throttle_retries: Option<u32>,
}

impl RetryPolicy {
    /// Create the default policy: standard cushion, unbounded retries.
    pub fn new() -> Self {
        Self {
            cushion: RETRY_CUSHION,
            max_throttle_retries: None,
        }
    }

    /// Cap the number of throttle retries per task.
    ///
    /// When the cap is exceeded the task becomes failed-terminal instead of
    /// waiting again.
    pub fn with_max_throttle_retries(mut self, max: Option<u32>) -> Self {
        self.max_throttle_retries = max;
        self
    }

    /// The configured retry cap, if any
    pub fn max_throttle_retries(&self) -> Option<u32> {
        self.max_throttle_retries
    }

    /// The delay to wait before re-admitting a throttled task.
    pub fn delay_for(&self, signal: &ThrottleSignal) -> Duration {
        signal.retry_after + self.cushion
    }

    /// Whether another retry is allowed after `retries_so_far` throttles.
    pub fn allows(&self, retries_so_far: u32) -> bool {
        match self.max_throttle_retries {
            Some(max) => retries_so_far <= max,
            None => true,
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new()
    }
}
