//! Sweep orchestration and quota governance
//!
//! This module provides the core dispatch engine with quota enforcement,
//! throttle recovery, and idempotent result commits.
//!
//! # Overview
//!
//! 1. **Enumeration**: [`enumerate::outstanding_tasks`] diffs the full task
//!    space against the result store
//! 2. **Admission**: [`quota::QuotaGovernor`] blocks each task until its
//!    estimated cost fits under the provider's trailing-window quota
//! 3. **Execution**: the provider adapter performs the call
//! 4. **Recovery**: [`retry::RetryPolicy`] turns throttle signals into
//!    cushioned delays; the same task is re-admitted, never abandoned
//! 5. **Commit**: terminal outcomes are persisted before the loop advances
//!
//! # Error Handling
//!
//! No error escapes the dispatch loop: throttling is retried, fatal provider
//! errors become failed-terminal outcomes, and request-build failures skip
//! the task for this run only. The single exception is store I/O failure,
//! which aborts the sweep rather than risk losing paid-for results.

pub mod enumerate;
pub mod executor;
pub mod progress;
pub mod quota;
pub mod retry;

pub use enumerate::outstanding_tasks;
pub use executor::SweepExecutor;
pub use progress::SweepProgress;
pub use quota::{QuotaDimension, QuotaGovernor, QuotaSpec};
pub use retry::RetryPolicy;

/// Dispatch errors
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    /// Result store failure; aborts the sweep
    #[error("store error: {0}")]
    StoreError(#[from] crate::store::StoreError),

    /// Adapter setup failure
    #[error("adapter error: {0}")]
    AdapterError(#[from] crate::provider::AdapterError),
}
