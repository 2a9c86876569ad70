//! # Puzzle Bench
//!
//! A dispatch engine for running large benchmark sweeps against heterogeneous
//! LLM inference providers. Each unit of work is "solve puzzle P, attempt A,
//! at temperature T, via provider X"; the engine's job is to run thousands of
//! such calls reliably and cheaply.
//!
//! ## Features
//!
//! - **Multi-Provider Support**: OpenAI-style chat completions, Anthropic-style
//!   messages, and Gemini-style generateContent backends
//! - **Quota Governance**: per-provider trailing-window rate limiting
//!   (tokens-per-minute or requests-per-minute) with blocking admission
//! - **Throttle Recovery**: automatic retry on provider backpressure, honoring
//!   "retry after N ms" hints
//! - **Resumable Results**: a durable, idempotent result store; interrupted
//!   sweeps restart with exactly the uncompleted work
//! - **Never Pay Twice**: completed attempts are skipped on every later run
//!
//! ## Quick Start
//!
//! ```no_run
//! use puzzle_bench::dispatch::SweepExecutor;
//! use puzzle_bench::provider::{create_adapter, Credential};
//! use puzzle_bench::puzzles::{load_puzzles, NoAttachments};
//! use puzzle_bench::registry::ProviderRegistry;
//! use puzzle_bench::store::ResultStore;
//! use puzzle_bench::ProviderKind;
//! use std::sync::Arc;
//! use tokio::sync::Mutex;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let registry = ProviderRegistry::load_embedded()?;
//! let profile = registry.get(ProviderKind::Openai)?;
//! let credential = Credential::from_env(&profile.credential_var)?;
//! let adapter = create_adapter(profile, credential)?;
//!
//! let puzzles = load_puzzles("data/puzzles/puzzles.csv".as_ref())?;
//! let store = Arc::new(Mutex::new(ResultStore::load("results/results_gpt-4o-mini.json")?));
//!
//! let executor = SweepExecutor::new(adapter.into(), store);
//! let summary = executor.run(&puzzles, &profile.schedule(), &NoAttachments).await?;
//! println!("{}", summary.format_summary());
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! - [`registry`] - Embedded provider profiles (model, endpoint, quota rules)
//! - [`provider`] - Provider adapters: request construction, invocation,
//!   response parsing, throttling classification
//! - [`dispatch`] - Sweep orchestration: task enumeration, quota governance,
//!   retry policy, the dispatch loop
//! - [`store`] - Durable result store with crash-safe atomic writes
//! - [`puzzles`] - Puzzle source and image asset boundary
//! - [`shutdown`] - Admission-gate shutdown coordination
//! - [`metrics`] - Prometheus observability

#![warn(missing_docs)]
#![warn(clippy::all)]

use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// CLI command implementations
pub mod cli;

/// Sweep orchestration: enumeration, quota governance, retry, dispatch loop
pub mod dispatch;

/// Observability metrics
pub mod metrics;

/// Provider adapters
pub mod provider;

/// Puzzle source and image asset boundary
pub mod puzzles;

/// Embedded provider registry
pub mod registry;

/// Graceful shutdown coordination shared across modules
pub mod shutdown;

/// Durable result store
pub mod store;

// Re-export commonly used types
pub use store::ResultStore;

/// Identifies one inference backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    /// OpenAI-style chat completions backend
    Openai,
    /// Anthropic-style messages backend
    Anthropic,
    /// Gemini-style generateContent backend
    Gemini,
}

impl std::fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ProviderKind::Openai => "openai",
            ProviderKind::Anthropic => "anthropic",
            ProviderKind::Gemini => "gemini",
        };
        write!(f, "{s}")
    }
}

impl FromStr for ProviderKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "openai" => Ok(ProviderKind::Openai),
            "anthropic" => Ok(ProviderKind::Anthropic),
            "gemini" => Ok(ProviderKind::Gemini),
            _ => Err(format!("Unknown provider: {s}")),
        }
    }
}

/// One (attempt index, temperature) slot in the sweep schedule
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AttemptSpec {
    /// Attempt index (1-based)
    pub attempt: u32,
    /// Sampling temperature for this attempt
    pub temperature: f64,
}

impl AttemptSpec {
    /// Build the ordered attempt schedule from a temperature list.
    ///
    /// Attempt indices are assigned 1..=N in list order.
    pub fn schedule(temperatures: &[f64]) -> Vec<AttemptSpec> {
        temperatures
            .iter()
            .enumerate()
            .map(|(i, &temperature)| AttemptSpec {
                attempt: (i + 1) as u32,
                temperature,
            })
            .collect()
    }
}

/// One dispatchable unit of work: a (puzzle, attempt) pair bound to a provider
#[derive(Debug, Clone, PartialEq)]
pub struct Task {
    /// Puzzle id from the puzzle source
    pub puzzle_id: u64,
    /// Attempt index (1-based)
    pub attempt: u32,
    /// Sampling temperature for this attempt
    pub temperature: f64,
    /// Backend that will execute this task
    pub provider: ProviderKind,
}

impl Task {
    /// Validate task parameters
    pub fn validate(&self) -> Result<(), String> {
        if self.attempt == 0 {
            return Err("Attempt index must be 1-based".to_string());
        }

        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(format!(
                "Temperature must be within [0.0, 2.0], got {}",
                self.temperature
            ));
        }

        Ok(())
    }
}

/// The recorded result of one task: a successful answer or a terminal failure
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AttemptOutcome {
    /// Attempt index (1-based)
    pub attempt: u32,
    /// Sampling temperature the attempt ran at
    pub temperature: f64,
    /// Answer text; absent on failure
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub answer: Option<String>,
    /// Prompt tokens reported by the provider (0 when unavailable)
    #[serde(default)]
    pub prompt_tokens: u64,
    /// Completion tokens reported by the provider (0 when unavailable)
    #[serde(default)]
    pub completion_tokens: u64,
    /// Total tokens reported by the provider (0 when unavailable)
    #[serde(default)]
    pub total_tokens: u64,
    /// Terminal failure message; absent on success
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl AttemptOutcome {
    /// Build a failed-terminal outcome for a task.
    pub fn failure(task: &Task, message: impl Into<String>) -> Self {
        Self {
            attempt: task.attempt,
            temperature: task.temperature,
            answer: None,
            prompt_tokens: 0,
            completion_tokens: 0,
            total_tokens: 0,
            error: Some(message.into()),
        }
    }

    /// An outcome is successful iff the answer is present and non-blank.
    pub fn is_success(&self) -> bool {
        self.answer
            .as_deref()
            .map(|a| !a.trim().is_empty())
            .unwrap_or(false)
    }
}
