//! CLI error types

use crate::dispatch::DispatchError;
use crate::provider::AdapterError;
use crate::puzzles::PuzzleSourceError;
use crate::store::StoreError;

/// Errors surfaced by CLI commands
#[derive(Debug, thiserror::Error)]
pub enum CliError {
    /// Invalid command-line argument
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Provider credential missing from the environment
    #[error("missing credential: {0}")]
    MissingCredential(String),

    /// Registry failure
    #[error("registry error: {0}")]
    RegistryError(String),

    /// Puzzle source failure
    #[error("puzzle source error: {0}")]
    PuzzleSourceError(#[from] PuzzleSourceError),

    /// Result store failure
    #[error("store error: {0}")]
    StoreError(#[from] StoreError),

    /// Dispatch failure
    #[error("dispatch error: {0}")]
    DispatchError(#[from] DispatchError),

    /// Adapter setup failure
    #[error("adapter error: {0}")]
    AdapterError(#[from] AdapterError),

    /// Metrics initialization failure
    #[error("metrics error: {0}")]
    MetricsError(String),
}
