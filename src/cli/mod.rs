//! CLI command implementations

pub mod error;
pub mod providers;
pub mod status;
pub mod sweep;

pub use error::CliError;
pub use providers::ProvidersCommand;
pub use status::StatusArgs;
pub use sweep::{Cli, Commands, SweepArgs};
