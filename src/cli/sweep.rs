//! Sweep command implementation

use crate::dispatch::{RetryPolicy, SweepExecutor, SweepProgress};
use crate::provider::{create_adapter, Credential};
use crate::puzzles::{load_puzzles, DirAttachmentSource};
use crate::registry::ProviderRegistry;
use crate::shutdown::SharedShutdown;
use crate::store::ResultStore;
use crate::ProviderKind;
use clap::{Args, Parser, Subcommand};
use futures::stream::{self, StreamExt};
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::info;

use super::CliError;

/// Benchmark sweep dispatcher for LLM inference providers
#[derive(Debug, Parser)]
#[command(name = "puzzle-bench", version, about)]
pub struct Cli {
    /// Command to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Run a benchmark sweep against one or more providers
    Sweep(SweepArgs),
    /// List configured providers and their quota profiles
    Providers(super::ProvidersCommand),
    /// Report outstanding work without issuing any provider calls
    Status(super::StatusArgs),
}

/// Arguments for the sweep command
#[derive(Debug, Args)]
pub struct SweepArgs {
    /// Providers to sweep (comma-separated: openai, anthropic, gemini)
    #[arg(long, value_delimiter = ',', required = true)]
    pub providers: Vec<String>,

    /// Puzzle CSV path
    #[arg(long, default_value = "data/puzzles/puzzles.csv")]
    pub puzzles: PathBuf,

    /// Per-puzzle image directory
    #[arg(long, default_value = "data/puzzles/puzzle_images")]
    pub images_dir: PathBuf,

    /// Directory holding one results file per provider
    #[arg(long, default_value = "results")]
    pub results_dir: PathBuf,

    /// Cap throttle retries per task (default: unbounded)
    #[arg(long)]
    pub max_throttle_retries: Option<u32>,

    /// Re-run attempts previously recorded as failed
    #[arg(long)]
    pub rerun_failed: bool,

    /// Expose Prometheus metrics on this address (e.g., 127.0.0.1:9090)
    #[arg(long)]
    pub metrics_addr: Option<SocketAddr>,
}

impl SweepArgs {
    /// Execute the sweep command.
    pub async fn execute(&self, shutdown: SharedShutdown) -> Result<(), CliError> {
        if let Some(addr) = self.metrics_addr {
            crate::metrics::init_metrics(addr)
                .await
                .map_err(|e| CliError::MetricsError(e.to_string()))?;
        }

        let kinds = parse_providers(&self.providers)?;
        let registry = ProviderRegistry::load().map_err(|e| CliError::RegistryError(e.to_string()))?;
        let puzzles = load_puzzles(&self.puzzles)?;
        let attachments = Arc::new(DirAttachmentSource::new(&self.images_dir));

        info!(
            providers = kinds.len(),
            puzzles = puzzles.len(),
            "Preparing sweep"
        );

        let multi = MultiProgress::new();
        let bar_style = ProgressStyle::with_template(
            "{prefix:>10} [{bar:40}] {pos}/{len} ({elapsed})",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar());

        // One executor per provider: independent governors, independent
        // stores (one results file each), shared puzzle set.
        let mut sweeps = Vec::new();
        for kind in kinds {
            let profile = registry
                .get(kind)
                .map_err(|e| CliError::RegistryError(e.to_string()))?;
            let credential = Credential::from_env(&profile.credential_var)
                .map_err(|e| CliError::MissingCredential(e.to_string()))?;
            let adapter: Arc<dyn crate::provider::ProviderAdapter> =
                create_adapter(profile, credential)?.into();

            let store = ResultStore::load(self.results_dir.join(&profile.results_file))?;
            let store = Arc::new(Mutex::new(store));

            let retry =
                RetryPolicy::new().with_max_throttle_retries(self.max_throttle_retries);
            let executor = SweepExecutor::new(adapter, store)
                .with_retry_policy(retry)
                .with_shutdown(shutdown.clone())
                .with_rerun_failed(self.rerun_failed);

            let schedule = profile.schedule();
            let outstanding = executor.outstanding(&puzzles, &schedule).await;

            let bar = multi.add(ProgressBar::new(outstanding as u64));
            bar.set_style(bar_style.clone());
            bar.set_prefix(kind.to_string());
            let executor = executor.with_progress_bar(bar.clone());

            sweeps.push((executor, schedule, bar));
        }

        // Providers share no quota state, so their sweeps run concurrently;
        // each one is still a single flow in enumerator order.
        let concurrency = sweeps.len().max(1);
        let puzzles = &puzzles;
        let attachments = &attachments;
        let results: Vec<Result<SweepProgress, CliError>> = stream::iter(sweeps)
            .map(|(executor, schedule, bar)| async move {
                let progress = executor.run(puzzles, &schedule, attachments.as_ref()).await?;
                bar.finish_with_message("done");
                Ok(progress)
            })
            .buffer_unordered(concurrency)
            .collect()
            .await;

        let mut failed = false;
        for result in results {
            match result {
                Ok(progress) => println!("{}", progress.format_summary()),
                Err(e) => {
                    failed = true;
                    tracing::error!(error = %e, "Sweep failed");
                }
            }
        }

        if failed {
            return Err(CliError::InvalidArgument(
                "one or more sweeps failed".to_string(),
            ));
        }
        Ok(())
    }
}

/// Parse and de-duplicate the provider list.
fn parse_providers(raw: &[String]) -> Result<Vec<ProviderKind>, CliError> {
    let mut kinds = Vec::new();
    for name in raw {
        let kind = ProviderKind::from_str(name.trim())
            .map_err(CliError::InvalidArgument)?;
        if !kinds.contains(&kind) {
            kinds.push(kind);
        }
    }
    if kinds.is_empty() {
        return Err(CliError::InvalidArgument(
            "at least one provider is required".to_string(),
        ));
    }
    Ok(kinds)
}
