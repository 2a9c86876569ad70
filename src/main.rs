//! Main entry point for the puzzle-bench CLI

use clap::Parser;
use puzzle_bench::cli::{Cli, Commands};
use puzzle_bench::shutdown::{self, ShutdownGate};
use tracing::error;
use tracing_subscriber::EnvFilter;

/// Initialize tracing subscriber with optional JSON formatting
fn init_tracing() {
    let json_format = std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false);

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("puzzle_bench=info"));

    if json_format {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

#[tokio::main]
async fn main() {
    // Credentials come from the environment; a local .env is honored when
    // present and silently ignored otherwise.
    dotenvy::dotenv().ok();

    init_tracing();

    let cli = Cli::parse();

    // Install the global shutdown gate and Ctrl+C handler. A stop request
    // halts new admissions; the in-flight call completes and commits.
    let gate = ShutdownGate::shared();
    shutdown::set_global_shutdown(gate.clone());
    tokio::spawn({
        let gate = gate.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::warn!("Ctrl+C received - finishing the in-flight call, then stopping");
                gate.request_stop();
            }
        }
    });

    let result: anyhow::Result<()> = match cli.command {
        Commands::Sweep(ref args) => args.execute(gate.clone()).await.map_err(Into::into),
        Commands::Providers(ref cmd) => cmd.execute().await.map_err(Into::into),
        Commands::Status(ref args) => args.execute().await.map_err(Into::into),
    };

    if let Err(e) = result {
        error!("Command failed: {}", e);
        std::process::exit(1);
    }
}
