//! Status command: report outstanding work without issuing provider calls

use crate::dispatch::outstanding_tasks;
use crate::puzzles::load_puzzles;
use crate::registry::ProviderRegistry;
use crate::store::ResultStore;
use chrono::Utc;
use clap::Args;
use std::path::PathBuf;

use super::CliError;

/// Arguments for the status command
#[derive(Debug, Args)]
pub struct StatusArgs {
    /// Puzzle CSV path
    #[arg(long, default_value = "data/puzzles/puzzles.csv")]
    pub puzzles: PathBuf,

    /// Directory holding one results file per provider
    #[arg(long, default_value = "results")]
    pub results_dir: PathBuf,
}

impl StatusArgs {
    /// Execute the status command. Read-only: no provider calls, no writes.
    pub async fn execute(&self) -> Result<(), CliError> {
        let registry =
            ProviderRegistry::load().map_err(|e| CliError::RegistryError(e.to_string()))?;
        let puzzles = load_puzzles(&self.puzzles)?;
        let with_content = puzzles.iter().filter(|p| p.has_content()).count();

        println!(
            "Sweep status as of {} ({} puzzles, {} with content)",
            Utc::now().format("%Y-%m-%d %H:%M:%S UTC"),
            puzzles.len(),
            with_content
        );

        let mut profiles = registry.profiles();
        profiles.sort_by_key(|p| p.id.to_string());

        for profile in profiles {
            let store = ResultStore::load(self.results_dir.join(&profile.results_file))?;
            let document = store.document();
            let schedule = profile.schedule();

            let total = with_content * schedule.len();
            let outstanding =
                outstanding_tasks(&puzzles, &schedule, document, profile.id, false).len();

            let mut succeeded = 0usize;
            let mut failed = 0usize;
            for (_, results) in document.iter() {
                for answer in &results.answers {
                    if answer.is_success() {
                        succeeded += 1;
                    } else if answer.error.is_some() {
                        failed += 1;
                    }
                }
            }

            println!(
                "  {:<10} {:>5}/{:<5} done ({} succeeded, {} failed), {} outstanding",
                profile.id.to_string(),
                total - outstanding,
                total,
                succeeded,
                failed,
                outstanding
            );
        }

        Ok(())
    }
}
