//! Providers command: list registry profiles

use crate::registry::ProviderRegistry;
use clap::Args;

use super::CliError;

/// Arguments for the providers command
#[derive(Debug, Args)]
pub struct ProvidersCommand {
    /// Show the full attempt schedule for each provider
    #[arg(long)]
    pub verbose: bool,
}

impl ProvidersCommand {
    /// Execute the providers command.
    pub async fn execute(&self) -> Result<(), CliError> {
        let registry =
            ProviderRegistry::load().map_err(|e| CliError::RegistryError(e.to_string()))?;

        let mut profiles = registry.profiles();
        profiles.sort_by_key(|p| p.id.to_string());

        println!("Configured providers:");
        for profile in profiles {
            println!(
                "  {:<10} model={:<28} quota={} {}  results={}",
                profile.id.to_string(),
                profile.model,
                profile.quota.limit,
                profile.quota.dimension,
                profile.results_file
            );
            if self.verbose {
                for spec in profile.schedule() {
                    println!(
                        "             attempt {} at temperature {}",
                        spec.attempt, spec.temperature
                    );
                }
            }
        }

        Ok(())
    }
}
