//! Provider registry with per-backend quota and sweep metadata
//!
//! The registry contains one profile per supported provider: the model to
//! query, the endpoint, the quota rule the governor must enforce, the attempt
//! schedule, and the results-file name the store persists to.

use crate::dispatch::quota::QuotaSpec;
use crate::{AttemptSpec, ProviderKind};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Embedded registry data
const REGISTRY_JSON: &str = include_str!("providers.json");

/// Global registry instance (loaded once)
static REGISTRY: Lazy<Result<ProviderRegistry, RegistryError>> =
    Lazy::new(|| ProviderRegistry::from_json(REGISTRY_JSON));

/// Registry of supported provider profiles
#[derive(Debug, Clone)]
pub struct ProviderRegistry {
    #[allow(dead_code)]
    schema_version: String,
    profiles: HashMap<ProviderKind, ProviderProfile>,
}

impl ProviderRegistry {
    /// Load the embedded registry.
    ///
    /// This is a singleton operation - the registry is loaded once and cached.
    pub fn load() -> Result<&'static Self, &'static RegistryError> {
        REGISTRY.as_ref()
    }

    /// Load the embedded registry, returning an owned copy
    pub fn load_embedded() -> Result<Self, RegistryError> {
        Self::from_json(REGISTRY_JSON)
    }

    /// Parse a registry from a JSON string
    fn from_json(json: &str) -> Result<Self, RegistryError> {
        let raw: RawRegistry = serde_json::from_str(json)
            .map_err(|e| RegistryError::ParseError(format!("Failed to parse registry: {e}")))?;

        let mut profiles = HashMap::new();
        for profile in raw.providers {
            profile.validate()?;
            profiles.insert(profile.id, profile);
        }

        Ok(Self {
            schema_version: raw.schema_version,
            profiles,
        })
    }

    /// Get the profile for a provider
    pub fn get(&self, kind: ProviderKind) -> Result<&ProviderProfile, RegistryError> {
        self.profiles
            .get(&kind)
            .ok_or_else(|| RegistryError::NotFound(format!("Provider {kind} not in registry")))
    }

    /// All registered profiles, in no particular order
    pub fn profiles(&self) -> Vec<&ProviderProfile> {
        self.profiles.values().collect()
    }

    /// All registered provider kinds
    pub fn list_all(&self) -> Vec<ProviderKind> {
        self.profiles.keys().copied().collect()
    }
}

/// One provider's sweep profile
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderProfile {
    /// Provider identifier
    pub id: ProviderKind,
    /// Model name sent with every request
    pub model: String,
    /// Endpoint URL for the chat/completion contract
    pub endpoint: String,
    /// Environment variable holding the credential
    pub credential_var: String,
    /// Quota rule the governor enforces for this provider
    pub quota: QuotaSpec,
    /// Sampling temperatures, one per attempt, in attempt order
    pub attempts: Vec<f64>,
    /// Completion token cap sent with every request
    pub completion_max_tokens: u32,
    /// Results-file name under the results directory
    pub results_file: String,
}

impl ProviderProfile {
    /// The ordered attempt schedule derived from the temperature list.
    pub fn schedule(&self) -> Vec<AttemptSpec> {
        AttemptSpec::schedule(&self.attempts)
    }

    /// Validate profile integrity
    fn validate(&self) -> Result<(), RegistryError> {
        if self.model.is_empty() {
            return Err(RegistryError::InvalidProfile(format!(
                "Provider {} has an empty model",
                self.id
            )));
        }

        if self.endpoint.is_empty() {
            return Err(RegistryError::InvalidProfile(format!(
                "Provider {} has an empty endpoint",
                self.id
            )));
        }

        if self.attempts.is_empty() {
            return Err(RegistryError::InvalidProfile(format!(
                "Provider {} has an empty attempt schedule",
                self.id
            )));
        }

        if self.quota.limit == 0 {
            return Err(RegistryError::InvalidProfile(format!(
                "Provider {} has a zero quota limit",
                self.id
            )));
        }

        Ok(())
    }
}

/// Raw registry file structure
#[derive(Debug, Deserialize)]
struct RawRegistry {
    schema_version: String,
    #[allow(dead_code)]
    last_updated: String,
    providers: Vec<ProviderProfile>,
}

/// Registry errors
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    /// Registry JSON could not be parsed
    #[error("parse error: {0}")]
    ParseError(String),

    /// Requested provider is not registered
    #[error("not found: {0}")]
    NotFound(String),

    /// A profile failed validation
    #[error("invalid profile: {0}")]
    InvalidProfile(String),
}
