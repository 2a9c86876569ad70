//! Provider adapter implementations
//!
//! One adapter per inference backend, polymorphic over request construction,
//! invocation, response parsing, throttling classification, and pre-flight
//! cost estimation. The dispatch loop never touches a provider-specific
//! shape; adding a backend means adding an adapter and a registry profile.

use crate::dispatch::quota::QuotaSpec;
use crate::puzzles::PuzzleContent;
use crate::registry::ProviderProfile;
use crate::{AttemptOutcome, ProviderKind, Task};
use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use std::time::Duration;

pub mod anthropic;
pub mod gemini;
pub mod http;
pub mod openai;

/// System instruction sent with every puzzle request
pub const SYSTEM_INSTRUCTION: &str = "You are an expert Jane Street puzzle solver. \
     Return ONLY the final numeric or textual answer - no explanation.";

/// Matches the human-readable retry hint some providers embed in error bodies
static RETRY_HINT_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"in (\d+)ms").unwrap());

/// Parse a "retry after N ms" hint out of an error message, if present.
pub fn parse_retry_hint(message: &str) -> Option<Duration> {
    RETRY_HINT_RE
        .captures(message)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse::<u64>().ok())
        .map(Duration::from_millis)
}

/// Adapter errors (request construction and setup only; execution failures
/// are reported through [`CallOutcome`])
#[derive(Debug, thiserror::Error)]
pub enum AdapterError {
    /// Request payload could not be built from the task content
    #[error("request build error: {0}")]
    BuildError(String),

    /// Credential missing or unusable
    #[error("credential error: {0}")]
    CredentialError(String),

    /// Provider is not supported by any adapter
    #[error("unsupported provider: {0}")]
    UnsupportedProvider(String),
}

/// A ready-to-use provider credential
pub struct Credential {
    key: String,
}

impl Credential {
    /// Wrap an already-loaded secret.
    pub fn new(key: impl Into<String>) -> Self {
        Self { key: key.into() }
    }

    /// Read a credential from an environment variable.
    pub fn from_env(var: &str) -> Result<Self, AdapterError> {
        match std::env::var(var) {
            Ok(key) if !key.trim().is_empty() => Ok(Self::new(key)),
            _ => Err(AdapterError::CredentialError(format!(
                "Missing {var} in environment"
            ))),
        }
    }

    /// The raw secret, for header/query injection.
    pub fn expose(&self) -> &str {
        &self.key
    }
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Credential(***)")
    }
}

/// A fully-built provider request, ready to execute
#[derive(Debug, Clone)]
pub struct ProviderRequest {
    /// Backend this request targets
    pub provider: ProviderKind,
    /// Puzzle id, for logging
    pub puzzle_id: u64,
    /// Attempt index, for logging
    pub attempt: u32,
    /// Provider-specific JSON body
    pub body: serde_json::Value,
}

/// A successful raw provider response
#[derive(Debug, Clone)]
pub struct ProviderResponse {
    /// Parsed JSON body
    pub body: serde_json::Value,
}

/// Provider backpressure: retry after the given delay
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThrottleSignal {
    /// How long the provider asked us to wait (hint, or a per-provider
    /// fallback when no hint was supplied)
    pub retry_after: Duration,
}

/// A terminal execution failure
#[derive(Debug, Clone)]
pub struct FatalError {
    /// Human-readable failure description
    pub message: String,
}

/// The three-way result of executing a provider request.
///
/// Execution never returns a plain error: every failure is either a throttle
/// signal (retried) or fatal (recorded as a failed-terminal outcome).
#[derive(Debug, Clone)]
pub enum CallOutcome {
    /// The provider returned a parseable response
    Completed(ProviderResponse),
    /// The provider reported backpressure
    Throttled(ThrottleSignal),
    /// The call failed terminally
    Fatal(FatalError),
}

/// Classification of a provider error reply
#[derive(Debug, Clone)]
pub enum ErrorClass {
    /// Backpressure; retry after the signal's delay
    Throttled(ThrottleSignal),
    /// Terminal failure with a description
    Fatal(String),
}

/// Capability interface implemented once per provider (polymorphic dispatch)
#[async_trait]
pub trait ProviderAdapter: Send + Sync {
    /// Which backend this adapter targets
    fn kind(&self) -> ProviderKind;

    /// Model name sent with every request
    fn model(&self) -> &str;

    /// The quota rule the governor must enforce for this provider
    fn quota(&self) -> QuotaSpec;

    /// Assemble the provider-specific payload from the task and puzzle
    /// content. Pure; no I/O.
    fn build_request(
        &self,
        task: &Task,
        content: &PuzzleContent,
    ) -> Result<ProviderRequest, AdapterError>;

    /// Cheap, pessimistic pre-flight estimate of quota consumption.
    ///
    /// Admission blocks on this value, so it must never under-estimate by
    /// more than a small bounded factor.
    fn estimate_cost(&self, request: &ProviderRequest) -> u64;

    /// Perform the network call. Never returns an error past this boundary.
    async fn execute(&self, request: &ProviderRequest) -> CallOutcome;

    /// Extract answer text and real token usage from a response.
    ///
    /// Missing or ambiguous fields become zeros/empty rather than failures.
    fn parse_response(&self, response: &ProviderResponse, task: &Task) -> AttemptOutcome;

    /// Classify an error reply into a retry directive or terminal failure.
    fn classify_error(&self, status: Option<u16>, body: &str) -> ErrorClass;
}

/// Create an adapter from a registry profile (selected once at startup).
pub fn create_adapter(
    profile: &ProviderProfile,
    credential: Credential,
) -> Result<Box<dyn ProviderAdapter>, AdapterError> {
    match profile.id {
        ProviderKind::Openai => Ok(Box::new(openai::OpenAiAdapter::new(
            profile.clone(),
            credential,
        ))),
        ProviderKind::Anthropic => Ok(Box::new(anthropic::AnthropicAdapter::new(
            profile.clone(),
            credential,
        ))),
        ProviderKind::Gemini => Ok(Box::new(gemini::GeminiAdapter::new(
            profile.clone(),
            credential,
        ))),
    }
}
