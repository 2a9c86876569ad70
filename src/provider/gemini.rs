//! Gemini-style generateContent adapter
//!
//! Two quirks this adapter absorbs so the dispatch loop stays generic:
//! quota errors sometimes arrive as free text rather than a clean 429, and a
//! safety block yields a well-formed response with no candidate text.

use super::http::ProviderHttpClient;
use super::{
    parse_retry_hint, AdapterError, CallOutcome, Credential, ErrorClass, FatalError,
    ProviderAdapter, ProviderRequest, ProviderResponse, ThrottleSignal, SYSTEM_INSTRUCTION,
};
use crate::dispatch::quota::QuotaSpec;
use crate::puzzles::PuzzleContent;
use crate::registry::ProviderProfile;
use crate::{AttemptOutcome, ProviderKind, Task};
use async_trait::async_trait;
use serde_json::json;
use std::time::Duration;

/// Fallback wait when a quota error carries no retry hint
const THROTTLE_FALLBACK: Duration = Duration::from_secs(60);

/// Substrings that mark a free-text error as backpressure
const QUOTA_MARKERS: [&str; 4] = ["rate limit", "quota", "429", "exhausted"];

/// Gemini-style generateContent adapter
pub struct GeminiAdapter {
    profile: ProviderProfile,
    credential: Credential,
    http: ProviderHttpClient,
}

impl GeminiAdapter {
    /// Create a new adapter from a registry profile and credential.
    pub fn new(profile: ProviderProfile, credential: Credential) -> Self {
        Self {
            profile,
            credential,
            http: ProviderHttpClient::new(),
        }
    }

    /// Create with a custom HTTP client (for callers wanting a timeout).
    pub fn with_http_client(mut self, http: ProviderHttpClient) -> Self {
        self.http = http;
        self
    }
}

#[async_trait]
impl ProviderAdapter for GeminiAdapter {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Gemini
    }

    fn model(&self) -> &str {
        &self.profile.model
    }

    fn quota(&self) -> QuotaSpec {
        self.profile.quota
    }

    fn build_request(
        &self,
        task: &Task,
        content: &PuzzleContent,
    ) -> Result<ProviderRequest, AdapterError> {
        task.validate().map_err(AdapterError::BuildError)?;

        // No system role on this contract: the instruction is prepended to
        // the puzzle text.
        let prompt = format!("{SYSTEM_INSTRUCTION}\n\n{}", content.text);
        let mut parts = vec![json!({"text": prompt})];
        if let Some(image) = &content.image {
            parts.push(json!({
                "inline_data": {
                    "mime_type": image.media_type,
                    "data": image.data,
                }
            }));
        }

        let body = json!({
            "contents": [{"parts": parts}],
            "generationConfig": {
                "temperature": task.temperature,
                "maxOutputTokens": self.profile.completion_max_tokens,
            }
        });

        Ok(ProviderRequest {
            provider: ProviderKind::Gemini,
            puzzle_id: task.puzzle_id,
            attempt: task.attempt,
            body,
        })
    }

    fn estimate_cost(&self, _request: &ProviderRequest) -> u64 {
        // Request-dimension quota: one unit per call
        1
    }

    async fn execute(&self, request: &ProviderRequest) -> CallOutcome {
        let query = [("key", self.credential.expose().to_string())];

        let reply = match self
            .http
            .post_json(&self.profile.endpoint, &[], &query, &request.body)
            .await
        {
            Ok(reply) => reply,
            Err(e) => {
                return CallOutcome::Fatal(FatalError {
                    message: e.to_string(),
                })
            }
        };

        if reply.is_success() {
            match serde_json::from_str(&reply.body) {
                Ok(body) => CallOutcome::Completed(ProviderResponse { body }),
                Err(e) => CallOutcome::Fatal(FatalError {
                    message: format!("unparseable response: {e}"),
                }),
            }
        } else {
            match self.classify_error(Some(reply.status), &reply.body) {
                ErrorClass::Throttled(signal) => CallOutcome::Throttled(signal),
                ErrorClass::Fatal(message) => CallOutcome::Fatal(FatalError { message }),
            }
        }
    }

    fn parse_response(&self, response: &ProviderResponse, task: &Task) -> AttemptOutcome {
        let body = &response.body;
        let text = body["candidates"][0]["content"]["parts"][0]["text"]
            .as_str()
            .unwrap_or("")
            .trim()
            .to_string();

        let meta = &body["usageMetadata"];
        let prompt_tokens = meta["promptTokenCount"].as_u64().unwrap_or(0);
        let completion_tokens = meta["candidatesTokenCount"].as_u64().unwrap_or(0);
        let total_tokens = meta["totalTokenCount"]
            .as_u64()
            .unwrap_or(prompt_tokens + completion_tokens);

        // A safety block leaves no candidate text; record the reason instead
        // of an answer so the attempt is terminal, not silently blank.
        let error = if text.is_empty() {
            match body["promptFeedback"]["blockReason"].as_str() {
                Some(reason) => Some(format!("blocked: {reason}")),
                None => Some("no candidate text in response".to_string()),
            }
        } else {
            None
        };

        AttemptOutcome {
            attempt: task.attempt,
            temperature: task.temperature,
            answer: if text.is_empty() { None } else { Some(text) },
            prompt_tokens,
            completion_tokens,
            total_tokens,
            error,
        }
    }

    fn classify_error(&self, status: Option<u16>, body: &str) -> ErrorClass {
        let lowered = body.to_lowercase();
        let looks_throttled =
            status == Some(429) || QUOTA_MARKERS.iter().any(|m| lowered.contains(m));

        if looks_throttled {
            let retry_after = parse_retry_hint(body).unwrap_or(THROTTLE_FALLBACK);
            return ErrorClass::Throttled(ThrottleSignal { retry_after });
        }

        ErrorClass::Fatal(match status {
            Some(code) => format!("HTTP {code}: {body}"),
            None => format!("network error: {body}"),
        })
    }
}
