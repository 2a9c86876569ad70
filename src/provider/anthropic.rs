//! Anthropic-style messages adapter
//!
//! Quota dimension is requests-per-minute: every call costs one unit
//! regardless of payload size.

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

/// API version header value the messages endpoint requires
const API_VERSION: &str = "2023-06-01";

/// Fallback wait when a 429 carries no retry hint
const THROTTLE_FALLBACK: Duration = Duration::from_secs(60);

/// Anthropic-style messages adapter
pub struct AnthropicAdapter {
    profile: ProviderProfile,
    credential: Credential,
    http: ProviderHttpClient,
}

impl AnthropicAdapter {
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
impl ProviderAdapter for AnthropicAdapter {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Anthropic
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

        let mut parts = vec![json!({"type": "text", "text": content.text})];
        if let Some(image) = &content.image {
            parts.push(json!({
                "type": "image",
                "source": {
                    "type": "base64",
                    "media_type": image.media_type,
                    "data": image.data,
                }
            }));
        }

        let body = json!({
            "model": self.profile.model,
            "system": SYSTEM_INSTRUCTION,
            "messages": [{"role": "user", "content": parts}],
            "temperature": task.temperature,
            "max_tokens": self.profile.completion_max_tokens,
        });

        Ok(ProviderRequest {
            provider: ProviderKind::Anthropic,
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
        let headers = [
            ("x-api-key", self.credential.expose().to_string()),
            ("anthropic-version", API_VERSION.to_string()),
        ];

        let reply = match self
            .http
            .post_json(&self.profile.endpoint, &headers, &[], &request.body)
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
        let text = body["content"][0]["text"]
            .as_str()
            .unwrap_or("")
            .trim()
            .to_string();

        let usage = &body["usage"];
        let prompt_tokens = usage["input_tokens"].as_u64().unwrap_or(0);
        let completion_tokens = usage["output_tokens"].as_u64().unwrap_or(0);

        AttemptOutcome {
            attempt: task.attempt,
            temperature: task.temperature,
            answer: if text.is_empty() { None } else { Some(text) },
            prompt_tokens,
            completion_tokens,
            total_tokens: prompt_tokens + completion_tokens,
            error: None,
        }
    }

    fn classify_error(&self, status: Option<u16>, body: &str) -> ErrorClass {
        if status == Some(429) {
            let retry_after = parse_retry_hint(body).unwrap_or(THROTTLE_FALLBACK);
            return ErrorClass::Throttled(ThrottleSignal { retry_after });
        }

        ErrorClass::Fatal(match status {
            Some(code) => format!("HTTP {code}: {body}"),
            None => format!("network error: {body}"),
        })
    }
}
