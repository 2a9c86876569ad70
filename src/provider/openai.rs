//! OpenAI-style chat completions adapter
//!
//! Quota dimension is tokens-per-minute, so admission needs a token estimate
//! before the real usage is known; the estimate is the serialized payload
//! size at ~4 chars/token plus the completion cap.

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

/// Fallback wait when a 429 carries no retry hint
const THROTTLE_FALLBACK: Duration = Duration::from_secs(1);

/// OpenAI-style chat completions adapter
pub struct OpenAiAdapter {
    profile: ProviderProfile,
    credential: Credential,
    http: ProviderHttpClient,
}

impl OpenAiAdapter {
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
impl ProviderAdapter for OpenAiAdapter {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Openai
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

        let mut user_parts = vec![json!({"type": "text", "text": content.text})];
        if let Some(image) = &content.image {
            user_parts.push(json!({
                "type": "image_url",
                "image_url": {
                    "url": format!("data:{};base64,{}", image.media_type, image.data)
                }
            }));
        }

        let body = json!({
            "model": self.profile.model,
            "messages": [
                {"role": "system", "content": SYSTEM_INSTRUCTION},
                {"role": "user", "content": user_parts},
            ],
            "temperature": task.temperature,
            "max_tokens": self.profile.completion_max_tokens,
        });

        Ok(ProviderRequest {
            provider: ProviderKind::Openai,
            puzzle_id: task.puzzle_id,
            attempt: task.attempt,
            body,
        })
    }

    fn estimate_cost(&self, request: &ProviderRequest) -> u64 {
        let chars = request.body.to_string().len() as u64;
        chars / 4 + 1 + u64::from(self.profile.completion_max_tokens)
    }

    async fn execute(&self, request: &ProviderRequest) -> CallOutcome {
        let headers = [(
            "Authorization",
            format!("Bearer {}", self.credential.expose()),
        )];

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
        let text = body["choices"][0]["message"]["content"]
            .as_str()
            .unwrap_or("")
            .trim()
            .to_string();

        let usage = &body["usage"];
        let prompt_tokens = usage["prompt_tokens"].as_u64().unwrap_or(0);
        let completion_tokens = usage["completion_tokens"].as_u64().unwrap_or(0);
        let total_tokens = usage["total_tokens"]
            .as_u64()
            .unwrap_or(prompt_tokens + completion_tokens);

        AttemptOutcome {
            attempt: task.attempt,
            temperature: task.temperature,
            answer: if text.is_empty() { None } else { Some(text) },
            prompt_tokens,
            completion_tokens,
            total_tokens,
            error: if body["choices"][0].is_null() {
                Some("empty completion".to_string())
            } else {
                None
            },
        }
    }

    fn classify_error(&self, status: Option<u16>, body: &str) -> ErrorClass {
        if status == Some(429) {
            let retry_after = parse_retry_hint(body).unwrap_or(THROTTLE_FALLBACK);
            return ErrorClass::Throttled(ThrottleSignal { retry_after });
        }

        ErrorClass::Fatal(match status {
            Some(code) => format!("HTTP {code}: {}", truncate(body)),
            None => format!("network error: {}", truncate(body)),
        })
    }
}

/// Bound error bodies so stored messages stay readable.
fn truncate(body: &str) -> &str {
    let cut = body
        .char_indices()
        .nth(300)
        .map(|(i, _)| i)
        .unwrap_or(body.len());
    &body[..cut]
}
