//! Shared test support: scripted provider adapters and fixture builders

use async_trait::async_trait;
use puzzle_bench::dispatch::quota::{QuotaDimension, QuotaSpec};
use puzzle_bench::provider::{
    AdapterError, CallOutcome, ErrorClass, FatalError, ProviderAdapter, ProviderRequest,
    ProviderResponse, ThrottleSignal,
};
use puzzle_bench::puzzles::{PuzzleContent, PuzzleRecord};
use puzzle_bench::{AttemptOutcome, ProviderKind, Task};
use serde_json::json;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::Duration;

/// An adapter that replays a fixed script of call outcomes.
///
/// Execution pops the next scripted outcome; an exhausted script returns a
/// fatal error so a test that issues unexpected calls fails loudly.
pub struct ScriptedAdapter {
    kind: ProviderKind,
    quota: QuotaSpec,
    script: Mutex<VecDeque<CallOutcome>>,
    calls: AtomicU64,
}

impl ScriptedAdapter {
    pub fn new(script: Vec<CallOutcome>) -> Self {
        Self {
            kind: ProviderKind::Openai,
            quota: QuotaSpec {
                dimension: QuotaDimension::RequestsPerMinute,
                limit: 1000,
            },
            script: Mutex::new(script.into()),
            calls: AtomicU64::new(0),
        }
    }

    /// Number of execute calls made so far.
    pub fn calls(&self) -> u64 {
        self.calls.load(Ordering::SeqCst)
    }

    /// A completed outcome whose parsed answer will be `text`.
    pub fn completed(text: &str) -> CallOutcome {
        CallOutcome::Completed(ProviderResponse {
            body: json!({
                "text": text,
                "usage": {"prompt": 10, "completion": 2, "total": 12}
            }),
        })
    }

    /// A throttle signal with the given retry hint.
    pub fn throttled(retry_after: Duration) -> CallOutcome {
        CallOutcome::Throttled(ThrottleSignal { retry_after })
    }

    /// A fatal error with the given message.
    pub fn fatal(message: &str) -> CallOutcome {
        CallOutcome::Fatal(FatalError {
            message: message.to_string(),
        })
    }
}

#[async_trait]
impl ProviderAdapter for ScriptedAdapter {
    fn kind(&self) -> ProviderKind {
        self.kind
    }

    fn model(&self) -> &str {
        "scripted-model"
    }

    fn quota(&self) -> QuotaSpec {
        self.quota
    }

    fn build_request(
        &self,
        task: &Task,
        content: &PuzzleContent,
    ) -> Result<ProviderRequest, AdapterError> {
        Ok(ProviderRequest {
            provider: self.kind,
            puzzle_id: task.puzzle_id,
            attempt: task.attempt,
            body: json!({
                "puzzle": content.text,
                "temperature": task.temperature,
            }),
        })
    }

    fn estimate_cost(&self, request: &ProviderRequest) -> u64 {
        match self.quota.dimension {
            QuotaDimension::RequestsPerMinute => 1,
            QuotaDimension::TokensPerMinute => request.body.to_string().len() as u64 / 4 + 1,
        }
    }

    async fn execute(&self, _request: &ProviderRequest) -> CallOutcome {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.script
            .lock()
            .expect("script lock poisoned")
            .pop_front()
            .unwrap_or_else(|| Self::fatal("script exhausted: unexpected call"))
    }

    fn parse_response(&self, response: &ProviderResponse, task: &Task) -> AttemptOutcome {
        let body = &response.body;
        let text = body["text"].as_str().unwrap_or("").trim().to_string();
        AttemptOutcome {
            attempt: task.attempt,
            temperature: task.temperature,
            answer: if text.is_empty() { None } else { Some(text) },
            prompt_tokens: body["usage"]["prompt"].as_u64().unwrap_or(0),
            completion_tokens: body["usage"]["completion"].as_u64().unwrap_or(0),
            total_tokens: body["usage"]["total"].as_u64().unwrap_or(0),
            error: None,
        }
    }

    fn classify_error(&self, status: Option<u16>, _body: &str) -> ErrorClass {
        if status == Some(429) {
            ErrorClass::Throttled(ThrottleSignal {
                retry_after: Duration::from_secs(1),
            })
        } else {
            ErrorClass::Fatal(format!("HTTP {status:?}"))
        }
    }
}

/// A puzzle record fixture.
pub fn puzzle(id: u64, name: &str, text: Option<&str>) -> PuzzleRecord {
    PuzzleRecord {
        id,
        name: name.to_string(),
        text: text.map(str::to_string),
        has_image: false,
        answer: None,
    }
}

/// A successful outcome fixture.
pub fn success_outcome(attempt: u32, temperature: f64, answer: &str) -> AttemptOutcome {
    AttemptOutcome {
        attempt,
        temperature,
        answer: Some(answer.to_string()),
        prompt_tokens: 10,
        completion_tokens: 2,
        total_tokens: 12,
        error: None,
    }
}
