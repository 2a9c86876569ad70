//! Shared HTTP helper for provider adapters
//!
//! A thin JSON-POST wrapper over a shared [`reqwest::Client`]. It captures
//! the status code and body verbatim so each adapter can apply its own error
//! classification; retry and backoff live in the dispatch loop, not here.

use reqwest::Client;
use serde_json::Value;
use std::sync::Arc;
use tracing::debug;

/// Status code and raw body of a provider reply
#[derive(Debug, Clone)]
pub struct HttpReply {
    /// HTTP status code
    pub status: u16,
    /// Raw response body
    pub body: String,
}

impl HttpReply {
    /// Whether the status is in the 2xx range
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Transport-level errors (connection, DNS, timeout)
#[derive(Debug, thiserror::Error)]
pub enum HttpError {
    /// Network error before any status was received
    #[error("network error: {0}")]
    NetworkError(String),
}

/// Shared HTTP client for all provider interactions
#[derive(Debug, Clone)]
pub struct ProviderHttpClient {
    client: Arc<Client>,
}

impl ProviderHttpClient {
    /// Create a new client with transport defaults.
    pub fn new() -> Self {
        Self {
            client: Arc::new(Client::new()),
        }
    }

    /// Create from a shared client (e.g., one with a caller-set timeout).
    pub fn with_client(client: Arc<Client>) -> Self {
        Self { client }
    }

    /// POST a JSON body, returning the status and raw body.
    ///
    /// Non-2xx statuses are returned as normal replies: classifying them is
    /// the adapter's job.
    pub async fn post_json(
        &self,
        url: &str,
        headers: &[(&str, String)],
        query: &[(&str, String)],
        body: &Value,
    ) -> Result<HttpReply, HttpError> {
        let mut request = self.client.post(url).query(query).json(body);
        for (name, value) in headers {
            request = request.header(*name, value);
        }

        debug!(url, "Sending provider request");

        let response = request
            .send()
            .await
            .map_err(|e| HttpError::NetworkError(e.to_string()))?;

        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| HttpError::NetworkError(format!("Failed to read body: {e}")))?;

        debug!(status, bytes = body.len(), "Provider reply received");

        Ok(HttpReply { status, body })
    }
}

impl Default for ProviderHttpClient {
    fn default() -> Self {
        Self::new()
    }
}
