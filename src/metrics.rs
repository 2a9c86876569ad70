//! Observability metrics for benchmark sweeps
//!
//! Counters and histograms for provider requests, throttle events, quota
//! waits, and task outcomes, exported through a Prometheus scrape endpoint.
//! Recording works whether or not the exporter is installed; without it the
//! calls are no-ops, so library users pay nothing.

use crate::ProviderKind;
use metrics::{counter, describe_counter, describe_histogram, histogram, Unit};
use metrics_exporter_prometheus::PrometheusBuilder;
use once_cell::sync::Lazy;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, info};

/// Global metrics registry initialization flag
static METRICS_INITIALIZED: Lazy<Arc<RwLock<bool>>> = Lazy::new(|| Arc::new(RwLock::new(false)));

/// Initialize the metrics system with a Prometheus exporter.
///
/// Called once at application startup; idempotent.
pub async fn init_metrics(addr: SocketAddr) -> Result<(), Box<dyn std::error::Error>> {
    let mut initialized = METRICS_INITIALIZED.write().await;
    if *initialized {
        debug!("Metrics already initialized, skipping");
        return Ok(());
    }

    info!("Initializing metrics system on {}", addr);

    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .map_err(|e| format!("Failed to install Prometheus exporter: {e}"))?;

    describe_counter!(
        "provider_requests_total",
        Unit::Count,
        "Total provider API calls executed"
    );

    describe_counter!(
        "provider_throttle_events_total",
        Unit::Count,
        "Total throttle signals received from providers"
    );

    describe_counter!(
        "tasks_succeeded_total",
        Unit::Count,
        "Tasks committed with a successful answer"
    );

    describe_counter!(
        "tasks_failed_total",
        Unit::Count,
        "Tasks committed as failed-terminal"
    );

    describe_histogram!(
        "provider_request_duration_seconds",
        Unit::Seconds,
        "Provider call duration in seconds"
    );

    describe_histogram!(
        "quota_wait_seconds",
        Unit::Seconds,
        "Time spent blocked on quota admission"
    );

    *initialized = true;
    Ok(())
}

/// Whether the metrics system has been initialized
pub async fn is_initialized() -> bool {
    *METRICS_INITIALIZED.read().await
}

/// Record one executed provider call and its duration.
pub fn record_request(provider: ProviderKind, duration: Duration) {
    counter!("provider_requests_total", "provider" => provider.to_string()).increment(1);
    histogram!("provider_request_duration_seconds", "provider" => provider.to_string())
        .record(duration.as_secs_f64());
}

/// Record one throttle signal.
pub fn record_throttle(provider: ProviderKind) {
    counter!("provider_throttle_events_total", "provider" => provider.to_string()).increment(1);
}

/// Record time spent blocked on quota admission.
pub fn record_quota_wait(provider: ProviderKind, waited: Duration) {
    histogram!("quota_wait_seconds", "provider" => provider.to_string())
        .record(waited.as_secs_f64());
}

/// Record a committed terminal outcome.
pub fn record_task_outcome(provider: ProviderKind, success: bool) {
    let name = if success {
        "tasks_succeeded_total"
    } else {
        "tasks_failed_total"
    };
    counter!(name, "provider" => provider.to_string()).increment(1);
}
