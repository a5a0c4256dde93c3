//! Prometheus Metrics Module
//!
//! Exposes application metrics via Prometheus format for monitoring.
//!
//! # Metrics Categories
//!
//! - **Session**: liveness and re-login outcomes
//! - **Kbars**: per-symbol request outcomes
//! - **HTTP**: requests served by route and status
//! - **Latency**: historical fetch duration
//!
//! # Integration
//!
//! Metrics are exposed at `/metrics` on the HTTP server port.

use std::sync::OnceLock;
use std::time::Duration;

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

// =============================================================================
// Global Metrics Handle
// =============================================================================

static PROMETHEUS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Initialize the Prometheus metrics recorder.
///
/// # Panics
///
/// Panics if the recorder cannot be installed.
#[allow(clippy::expect_used)]
pub fn init_metrics() -> PrometheusHandle {
    PROMETHEUS_HANDLE
        .get_or_init(|| {
            let builder = PrometheusBuilder::new();
            let handle = builder
                .install_recorder()
                .expect("failed to install Prometheus recorder");

            register_metrics();
            handle
        })
        .clone()
}

/// Get the Prometheus handle for rendering metrics.
///
/// Returns `None` if metrics have not been initialized.
#[must_use]
pub fn get_metrics_handle() -> Option<PrometheusHandle> {
    PROMETHEUS_HANDLE.get().cloned()
}

// =============================================================================
// Metric Registration
// =============================================================================

fn register_metrics() {
    describe_gauge!(
        "data_provider_session_live",
        "1 when the last liveness check found a usable broker session"
    );
    describe_counter!(
        "data_provider_relogins_total",
        "Broker re-login attempts by outcome"
    );
    describe_counter!(
        "data_provider_kbars_requests_total",
        "Per-symbol kbar requests by outcome"
    );
    describe_counter!(
        "data_provider_http_requests_total",
        "HTTP requests served by route and status"
    );
    describe_histogram!(
        "data_provider_fetch_duration_seconds",
        "Time to fetch and aggregate daily bars for one request"
    );
}

// =============================================================================
// Metric Recording Functions
// =============================================================================

/// Outcome of a single kbar request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KbarsOutcome {
    /// Ticks were delivered.
    Ok,
    /// The broker delivered nothing usable.
    Empty,
    /// No callback arrived in time.
    Timeout,
    /// The delivered payload could not be decoded.
    DecodeError,
    /// The request could not be issued.
    RequestError,
    /// The callback was released without ever being invoked.
    Dropped,
}

impl KbarsOutcome {
    const fn as_str(self) -> &'static str {
        match self {
            Self::Ok => "ok",
            Self::Empty => "empty",
            Self::Timeout => "timeout",
            Self::DecodeError => "decode_error",
            Self::RequestError => "request_error",
            Self::Dropped => "dropped",
        }
    }
}

/// Record whether the session was found live.
pub fn set_session_live(live: bool) {
    gauge!("data_provider_session_live").set(if live { 1.0 } else { 0.0 });
}

/// Record a re-login attempt.
pub fn record_relogin(success: bool) {
    counter!(
        "data_provider_relogins_total",
        "outcome" => if success { "success" } else { "failure" }
    )
    .increment(1);
}

/// Record the outcome of a kbar request.
pub fn record_kbars_outcome(outcome: KbarsOutcome) {
    counter!(
        "data_provider_kbars_requests_total",
        "outcome" => outcome.as_str()
    )
    .increment(1);
}

/// Record an HTTP request.
pub fn record_http_request(route: &str, status: u16) {
    counter!(
        "data_provider_http_requests_total",
        "route" => route.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
}

/// Record historical fetch duration.
pub fn record_fetch_duration(duration: Duration) {
    histogram!("data_provider_fetch_duration_seconds").record(duration.as_secs_f64());
}

// =============================================================================
// Tests
// =============================================================================
