//! Metrics recorder and `/metrics` endpoint for the admin server.

use std::sync::OnceLock;

use axum::http::StatusCode;
use axum::response::IntoResponse;
use metrics::{counter, describe_counter, describe_histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

/// Shutdown handler failure counter.
pub const SHUTDOWN_HANDLER_FAILURES: &str = "shutdown_handler_failures_total";

/// Shutdown handler duration histogram.
pub const SHUTDOWN_HANDLER_DURATION: &str = "shutdown_handler_duration_seconds";

/// Main-loop panic counter.
pub const MAIN_LOOP_PANICS: &str = "main_loop_panics_total";

static PROMETHEUS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Initializes the global metrics recorder with a Prometheus exporter.
///
/// Safe to call multiple times; subsequent calls are no-ops. Returns a
/// handle for rendering metrics, also stored globally for the `/metrics`
/// endpoint.
///
/// # Panics
///
/// Panics if the Prometheus recorder cannot be installed. Metrics are
/// critical infrastructure; the server should not start without them.
#[allow(clippy::panic)]
pub fn init_metrics() -> PrometheusHandle {
    PROMETHEUS_HANDLE
        .get_or_init(|| {
            let builder = PrometheusBuilder::new();
            let handle = builder
                .install_recorder()
                .unwrap_or_else(|e| panic!("failed to install prometheus recorder: {e}"));

            describe_counter!(
                SHUTDOWN_HANDLER_FAILURES,
                "Total number of shutdown handlers that returned an error"
            );
            describe_histogram!(
                SHUTDOWN_HANDLER_DURATION,
                "Duration of shutdown handler executions in seconds"
            );
            describe_counter!(
                MAIN_LOOP_PANICS,
                "Total number of panics recovered from the main loop"
            );

            tracing::info!("Prometheus metrics recorder initialized");
            handle
        })
        .clone()
}

/// Returns the global Prometheus handle, if initialized.
#[must_use]
pub fn prometheus_handle() -> Option<PrometheusHandle> {
    PROMETHEUS_HANDLE.get().cloned()
}

/// Handler for the `/metrics` endpoint.
///
/// Returns Prometheus-formatted metrics text.
pub async fn serve_metrics() -> impl IntoResponse {
    prometheus_handle().map_or_else(
        || {
            (
                StatusCode::SERVICE_UNAVAILABLE,
                [("content-type", "text/plain; charset=utf-8")],
                "Metrics not initialized".to_string(),
            )
        },
        |handle| {
            let metrics = handle.render();
            (
                StatusCode::OK,
                [("content-type", "text/plain; charset=utf-8")],
                metrics,
            )
        },
    )
}

/// Records a shutdown handler failure.
pub fn record_handler_failure(handler: &str) {
    counter!(SHUTDOWN_HANDLER_FAILURES, "handler" => handler.to_string()).increment(1);
}

/// Records a recovered main-loop panic.
pub fn record_main_loop_panic() {
    counter!(MAIN_LOOP_PANICS).increment(1);
}
