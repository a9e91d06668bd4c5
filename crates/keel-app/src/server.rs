//! Administrative HTTP server.
//!
//! Serves readiness, healthiness, metrics, and debug endpoints on the
//! admin port (default 9000). Routes are toggled by [`AdminConfig`] flags.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::body::Body;
use axum::extract::State;
use axum::http::header::HeaderName;
use axum::http::{HeaderValue, Request, StatusCode};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;

use keel_core::{Error, RequestScope, Result};

use crate::config::AdminConfig;
use crate::probe::ProbeGroup;

/// Lower-cased request-id header echoed on every response.
const REQUEST_ID_HEADER: HeaderName = HeaderName::from_static("x-requestid");

/// Shared state for admin request handlers.
#[derive(Clone)]
pub struct AdminState {
    /// Readiness probe group, bound to `/ready`.
    pub readiness: Arc<ProbeGroup>,
    /// Healthiness probe group, bound to `/healthy`.
    pub healthiness: Arc<ProbeGroup>,
}

impl std::fmt::Debug for AdminState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdminState")
            .field("readiness", &self.readiness.name())
            .field("healthiness", &self.healthiness.name())
            .finish()
    }
}

/// Probe endpoint handler for `/ready`.
async fn ready(State(state): State<AdminState>) -> Response {
    narrate_group(&state.readiness)
}

/// Probe endpoint handler for `/healthy`.
async fn healthy(State(state): State<AdminState>) -> Response {
    narrate_group(&state.healthiness)
}

fn narrate_group(group: &ProbeGroup) -> Response {
    let (ok, text) = group.narrate();
    let status = if ok {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status, text).into_response()
}

/// Middleware installing a [`RequestScope`] into request extensions.
///
/// Values arrive through `X-TRACEID` / `X-PROBABILITYSAMPLE` /
/// `X-REQUESTID`; absent or malformed parts are synthesized. The request
/// id is echoed on the response.
pub async fn request_scope_middleware(mut request: Request<Body>, next: Next) -> Response {
    let headers = request.headers();
    let scope = RequestScope::from_header_values(
        headers.get("x-traceid").and_then(|v| v.to_str().ok()),
        headers
            .get("x-probabilitysample")
            .and_then(|v| v.to_str().ok()),
        headers.get("x-requestid").and_then(|v| v.to_str().ok()),
    );
    let request_id = scope.request_id.to_string();
    request.extensions_mut().insert(scope);

    let mut response = next.run(request).await;
    if let Ok(value) = HeaderValue::from_str(&request_id) {
        response.headers_mut().insert(REQUEST_ID_HEADER, value);
    }
    response
}

/// Builds the admin router for the given configuration.
#[must_use]
pub fn admin_router(config: &AdminConfig, state: AdminState) -> Router {
    let mut router = Router::new();

    if config.with_probes {
        router = router
            .route("/ready", get(ready))
            .route("/healthy", get(healthy));
    }
    if config.with_metrics {
        router = router.route("/metrics", get(crate::metrics::serve_metrics));
    }
    if config.with_debug_urls {
        router = router
            .route("/debug/dump/memstats", get(crate::debug::dump_memstats))
            .route("/debug/dump/tasks", get(crate::debug::dump_tasks));
    }

    router
        .layer(middleware::from_fn(request_scope_middleware))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Binds the admin port and serves until `cancel` fires.
///
/// # Errors
///
/// Returns an error when the port cannot be bound or the server fails.
pub async fn serve(
    config: &AdminConfig,
    state: AdminState,
    cancel: CancellationToken,
) -> Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let router = admin_router(config, state);

    tracing::info!(port = config.port, "starting admin server");

    let listener = tokio::net::TcpListener::bind(addr).await.map_err(|e| {
        Error::build()
            .op("adminserver.bind")
            .kv("port", config.port)
            .source(e)
            .finish()
            .unwrap_or_else(|| Error::internal("failed to bind admin port"))
    })?;

    axum::serve(listener, router)
        .with_graceful_shutdown(cancel.cancelled_owned())
        .await
        .map_err(|e| {
            Error::build()
                .op("adminserver.serve")
                .source(e)
                .finish()
                .unwrap_or_else(|| Error::internal("admin server failed"))
        })
}
