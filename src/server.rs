//! HTTP server exposing the metrics registry.
//!
//! - `GET /metrics`: Prometheus text exposition of the latest samples
//! - `GET /api/samples`: the same samples as JSON
//! - `GET /healthz`: liveness probe

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::State,
    http::header,
    response::IntoResponse,
    routing::get,
};
use serde::Serialize;
use tower_http::trace::{DefaultMakeSpan, TraceLayer};

use crate::metrics::{self, MetricSample, MetricsRegistry};

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<MetricsRegistry>,
}

/// Health check response.
#[derive(Serialize)]
struct HealthResponse {
    status: String,
    samples: usize,
}

/// Create the Axum router with all routes.
pub fn create_router(state: AppState) -> Router {
    let app_state = Arc::new(state);

    Router::new()
        .route("/metrics", get(metrics_handler))
        .route("/api/samples", get(samples_handler))
        .route("/healthz", get(healthz_handler))
        .layer(TraceLayer::new_for_http().make_span_with(DefaultMakeSpan::default()))
        .with_state(app_state)
}

/// Scrape endpoint.
///
/// Takes a snapshot under the registry's read lock and renders it after the
/// lock is released.
async fn metrics_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let snapshot = state.registry.snapshot();
    tracing::trace!(samples = snapshot.len(), "Serving scrape");
    (
        [(header::CONTENT_TYPE, metrics::CONTENT_TYPE)],
        metrics::render(&snapshot),
    )
}

async fn samples_handler(State(state): State<Arc<AppState>>) -> Json<Vec<MetricSample>> {
    Json(state.registry.snapshot())
}

/// Liveness probe.
async fn healthz_handler(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        samples: state.registry.len(),
    })
}
