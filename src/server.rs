// Scrape endpoint HTTP API implementation
// This file exposes the prometheus registry over HTTP
//
// Numan Thabit 2025 Nov

use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Router as AxumRouter,
};
use prometheus::Registry;
use tower_http::trace::TraceLayer;
use tracing::warn;

use crate::metrics::render;

/// Create the HTTP router with the scrape and health endpoints
pub fn create_metrics_router(registry: Registry) -> AxumRouter {
    AxumRouter::new()
        .route("/health", get(health_check))
        .route("/metrics", get(scrape))
        .layer(TraceLayer::new_for_http())
        .with_state(registry)
}

/// Health check endpoint
async fn health_check() -> StatusCode {
    StatusCode::OK
}

/// Prometheus text exposition of every registered family
async fn scrape(State(registry): State<Registry>) -> Response {
    match render(&registry) {
        Ok(body) => (
            [(header::CONTENT_TYPE, prometheus::TEXT_FORMAT)],
            body,
        )
            .into_response(),
        Err(err) => {
            warn!(error = %err, "encoding metrics failed");
            (StatusCode::INTERNAL_SERVER_ERROR, err.to_string()).into_response()
        }
    }
}
