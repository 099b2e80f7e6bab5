//! HTTP router and handlers

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::State,
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::get,
};
use serde_json::json;
use tower_http::{catch_panic::CatchPanicLayer, trace::TraceLayer};
use tracing::error;

use crate::cache::SharedResult;
use crate::service::SupplyService;

/// Shared application state
pub struct AppState {
    /// Supply read service
    pub service: Arc<SupplyService>,
}

/// Create the router
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/v2/circulating", get(circulating_handler))
        .route("/v2/total", get(total_handler))
        .route("/v2/max", get(max_handler))
        .layer(CatchPanicLayer::new())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// GET /health - liveness plus cache counters
async fn health_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "cache": state.service.cache_stats(),
    }))
}

/// GET /v2/circulating - circulating supply as plain text
async fn circulating_handler(State(state): State<Arc<AppState>>) -> Response {
    render_supply(state.service.circulating().await)
}

/// GET /v2/total - total supply as plain text
async fn total_handler(State(state): State<Arc<AppState>>) -> Response {
    render_supply(state.service.total().await)
}

/// GET /v2/max - max supply as plain text
async fn max_handler(State(state): State<Arc<AppState>>) -> Response {
    render_supply(state.service.max_supply().await)
}

/// Render a supply figure in plain decimal notation, or the underlying
/// error with its original message preserved for diagnosis
fn render_supply(result: SharedResult<f64>) -> Response {
    match result {
        Ok(value) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
            // f64 Display renders fixed decimal notation with minimal
            // digits, never scientific
            value.to_string(),
        )
            .into_response(),
        Err(e) => {
            error!(error = %e, "Supply computation failed");
            (e.status_code(), e.to_string()).into_response()
        }
    }
}
