//! HTTP surface for the retrieval gateway.
//!
//! Four routes: `/healthz` (liveness only), `/readyz` (503 until at
//! least one source is configured), `/metrics` (JSON counter
//! exposition), and `POST /search`. Search responses carry fused items
//! or an error envelope; limiter and breaker internals are visible only
//! through `/metrics`, never in a search response.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};

use rankgate_core::{Controller, FusedItem, GatewayError};

#[derive(Clone)]
pub struct AppState {
    pub controller: Arc<Controller>,
    pub default_k: usize,
}

#[derive(serde::Deserialize)]
pub struct SearchRequest {
    query: String,
    #[serde(default)]
    k: Option<usize>,
}

#[derive(serde::Serialize)]
pub struct SearchResponse {
    items: Vec<FusedItem>,
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .route("/metrics", get(metrics))
        .route("/search", post(search))
        .with_state(state)
}

/// Bind and serve until the process is stopped.
pub async fn run_server(state: AppState, port: u16) -> anyhow::Result<()> {
    let addr = format!("0.0.0.0:{port}");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    let local_addr = listener.local_addr()?;

    let app = build_router(state);
    tracing::info!("rankgate listening on http://{local_addr}");
    axum::serve(listener, app).await?;
    Ok(())
}

async fn healthz() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}

async fn readyz(State(state): State<AppState>) -> impl IntoResponse {
    if state.controller.source_count() > 0 {
        (
            StatusCode::OK,
            Json(serde_json::json!({ "ready": true })),
        )
    } else {
        (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(serde_json::json!({ "ready": false, "error": "no sources configured" })),
        )
    }
}

async fn metrics(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.controller.metrics_snapshot())
}

async fn search(
    State(state): State<AppState>,
    Json(body): Json<SearchRequest>,
) -> impl IntoResponse {
    let query = body.query.trim();
    if query.is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(serde_json::json!({ "error": "query must not be empty" })),
        )
            .into_response();
    }
    let k = body.k.unwrap_or(state.default_k);
    if k == 0 {
        return (
            StatusCode::BAD_REQUEST,
            Json(serde_json::json!({ "error": "k must be greater than 0" })),
        )
            .into_response();
    }

    match state.controller.search(query, k).await {
        Ok(items) => (StatusCode::OK, Json(SearchResponse { items })).into_response(),
        Err(err) => {
            let status = error_status(&err);
            tracing::warn!(status = status.as_u16(), error = %err, "search failed");
            (status, Json(serde_json::json!({ "error": err.to_string() }))).into_response()
        }
    }
}

/// Maps gateway errors onto the HTTP surface. Per-source failures never
/// reach here; only whole-request outcomes do.
fn error_status(err: &GatewayError) -> StatusCode {
    match err {
        GatewayError::NoSourcesAvailable => StatusCode::SERVICE_UNAVAILABLE,
        GatewayError::BudgetExceeded => StatusCode::GATEWAY_TIMEOUT,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}
