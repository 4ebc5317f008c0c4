// src/routes/health.rs
//! Liveness endpoints.
//!
//! `/health` is used by container orchestrators and CI to check that the
//! service answers HTTP requests; `/` is a plain welcome message. Neither
//! touches the tracker or the store.

use axum::{routing::get, Json, Router};
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{json, Value};

/// JSON response body for the `/health` endpoint.
#[derive(Serialize)]
struct HealthResponse {
    ok: bool,
    service: &'static str,
    version: &'static str,
    time_utc: DateTime<Utc>,
}

/// Handle `GET /health`.
async fn health() -> Json<HealthResponse> {
    // ---
    Json(HealthResponse {
        ok: true,
        service: env!("CARGO_PKG_NAME"),
        version: env!("CARGO_PKG_VERSION"),
        time_utc: Utc::now(),
    })
}

async fn root() -> Json<Value> {
    Json(json!({ "message": "SmartNet telemetry pipeline: POST /ingest, GET /status" }))
}

/// Create a subrouter containing `/` and `/health`.
///
/// Generic over the application state so it merges cleanly with the
/// gateway router whatever the store backend is.
pub fn router<S>() -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    Router::new()
        .route("/", get(root))
        .route("/health", get(health))
}
