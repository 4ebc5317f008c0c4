//! `GET /status`: last known status of every node, sorted by node id.
//! `GET /status/stats`: tracker counters, including discarded stale
//! readings.

use axum::{extract::State, routing::get, Json, Router};

use super::AppState;
use crate::models::StatusItem;
use crate::store::ReadingStore;
use crate::tracker::TrackerStats;

pub fn router<S: ReadingStore>() -> Router<AppState<S>> {
    // ---
    Router::new()
        .route("/status", get(status::<S>))
        .route("/status/stats", get(stats::<S>))
}

async fn status<S: ReadingStore>(State(state): State<AppState<S>>) -> Json<Vec<StatusItem>> {
    Json(state.tracker.snapshot())
}

async fn stats<S: ReadingStore>(State(state): State<AppState<S>>) -> Json<TrackerStats> {
    Json(state.tracker.stats())
}
