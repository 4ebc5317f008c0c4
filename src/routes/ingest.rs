//! `POST /ingest`: validate a batch, append it to history, update the live
//! status view.

use axum::{extract::State, routing::post, Json, Router};
use serde::Serialize;
use tracing::{debug, info};

use super::AppState;
use crate::error::ApiError;
use crate::models::IngestBatch;
use crate::store::ReadingStore;
use crate::tracker::UpsertOutcome;

// ---

#[derive(Debug, Serialize)]
struct IngestResponse {
    /// Rows appended to the history store.
    inserted: u64,
    /// Readings that became their node's current status.
    accepted: usize,
    /// Readings older than their node's current status.
    stale: usize,
}

pub fn router<S: ReadingStore>() -> Router<AppState<S>> {
    Router::new().route("/ingest", post(handler::<S>))
}

async fn handler<S: ReadingStore>(
    State(state): State<AppState<S>>,
    Json(batch): Json<IngestBatch>,
) -> Result<Json<IngestResponse>, ApiError> {
    // ---
    let readings = batch.into_readings(state.tracker.now())?;
    debug!("POST /ingest - {} readings validated", readings.len());

    // History before live view: a failed write leaves the tracker untouched
    let inserted = state.store.insert_batch(&readings).await?;

    let (mut accepted, mut stale) = (0, 0);
    for reading in readings {
        match state.tracker.upsert(reading) {
            UpsertOutcome::Stale => stale += 1,
            UpsertOutcome::Inserted | UpsertOutcome::Replaced => accepted += 1,
        }
    }

    info!(
        "POST /ingest - inserted {}, accepted {}, stale {}",
        inserted, accepted, stale
    );
    Ok(Json(IngestResponse {
        inserted,
        accepted,
        stale,
    }))
}
