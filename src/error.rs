//! Error taxonomy for the telemetry pipeline.
//!
//! Library code returns the typed errors below; the binaries wrap them in
//! `anyhow` with context. [`ApiError`] is the only type that knows about
//! HTTP and maps every failure onto a status code and JSON body.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

// ---

/// A reading or batch rejected at the ingestion boundary.
#[derive(Debug, Error, PartialEq)]
pub enum ValidationError {
    #[error("batch must contain at least one reading")]
    EmptyBatch,

    #[error("node_id must be 1-64 characters, got {len}")]
    NodeIdLength { len: usize },

    #[error("{field} must be a non-negative number, got {value}")]
    Negative { field: &'static str, value: f64 },

    #[error("{field} must be finite, got {value}")]
    NotFinite { field: &'static str, value: f64 },

    #[error("reading {index}: {source}")]
    InBatch {
        index: usize,
        #[source]
        source: Box<ValidationError>,
    },
}

/// Failures of the historical aggregation stage.
#[derive(Debug, Error, PartialEq)]
pub enum AggregateError {
    #[error("no history to aggregate; ingest readings before training")]
    EmptyInput,

    #[error("window size must be positive, got {seconds}s")]
    InvalidWindow { seconds: i64 },
}

/// Violations of the persisted feature-column contract.
#[derive(Debug, Error)]
pub enum FeatureContractError {
    #[error("unknown feature column '{0}'")]
    UnknownColumn(String),

    #[error("duplicate feature column '{0}'")]
    DuplicateColumn(String),

    #[error("feature contract lists {found} columns, expected {expected}")]
    ColumnCount { expected: usize, found: usize },

    #[error("column {position} is '{found}', contract requires '{expected}'")]
    ColumnMismatch {
        position: usize,
        expected: String,
        found: String,
    },

    #[error("feature contract I/O: {0}")]
    Io(#[from] std::io::Error),

    #[error("feature contract format: {0}")]
    Format(#[from] serde_json::Error),
}

/// Invalid telemetry generator configuration.
#[derive(Debug, Error)]
pub enum GeneratorError {
    #[error("{name} must be within [0, 1], got {value}")]
    InvalidProbability { name: &'static str, value: f64 },

    #[error("invalid distribution parameters: {0}")]
    Distribution(String),
}

/// Failures of the history store collaborator.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Reasons a training run cannot proceed.
///
/// Kept apart from [`StoreError`] so a driver can tell "the pipeline
/// produced no usable signal" from "the pipeline crashed".
#[derive(Debug, Error)]
pub enum TrainingError {
    #[error(transparent)]
    Aggregate(#[from] AggregateError),

    #[error("aggregation produced no window with at least two readings")]
    NoWindows,

    #[error("all {count} windows carry label {label}; adjust degrade probability or failure bias")]
    DegenerateLabels { label: u8, count: usize },

    #[error("test fraction must be within (0, 1), got {0}")]
    InvalidSplit(f64),

    #[error(transparent)]
    Contract(#[from] FeatureContractError),

    #[error("classifier failed: {0}")]
    Classifier(#[source] Box<dyn std::error::Error + Send + Sync>),
}

// ---

/// Error returned by HTTP handlers.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        // ---
        let (status, message) = match &self {
            ApiError::Validation(e) => (StatusCode::UNPROCESSABLE_ENTITY, e.to_string()),
            ApiError::Store(e) => {
                tracing::error!("Store error: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Failed to persist readings".to_string(),
                )
            }
        };

        let body = Json(json!({
            "error": message,
            "status": status.as_u16()
        }));

        (status, body).into_response()
    }
}
