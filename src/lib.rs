//! Network sensor telemetry pipeline.
//!
//! - [`tracker`]: last known status per node (real-time path)
//! - [`aggregate`] and [`stats`]: windowed features and failure labels
//!   from history (batch path)
//! - [`features`]: the persisted feature-column contract
//! - [`generator`]: synthetic telemetry with a degradation/failure model
//! - [`training`]: the seam to an external classifier
//!
//! [`routes`], [`store`] and [`schema`] adapt the core to HTTP and
//! PostgreSQL.

pub mod aggregate;
pub mod config;
pub mod error;
pub mod features;
pub mod generator;
pub mod logging;
pub mod models;
pub mod routes;
pub mod schema;
pub mod stats;
pub mod store;
pub mod tracker;
pub mod training;

pub use config::Config;
pub use error::{
    AggregateError, ApiError, FeatureContractError, GeneratorError, StoreError, TrainingError,
    ValidationError,
};
pub use models::{IngestBatch, Reading, ReadingIn, StatusItem};
pub use tracker::LatestStateTracker;
