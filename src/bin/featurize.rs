//! Training-data driver.
//!
//! Loads the full reading history, aggregates it into fixed windows and
//! writes two artifacts for the external classifier:
//! - `feature_spec.json`: the ordered feature-column contract
//! - `windows.json`: one record per window with its node, window start,
//!   features in contract column order, 0/1 label and train/validation side
//!   of the seeded stratified split
//!
//! Fails loudly on an empty history, on history with no usable window, and
//! on degenerate labels, each with a distinct message.

use std::fs;

use anyhow::{Context, Result};
use dotenvy::dotenv;
use sqlx::postgres::PgPoolOptions;

use smartnet_pipeline::{
    aggregate::aggregate,
    config,
    features::{FeatureContract, FEATURE_SPEC_FILE},
    logging,
    store::{PgStore, ReadingStore},
    training::{TrainingDataset, TrainingSet, DEFAULT_SPLIT_SEED, DEFAULT_TEST_FRACTION},
    TrainingError,
};

const WINDOWS_FILE: &str = "windows.json";

// ---

#[tokio::main]
async fn main() -> Result<()> {
    // ---
    dotenv().ok();
    logging::init_tracing();

    let cfg = config::load_from_env()?;
    cfg.log_config();

    let pool = PgPoolOptions::new()
        .max_connections(cfg.db_pool_max)
        .connect(&cfg.db_url)
        .await
        .with_context(|| {
            format!(
                "Failed to connect to database '{}'",
                config::mask_db_url(&cfg.db_url)
            )
        })?;
    let store = PgStore::new(pool);

    let history = store
        .load_history()
        .await
        .context("Failed to load reading history")?;

    let aggregation = aggregate(&history, cfg.window)
        .context("Aggregation failed; run the simulator or ingest readings first")?;

    let contract = FeatureContract::default();
    let set = match TrainingSet::prepare(&aggregation, &contract) {
        Ok(set) => set,
        Err(e @ TrainingError::DegenerateLabels { .. }) => {
            return Err(e).context(
                "No usable signal: labels are all identical, a classifier cannot be evaluated",
            );
        }
        Err(e) => return Err(e).context("No usable training data"),
    };

    let dataset =
        TrainingDataset::build(&aggregation, &set, DEFAULT_TEST_FRACTION, DEFAULT_SPLIT_SEED)?;

    let spec_path = cfg.artifacts_dir.join(FEATURE_SPEC_FILE);
    contract
        .save(&spec_path)
        .with_context(|| format!("Failed to write {}", spec_path.display()))?;

    let windows_path = cfg.artifacts_dir.join(WINDOWS_FILE);
    fs::write(&windows_path, serde_json::to_string_pretty(&dataset)?)
        .with_context(|| format!("Failed to write {}", windows_path.display()))?;

    let balance = aggregation.label_balance();
    tracing::info!(
        "Wrote {} windows ({} failing / {} healthy; {} train / {} validation) to {}",
        dataset.records.len(),
        balance.positive,
        balance.negative,
        dataset.train_size,
        dataset.validation_size,
        windows_path.display()
    );

    Ok(())
}
