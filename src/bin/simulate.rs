//! Sensor simulator: streams synthetic telemetry batches to `/ingest`.
//!
//! Every `--period` seconds one reading per node is generated and POSTed.
//! Transport failures are logged and the stream carries on. With a fixed
//! `--seed` the sequence of readings is reproducible (timestamps aside).

use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use dotenvy::dotenv;

use smartnet_pipeline::{
    generator::{
        node_ids, GeneratorParams, TelemetryGenerator, DEFAULT_DEGRADE_PROBABILITY,
        DEFAULT_FAILURE_BIAS,
    },
    logging,
};

#[derive(Debug, Parser)]
#[command(name = "simulate", about = "Synthetic sensor stream for the SmartNet pipeline")]
struct Args {
    /// Base URL of the ingestion API (without /ingest).
    #[arg(long, default_value = "http://127.0.0.1:8080")]
    api: String,

    /// Number of simulated nodes.
    #[arg(long, default_value_t = 3)]
    nodes: usize,

    /// Seconds between batches.
    #[arg(long, default_value_t = 2.0)]
    period: f64,

    /// Probability that a reading falls in a degradation episode.
    #[arg(long, default_value_t = DEFAULT_DEGRADE_PROBABILITY)]
    degrade: f64,

    /// Floor pushed into the failure probability.
    #[arg(long, default_value_t = DEFAULT_FAILURE_BIAS)]
    failure_bias: f64,

    /// RNG seed.
    #[arg(long, default_value_t = 42, conflicts_with = "random_seed")]
    seed: u64,

    /// Seed from OS entropy instead of --seed.
    #[arg(long)]
    random_seed: bool,

    /// Stop after this many batches (runs forever when omitted).
    #[arg(long)]
    max_batches: Option<u64>,
}

// ---

#[tokio::main]
async fn main() -> Result<()> {
    // ---
    dotenv().ok();
    logging::init_tracing();
    let args = Args::parse();

    if !(args.period.is_finite() && args.period > 0.0) {
        anyhow::bail!("--period must be a positive number of seconds");
    }
    if args.nodes == 0 {
        anyhow::bail!("--nodes must be at least 1");
    }
    let params = GeneratorParams::new(args.degrade, args.failure_bias)?;
    let seed = (!args.random_seed).then_some(args.seed);
    let mut generator = TelemetryGenerator::new(seed)?;

    let ids = node_ids(args.nodes);
    let endpoint = format!("{}/ingest", args.api.trim_end_matches('/'));
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(5))
        .build()
        .context("Failed to build HTTP client")?;

    tracing::info!("Sending to {}", endpoint);
    tracing::info!(
        "Nodes: {:?} | period: {}s | degrade: {} | failure_bias: {} | seed: {:?}",
        ids,
        args.period,
        params.degrade_probability(),
        params.failure_bias(),
        seed
    );

    let mut interval = tokio::time::interval(Duration::from_secs_f64(args.period));
    let mut sent = 0u64;

    loop {
        interval.tick().await;
        let batch = generator.build_batch(&ids, &params);

        match client.post(&endpoint).json(&batch).send().await {
            Ok(resp) => {
                let status = resp.status();
                let body = resp.text().await.unwrap_or_default();
                let preview: String = body.chars().take(120).collect();
                tracing::info!("HTTP {} :: {}", status, preview);
            }
            Err(e) => tracing::warn!("POST {} failed: {}", endpoint, e),
        }

        sent += 1;
        if args.max_batches.is_some_and(|max| sent >= max) {
            tracing::info!("Reached max batches ({}), stopping", sent);
            break;
        }
    }

    Ok(())
}
