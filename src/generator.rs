//! Synthetic telemetry with a two-phase degradation and failure model.
//!
//! A healthy baseline is drawn from fixed normal distributions. With
//! probability `degrade_probability` the sample is pushed into a degraded
//! regime: exponential (bursty) excess on latency and jitter, weaker RSSI
//! and a higher noise floor. Degradation only ever worsens metrics.
//!
//! The failure flag is a Bernoulli draw whose probability is a logistic
//! score of the metrics blended with `failure_bias`:
//!
//! ```text
//! score  = 0.04*lat + 0.07*jit - 0.06*rssi + 0.05*noise
//! p_fail = 0.7 * sigmoid(score - 2.5) + 0.3 * failure_bias
//! ```
//!
//! # Reproducibility
//!
//! The generator owns a `ChaCha8Rng` (rand_chacha) seeded once through
//! `SeedableRng::seed_from_u64`; normal and exponential variates come from
//! `rand_distr` (Ziggurat). Per reading the draws happen in a fixed order:
//! four baseline normals (latency, jitter, rssi, noise), one uniform for
//! the degradation decision, four degradation draws only when degraded,
//! one uniform for the failure decision. The same seed therefore yields
//! the same stream bit-for-bit with these crate versions. There is no way
//! to reseed a generator once built.

use chrono::{DateTime, Utc};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rand_distr::{Distribution, Exp, Normal};

use crate::error::GeneratorError;
use crate::models::{IngestBatch, Reading, ReadingIn};

// ---

const LATENCY_BASE: (f64, f64) = (20.0, 5.0);
const JITTER_BASE: (f64, f64) = (3.0, 1.0);
const RSSI_BASE: (f64, f64) = (-65.0, 4.0);
const NOISE_BASE: (f64, f64) = (-90.0, 3.0);

/// Mean of the exponential excess added to latency / jitter when degraded.
const LATENCY_BURST_MEAN: f64 = 20.0;
const JITTER_BURST_MEAN: f64 = 5.0;
const RSSI_DROP: (f64, f64) = (-6.0, 2.0);
const NOISE_RISE: (f64, f64) = (6.0, 2.0);

const SCORE_WEIGHTS: [f64; 4] = [0.04, 0.07, -0.06, 0.05];
const SCORE_THRESHOLD: f64 = 2.5;
const MODEL_WEIGHT: f64 = 0.7;
const BIAS_WEIGHT: f64 = 0.3;

pub const DEFAULT_DEGRADE_PROBABILITY: f64 = 0.12;
pub const DEFAULT_FAILURE_BIAS: f64 = 0.05;

/// Validated knobs of the degradation model.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeneratorParams {
    degrade_probability: f64,
    failure_bias: f64,
}

impl Default for GeneratorParams {
    fn default() -> Self {
        GeneratorParams {
            degrade_probability: DEFAULT_DEGRADE_PROBABILITY,
            failure_bias: DEFAULT_FAILURE_BIAS,
        }
    }
}

impl GeneratorParams {
    pub fn new(degrade_probability: f64, failure_bias: f64) -> Result<Self, GeneratorError> {
        // ---
        check_probability("degrade_probability", degrade_probability)?;
        check_probability("failure_bias", failure_bias)?;

        Ok(GeneratorParams {
            degrade_probability,
            failure_bias,
        })
    }

    pub fn degrade_probability(&self) -> f64 {
        self.degrade_probability
    }

    pub fn failure_bias(&self) -> f64 {
        self.failure_bias
    }
}

fn check_probability(name: &'static str, value: f64) -> Result<(), GeneratorError> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(GeneratorError::InvalidProbability { name, value })
    }
}

/// Node identifiers `node-01`, `node-02`, ... for `count` nodes.
pub fn node_ids(count: usize) -> Vec<String> {
    (1..=count).map(|i| format!("node-{i:02}")).collect()
}

struct Distributions {
    latency: Normal<f64>,
    jitter: Normal<f64>,
    rssi: Normal<f64>,
    noise: Normal<f64>,
    latency_burst: Exp<f64>,
    jitter_burst: Exp<f64>,
    rssi_drop: Normal<f64>,
    noise_rise: Normal<f64>,
}

impl Distributions {
    fn new() -> Result<Self, GeneratorError> {
        // ---
        let normal = |(mean, sd): (f64, f64)| {
            Normal::new(mean, sd).map_err(|e| GeneratorError::Distribution(e.to_string()))
        };
        let exp = |mean: f64| {
            Exp::new(1.0 / mean).map_err(|e| GeneratorError::Distribution(e.to_string()))
        };

        Ok(Distributions {
            latency: normal(LATENCY_BASE)?,
            jitter: normal(JITTER_BASE)?,
            rssi: normal(RSSI_BASE)?,
            noise: normal(NOISE_BASE)?,
            latency_burst: exp(LATENCY_BURST_MEAN)?,
            jitter_burst: exp(JITTER_BURST_MEAN)?,
            rssi_drop: normal(RSSI_DROP)?,
            noise_rise: normal(NOISE_RISE)?,
        })
    }
}

/// Seeded telemetry source. One handle per independent stream.
pub struct TelemetryGenerator {
    rng: ChaCha8Rng,
    dist: Distributions,
}

impl TelemetryGenerator {
    /// Build a generator seeded with `seed`, or from OS entropy when
    /// `None`.
    pub fn new(seed: Option<u64>) -> Result<Self, GeneratorError> {
        // ---
        let rng = match seed {
            Some(seed) => ChaCha8Rng::seed_from_u64(seed),
            None => ChaCha8Rng::from_entropy(),
        };

        Ok(TelemetryGenerator {
            rng,
            dist: Distributions::new()?,
        })
    }

    /// One reading for `node_id`, stamped with the current time.
    pub fn generate(&mut self, node_id: &str, params: &GeneratorParams) -> Reading {
        self.generate_at(node_id, params, Utc::now())
    }

    pub fn generate_at(
        &mut self,
        node_id: &str,
        params: &GeneratorParams,
        at: DateTime<Utc>,
    ) -> Reading {
        // ---
        let d = &self.dist;
        let rng = &mut self.rng;

        let mut lat = d.latency.sample(rng);
        let mut jit = d.jitter.sample(rng);
        let mut rssi = d.rssi.sample(rng);
        let mut noise = d.noise.sample(rng);

        if rng.gen::<f64>() < params.degrade_probability {
            lat += d.latency_burst.sample(rng);
            jit += d.jitter_burst.sample(rng);
            rssi += d.rssi_drop.sample(rng);
            noise += d.noise_rise.sample(rng);
        }

        let p_fail = failure_probability([lat, jit, rssi, noise], params.failure_bias);

        Reading {
            node_id: node_id.to_string(),
            timestamp: at,
            latency_ms: lat.max(0.0),
            jitter_ms: jit.max(0.0),
            rssi_dbm: rssi,
            noise_dbm: noise,
            failure: Some(rng.gen::<f64>() < p_fail),
        }
    }

    /// One reading per node, shaped as an `/ingest` body.
    pub fn build_batch(&mut self, node_ids: &[String], params: &GeneratorParams) -> IngestBatch {
        // ---
        IngestBatch {
            readings: node_ids
                .iter()
                .map(|id| ReadingIn::from(self.generate(id, params)))
                .collect(),
        }
    }
}

/// Blended failure probability for (latency, jitter, rssi, noise). The
/// score uses the unclamped metrics.
pub fn failure_probability(metrics: [f64; 4], failure_bias: f64) -> f64 {
    // ---
    let score: f64 = metrics
        .iter()
        .zip(SCORE_WEIGHTS)
        .map(|(m, w)| m * w)
        .sum();
    let sigmoid = 1.0 / (1.0 + (-(score - SCORE_THRESHOLD)).exp());

    MODEL_WEIGHT * sigmoid + BIAS_WEIGHT * failure_bias
}
