//! Historical aggregation: raw reading history to per-window features and
//! failure labels.
//!
//! Windows are left-closed and anchored at the Unix epoch, so a reading at
//! `t` lands in `[floor(t / w) * w, floor(t / w) * w + w)` no matter when
//! the aggregation runs. The stage holds no state; the same history always
//! produces the same rows.

use std::{cmp::Ordering, collections::BTreeMap};

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use crate::error::AggregateError;
use crate::features::{FeatureContract, FeatureMatrix};
use crate::models::Reading;
use crate::stats::MetricSummary;

// ---

/// Default width of an aggregation window.
pub const DEFAULT_WINDOW_MINUTES: i64 = 15;

pub fn default_window() -> Duration {
    Duration::minutes(DEFAULT_WINDOW_MINUTES)
}

/// Features and label of one node over one window.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WindowFeatureRow {
    // ---
    pub node_id: String,
    pub window_start: DateTime<Utc>,
    pub sample_count: usize,
    pub latency_ms: MetricSummary,
    pub jitter_ms: MetricSummary,
    pub rssi_dbm: MetricSummary,
    pub noise_dbm: MetricSummary,

    /// True when any reading in the window reported a failure.
    pub label: bool,
}

/// Count of positive and negative window labels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LabelBalance {
    pub positive: usize,
    pub negative: usize,
}

/// Output of [`aggregate`]: rows ordered by `(node_id, window_start)`.
#[derive(Debug, Clone, PartialEq)]
pub struct Aggregation {
    pub window: Duration,
    pub rows: Vec<WindowFeatureRow>,
}

impl WindowFeatureRow {
    /// Feature values in canonical column order.
    pub fn feature_vector(&self) -> [f64; 12] {
        // ---
        let [a, b, c, d] = [
            &self.latency_ms,
            &self.jitter_ms,
            &self.rssi_dbm,
            &self.noise_dbm,
        ];
        [
            a.mean, a.std, a.p95, b.mean, b.std, b.p95, c.mean, c.std, c.p95, d.mean, d.std, d.p95,
        ]
    }
}

impl Aggregation {
    /// Feature matrix in the canonical contract order.
    pub fn feature_matrix(&self) -> FeatureMatrix {
        FeatureContract::default().build_matrix(&self.rows)
    }

    /// Binary labels aligned with [`Aggregation::feature_matrix`].
    pub fn labels(&self) -> Vec<u8> {
        self.rows.iter().map(|r| u8::from(r.label)).collect()
    }

    pub fn label_balance(&self) -> LabelBalance {
        // ---
        let positive = self.rows.iter().filter(|r| r.label).count();
        LabelBalance {
            positive,
            negative: self.rows.len() - positive,
        }
    }

    /// True when every row carries the same label (including no rows at
    /// all): a classifier cannot be evaluated on such a dataset.
    pub fn is_degenerate(&self) -> bool {
        let balance = self.label_balance();
        balance.positive == 0 || balance.negative == 0
    }
}

// ---

/// Aggregate an unordered history of readings into window feature rows.
///
/// Windows holding fewer than two readings are dropped because their
/// standard deviation is undefined.
pub fn aggregate(history: &[Reading], window: Duration) -> Result<Aggregation, AggregateError> {
    // ---
    if history.is_empty() {
        return Err(AggregateError::EmptyInput);
    }
    let window_ms = window.num_milliseconds();
    if window_ms <= 0 {
        return Err(AggregateError::InvalidWindow {
            seconds: window.num_seconds(),
        });
    }

    let mut by_node: BTreeMap<&str, Vec<&Reading>> = BTreeMap::new();
    for reading in history {
        by_node.entry(reading.node_id.as_str()).or_default().push(reading);
    }

    let mut rows = Vec::new();
    let mut dropped = 0usize;

    for (node_id, mut readings) in by_node {
        readings.sort_by(|a, b| chronological(a, b));

        let mut buckets: BTreeMap<i64, Vec<&Reading>> = BTreeMap::new();
        for reading in readings {
            let start = window_start_ms(reading.timestamp, window_ms);
            buckets.entry(start).or_default().push(reading);
        }

        for (start_ms, bucket) in buckets {
            match summarize(node_id, start_ms, &bucket) {
                Some(row) => rows.push(row),
                None => dropped += 1,
            }
        }
    }

    tracing::debug!(
        "Aggregated {} readings into {} windows ({} dropped with < 2 samples)",
        history.len(),
        rows.len(),
        dropped
    );

    Ok(Aggregation { window, rows })
}

/// Epoch-aligned start of the window containing `ts`, in milliseconds.
fn window_start_ms(ts: DateTime<Utc>, window_ms: i64) -> i64 {
    ts.timestamp_millis().div_euclid(window_ms) * window_ms
}

/// Timestamp order with a total tie-break on the values, so that the
/// input order of simultaneous readings never changes the output.
fn chronological(a: &Reading, b: &Reading) -> Ordering {
    // ---
    a.timestamp
        .cmp(&b.timestamp)
        .then(a.latency_ms.total_cmp(&b.latency_ms))
        .then(a.jitter_ms.total_cmp(&b.jitter_ms))
        .then(a.rssi_dbm.total_cmp(&b.rssi_dbm))
        .then(a.noise_dbm.total_cmp(&b.noise_dbm))
        .then(a.failure.cmp(&b.failure))
}

fn summarize(node_id: &str, start_ms: i64, bucket: &[&Reading]) -> Option<WindowFeatureRow> {
    // ---
    let column = |f: fn(&Reading) -> f64| bucket.iter().map(|r| f(*r)).collect::<Vec<_>>();

    Some(WindowFeatureRow {
        node_id: node_id.to_string(),
        window_start: DateTime::from_timestamp_millis(start_ms)?,
        sample_count: bucket.len(),
        latency_ms: MetricSummary::from_samples(&column(|r| r.latency_ms))?,
        jitter_ms: MetricSummary::from_samples(&column(|r| r.jitter_ms))?,
        rssi_dbm: MetricSummary::from_samples(&column(|r| r.rssi_dbm))?,
        noise_dbm: MetricSummary::from_samples(&column(|r| r.noise_dbm))?,
        label: bucket.iter().any(|r| r.failed()),
    })
}
