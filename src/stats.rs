//! Per-metric statistical reduction used by the window aggregator.
//!
//! Each statistic is a standalone pure function so the quantile method is
//! a single decision made here: percentiles use linear interpolation
//! between closest ranks (`rank = q * (n - 1)`), the same convention as
//! NumPy's and pandas' defaults.

use serde::Serialize;

// ---

/// Quantile reported for every metric.
pub const P95: f64 = 0.95;

/// Mean, sample standard deviation and 95th percentile of one metric
/// inside one window.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MetricSummary {
    pub mean: f64,
    pub std: f64,
    pub p95: f64,
}

impl MetricSummary {
    /// Summarize `samples`, or `None` when fewer than two samples make the
    /// standard deviation undefined.
    pub fn from_samples(samples: &[f64]) -> Option<Self> {
        // ---
        let std = sample_std_dev(samples)?;
        let mut sorted = samples.to_vec();
        sorted.sort_by(f64::total_cmp);

        Some(MetricSummary {
            mean: mean(samples)?,
            std,
            p95: percentile(&sorted, P95)?,
        })
    }
}

/// Arithmetic mean; `None` for an empty slice.
pub fn mean(samples: &[f64]) -> Option<f64> {
    if samples.is_empty() {
        return None;
    }
    Some(samples.iter().sum::<f64>() / samples.len() as f64)
}

/// Sample standard deviation with Bessel's correction (n - 1); `None`
/// below two samples.
pub fn sample_std_dev(samples: &[f64]) -> Option<f64> {
    // ---
    if samples.len() < 2 {
        return None;
    }
    let m = mean(samples)?;
    let ss: f64 = samples.iter().map(|x| (x - m) * (x - m)).sum();
    Some((ss / (samples.len() - 1) as f64).sqrt())
}

/// Quantile `q` of an ascending-sorted slice by linear interpolation.
pub fn percentile(sorted: &[f64], q: f64) -> Option<f64> {
    // ---
    if sorted.is_empty() || !(0.0..=1.0).contains(&q) {
        return None;
    }

    let rank = q * (sorted.len() - 1) as f64;
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    let frac = rank - lo as f64;

    Some(sorted[lo] + frac * (sorted[hi] - sorted[lo]))
}
