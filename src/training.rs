//! Training seam between the aggregation stage and an external
//! classifier.
//!
//! The classifier itself is a black box behind [`Classifier`] /
//! [`FailureModel`]. This module owns what surrounds it: refusing datasets
//! that cannot produce a meaningful model, keeping columns aligned with the
//! feature contract, a reproducible stratified split and ROC-AUC scoring
//! on the validation part.

use chrono::{DateTime, Utc};
use rand::{seq::SliceRandom, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::Serialize;

use crate::aggregate::{Aggregation, LabelBalance};
use crate::error::TrainingError;
use crate::features::{FeatureContract, FeatureMatrix};

// ---

pub const DEFAULT_TEST_FRACTION: f64 = 0.25;
pub const DEFAULT_SPLIT_SEED: u64 = 42;

/// Fits a [`FailureModel`] from a feature matrix and binary labels.
pub trait Classifier {
    type Model: FailureModel;
    type Error: std::error::Error + Send + Sync + 'static;

    fn fit(&self, x: &FeatureMatrix, y: &[u8]) -> Result<Self::Model, Self::Error>;
}

/// A fitted model returning the probability of the positive class per row.
pub trait FailureModel {
    fn predict_proba(&self, x: &FeatureMatrix) -> Vec<f64>;
}

/// Contract-aligned features and labels ready for a classifier.
#[derive(Debug, Clone, PartialEq)]
pub struct TrainingSet {
    pub features: FeatureMatrix,
    pub labels: Vec<u8>,
}

/// Which side of the stratified split a window fell on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Split {
    Train,
    Validation,
}

/// One window as handed to the classifier: contract-ordered features and a
/// 0/1 label, tagged with where it came from.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DatasetRecord {
    pub node_id: String,
    pub window_start: DateTime<Utc>,
    pub split: Split,
    pub features: Vec<f64>,
    pub label: u8,
}

/// Serializable training dataset: the feature columns, the seeded split
/// parameters and one record per window.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrainingDataset {
    // ---
    pub window_minutes: i64,
    pub test_fraction: f64,
    pub split_seed: u64,
    pub columns: Vec<String>,
    pub train_size: usize,
    pub validation_size: usize,
    pub records: Vec<DatasetRecord>,
}

/// Result of [`train_and_evaluate`].
#[derive(Debug)]
pub struct Evaluation<M> {
    pub model: M,
    pub train_size: usize,
    pub validation_size: usize,
    /// `None` when the validation split holds a single class.
    pub validation_auc: Option<f64>,
}

impl TrainingSet {
    /// Build a training set from aggregated windows, failing on an empty
    /// result or on labels that are all identical.
    pub fn prepare(
        aggregation: &Aggregation,
        contract: &FeatureContract,
    ) -> Result<Self, TrainingError> {
        // ---
        if aggregation.rows.is_empty() {
            return Err(TrainingError::NoWindows);
        }

        let LabelBalance { positive, negative } = aggregation.label_balance();
        if positive == 0 || negative == 0 {
            return Err(TrainingError::DegenerateLabels {
                label: u8::from(positive > 0),
                count: positive + negative,
            });
        }

        tracing::info!(
            "Training set: {} windows ({} failing, {} healthy)",
            positive + negative,
            positive,
            negative
        );

        Ok(TrainingSet {
            features: contract.build_matrix(&aggregation.rows),
            labels: aggregation.labels(),
        })
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// Stratified split into (train, validation). Each class is shuffled
    /// with a seeded RNG and `test_fraction` of it, rounded, goes to
    /// validation.
    pub fn stratified_split(
        &self,
        test_fraction: f64,
        seed: u64,
    ) -> Result<(TrainingSet, TrainingSet), TrainingError> {
        // ---
        let (train, validation) = self.split_indices(test_fraction, seed)?;
        Ok((self.subset(&train), self.subset(&validation)))
    }

    /// Row indices of the (train, validation) parts, each ascending.
    pub fn split_indices(
        &self,
        test_fraction: f64,
        seed: u64,
    ) -> Result<(Vec<usize>, Vec<usize>), TrainingError> {
        // ---
        if !(test_fraction > 0.0 && test_fraction < 1.0) {
            return Err(TrainingError::InvalidSplit(test_fraction));
        }

        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let mut train = Vec::new();
        let mut validation = Vec::new();

        for class in [0u8, 1] {
            let mut idx: Vec<usize> = (0..self.len()).filter(|&i| self.labels[i] == class).collect();
            idx.shuffle(&mut rng);

            let n_val = (idx.len() as f64 * test_fraction).round() as usize;
            validation.extend_from_slice(&idx[..n_val]);
            train.extend_from_slice(&idx[n_val..]);
        }
        train.sort_unstable();
        validation.sort_unstable();

        Ok((train, validation))
    }

    fn subset(&self, indices: &[usize]) -> TrainingSet {
        // ---
        TrainingSet {
            features: self.features.select(indices),
            labels: indices.iter().map(|&i| self.labels[i]).collect(),
        }
    }
}

impl TrainingDataset {
    /// Pair every row of `set` with its window and split side. `set` must
    /// come from [`TrainingSet::prepare`] on the same `aggregation`.
    pub fn build(
        aggregation: &Aggregation,
        set: &TrainingSet,
        test_fraction: f64,
        seed: u64,
    ) -> Result<Self, TrainingError> {
        // ---
        let (train, validation) = set.split_indices(test_fraction, seed)?;

        let mut side = vec![Split::Train; set.len()];
        for &i in &validation {
            side[i] = Split::Validation;
        }

        let records = aggregation
            .rows
            .iter()
            .zip(&set.features.rows)
            .zip(&set.labels)
            .zip(side)
            .map(|(((row, features), &label), split)| DatasetRecord {
                node_id: row.node_id.clone(),
                window_start: row.window_start,
                split,
                features: features.clone(),
                label,
            })
            .collect();

        Ok(TrainingDataset {
            window_minutes: aggregation.window.num_minutes(),
            test_fraction,
            split_seed: seed,
            columns: set.features.columns.clone(),
            train_size: train.len(),
            validation_size: validation.len(),
            records,
        })
    }
}

/// Score `x` with `model` after checking its columns against `contract`.
pub fn predict<M: FailureModel>(
    model: &M,
    contract: &FeatureContract,
    x: &FeatureMatrix,
) -> Result<Vec<f64>, TrainingError> {
    contract.check_columns(&x.columns)?;
    Ok(model.predict_proba(x))
}

/// Split, fit on the training part, report validation ROC-AUC.
pub fn train_and_evaluate<C: Classifier>(
    classifier: &C,
    set: &TrainingSet,
    contract: &FeatureContract,
    test_fraction: f64,
    seed: u64,
) -> Result<Evaluation<C::Model>, TrainingError> {
    // ---
    contract.check_columns(&set.features.columns)?;
    let (train, validation) = set.stratified_split(test_fraction, seed)?;

    let model = classifier
        .fit(&train.features, &train.labels)
        .map_err(|e| TrainingError::Classifier(Box::new(e)))?;

    let scores = predict(&model, contract, &validation.features)?;
    let validation_auc = roc_auc(&validation.labels, &scores);

    match validation_auc {
        Some(auc) => tracing::info!("Validation ROC-AUC: {:.4}", auc),
        None => tracing::warn!("Validation split holds a single class; ROC-AUC undefined"),
    }

    Ok(Evaluation {
        model,
        train_size: train.len(),
        validation_size: validation.len(),
        validation_auc,
    })
}

/// Area under the ROC curve (Mann-Whitney U with tied scores sharing
/// their average rank). `None` unless both classes are present.
pub fn roc_auc(labels: &[u8], scores: &[f64]) -> Option<f64> {
    // ---
    if labels.len() != scores.len() {
        return None;
    }
    let positives = labels.iter().filter(|&&l| l == 1).count();
    let negatives = labels.len() - positives;
    if positives == 0 || negatives == 0 {
        return None;
    }

    let mut order: Vec<usize> = (0..scores.len()).collect();
    order.sort_by(|&a, &b| scores[a].total_cmp(&scores[b]));

    let mut rank_sum = 0.0;
    let mut i = 0;
    while i < order.len() {
        let mut j = i;
        while j + 1 < order.len() && scores[order[j + 1]] == scores[order[i]] {
            j += 1;
        }
        // ranks are 1-based; ties share the average
        let avg_rank = (i + j) as f64 / 2.0 + 1.0;
        rank_sum += order[i..=j]
            .iter()
            .filter(|&&k| labels[k] == 1)
            .count() as f64
            * avg_rank;
        i = j + 1;
    }

    let p = positives as f64;
    let u = rank_sum - p * (p + 1.0) / 2.0;
    Some(u / (p * negatives as f64))
}
