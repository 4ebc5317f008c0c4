//! Feature contract: the ordered list of feature-column names shared by
//! training and inference.
//!
//! The contract is persisted as `feature_spec.json`
//! (`{"feature_columns": [...]}`). Anything that builds a feature matrix
//! reads the file and lays columns out in exactly that order, and any
//! consumer handed a matrix checks its header against the contract before
//! touching the values.

use std::{collections::HashSet, fs, path::Path};

use serde::{Deserialize, Serialize};

use crate::aggregate::WindowFeatureRow;
use crate::error::FeatureContractError;

// ---

/// File name the training driver writes the contract to.
pub const FEATURE_SPEC_FILE: &str = "feature_spec.json";

/// Canonical column order: mean, std, p95 for each metric.
pub const FEATURE_COLUMNS: [&str; 12] = [
    "latency_ms_mean",
    "latency_ms_std",
    "latency_ms_p95",
    "jitter_ms_mean",
    "jitter_ms_std",
    "jitter_ms_p95",
    "rssi_dbm_mean",
    "rssi_dbm_std",
    "rssi_dbm_p95",
    "noise_dbm_mean",
    "noise_dbm_std",
    "noise_dbm_p95",
];

#[derive(Debug, Serialize, Deserialize)]
struct ContractFile {
    feature_columns: Vec<String>,
}

/// Validated ordered list of feature columns.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureContract {
    // ---
    columns: Vec<String>,

    /// Position of each contract column in [`FEATURE_COLUMNS`].
    source_index: Vec<usize>,
}

/// Feature values laid out in contract column order, one row per window.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeatureMatrix {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<f64>>,
}

impl Default for FeatureContract {
    fn default() -> Self {
        // ---
        FeatureContract {
            columns: FEATURE_COLUMNS.iter().map(|c| c.to_string()).collect(),
            source_index: (0..FEATURE_COLUMNS.len()).collect(),
        }
    }
}

impl FeatureContract {
    /// Build a contract from an explicit column list. Every canonical
    /// column must appear exactly once; the order is kept as given.
    pub fn from_columns(columns: Vec<String>) -> Result<Self, FeatureContractError> {
        // ---
        let mut seen = HashSet::new();
        let mut source_index = Vec::with_capacity(columns.len());

        for name in &columns {
            let idx = FEATURE_COLUMNS
                .iter()
                .position(|c| c == name)
                .ok_or_else(|| FeatureContractError::UnknownColumn(name.clone()))?;
            if !seen.insert(idx) {
                return Err(FeatureContractError::DuplicateColumn(name.clone()));
            }
            source_index.push(idx);
        }

        if columns.len() != FEATURE_COLUMNS.len() {
            return Err(FeatureContractError::ColumnCount {
                expected: FEATURE_COLUMNS.len(),
                found: columns.len(),
            });
        }

        Ok(FeatureContract {
            columns,
            source_index,
        })
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Read and validate a persisted contract.
    pub fn load(path: &Path) -> Result<Self, FeatureContractError> {
        // ---
        let text = fs::read_to_string(path)?;
        let file: ContractFile = serde_json::from_str(&text)?;
        let contract = Self::from_columns(file.feature_columns)?;

        tracing::debug!("Loaded feature contract from {}", path.display());
        Ok(contract)
    }

    /// Persist the contract, creating parent directories as needed.
    pub fn save(&self, path: &Path) -> Result<(), FeatureContractError> {
        // ---
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let file = ContractFile {
            feature_columns: self.columns.clone(),
        };
        fs::write(path, serde_json::to_string_pretty(&file)?)?;

        tracing::info!("Feature contract written to {}", path.display());
        Ok(())
    }

    /// Reject a header that differs from the contract in length, names or
    /// order.
    pub fn check_columns(&self, columns: &[String]) -> Result<(), FeatureContractError> {
        // ---
        if columns.len() != self.columns.len() {
            return Err(FeatureContractError::ColumnCount {
                expected: self.columns.len(),
                found: columns.len(),
            });
        }

        match self
            .columns
            .iter()
            .zip(columns)
            .position(|(expected, found)| expected != found)
        {
            Some(position) => Err(FeatureContractError::ColumnMismatch {
                position,
                expected: self.columns[position].clone(),
                found: columns[position].clone(),
            }),
            None => Ok(()),
        }
    }

    /// Lay out window features in contract order.
    pub fn build_matrix(&self, rows: &[WindowFeatureRow]) -> FeatureMatrix {
        // ---
        let rows = rows
            .iter()
            .map(|row| {
                let values = row.feature_vector();
                self.source_index.iter().map(|&i| values[i]).collect()
            })
            .collect();

        FeatureMatrix {
            columns: self.columns.clone(),
            rows,
        }
    }
}

impl FeatureMatrix {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Subset of rows by position, keeping the header.
    pub fn select(&self, indices: &[usize]) -> FeatureMatrix {
        // ---
        FeatureMatrix {
            columns: self.columns.clone(),
            rows: indices.iter().map(|&i| self.rows[i].clone()).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;
    use crate::stats::MetricSummary;
    use chrono::{TimeZone, Utc};

    fn create_test_row() -> WindowFeatureRow {
        // ---
        let summary = |base: f64| MetricSummary {
            mean: base,
            std: base + 1.0,
            p95: base + 2.0,
        };
        WindowFeatureRow {
            node_id: "node-01".to_string(),
            window_start: Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap(),
            sample_count: 3,
            latency_ms: summary(10.0),
            jitter_ms: summary(20.0),
            rssi_dbm: summary(30.0),
            noise_dbm: summary(40.0),
            label: true,
        }
    }

    #[test]
    fn test_default_matrix_follows_canonical_order() {
        // ---
        let matrix = FeatureContract::default().build_matrix(&[create_test_row()]);

        assert_eq!(matrix.columns, FEATURE_COLUMNS);
        assert_eq!(
            matrix.rows[0],
            vec![10.0, 11.0, 12.0, 20.0, 21.0, 22.0, 30.0, 31.0, 32.0, 40.0, 41.0, 42.0]
        );
    }

    #[test]
    fn test_permuted_contract_reorders_columns() {
        // ---
        let mut columns: Vec<String> = FEATURE_COLUMNS.iter().map(|c| c.to_string()).collect();
        columns.swap(0, 11);
        let contract = FeatureContract::from_columns(columns).unwrap();

        let matrix = contract.build_matrix(&[create_test_row()]);
        assert_eq!(matrix.columns[0], "noise_dbm_p95");
        assert_eq!(matrix.rows[0][0], 42.0);
        assert_eq!(matrix.rows[0][11], 10.0);
    }

    #[test]
    fn test_invalid_contracts_rejected() {
        // ---
        let mut unknown: Vec<String> = FEATURE_COLUMNS.iter().map(|c| c.to_string()).collect();
        unknown[3] = "latency_ms_median".to_string();
        assert!(matches!(
            FeatureContract::from_columns(unknown),
            Err(FeatureContractError::UnknownColumn(_))
        ));

        let mut dup: Vec<String> = FEATURE_COLUMNS.iter().map(|c| c.to_string()).collect();
        dup[1] = dup[0].clone();
        assert!(matches!(
            FeatureContract::from_columns(dup),
            Err(FeatureContractError::DuplicateColumn(_))
        ));

        let short: Vec<String> = FEATURE_COLUMNS[..4].iter().map(|c| c.to_string()).collect();
        assert!(matches!(
            FeatureContract::from_columns(short),
            Err(FeatureContractError::ColumnCount { found: 4, .. })
        ));
    }

    #[test]
    fn test_check_columns_detects_order_violation() {
        // ---
        let contract = FeatureContract::default();
        assert!(contract.check_columns(contract.columns()).is_ok());

        let mut swapped = contract.columns().to_vec();
        swapped.swap(1, 2);
        match contract.check_columns(&swapped) {
            Err(FeatureContractError::ColumnMismatch { position, .. }) => assert_eq!(position, 1),
            other => panic!("expected ColumnMismatch, got {other:?}"),
        }
    }

    #[test]
    fn test_save_and_load() {
        // ---
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("artifacts").join(FEATURE_SPEC_FILE);

        let contract = FeatureContract::default();
        contract.save(&path).unwrap();

        let text = fs::read_to_string(&path).unwrap();
        assert!(text.contains("\"feature_columns\""));

        let loaded = FeatureContract::load(&path).unwrap();
        assert_eq!(loaded, contract);
    }

    #[test]
    fn test_load_rejects_malformed_file() {
        // ---
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(FEATURE_SPEC_FILE);
        fs::write(&path, r#"{"columns": []}"#).unwrap();

        assert!(matches!(
            FeatureContract::load(&path),
            Err(FeatureContractError::Format(_))
        ));
    }
}
