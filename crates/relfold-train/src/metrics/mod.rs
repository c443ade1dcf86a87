//! Metrics for scoring relation-classification predictions.
//!
//! Every metric consumes a [`PredictionBatch`]: an `N x C` probability matrix
//! and the `N` gold class indices. Scores are reported in percent.

use crate::{TrainError, TrainResult};
use scirs2_core::ndarray::{Array2, ArrayView1};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// Key of the micro F1 score in exported metric maps.
pub const MICRO_F1_KEY: &str = "micro f1 score";
/// Key of the AUPRC score in exported metric maps.
pub const AUPRC_KEY: &str = "auprc";
/// Key of the accuracy score in exported metric maps.
pub const ACCURACY_KEY: &str = "accuracy";
/// All exported metric keys.
pub const METRIC_KEYS: [&str; 3] = [MICRO_F1_KEY, AUPRC_KEY, ACCURACY_KEY];

/// Trait for metrics.
pub trait Metric {
    /// Compute metric value.
    fn compute(&self, batch: &PredictionBatch) -> TrainResult<f64>;

    /// Get metric name.
    fn name(&self) -> &str;
}

/// Class probabilities paired with gold labels.
#[derive(Debug, Clone, PartialEq)]
pub struct PredictionBatch {
    probabilities: Array2<f64>,
    labels: Vec<usize>,
}

/// On-disk form of a [`PredictionBatch`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredictionFile {
    /// One probability row per example.
    pub probabilities: Vec<Vec<f64>>,
    /// Gold class index per example.
    pub labels: Vec<usize>,
}

impl PredictionBatch {
    /// Pair a probability matrix with gold labels.
    ///
    /// Fails with `ShapeError` if the row count differs from the label count.
    pub fn new(probabilities: Array2<f64>, labels: Vec<usize>) -> TrainResult<Self> {
        if probabilities.nrows() != labels.len() {
            return Err(TrainError::ShapeError(format!(
                "{} prediction rows for {} gold labels",
                probabilities.nrows(),
                labels.len()
            )));
        }
        Ok(Self {
            probabilities,
            labels,
        })
    }

    /// Build from nested rows (as read from a prediction file).
    pub fn from_rows(rows: Vec<Vec<f64>>, labels: Vec<usize>) -> TrainResult<Self> {
        let n_rows = rows.len();
        let n_cols = rows.first().map_or(0, Vec::len);
        if let Some((i, row)) = rows.iter().enumerate().find(|(_, r)| r.len() != n_cols) {
            return Err(TrainError::ShapeError(format!(
                "row {} has {} columns, expected {}",
                i,
                row.len(),
                n_cols
            )));
        }
        let flat: Vec<f64> = rows.into_iter().flatten().collect();
        let probabilities = Array2::from_shape_vec((n_rows, n_cols), flat)
            .map_err(|e| TrainError::ShapeError(e.to_string()))?;
        Self::new(probabilities, labels)
    }

    /// Load a JSON prediction file.
    pub fn load<P: AsRef<Path>>(path: P) -> TrainResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            TrainError::ConfigError(format!(
                "Failed to read predictions {}: {}",
                path.display(),
                e
            ))
        })?;
        let file: PredictionFile = serde_json::from_str(&content).map_err(|e| {
            TrainError::ConfigError(format!(
                "Failed to parse predictions {}: {}",
                path.display(),
                e
            ))
        })?;
        Self::from_rows(file.probabilities, file.labels)
    }

    /// Convert to the on-disk form.
    pub fn to_file(&self) -> PredictionFile {
        PredictionFile {
            probabilities: self
                .probabilities
                .rows()
                .into_iter()
                .map(|row| row.to_vec())
                .collect(),
            labels: self.labels.clone(),
        }
    }

    /// Probability matrix (`N x C`).
    pub fn probabilities(&self) -> &Array2<f64> {
        &self.probabilities
    }

    /// Gold class indices.
    pub fn labels(&self) -> &[usize] {
        &self.labels
    }

    /// Number of examples.
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    /// Whether the batch has no examples.
    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// Number of classes (columns).
    pub fn num_classes(&self) -> usize {
        self.probabilities.ncols()
    }

    /// Predicted class per example (argmax, lowest index on ties).
    pub fn predictions(&self) -> Vec<usize> {
        self.probabilities.rows().into_iter().map(argmax).collect()
    }
}

/// Index of the largest value; ties go to the lowest index and NaN never wins.
pub(crate) fn argmax(row: ArrayView1<f64>) -> usize {
    let mut best = 0;
    let mut best_value = f64::NEG_INFINITY;
    for (j, &value) in row.iter().enumerate() {
        if value > best_value {
            best_value = value;
            best = j;
        }
    }
    best
}

// Module declarations
mod basic;
mod ranking;

pub use basic::{Accuracy, MicroF1};
pub use ranking::{precision_recall_curve, Auprc, ClassAuprc, MetricDegenerate, PrCurve};

/// The three scores reported per evaluation, in percent.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MetricScores {
    /// Micro F1 over non-null relations.
    pub micro_f1: f64,
    /// Mean one-vs-rest AUPRC over all classes.
    pub auprc: f64,
    /// Exact-match accuracy.
    pub accuracy: f64,
}

impl MetricScores {
    /// Export as a name → value map.
    pub fn to_map(&self) -> BTreeMap<String, f64> {
        [
            (MICRO_F1_KEY.to_string(), self.micro_f1),
            (AUPRC_KEY.to_string(), self.auprc),
            (ACCURACY_KEY.to_string(), self.accuracy),
        ]
        .into_iter()
        .collect()
    }
}

/// Scorer combining micro F1, AUPRC and accuracy for a fixed label space.
#[derive(Debug, Clone)]
pub struct RelationMetrics {
    num_labels: usize,
    micro_f1: MicroF1,
    auprc: Auprc,
    accuracy: Accuracy,
}

impl RelationMetrics {
    /// Scorer for `num_labels` classes with `no_relation_index` excluded from F1.
    pub fn new(num_labels: usize, no_relation_index: usize) -> Self {
        Self {
            num_labels,
            micro_f1: MicroF1::new(no_relation_index),
            auprc: Auprc,
            accuracy: Accuracy,
        }
    }

    /// Scorer for the label space of a label map.
    pub fn for_labels(labels: &crate::LabelMap) -> Self {
        Self::new(labels.num_labels(), labels.no_relation_index())
    }

    /// Number of classes the scorer expects.
    pub fn num_labels(&self) -> usize {
        self.num_labels
    }

    /// Check a batch against the label space.
    pub fn validate(&self, batch: &PredictionBatch) -> TrainResult<()> {
        if batch.num_classes() != self.num_labels {
            return Err(TrainError::ShapeError(format!(
                "prediction matrix has {} columns, expected {}",
                batch.num_classes(),
                self.num_labels
            )));
        }
        if let Some((i, &label)) = batch
            .labels()
            .iter()
            .enumerate()
            .find(|&(_, &l)| l >= self.num_labels)
        {
            return Err(TrainError::ShapeError(format!(
                "gold label {} at row {} is outside 0..{}",
                label, i, self.num_labels
            )));
        }
        Ok(())
    }

    /// Compute all three scores.
    pub fn score(&self, batch: &PredictionBatch) -> TrainResult<MetricScores> {
        self.validate(batch)?;
        Ok(MetricScores {
            micro_f1: self.micro_f1.compute(batch)?,
            auprc: self.auprc.compute(batch)?,
            accuracy: self.accuracy.compute(batch)?,
        })
    }

    /// Per-class AUPRC with degenerate classes reported.
    pub fn per_class_auprc(&self, batch: &PredictionBatch) -> TrainResult<ClassAuprc> {
        self.validate(batch)?;
        Ok(self.auprc.per_class(batch))
    }

    /// All metrics by name, in the same order as [`METRIC_KEYS`].
    pub fn metrics(&self) -> [&dyn Metric; 3] {
        [&self.micro_f1, &self.auprc, &self.accuracy]
    }
}
