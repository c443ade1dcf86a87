//! Checkpoint directory layout and per-fold manifests.

use crate::metrics::MetricScores;
use crate::{TrainError, TrainResult};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Directory holding the best model(s) under the output root.
pub const BEST_MODEL_DIR: &str = "best_model";
/// Manifest written next to each saved checkpoint.
pub const MANIFEST_FILE: &str = "fold_manifest.json";
/// Cross-validation summary written to the output root.
pub const SUMMARY_FILE: &str = "cv_summary.json";

/// Where a run's checkpoints live.
///
/// A single-fold run saves to `<root>/best_model`; a k-fold run saves fold
/// `i` to `<root>/best_model/<i>_best_model`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckpointLayout {
    root: PathBuf,
    num_folds: usize,
}

impl CheckpointLayout {
    /// Layout for a run of `num_folds` folds under `root`.
    pub fn new(root: impl Into<PathBuf>, num_folds: usize) -> Self {
        Self {
            root: root.into(),
            num_folds,
        }
    }

    /// Output root.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Best-model directory of a fold (1-based).
    pub fn best_model_dir(&self, fold: usize) -> PathBuf {
        let best = self.root.join(BEST_MODEL_DIR);
        if self.num_folds == 1 {
            best
        } else {
            best.join(format!("{}_best_model", fold))
        }
    }

    /// Path of the cross-validation summary.
    pub fn summary_path(&self) -> PathBuf {
        self.root.join(SUMMARY_FILE)
    }

    /// Create a fold's checkpoint directory and return it.
    pub fn prepare(&self, fold: usize) -> TrainResult<PathBuf> {
        let dir = self.best_model_dir(fold);
        std::fs::create_dir_all(&dir).map_err(|e| {
            TrainError::CheckpointError(format!(
                "Failed to create checkpoint directory {}: {}",
                dir.display(),
                e
            ))
        })?;
        Ok(dir)
    }
}

/// Metadata saved alongside a fold's checkpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FoldManifest {
    /// 1-based fold number.
    pub fold: usize,
    /// Total folds in the run.
    pub num_folds: usize,
    /// Seed the fold's trainer was built with.
    pub seed: u64,
    /// Number of relation classes.
    pub num_labels: usize,
    /// Vocabulary size including entity markers.
    pub vocab_size: usize,
    /// Training examples.
    pub train_size: usize,
    /// Dev examples.
    pub dev_size: usize,
    /// Dev scores of the saved model.
    pub scores: MetricScores,
    /// Highest-scoring periodic evaluation, if the trainer reported any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub best_evaluation: Option<BestEvaluation>,
}

/// Step and scores of the periodic evaluation with the highest micro F1.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BestEvaluation {
    /// Trainer step of the evaluation.
    pub step: usize,
    /// Scores at that step.
    pub scores: MetricScores,
}

impl FoldManifest {
    /// Write the manifest into `dir`.
    pub fn save(&self, dir: &Path) -> TrainResult<PathBuf> {
        let path = dir.join(MANIFEST_FILE);
        let json = serde_json::to_string_pretty(self).map_err(|e| {
            TrainError::CheckpointError(format!("Failed to serialize manifest: {}", e))
        })?;
        std::fs::write(&path, json).map_err(|e| {
            TrainError::CheckpointError(format!(
                "Failed to write manifest {}: {}",
                path.display(),
                e
            ))
        })?;
        Ok(path)
    }

    /// Read the manifest from a checkpoint directory.
    pub fn load(dir: &Path) -> TrainResult<Self> {
        let path = dir.join(MANIFEST_FILE);
        let json = std::fs::read_to_string(&path).map_err(|e| {
            TrainError::CheckpointError(format!(
                "Failed to read manifest {}: {}",
                path.display(),
                e
            ))
        })?;
        serde_json::from_str(&json).map_err(|e| {
            TrainError::CheckpointError(format!(
                "Failed to parse manifest {}: {}",
                path.display(),
                e
            ))
        })
    }
}
