//! Run configuration.
//!
//! A run is described by a TOML file; every field has a default so a file
//! only needs to name what it changes:
//!
//! ```toml
//! seed = 7
//!
//! [data]
//! corpus = "train.csv"
//!
//! [cross_validation]
//! n_folds = 5
//! stratified = true
//! ```

use crate::{TrainError, TrainResult};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Complete configuration of a cross-validation run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    /// Seed for splitting; fold `i` trains with `seed + i`.
    pub seed: u64,

    /// Input data
    pub data: DataConfig,

    /// Fold layout
    pub cross_validation: CrossValidationConfig,

    /// Settings handed to the external trainer
    pub training: Hyperparameters,

    /// Output locations
    pub output: OutputConfig,
}

/// Input files and encoding length.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DataConfig {
    /// Corpus CSV file
    pub corpus: PathBuf,

    /// Label map JSON file
    pub label_map: PathBuf,

    /// Vocabulary file (built from the corpus when absent)
    pub vocab: Option<PathBuf>,

    /// Encoded sequence length
    pub max_length: usize,
}

/// Fold layout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CrossValidationConfig {
    /// Number of folds; 1 means a single holdout split
    pub n_folds: usize,

    /// Keep label proportions in every fold
    pub stratified: bool,

    /// Dev fraction of a single holdout split
    pub holdout_ratio: f64,
}

/// Hyperparameters forwarded to the external trainer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Hyperparameters {
    /// Number of training epochs
    pub epochs: usize,

    /// Peak learning rate
    pub learning_rate: f64,

    /// Training batch size
    pub batch_size: usize,

    /// Evaluation batch size
    pub eval_batch_size: usize,

    /// Linear warmup steps
    pub warmup_steps: usize,

    /// Weight decay
    pub weight_decay: f64,

    /// Classifier dropout
    pub dropout: f64,

    /// Maximum number of intermediate checkpoints the trainer keeps
    pub save_total_limit: usize,
}

/// Output locations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Root of `best_model/` and `cv_summary.json`
    pub output_dir: PathBuf,

    /// JSON-lines file receiving every evaluation's scores
    pub metrics_log: Option<PathBuf>,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            seed: 42,
            data: DataConfig::default(),
            cross_validation: CrossValidationConfig::default(),
            training: Hyperparameters::default(),
            output: OutputConfig::default(),
        }
    }
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            corpus: PathBuf::from("train.csv"),
            label_map: PathBuf::from("label_map.json"),
            vocab: None,
            max_length: 256,
        }
    }
}

impl Default for CrossValidationConfig {
    fn default() -> Self {
        Self {
            n_folds: 5,
            stratified: false,
            holdout_ratio: 0.2,
        }
    }
}

impl Default for Hyperparameters {
    fn default() -> Self {
        Self {
            epochs: 4,
            learning_rate: 5e-5,
            batch_size: 32,
            eval_batch_size: 32,
            warmup_steps: 500,
            weight_decay: 0.01,
            dropout: 0.1,
            save_total_limit: 5,
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("."),
            metrics_log: None,
        }
    }
}

impl RunConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> TrainResult<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            TrainError::ConfigError(format!(
                "Failed to read config file {}: {}",
                path.display(),
                e
            ))
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| {
            TrainError::ConfigError(format!(
                "Failed to parse config file {}: {}",
                path.display(),
                e
            ))
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration as TOML.
    pub fn save(&self, path: &Path) -> TrainResult<()> {
        let content = toml::to_string_pretty(self).map_err(|e| {
            TrainError::ConfigError(format!("Failed to serialize configuration: {}", e))
        })?;

        fs::write(path, content).map_err(|e| {
            TrainError::ConfigError(format!(
                "Failed to write config file {}: {}",
                path.display(),
                e
            ))
        })
    }

    /// Reject values no run can use.
    pub fn validate(&self) -> TrainResult<()> {
        if self.cross_validation.n_folds == 0 {
            return Err(TrainError::ConfigError(
                "cross_validation.n_folds must be at least 1".to_string(),
            ));
        }
        let ratio = self.cross_validation.holdout_ratio;
        if !(ratio > 0.0 && ratio < 1.0) {
            return Err(TrainError::ConfigError(format!(
                "cross_validation.holdout_ratio must be in (0, 1), got {}",
                ratio
            )));
        }
        if self.data.max_length == 0 {
            return Err(TrainError::ConfigError(
                "data.max_length must be positive".to_string(),
            ));
        }
        Ok(())
    }

    /// Resolve relative paths against `base` (usually the config file's directory).
    pub fn resolve_paths(&mut self, base: &Path) {
        let resolve = |p: &mut PathBuf| {
            if p.is_relative() {
                *p = base.join(&*p);
            }
        };
        resolve(&mut self.data.corpus);
        resolve(&mut self.data.label_map);
        if let Some(vocab) = self.data.vocab.as_mut() {
            resolve(vocab);
        }
        resolve(&mut self.output.output_dir);
        if let Some(log) = self.output.metrics_log.as_mut() {
            resolve(log);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = RunConfig::default();
        assert_eq!(config.seed, 42);
        assert_eq!(config.cross_validation.n_folds, 5);
        assert!(!config.cross_validation.stratified);
        assert_eq!(config.data.max_length, 256);
        assert_eq!(config.training.epochs, 4);
        assert_eq!(config.training.warmup_steps, 500);
        assert_eq!(config.output.output_dir, PathBuf::from("."));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_serialize_deserialize() {
        let config = RunConfig::default();
        let toml_str = toml::to_string(&config).unwrap();
        let deserialized: RunConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(config, deserialized);
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let config: RunConfig = toml::from_str(
            "seed = 7\n[cross_validation]\nn_folds = 1\n[training]\nlearning_rate = 1e-4\n",
        )
        .unwrap();
        assert_eq!(config.seed, 7);
        assert_eq!(config.cross_validation.n_folds, 1);
        assert_eq!(config.cross_validation.holdout_ratio, 0.2);
        assert_eq!(config.training.learning_rate, 1e-4);
        assert_eq!(config.training.batch_size, 32);
    }

    #[test]
    fn test_load_errors() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing.toml");
        assert!(matches!(
            RunConfig::load(&missing),
            Err(TrainError::ConfigError(_))
        ));

        let bad = dir.path().join("bad.toml");
        fs::write(&bad, "seed = \"forty-two\"").unwrap();
        assert!(matches!(RunConfig::load(&bad), Err(TrainError::ConfigError(_))));

        let zero = dir.path().join("zero.toml");
        fs::write(&zero, "[cross_validation]\nn_folds = 0\n").unwrap();
        assert!(matches!(RunConfig::load(&zero), Err(TrainError::ConfigError(_))));
    }

    #[test]
    fn test_save_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("run.toml");
        let mut config = RunConfig::default();
        config.data.vocab = Some(PathBuf::from("vocab.txt"));
        config.output.metrics_log = Some(PathBuf::from("metrics.jsonl"));
        config.save(&path).unwrap();

        assert_eq!(RunConfig::load(&path).unwrap(), config);
    }

    #[test]
    fn test_resolve_paths() {
        let mut config = RunConfig::default();
        config.data.label_map = PathBuf::from("/abs/labels.json");
        config.resolve_paths(Path::new("/runs/a"));
        assert_eq!(config.data.corpus, PathBuf::from("/runs/a/train.csv"));
        assert_eq!(config.data.label_map, PathBuf::from("/abs/labels.json"));
        assert_eq!(config.output.output_dir, PathBuf::from("/runs/a/."));
    }
}
