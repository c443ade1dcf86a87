//! Class-prior baseline trainer.
//!
//! Predicts, for every example, the label distribution observed in training
//! for the same pair of entity markers, smoothed toward the global label
//! prior. It needs no model weights, so it serves as the reference trainer
//! for smoke runs and tests of the orchestration path.

use crate::features::{EncodedFeatures, ENTITY_MARKER_COUNT};
use crate::metrics::PredictionBatch;
use crate::trainer::{EvaluationHook, ExternalTrainer, ModelSpec, TrainerFactory};
use crate::{TrainError, TrainResult};
use scirs2_core::ndarray::Array2;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// File name of a saved prior model.
pub const PRIOR_MODEL_FILE: &str = "prior_model.json";

/// Marker slots per role plus one for a missing marker.
const SLOTS: usize = ENTITY_MARKER_COUNT / 2 + 1;

/// Fitted label counts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriorModel {
    /// Number of classes.
    pub num_labels: usize,
    /// Weight of the global prior in each pair distribution.
    pub smoothing: f64,
    /// Label counts over all training examples.
    pub label_counts: Vec<f64>,
    /// Label counts per (subject marker, object marker) pair.
    pub pair_counts: Vec<Vec<f64>>,
}

impl PriorModel {
    fn empty(num_labels: usize, smoothing: f64) -> Self {
        Self {
            num_labels,
            smoothing,
            label_counts: vec![0.0; num_labels],
            pair_counts: vec![vec![0.0; num_labels]; SLOTS * SLOTS],
        }
    }

    /// Add-one smoothed label distribution over all training examples.
    pub fn global_prior(&self) -> Vec<f64> {
        let total: f64 = self.label_counts.iter().sum();
        let denominator = total + self.num_labels as f64;
        self.label_counts
            .iter()
            .map(|&c| (c + 1.0) / denominator)
            .collect()
    }

    /// Label distribution for one marker pair.
    fn distribution(&self, pair: usize, prior: &[f64]) -> Vec<f64> {
        let counts = &self.pair_counts[pair];
        let total: f64 = counts.iter().sum();
        counts
            .iter()
            .zip(prior)
            .map(|(&c, &p)| (c + self.smoothing * p) / (total + self.smoothing))
            .collect()
    }

    /// Load a model saved by [`PriorTrainer`].
    pub fn load(dir: &Path) -> TrainResult<Self> {
        let path = dir.join(PRIOR_MODEL_FILE);
        let json = std::fs::read_to_string(&path).map_err(|e| {
            TrainError::CheckpointError(format!("Failed to read {}: {}", path.display(), e))
        })?;
        serde_json::from_str(&json).map_err(|e| {
            TrainError::CheckpointError(format!("Failed to parse {}: {}", path.display(), e))
        })
    }
}

/// Trainer fitting a [`PriorModel`].
#[derive(Debug, Clone)]
pub struct PriorTrainer {
    spec: ModelSpec,
    model: PriorModel,
    fitted: bool,
}

impl PriorTrainer {
    /// Untrained trainer for `spec`.
    pub fn new(spec: ModelSpec, smoothing: f64) -> Self {
        let model = PriorModel::empty(spec.num_labels, smoothing);
        Self {
            spec,
            model,
            fitted: false,
        }
    }

    /// Fitted model.
    pub fn model(&self) -> &PriorModel {
        &self.model
    }

    /// Pair slot of an example from the marker ids at its entity positions.
    fn pair_slot(&self, features: &EncodedFeatures, row: usize) -> usize {
        let first_marker = self.spec.vocab_size.saturating_sub(ENTITY_MARKER_COUNT);
        let per_role = ENTITY_MARKER_COUNT / 2;
        let slot = |role: usize| {
            let position = features.entity_positions[[row, role]];
            let id = features.input_ids[[row, position]] as usize;
            let marker_role_start = first_marker + role * per_role;
            if position > 0 && id >= marker_role_start && id < marker_role_start + per_role {
                id - marker_role_start
            } else {
                per_role
            }
        };
        slot(0) * SLOTS + slot(1)
    }

    fn check_labels(&self, features: &EncodedFeatures) -> TrainResult<()> {
        match features.labels.iter().find(|&&l| l >= self.spec.num_labels) {
            Some(label) => Err(TrainError::Trainer(format!(
                "label {} outside 0..{}",
                label, self.spec.num_labels
            ))),
            None => Ok(()),
        }
    }

    fn predict(&self, features: &EncodedFeatures) -> TrainResult<PredictionBatch> {
        let prior = self.model.global_prior();
        let mut probabilities = Array2::zeros((features.len(), self.spec.num_labels));
        for (row, mut out) in probabilities.rows_mut().into_iter().enumerate() {
            let distribution = self.model.distribution(self.pair_slot(features, row), &prior);
            for (value, p) in out.iter_mut().zip(distribution) {
                *value = p;
            }
        }
        PredictionBatch::new(probabilities, features.labels.clone())
    }
}

impl ExternalTrainer for PriorTrainer {
    fn train(
        &mut self,
        train: &EncodedFeatures,
        dev: &EncodedFeatures,
        hook: &mut EvaluationHook<'_>,
    ) -> TrainResult<()> {
        self.check_labels(train)?;
        let batch_size = self.spec.hyperparameters.batch_size.max(1);
        let epochs = self.spec.hyperparameters.epochs.max(1);
        let mut step = 0;

        for epoch in 1..=epochs {
            self.model = PriorModel::empty(self.spec.num_labels, self.model.smoothing);
            for start in (0..train.len()).step_by(batch_size) {
                let end = (start + batch_size).min(train.len());
                for row in start..end {
                    let label = train.labels[row];
                    let pair = self.pair_slot(train, row);
                    self.model.label_counts[label] += 1.0;
                    self.model.pair_counts[pair][label] += 1.0;
                }
                step += 1;
            }
            self.fitted = true;

            let scores = hook.compute_metrics(step, &self.predict(dev)?)?;
            tracing::debug!(
                fold = self.spec.fold,
                epoch,
                step,
                micro_f1 = scores.micro_f1,
                "Prior baseline epoch finished"
            );
        }
        Ok(())
    }

    fn evaluate(&mut self, dev: &EncodedFeatures) -> TrainResult<PredictionBatch> {
        if !self.fitted {
            return Err(TrainError::Trainer(
                "evaluate called before train".to_string(),
            ));
        }
        self.predict(dev)
    }

    fn save(&self, dir: &Path) -> TrainResult<()> {
        let path = dir.join(PRIOR_MODEL_FILE);
        let json = serde_json::to_string_pretty(&self.model).map_err(|e| {
            TrainError::CheckpointError(format!("Failed to serialize prior model: {}", e))
        })?;
        std::fs::write(&path, json).map_err(|e| {
            TrainError::CheckpointError(format!("Failed to write {}: {}", path.display(), e))
        })
    }
}

/// Factory of [`PriorTrainer`]s.
#[derive(Debug, Clone, Copy)]
pub struct PriorTrainerFactory {
    /// Weight of the global prior in each pair distribution.
    pub smoothing: f64,
}

impl Default for PriorTrainerFactory {
    fn default() -> Self {
        Self { smoothing: 1.0 }
    }
}

impl TrainerFactory for PriorTrainerFactory {
    fn create(&mut self, spec: &ModelSpec) -> TrainResult<Box<dyn ExternalTrainer>> {
        if self.smoothing <= 0.0 {
            return Err(TrainError::InvalidParameter(format!(
                "smoothing must be positive, got {}",
                self.smoothing
            )));
        }
        tracing::debug!(fold = spec.fold, seed = spec.seed, "Creating prior trainer");
        Ok(Box::new(PriorTrainer::new(spec.clone(), self.smoothing)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Hyperparameters;
    use crate::logging::MemorySink;
    use crate::metrics::RelationMetrics;
    use approx::assert_relative_eq;

    const VOCAB: usize = 10 + ENTITY_MARKER_COUNT;

    fn spec(num_labels: usize) -> ModelSpec {
        ModelSpec {
            fold: 1,
            num_folds: 1,
            num_labels,
            vocab_size: VOCAB,
            max_length: 4,
            seed: 43,
            hyperparameters: Hyperparameters {
                epochs: 2,
                batch_size: 2,
                ..Hyperparameters::default()
            },
        }
    }

    /// Rows `[CLS, subject marker, object marker, SEP]` with the given marker type slots.
    fn features(rows: &[(usize, usize, usize)]) -> EncodedFeatures {
        let mut input_ids = Array2::zeros((rows.len(), 4));
        let mut entity_positions = Array2::zeros((rows.len(), 2));
        for (i, &(s, o, _)) in rows.iter().enumerate() {
            input_ids[[i, 1]] = (10 + s) as u32;
            input_ids[[i, 2]] = (10 + 6 + o) as u32;
            entity_positions[[i, 0]] = 1;
            entity_positions[[i, 1]] = 2;
        }
        EncodedFeatures {
            input_ids,
            attention_mask: Array2::ones((rows.len(), 4)),
            entity_positions,
            labels: rows.iter().map(|r| r.2).collect(),
        }
    }

    #[test]
    fn test_prior_learns_pair_distribution() {
        let train = features(&[(0, 1, 1), (0, 1, 1), (0, 1, 1), (2, 2, 2), (2, 2, 0)]);
        let dev = features(&[(0, 1, 1), (2, 2, 2)]);

        let metrics = RelationMetrics::new(3, 0);
        let memory = MemorySink::new();
        let mut sink = memory.clone();
        let mut hook = EvaluationHook::new(1, &metrics, &mut sink);

        let mut trainer = PriorTrainer::new(spec(3), 1.0);
        trainer.train(&train, &dev, &mut hook).unwrap();

        // Two epochs of three batches each.
        let steps: Vec<usize> = memory.records().iter().map(|r| r.step).collect();
        assert_eq!(steps, vec![3, 6]);

        let predictions = trainer.evaluate(&dev).unwrap();
        assert_eq!(predictions.predictions()[0], 1);
        for row in predictions.probabilities().rows() {
            assert_relative_eq!(row.sum(), 1.0, epsilon = 1e-12);
        }
        assert_eq!(trainer.model().label_counts, vec![1.0, 3.0, 1.0]);
    }

    #[test]
    fn test_evaluate_before_train() {
        let mut trainer = PriorTrainer::new(spec(3), 1.0);
        assert!(matches!(
            trainer.evaluate(&features(&[(0, 0, 0)])),
            Err(TrainError::Trainer(_))
        ));
    }

    #[test]
    fn test_label_outside_space() {
        let metrics = RelationMetrics::new(3, 0);
        let mut sink = MemorySink::new();
        let mut hook = EvaluationHook::new(1, &metrics, &mut sink);
        let mut trainer = PriorTrainer::new(spec(3), 1.0);
        let bad = features(&[(0, 0, 5)]);
        assert!(trainer.train(&bad, &bad, &mut hook).is_err());
    }

    #[test]
    fn test_save_and_load() {
        let metrics = RelationMetrics::new(3, 0);
        let mut sink = MemorySink::new();
        let mut hook = EvaluationHook::new(1, &metrics, &mut sink);
        let mut trainer = PriorTrainer::new(spec(3), 0.5);
        let data = features(&[(0, 1, 1), (1, 0, 2)]);
        trainer.train(&data, &data, &mut hook).unwrap();

        let dir = tempfile::tempdir().unwrap();
        trainer.save(dir.path()).unwrap();
        assert_eq!(&PriorModel::load(dir.path()).unwrap(), trainer.model());
    }

    #[test]
    fn test_factory_rejects_bad_smoothing() {
        let mut factory = PriorTrainerFactory { smoothing: 0.0 };
        assert!(factory.create(&spec(3)).is_err());
        assert!(PriorTrainerFactory::default().create(&spec(3)).is_ok());
    }
}
