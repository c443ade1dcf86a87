//! Fold orchestration over an external trainer.
//!
//! The orchestrator runs folds strictly in sequence. For each fold it
//! encodes the train and dev examples, builds a fresh trainer, lets it train
//! with an [`EvaluationHook`], scores the final dev predictions, saves the
//! checkpoint and drops the trainer before the next fold starts.

use crate::checkpoint::{BestEvaluation, CheckpointLayout, FoldManifest};
use crate::config::{Hyperparameters, RunConfig};
use crate::corpus::{corpus_labels, RawExample};
use crate::crossval::{CrossValidationReport, Fold, FoldPlan, FoldResult};
use crate::error::FoldStage;
use crate::features::{EncodedFeatures, FeatureEncoder};
use crate::labels::LabelMap;
use crate::logging::{EvaluationKind, FanoutSink, JsonlSink, MetricsSink, TracingSink};
use crate::metrics::{MetricScores, PredictionBatch, RelationMetrics};
use crate::{TrainError, TrainResult};
use std::path::{Path, PathBuf};

/// Everything a trainer needs to build its model for one fold.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelSpec {
    /// 1-based fold number.
    pub fold: usize,
    /// Total folds in the run.
    pub num_folds: usize,
    /// Number of relation classes.
    pub num_labels: usize,
    /// Vocabulary size including the entity markers.
    pub vocab_size: usize,
    /// Encoded sequence length.
    pub max_length: usize,
    /// Seed for this fold (run seed + fold).
    pub seed: u64,
    /// Training hyperparameters.
    pub hyperparameters: Hyperparameters,
}

/// Scoring callback handed to [`ExternalTrainer::train`].
///
/// Each call scores a batch of dev predictions and forwards the scores to the
/// run's reporting sink.
pub struct EvaluationHook<'a> {
    fold: usize,
    metrics: &'a RelationMetrics,
    sink: &'a mut dyn MetricsSink,
    history: Vec<(usize, MetricScores)>,
}

impl<'a> EvaluationHook<'a> {
    /// Hook reporting evaluations of `fold` to `sink`.
    pub fn new(fold: usize, metrics: &'a RelationMetrics, sink: &'a mut dyn MetricsSink) -> Self {
        Self {
            fold,
            metrics,
            sink,
            history: Vec::new(),
        }
    }

    /// Score `predictions` taken at `step` and report them.
    pub fn compute_metrics(
        &mut self,
        step: usize,
        predictions: &PredictionBatch,
    ) -> TrainResult<MetricScores> {
        let scores = self.report(step, EvaluationKind::Periodic, predictions)?;
        self.history.push((step, scores));
        Ok(scores)
    }

    /// Score the post-training dev predictions and report them as the fold's
    /// final evaluation, at the step of the latest periodic one (0 if none).
    ///
    /// Not added to [`history`](Self::history).
    pub fn compute_final_metrics(
        &mut self,
        predictions: &PredictionBatch,
    ) -> TrainResult<MetricScores> {
        let step = self.last_step().unwrap_or(0);
        self.report(step, EvaluationKind::Final, predictions)
    }

    fn report(
        &mut self,
        step: usize,
        kind: EvaluationKind,
        predictions: &PredictionBatch,
    ) -> TrainResult<MetricScores> {
        let scores = self.metrics.score(predictions)?;
        self.sink.log_metrics(self.fold, step, kind, &scores)?;
        tracing::debug!(
            fold = self.fold,
            step,
            kind = %kind,
            micro_f1 = scores.micro_f1,
            "Computed evaluation metrics"
        );
        Ok(scores)
    }

    /// Fold this hook reports for.
    pub fn fold(&self) -> usize {
        self.fold
    }

    /// Every periodic evaluation so far, in call order.
    pub fn history(&self) -> &[(usize, MetricScores)] {
        &self.history
    }

    /// Step of the latest periodic evaluation.
    pub fn last_step(&self) -> Option<usize> {
        self.history.last().map(|(step, _)| *step)
    }

    /// Periodic evaluation with the highest micro F1 (earliest on ties).
    pub fn best(&self) -> Option<(usize, MetricScores)> {
        self.history.iter().copied().fold(None, |best, current| match best {
            Some((_, b)) if b.micro_f1 >= current.1.micro_f1 => best,
            _ => Some(current),
        })
    }
}

/// A model trainer driven by the orchestrator.
pub trait ExternalTrainer {
    /// Train on `train`, evaluating on `dev` through `hook` as often as the
    /// trainer sees fit.
    fn train(
        &mut self,
        train: &EncodedFeatures,
        dev: &EncodedFeatures,
        hook: &mut EvaluationHook<'_>,
    ) -> TrainResult<()>;

    /// Class probabilities for every dev example, paired with the gold labels.
    fn evaluate(&mut self, dev: &EncodedFeatures) -> TrainResult<PredictionBatch>;

    /// Save the trained model into `dir` (which already exists).
    fn save(&self, dir: &Path) -> TrainResult<()>;
}

/// Builds one trainer per fold.
pub trait TrainerFactory {
    /// Fresh, untrained trainer for the fold described by `spec`.
    fn create(&mut self, spec: &ModelSpec) -> TrainResult<Box<dyn ExternalTrainer>>;
}

/// Runs k-fold cross-validation.
pub struct FoldOrchestrator<'a> {
    plan: FoldPlan,
    encoder: &'a FeatureEncoder,
    labels: &'a LabelMap,
    metrics: RelationMetrics,
    layout: CheckpointLayout,
    seed: u64,
    hyperparameters: Hyperparameters,
    sink: Box<dyn MetricsSink>,
}

impl<'a> FoldOrchestrator<'a> {
    /// Orchestrator for `plan` writing under `output_dir`.
    pub fn new(
        plan: FoldPlan,
        encoder: &'a FeatureEncoder,
        labels: &'a LabelMap,
        output_dir: impl Into<PathBuf>,
    ) -> Self {
        let layout = CheckpointLayout::new(output_dir, plan.num_folds());
        Self {
            plan,
            encoder,
            labels,
            metrics: RelationMetrics::for_labels(labels),
            layout,
            seed: 42,
            hyperparameters: Hyperparameters::default(),
            sink: Box::new(TracingSink),
        }
    }

    /// Orchestrator configured from a run configuration.
    ///
    /// Scores go to `tracing` and, when `output.metrics_log` is set, to a
    /// JSON-lines file as well.
    pub fn from_config(
        config: &RunConfig,
        encoder: &'a FeatureEncoder,
        labels: &'a LabelMap,
    ) -> TrainResult<Self> {
        let cv = &config.cross_validation;
        let plan = FoldPlan::new(cv.n_folds, cv.stratified, cv.holdout_ratio, config.seed)?;

        let orchestrator = Self::new(plan, encoder, labels, &config.output.output_dir)
            .with_seed(config.seed)
            .with_hyperparameters(config.training.clone());

        Ok(match &config.output.metrics_log {
            Some(path) => orchestrator
                .with_sink(FanoutSink::new().with(TracingSink).with(JsonlSink::new(path)?)),
            None => orchestrator,
        })
    }

    /// Set the run seed.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Set the hyperparameters handed to every trainer.
    pub fn with_hyperparameters(mut self, hyperparameters: Hyperparameters) -> Self {
        self.hyperparameters = hyperparameters;
        self
    }

    /// Set the reporting sink.
    pub fn with_sink<S: MetricsSink + 'static>(mut self, sink: S) -> Self {
        self.sink = Box::new(sink);
        self
    }

    /// Checkpoint layout of this run.
    pub fn layout(&self) -> &CheckpointLayout {
        &self.layout
    }

    /// Run every fold and write the cross-validation summary.
    ///
    /// Stops at the first failing fold with [`TrainError::FoldAborted`].
    pub fn run(
        &mut self,
        examples: &[RawExample],
        factory: &mut dyn TrainerFactory,
    ) -> TrainResult<CrossValidationReport> {
        let gold = self.labels.encode(&corpus_labels(examples))?;
        let num_folds = self.plan.num_folds();
        tracing::info!(
            examples = examples.len(),
            folds = num_folds,
            seed = self.seed,
            "Starting cross-validation"
        );

        let mut report = CrossValidationReport::new();
        for index in 1..=num_folds {
            let fold = self
                .plan
                .fold(index, &gold)
                .map_err(|e| e.in_fold(index, FoldStage::Split))?;
            let result = self.run_fold(&fold, examples, factory)?;
            report.add_fold(result);
        }

        self.sink.flush()?;
        report.save(self.layout.summary_path())?;

        for (name, summary) in report.summary() {
            tracing::info!(metric = %name, mean = summary.mean, std = summary.std, "Cross-validation summary");
        }
        Ok(report)
    }

    fn run_fold(
        &mut self,
        fold: &Fold,
        examples: &[RawExample],
        factory: &mut dyn TrainerFactory,
    ) -> TrainResult<FoldResult> {
        let index = fold.index;
        let num_folds = self.plan.num_folds();
        let _span = tracing::info_span!("fold", fold = index).entered();
        tracing::info!(
            fold = index,
            train = fold.train.len(),
            dev = fold.dev.len(),
            "Starting fold {}/{}",
            index,
            num_folds
        );

        let train = self
            .encoder
            .encode_selection(examples, &fold.train, self.labels)
            .map_err(|e| e.in_fold(index, FoldStage::Encode))?;
        let dev = self
            .encoder
            .encode_selection(examples, &fold.dev, self.labels)
            .map_err(|e| e.in_fold(index, FoldStage::Encode))?;

        let spec = ModelSpec {
            fold: index,
            num_folds,
            num_labels: self.labels.num_labels(),
            vocab_size: self.encoder.extended_vocab_size(),
            max_length: self.encoder.max_length(),
            seed: self.seed.wrapping_add(index as u64),
            hyperparameters: self.hyperparameters.clone(),
        };
        let mut trainer = factory
            .create(&spec)
            .map_err(|e| e.in_fold(index, FoldStage::Setup))?;

        let mut hook = EvaluationHook::new(index, &self.metrics, self.sink.as_mut());
        trainer
            .train(&train, &dev, &mut hook)
            .map_err(|e| e.in_fold(index, FoldStage::Train))?;

        let predictions = trainer
            .evaluate(&dev)
            .map_err(|e| e.in_fold(index, FoldStage::Evaluate))?;
        if predictions.len() != dev.len() {
            return Err(TrainError::ShapeError(format!(
                "{} predictions for {} dev examples",
                predictions.len(),
                dev.len()
            ))
            .in_fold(index, FoldStage::Score));
        }
        if predictions.labels() != dev.labels.as_slice() {
            return Err(TrainError::ShapeError(
                "trainer returned gold labels that differ from the dev split".to_string(),
            )
            .in_fold(index, FoldStage::Score));
        }
        let scores = hook
            .compute_final_metrics(&predictions)
            .map_err(|e| e.in_fold(index, FoldStage::Score))?;

        let best = hook.best().map(|(step, scores)| BestEvaluation { step, scores });
        if let Some(best) = &best {
            tracing::info!(
                fold = index,
                step = best.step,
                micro_f1 = best.scores.micro_f1,
                auprc = best.scores.auprc,
                accuracy = best.scores.accuracy,
                "Best periodic evaluation"
            );
        }

        let dir = self.persist(&spec, trainer.as_ref(), fold, &scores, best)?;
        drop(trainer);

        tracing::info!(
            fold = index,
            micro_f1 = scores.micro_f1,
            auprc = scores.auprc,
            accuracy = scores.accuracy,
            checkpoint = %dir.display(),
            "Finished fold"
        );
        Ok(FoldResult::new(index, &scores, dir))
    }

    fn persist(
        &self,
        spec: &ModelSpec,
        trainer: &dyn ExternalTrainer,
        fold: &Fold,
        scores: &MetricScores,
        best_evaluation: Option<BestEvaluation>,
    ) -> TrainResult<PathBuf> {
        let stage = |e: TrainError| e.in_fold(spec.fold, FoldStage::Persist);

        let dir = self.layout.prepare(spec.fold).map_err(stage)?;
        trainer.save(&dir).map_err(stage)?;
        FoldManifest {
            fold: spec.fold,
            num_folds: spec.num_folds,
            seed: spec.seed,
            num_labels: spec.num_labels,
            vocab_size: spec.vocab_size,
            train_size: fold.train.len(),
            dev_size: fold.dev.len(),
            scores: *scores,
            best_evaluation,
        }
        .save(&dir)
        .map_err(stage)?;
        Ok(dir)
    }
}
