//! Error types for cross-validation runs.

use std::fmt;
use thiserror::Error;

/// Stage of a fold at which a run can abort.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FoldStage {
    /// Partitioning the corpus.
    Split,
    /// Encoding train/dev features.
    Encode,
    /// Constructing the per-fold trainer.
    Setup,
    /// `ExternalTrainer::train`.
    Train,
    /// `ExternalTrainer::evaluate`.
    Evaluate,
    /// Scoring the evaluation output.
    Score,
    /// Writing the checkpoint and its manifest.
    Persist,
}

impl fmt::Display for FoldStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FoldStage::Split => "split",
            FoldStage::Encode => "encode",
            FoldStage::Setup => "setup",
            FoldStage::Train => "train",
            FoldStage::Evaluate => "evaluate",
            FoldStage::Score => "score",
            FoldStage::Persist => "persist",
        };
        f.write_str(name)
    }
}

/// Errors that can occur while preparing, running or scoring folds.
#[derive(Error, Debug)]
pub enum TrainError {
    /// Label map, corpus or run configuration missing or unparseable.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// A label is absent from the label map.
    #[error("Label error: {0}")]
    LabelError(String),

    /// Prediction matrix does not match the label space or the gold vector.
    #[error("Shape error: {0}")]
    ShapeError(String),

    /// Error with invalid parameter.
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// An example whose entity spans cannot be marked.
    #[error("Invalid example {id}: {reason}")]
    InvalidExample {
        /// Example identifier from the corpus.
        id: String,
        /// What is wrong with it.
        reason: String,
    },

    /// Error in checkpoint or summary persistence.
    #[error("Checkpoint error: {0}")]
    CheckpointError(String),

    /// Failure raised by an external trainer.
    #[error("Trainer error: {0}")]
    Trainer(String),

    /// A fold failed and the run was aborted.
    #[error("Fold {fold} aborted during {stage}")]
    FoldAborted {
        /// 1-based fold number.
        fold: usize,
        /// Stage that failed.
        stage: FoldStage,
        /// Underlying failure.
        #[source]
        source: Box<TrainError>,
    },
}

impl TrainError {
    /// Wrap this error as the cause of an aborted fold.
    pub fn in_fold(self, fold: usize, stage: FoldStage) -> Self {
        TrainError::FoldAborted {
            fold,
            stage,
            source: Box::new(self),
        }
    }
}

/// Result type for training operations.
pub type TrainResult<T> = Result<T, TrainError>;
