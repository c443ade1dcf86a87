//! Cross-validated relation-classification training scaffolds.
//!
//! **Version**: 0.1.0
//!
//! This crate orchestrates k-fold training of a relation classifier whose
//! model lives behind the [`ExternalTrainer`] trait:
//! - Relation label codec with a versioned JSON label map
//! - Corpus loading from CSV
//! - Deterministic k-fold, stratified k-fold and holdout splitting
//! - Fixed-length feature encoding with typed entity markers
//! - Metrics: micro F1 excluding `no_relation`, multi-class AUPRC, accuracy
//! - Per-fold checkpoint layout and manifests
//! - Score reporting sinks
//! - A class-prior baseline trainer

mod baseline;
mod checkpoint;
mod config;
mod corpus;
mod crossval;
mod error;
mod features;
mod labels;
mod logging;
mod metrics;
mod trainer;

#[cfg(feature = "structured-logging")]
pub mod structured_logging;

pub use baseline::{PriorModel, PriorTrainer, PriorTrainerFactory, PRIOR_MODEL_FILE};
pub use checkpoint::{
    BestEvaluation, CheckpointLayout, FoldManifest, BEST_MODEL_DIR, MANIFEST_FILE, SUMMARY_FILE,
};
pub use config::{CrossValidationConfig, DataConfig, Hyperparameters, OutputConfig, RunConfig};
pub use corpus::{corpus_labels, load_corpus, EntityMention, EntityType, RawExample};
pub use crossval::{
    CrossValidationReport, CrossValidationSplit, Fold, FoldPlan, FoldResult, Holdout, KFold,
    MetricSummary, StratifiedKFold,
};
pub use error::{FoldStage, TrainError, TrainResult};
pub use features::{
    marker_token, split_words, EncodedFeature, EncodedFeatures, EntityRole, FeatureEncoder,
    SpecialTokens, Tokenizer, WordLevelTokenizer, CLS_TOKEN, ENTITY_MARKER_COUNT, PAD_TOKEN,
    SEP_TOKEN, UNK_TOKEN,
};
pub use labels::{LabelMap, KLUE_RELATIONS, LABEL_MAP_VERSION, NO_RELATION};
pub use logging::{
    EvaluationKind, FanoutSink, JsonlSink, MemorySink, MetricRecord, MetricsSink, NullSink,
    TracingSink,
};
pub use metrics::{
    precision_recall_curve, Accuracy, Auprc, ClassAuprc, Metric, MetricDegenerate, MetricScores,
    MicroF1, PrCurve, PredictionBatch, PredictionFile, RelationMetrics, ACCURACY_KEY, AUPRC_KEY,
    METRIC_KEYS, MICRO_F1_KEY,
};
pub use trainer::{EvaluationHook, ExternalTrainer, FoldOrchestrator, ModelSpec, TrainerFactory};
