//! Reporting sinks for evaluation scores.
//!
//! Every evaluation (periodic ones inside training and the final dev
//! evaluation of a fold) is forwarded to a [`MetricsSink`], tagged with its
//! [`EvaluationKind`]:
//! - [`TracingSink`]: a structured `tracing` event per evaluation
//! - [`JsonlSink`]: one JSON object per line in a file
//! - [`MemorySink`]: in-memory records, shared between clones
//! - [`NullSink`]: discards everything

use crate::metrics::MetricScores;
use crate::{TrainError, TrainResult};
use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fmt;
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::rc::Rc;

/// Whether an evaluation ran during training or closed the fold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EvaluationKind {
    /// Requested by the trainer through its hook.
    #[default]
    Periodic,
    /// The dev evaluation after training, once per fold.
    Final,
}

impl fmt::Display for EvaluationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EvaluationKind::Periodic => write!(f, "periodic"),
            EvaluationKind::Final => write!(f, "final"),
        }
    }
}

/// Trait for score reporting backends.
pub trait MetricsSink {
    /// Record the scores of one evaluation.
    ///
    /// # Arguments
    /// * `fold` - 1-based fold number
    /// * `step` - Trainer step at which the evaluation ran
    /// * `kind` - Periodic or final evaluation
    /// * `scores` - The three scores
    fn log_metrics(
        &mut self,
        fold: usize,
        step: usize,
        kind: EvaluationKind,
        scores: &MetricScores,
    ) -> TrainResult<()>;

    /// Flush any buffered records.
    fn flush(&mut self) -> TrainResult<()>;
}

/// One reported evaluation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricRecord {
    /// 1-based fold number.
    pub fold: usize,
    /// Trainer step.
    pub step: usize,
    /// Periodic or final.
    #[serde(default)]
    pub kind: EvaluationKind,
    /// Scores keyed by metric name.
    #[serde(flatten)]
    pub scores: BTreeMap<String, f64>,
}

impl MetricRecord {
    /// Record for one evaluation.
    pub fn new(fold: usize, step: usize, kind: EvaluationKind, scores: &MetricScores) -> Self {
        Self {
            fold,
            step,
            kind,
            scores: scores.to_map(),
        }
    }
}

/// Emits an `info` event per evaluation.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl MetricsSink for TracingSink {
    fn log_metrics(
        &mut self,
        fold: usize,
        step: usize,
        kind: EvaluationKind,
        scores: &MetricScores,
    ) -> TrainResult<()> {
        tracing::info!(
            fold,
            step,
            kind = %kind,
            micro_f1 = scores.micro_f1,
            auprc = scores.auprc,
            accuracy = scores.accuracy,
            "Evaluation"
        );
        Ok(())
    }

    fn flush(&mut self) -> TrainResult<()> {
        Ok(())
    }
}

/// Appends one JSON object per evaluation to a file.
#[derive(Debug)]
pub struct JsonlSink {
    writer: BufWriter<File>,
    path: PathBuf,
}

impl JsonlSink {
    /// Open (or create) `path` for appending.
    pub fn new<P: AsRef<Path>>(path: P) -> TrainResult<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| {
                TrainError::ConfigError(format!(
                    "Failed to create log directory {}: {}",
                    parent.display(),
                    e
                ))
            })?;
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|e| {
                TrainError::ConfigError(format!(
                    "Failed to open metrics log {}: {}",
                    path.display(),
                    e
                ))
            })?;

        Ok(Self {
            writer: BufWriter::new(file),
            path,
        })
    }

    /// Path of the log file.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl MetricsSink for JsonlSink {
    fn log_metrics(
        &mut self,
        fold: usize,
        step: usize,
        kind: EvaluationKind,
        scores: &MetricScores,
    ) -> TrainResult<()> {
        let record = MetricRecord::new(fold, step, kind, scores);
        let line = serde_json::to_string(&record).map_err(|e| {
            TrainError::CheckpointError(format!("Failed to serialize metrics: {}", e))
        })?;
        writeln!(self.writer, "{}", line).map_err(|e| {
            TrainError::CheckpointError(format!(
                "Failed to write metrics log {}: {}",
                self.path.display(),
                e
            ))
        })
    }

    fn flush(&mut self) -> TrainResult<()> {
        self.writer.flush().map_err(|e| {
            TrainError::CheckpointError(format!(
                "Failed to flush metrics log {}: {}",
                self.path.display(),
                e
            ))
        })
    }
}

/// Keeps records in memory; clones share the same storage.
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    records: Rc<RefCell<Vec<MetricRecord>>>,
}

impl MemorySink {
    /// Create an empty sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of every record so far.
    pub fn records(&self) -> Vec<MetricRecord> {
        self.records.borrow().clone()
    }
}

impl MetricsSink for MemorySink {
    fn log_metrics(
        &mut self,
        fold: usize,
        step: usize,
        kind: EvaluationKind,
        scores: &MetricScores,
    ) -> TrainResult<()> {
        self.records
            .borrow_mut()
            .push(MetricRecord::new(fold, step, kind, scores));
        Ok(())
    }

    fn flush(&mut self) -> TrainResult<()> {
        Ok(())
    }
}

/// Discards every record.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSink;

impl MetricsSink for NullSink {
    fn log_metrics(
        &mut self,
        _fold: usize,
        _step: usize,
        _kind: EvaluationKind,
        _scores: &MetricScores,
    ) -> TrainResult<()> {
        Ok(())
    }

    fn flush(&mut self) -> TrainResult<()> {
        Ok(())
    }
}

/// Forwards every record to several sinks in order.
#[derive(Default)]
pub struct FanoutSink {
    sinks: Vec<Box<dyn MetricsSink>>,
}

impl FanoutSink {
    /// Create a sink with no targets.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a target.
    pub fn with<S: MetricsSink + 'static>(mut self, sink: S) -> Self {
        self.sinks.push(Box::new(sink));
        self
    }

    /// Number of targets.
    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    /// Whether there are no targets.
    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }
}

impl MetricsSink for FanoutSink {
    fn log_metrics(
        &mut self,
        fold: usize,
        step: usize,
        kind: EvaluationKind,
        scores: &MetricScores,
    ) -> TrainResult<()> {
        for sink in &mut self.sinks {
            sink.log_metrics(fold, step, kind, scores)?;
        }
        Ok(())
    }

    fn flush(&mut self) -> TrainResult<()> {
        for sink in &mut self.sinks {
            sink.flush()?;
        }
        Ok(())
    }
}
