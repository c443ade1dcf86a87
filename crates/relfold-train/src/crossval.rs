//! Cross-validation splitting.
//!
//! This module provides the corpus partitioning strategies used by the fold
//! orchestrator:
//! - K-fold cross-validation
//! - Stratified K-fold (maintains class distribution)
//! - Single holdout split (the `k = 1` run)
//!
//! All strategies are deterministic for a given seed and corpus order.

use crate::metrics::MetricScores;
use crate::{TrainError, TrainResult};
use scirs2_core::random::{SeedableRng, StdRng};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Trait for cross-validation splitting strategies.
pub trait CrossValidationSplit {
    /// Get the number of splits.
    fn num_splits(&self) -> usize;

    /// Get the train/validation indices for a specific fold.
    ///
    /// # Arguments
    /// * `fold` - Fold index (0 to num_splits - 1)
    /// * `labels` - Gold class index of every example, in corpus order
    ///
    /// # Returns
    /// (train_indices, validation_indices)
    fn get_split(&self, fold: usize, labels: &[usize]) -> TrainResult<(Vec<usize>, Vec<usize>)>;
}

fn check_fold(fold: usize, n_splits: usize) -> TrainResult<()> {
    if fold >= n_splits {
        return Err(TrainError::InvalidParameter(format!(
            "fold {} is out of range [0, {})",
            fold, n_splits
        )));
    }
    Ok(())
}

fn check_enough_samples(n_splits: usize, n_samples: usize) -> TrainResult<()> {
    if n_splits > n_samples {
        return Err(TrainError::InvalidParameter(format!(
            "cannot split {} samples into {} folds",
            n_samples, n_splits
        )));
    }
    Ok(())
}

/// Fisher-Yates shuffle driven by an explicit generator.
fn shuffle_in_place(indices: &mut [usize], rng: &mut StdRng) {
    for i in (1..indices.len()).rev() {
        let j = rng.gen_range(0..=i);
        indices.swap(i, j);
    }
}

/// Sizes of `n_splits` near-equal folds; the first `n % n_splits` get one extra.
fn fold_sizes(n_samples: usize, n_splits: usize) -> Vec<usize> {
    let fold_size = n_samples / n_splits;
    let remainder = n_samples % n_splits;

    let mut sizes = vec![fold_size; n_splits];
    for size in sizes.iter_mut().take(remainder) {
        *size += 1;
    }
    sizes
}

fn boundaries(sizes: &[usize]) -> Vec<usize> {
    let mut bounds = Vec::with_capacity(sizes.len() + 1);
    bounds.push(0);
    let mut acc = 0;
    for size in sizes {
        acc += size;
        bounds.push(acc);
    }
    bounds
}

/// K-fold cross-validation.
///
/// Splits the data into K near-equally-sized folds. Each fold is used once as
/// validation while the K-1 remaining folds form the training set.
#[derive(Debug, Clone)]
pub struct KFold {
    /// Number of folds.
    pub n_splits: usize,
    /// Whether to shuffle the data before splitting.
    pub shuffle: bool,
    /// Random seed for shuffling.
    pub random_seed: u64,
}

impl KFold {
    /// Create a new K-fold splitter.
    ///
    /// # Arguments
    /// * `n_splits` - Number of folds (must be >= 2)
    pub fn new(n_splits: usize) -> TrainResult<Self> {
        if n_splits < 2 {
            return Err(TrainError::InvalidParameter(
                "n_splits must be at least 2".to_string(),
            ));
        }
        Ok(Self {
            n_splits,
            shuffle: false,
            random_seed: 42,
        })
    }

    /// Enable shuffling with a specific seed.
    pub fn with_shuffle(mut self, seed: u64) -> Self {
        self.shuffle = true;
        self.random_seed = seed;
        self
    }
}

impl CrossValidationSplit for KFold {
    fn num_splits(&self) -> usize {
        self.n_splits
    }

    fn get_split(&self, fold: usize, labels: &[usize]) -> TrainResult<(Vec<usize>, Vec<usize>)> {
        check_fold(fold, self.n_splits)?;
        let n_samples = labels.len();
        check_enough_samples(self.n_splits, n_samples)?;

        let mut indices: Vec<usize> = (0..n_samples).collect();
        if self.shuffle {
            let mut rng = StdRng::seed_from_u64(self.random_seed);
            shuffle_in_place(&mut indices, &mut rng);
        }

        let bounds = boundaries(&fold_sizes(n_samples, self.n_splits));
        let val_start = bounds[fold];
        let val_end = bounds[fold + 1];
        let val_indices = indices[val_start..val_end].to_vec();

        let mut train_indices = Vec::with_capacity(n_samples - val_indices.len());
        train_indices.extend_from_slice(&indices[..val_start]);
        train_indices.extend_from_slice(&indices[val_end..]);

        Ok((train_indices, val_indices))
    }
}

/// Stratified K-fold cross-validation.
///
/// Maintains class distribution in each fold (useful for imbalanced datasets
/// such as relation corpora dominated by `no_relation`).
#[derive(Debug, Clone)]
pub struct StratifiedKFold {
    /// Number of folds.
    pub n_splits: usize,
    /// Whether to shuffle the data before splitting.
    pub shuffle: bool,
    /// Random seed for shuffling.
    pub random_seed: u64,
}

impl StratifiedKFold {
    /// Create a new stratified K-fold splitter.
    ///
    /// # Arguments
    /// * `n_splits` - Number of folds (must be >= 2)
    pub fn new(n_splits: usize) -> TrainResult<Self> {
        if n_splits < 2 {
            return Err(TrainError::InvalidParameter(
                "n_splits must be at least 2".to_string(),
            ));
        }
        Ok(Self {
            n_splits,
            shuffle: true,
            random_seed: 42,
        })
    }

    /// Set random seed for shuffling.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.random_seed = seed;
        self
    }
}

impl CrossValidationSplit for StratifiedKFold {
    fn num_splits(&self) -> usize {
        self.n_splits
    }

    fn get_split(&self, fold: usize, labels: &[usize]) -> TrainResult<(Vec<usize>, Vec<usize>)> {
        check_fold(fold, self.n_splits)?;
        check_enough_samples(self.n_splits, labels.len())?;

        // Ordered map: classes are visited in the same order on every call.
        let mut class_indices: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
        for (i, &label) in labels.iter().enumerate() {
            class_indices.entry(label).or_default().push(i);
        }

        if self.shuffle {
            let mut rng = StdRng::seed_from_u64(self.random_seed);
            for indices in class_indices.values_mut() {
                shuffle_in_place(indices, &mut rng);
            }
        }

        let mut train_indices = Vec::new();
        let mut val_indices = Vec::new();

        // Leftover examples of each class go to the folds after the ones that
        // took the previous class's leftovers, keeping fold sizes balanced.
        let mut offset = 0;
        for indices in class_indices.values() {
            let class_size = indices.len();
            let mut sizes = vec![class_size / self.n_splits; self.n_splits];
            let remainder = class_size % self.n_splits;
            for j in 0..remainder {
                sizes[(offset + j) % self.n_splits] += 1;
            }
            offset = (offset + remainder) % self.n_splits;

            let bounds = boundaries(&sizes);
            let val_start = bounds[fold];
            let val_end = bounds[fold + 1];
            val_indices.extend_from_slice(&indices[val_start..val_end]);
            train_indices.extend_from_slice(&indices[..val_start]);
            train_indices.extend_from_slice(&indices[val_end..]);
        }

        train_indices.sort_unstable();
        val_indices.sort_unstable();
        Ok((train_indices, val_indices))
    }
}

/// Single train/dev holdout split.
///
/// Used when a run is configured with one fold: a shuffled `ratio` share of
/// the corpus is held out as the dev set.
#[derive(Debug, Clone)]
pub struct Holdout {
    /// Share of the corpus held out for evaluation.
    pub ratio: f64,
    /// Random seed for shuffling.
    pub random_seed: u64,
}

impl Holdout {
    /// Create a holdout splitter.
    ///
    /// # Arguments
    /// * `ratio` - Dev share, strictly between 0 and 1
    pub fn new(ratio: f64) -> TrainResult<Self> {
        if !(ratio > 0.0 && ratio < 1.0) {
            return Err(TrainError::InvalidParameter(format!(
                "holdout ratio must be in (0, 1), got {}",
                ratio
            )));
        }
        Ok(Self {
            ratio,
            random_seed: 42,
        })
    }

    /// Set random seed for shuffling.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.random_seed = seed;
        self
    }
}

impl CrossValidationSplit for Holdout {
    fn num_splits(&self) -> usize {
        1
    }

    fn get_split(&self, fold: usize, labels: &[usize]) -> TrainResult<(Vec<usize>, Vec<usize>)> {
        check_fold(fold, 1)?;
        let n_samples = labels.len();
        if n_samples < 2 {
            return Err(TrainError::InvalidParameter(format!(
                "holdout split needs at least 2 samples, got {}",
                n_samples
            )));
        }

        let mut indices: Vec<usize> = (0..n_samples).collect();
        let mut rng = StdRng::seed_from_u64(self.random_seed);
        shuffle_in_place(&mut indices, &mut rng);

        let dev_size = ((n_samples as f64 * self.ratio).round() as usize).clamp(1, n_samples - 1);
        let val_indices = indices[..dev_size].to_vec();
        let train_indices = indices[dev_size..].to_vec();

        Ok((train_indices, val_indices))
    }
}

/// One materialised train/dev partition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fold {
    /// 1-based fold number.
    pub index: usize,
    /// Training example indices.
    pub train: Vec<usize>,
    /// Dev example indices.
    pub dev: Vec<usize>,
}

/// Splitter selection for a run.
#[derive(Debug, Clone)]
pub enum FoldPlan {
    /// Plain shuffled k-fold.
    KFold(KFold),
    /// Label-stratified k-fold.
    Stratified(StratifiedKFold),
    /// Single holdout fold.
    Holdout(Holdout),
}

impl FoldPlan {
    /// Pick the splitter for `n_folds`.
    ///
    /// One fold means a holdout run; two or more means k-fold, stratified on
    /// gold labels when `stratified` is set.
    pub fn new(n_folds: usize, stratified: bool, holdout_ratio: f64, seed: u64) -> TrainResult<Self> {
        match n_folds {
            0 => Err(TrainError::InvalidParameter(
                "n_folds must be at least 1".to_string(),
            )),
            1 => Ok(FoldPlan::Holdout(Holdout::new(holdout_ratio)?.with_seed(seed))),
            k if stratified => Ok(FoldPlan::Stratified(StratifiedKFold::new(k)?.with_seed(seed))),
            k => Ok(FoldPlan::KFold(KFold::new(k)?.with_shuffle(seed))),
        }
    }

    fn splitter(&self) -> &dyn CrossValidationSplit {
        match self {
            FoldPlan::KFold(s) => s,
            FoldPlan::Stratified(s) => s,
            FoldPlan::Holdout(s) => s,
        }
    }

    /// Number of folds this plan produces.
    pub fn num_folds(&self) -> usize {
        self.splitter().num_splits()
    }

    /// Materialise a single fold (1-based).
    pub fn fold(&self, index: usize, labels: &[usize]) -> TrainResult<Fold> {
        if index == 0 {
            return Err(TrainError::InvalidParameter(
                "fold numbers start at 1".to_string(),
            ));
        }
        let (train, dev) = self.splitter().get_split(index - 1, labels)?;
        Ok(Fold { index, train, dev })
    }

    /// Materialise every fold.
    pub fn folds(&self, labels: &[usize]) -> TrainResult<Vec<Fold>> {
        (1..=self.num_folds())
            .map(|index| self.fold(index, labels))
            .collect()
    }
}

/// Outcome of one scored fold.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FoldResult {
    /// 1-based fold number.
    pub fold: usize,
    /// Micro F1 excluding `no_relation`, in percent.
    pub micro_f1: f64,
    /// Mean one-vs-rest AUPRC, in percent.
    pub auprc: f64,
    /// Accuracy, in percent.
    pub accuracy: f64,
    /// Directory holding the fold's best checkpoint.
    pub checkpoint_dir: PathBuf,
}

impl FoldResult {
    /// Combine a fold's scores with its checkpoint location.
    pub fn new(fold: usize, scores: &MetricScores, checkpoint_dir: PathBuf) -> Self {
        Self {
            fold,
            micro_f1: scores.micro_f1,
            auprc: scores.auprc,
            accuracy: scores.accuracy,
            checkpoint_dir,
        }
    }

    fn metric(&self, name: &str) -> Option<f64> {
        match name {
            crate::metrics::MICRO_F1_KEY => Some(self.micro_f1),
            crate::metrics::AUPRC_KEY => Some(self.auprc),
            crate::metrics::ACCURACY_KEY => Some(self.accuracy),
            _ => None,
        }
    }
}

/// Mean and sample standard deviation of one metric across folds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MetricSummary {
    /// Mean across folds.
    pub mean: f64,
    /// Sample standard deviation (0 for fewer than two folds).
    pub std: f64,
}

/// Cross-validation result aggregator.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CrossValidationReport {
    /// Results for each fold, in fold order.
    pub folds: Vec<FoldResult>,
}

impl CrossValidationReport {
    /// Create an empty report.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a fold result.
    pub fn add_fold(&mut self, result: FoldResult) {
        self.folds.push(result);
    }

    /// Get number of folds.
    pub fn num_folds(&self) -> usize {
        self.folds.len()
    }

    /// Get mean of a metric across all folds.
    pub fn mean_metric(&self, metric_name: &str) -> Option<f64> {
        let values: Vec<f64> = self.folds.iter().filter_map(|f| f.metric(metric_name)).collect();
        if values.is_empty() {
            return None;
        }
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }

    /// Get sample standard deviation of a metric across all folds.
    pub fn std_metric(&self, metric_name: &str) -> Option<f64> {
        let mean = self.mean_metric(metric_name)?;
        if self.folds.len() <= 1 {
            return Some(0.0);
        }

        let variance = self
            .folds
            .iter()
            .filter_map(|f| f.metric(metric_name))
            .map(|v| (v - mean).powi(2))
            .sum::<f64>()
            / (self.folds.len() - 1) as f64;

        Some(variance.sqrt())
    }

    /// Mean/std summary for every metric.
    pub fn summary(&self) -> BTreeMap<String, MetricSummary> {
        crate::metrics::METRIC_KEYS
            .iter()
            .filter_map(|&name| {
                let mean = self.mean_metric(name)?;
                let std = self.std_metric(name)?;
                Some((name.to_string(), MetricSummary { mean, std }))
            })
            .collect()
    }

    /// Write the report and its summary as JSON.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> TrainResult<()> {
        #[derive(Serialize)]
        struct SummaryFile<'a> {
            folds: &'a [FoldResult],
            summary: BTreeMap<String, MetricSummary>,
        }

        let path = path.as_ref();
        let json = serde_json::to_string_pretty(&SummaryFile {
            folds: &self.folds,
            summary: self.summary(),
        })
        .map_err(|e| {
            TrainError::CheckpointError(format!("Failed to serialize summary: {}", e))
        })?;

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| {
                TrainError::CheckpointError(format!("Failed to create {}: {}", parent.display(), e))
            })?;
        }
        std::fs::write(path, json).map_err(|e| {
            TrainError::CheckpointError(format!(
                "Failed to write summary {}: {}",
                path.display(),
                e
            ))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn labels(n: usize, classes: usize) -> Vec<usize> {
        (0..n).map(|i| i % classes).collect()
    }

    fn assert_partition(folds: &[Fold], n_samples: usize) {
        let mut all_dev = Vec::new();
        for fold in folds {
            let train: HashSet<usize> = fold.train.iter().copied().collect();
            let dev: HashSet<usize> = fold.dev.iter().copied().collect();
            assert!(train.is_disjoint(&dev));
            assert_eq!(train.len() + dev.len(), n_samples);
            all_dev.extend(fold.dev.iter().copied());
        }
        all_dev.sort_unstable();
        assert_eq!(all_dev, (0..n_samples).collect::<Vec<_>>());
    }

    #[test]
    fn test_kfold_basic() {
        let kfold = KFold::new(3).unwrap();
        assert_eq!(kfold.num_splits(), 3);

        let (train, val) = kfold.get_split(0, &labels(10, 2)).unwrap();
        assert_eq!(val.len(), 4);
        for &idx in &val {
            assert!(!train.contains(&idx));
        }

        let mut all_indices = train.clone();
        all_indices.extend(&val);
        all_indices.sort();
        assert_eq!(all_indices, (0..10).collect::<Vec<_>>());
    }

    #[test]
    fn test_kfold_with_shuffle() {
        let kfold = KFold::new(3).unwrap().with_shuffle(42);
        let data = labels(10, 3);
        let (train1, val1) = kfold.get_split(0, &data).unwrap();
        let (train2, val2) = kfold.get_split(0, &data).unwrap();

        assert_eq!(train1, train2);
        assert_eq!(val1, val2);
    }

    #[test]
    fn test_kfold_invalid() {
        assert!(KFold::new(1).is_err());
        let kfold = KFold::new(3).unwrap();
        assert!(kfold.get_split(5, &labels(10, 2)).is_err());
        assert!(kfold.get_split(0, &labels(2, 2)).is_err());
    }

    #[test]
    fn test_ten_examples_five_folds() {
        let plan = FoldPlan::new(5, false, 0.2, 42).unwrap();
        let folds = plan.folds(&labels(10, 3)).unwrap();

        assert_eq!(folds.len(), 5);
        for (i, fold) in folds.iter().enumerate() {
            assert_eq!(fold.index, i + 1);
            assert_eq!(fold.dev.len(), 2);
            assert_eq!(fold.train.len(), 8);
        }
        assert_partition(&folds, 10);
    }

    #[test]
    fn test_uneven_fold_sizes() {
        let plan = FoldPlan::new(4, false, 0.2, 7).unwrap();
        let folds = plan.folds(&labels(11, 2)).unwrap();
        let sizes: Vec<usize> = folds.iter().map(|f| f.dev.len()).collect();
        assert_eq!(sizes, vec![3, 3, 3, 2]);
        assert_partition(&folds, 11);
    }

    #[test]
    fn test_stratified_partition() {
        let data: Vec<usize> = (0..40).map(|i| if i % 4 == 0 { 1 } else { 0 }).collect();
        let plan = FoldPlan::new(5, true, 0.2, 42).unwrap();
        let folds = plan.folds(&data).unwrap();

        assert_partition(&folds, 40);
        for fold in &folds {
            let positives = fold.dev.iter().filter(|&&i| data[i] == 1).count();
            assert_eq!(positives, 2);
            assert_eq!(fold.dev.len(), 8);
        }
    }

    #[test]
    fn test_stratified_balances_remainders() {
        // Three classes of 4 examples over 3 folds: every class leaves one over.
        let data: Vec<usize> = (0..12).map(|i| i / 4).collect();
        let splitter = StratifiedKFold::new(3).unwrap();
        let sizes: Vec<usize> = (0..3)
            .map(|f| splitter.get_split(f, &data).unwrap().1.len())
            .collect();
        assert_eq!(sizes, vec![4, 4, 4]);
    }

    #[test]
    fn test_stratified_is_reproducible() {
        let data = labels(50, 7);
        let a = StratifiedKFold::new(5).unwrap().with_seed(3);
        let b = StratifiedKFold::new(5).unwrap().with_seed(3);
        for fold in 0..5 {
            assert_eq!(a.get_split(fold, &data).unwrap(), b.get_split(fold, &data).unwrap());
        }
    }

    #[test]
    fn test_holdout_single_fold() {
        let plan = FoldPlan::new(1, false, 0.2, 42).unwrap();
        assert_eq!(plan.num_folds(), 1);

        let folds = plan.folds(&labels(10, 2)).unwrap();
        assert_eq!(folds.len(), 1);
        assert_eq!(folds[0].dev.len(), 2);
        assert_eq!(folds[0].train.len(), 8);

        let mut all: Vec<usize> = folds[0].train.iter().chain(&folds[0].dev).copied().collect();
        all.sort_unstable();
        assert_eq!(all, (0..10).collect::<Vec<_>>());
    }

    #[test]
    fn test_holdout_keeps_one_dev_example() {
        let holdout = Holdout::new(0.01).unwrap();
        let (train, dev) = holdout.get_split(0, &labels(5, 1)).unwrap();
        assert_eq!(dev.len(), 1);
        assert_eq!(train.len(), 4);
    }

    #[test]
    fn test_holdout_invalid() {
        assert!(Holdout::new(0.0).is_err());
        assert!(Holdout::new(1.0).is_err());
        assert!(Holdout::new(0.5).unwrap().get_split(0, &[0]).is_err());
        assert!(FoldPlan::new(0, false, 0.2, 42).is_err());
    }

    #[test]
    fn test_fold_numbering() {
        let plan = FoldPlan::new(3, false, 0.2, 42).unwrap();
        assert!(plan.fold(0, &labels(9, 3)).is_err());
        assert!(plan.fold(4, &labels(9, 3)).is_err());
        assert_eq!(plan.fold(3, &labels(9, 3)).unwrap().index, 3);
    }

    fn result(fold: usize, f1: f64, auprc: f64, acc: f64) -> FoldResult {
        FoldResult {
            fold,
            micro_f1: f1,
            auprc,
            accuracy: acc,
            checkpoint_dir: PathBuf::from(format!("best_model/{}_best_model", fold)),
        }
    }

    #[test]
    fn test_cv_report() {
        let mut report = CrossValidationReport::new();
        report.add_fold(result(1, 85.0, 60.0, 90.0));
        report.add_fold(result(2, 90.0, 62.0, 95.0));
        report.add_fold(result(3, 88.0, 64.0, 92.0));

        assert_eq!(report.num_folds(), 3);

        let mean = report.mean_metric("micro f1 score").unwrap();
        assert!((mean - 87.666_666).abs() < 1e-5);
        assert!(report.std_metric("micro f1 score").unwrap() > 0.0);

        let mean_acc = report.mean_metric("accuracy").unwrap();
        assert!((mean_acc - 92.333_333).abs() < 1e-5);

        let summary = report.summary();
        assert_eq!(summary.len(), 3);
        assert!((summary["auprc"].mean - 62.0).abs() < 1e-9);
        assert!((summary["auprc"].std - 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_cv_report_empty() {
        let report = CrossValidationReport::new();
        assert_eq!(report.num_folds(), 0);
        assert!(report.mean_metric("accuracy").is_none());
        assert!(report.summary().is_empty());
        assert!(report.mean_metric("loss").is_none());
    }

    #[test]
    fn test_cv_report_save() {
        let dir = tempfile::tempdir().unwrap();
        let mut report = CrossValidationReport::new();
        report.add_fold(result(1, 50.0, 40.0, 70.0));

        let path = dir.path().join("cv_summary.json");
        report.save(&path).unwrap();

        let value: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(value["folds"][0]["fold"], 1);
        assert_eq!(value["summary"]["accuracy"]["std"], 0.0);
    }
}
