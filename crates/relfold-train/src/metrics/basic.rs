//! Basic classification metrics.

use crate::TrainResult;

use super::{Metric, PredictionBatch, ACCURACY_KEY, MICRO_F1_KEY};

/// Exact-match accuracy between argmax predictions and gold labels, in percent.
#[derive(Debug, Clone, Copy, Default)]
pub struct Accuracy;

impl Metric for Accuracy {
    fn compute(&self, batch: &PredictionBatch) -> TrainResult<f64> {
        if batch.is_empty() {
            return Ok(0.0);
        }

        let correct = batch
            .predictions()
            .iter()
            .zip(batch.labels())
            .filter(|(pred, gold)| pred == gold)
            .count();

        Ok(correct as f64 / batch.len() as f64 * 100.0)
    }

    fn name(&self) -> &str {
        ACCURACY_KEY
    }
}

/// Micro-averaged F1 over every class except the `no_relation` sentinel.
///
/// The sentinel is removed from the label universe, not from the data: an
/// example whose gold label is a relation but whose prediction is
/// `no_relation` still counts as a false negative, and the reverse as a false
/// positive.
#[derive(Debug, Clone, Copy)]
pub struct MicroF1 {
    /// Class index left out of the label universe.
    pub excluded_class: usize,
}

impl MicroF1 {
    /// F1 that ignores `excluded_class`.
    pub fn new(excluded_class: usize) -> Self {
        Self { excluded_class }
    }

    /// Pooled (true positive, false positive, false negative) counts.
    pub fn counts(&self, batch: &PredictionBatch) -> (usize, usize, usize) {
        let mut tp = 0;
        let mut fp = 0;
        let mut fn_ = 0;

        for (&pred, &gold) in batch.predictions().iter().zip(batch.labels()) {
            if pred == gold {
                if gold != self.excluded_class {
                    tp += 1;
                }
                continue;
            }
            if pred != self.excluded_class {
                fp += 1;
            }
            if gold != self.excluded_class {
                fn_ += 1;
            }
        }

        (tp, fp, fn_)
    }
}

impl Default for MicroF1 {
    fn default() -> Self {
        Self::new(0)
    }
}

impl Metric for MicroF1 {
    fn compute(&self, batch: &PredictionBatch) -> TrainResult<f64> {
        let (tp, fp, fn_) = self.counts(batch);
        let denominator = 2 * tp + fp + fn_;
        if denominator == 0 {
            return Ok(0.0);
        }
        Ok(2.0 * tp as f64 / denominator as f64 * 100.0)
    }

    fn name(&self) -> &str {
        MICRO_F1_KEY
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use scirs2_core::ndarray::Array2;

    /// Batch whose argmax predictions are exactly `preds`.
    fn batch(preds: &[usize], golds: &[usize], num_classes: usize) -> PredictionBatch {
        let mut probs = Array2::from_elem((preds.len(), num_classes), 0.01);
        for (i, &p) in preds.iter().enumerate() {
            probs[[i, p]] = 0.9;
        }
        PredictionBatch::new(probs, golds.to_vec()).unwrap()
    }

    #[test]
    fn test_accuracy() {
        let b = batch(&[0, 1, 2, 2], &[0, 1, 1, 2], 3);
        assert_relative_eq!(Accuracy.compute(&b).unwrap(), 75.0);
    }

    #[test]
    fn test_accuracy_empty() {
        let b = batch(&[], &[], 3);
        assert_eq!(Accuracy.compute(&b).unwrap(), 0.0);
    }

    #[test]
    fn test_micro_f1_perfect_on_relations() {
        let b = batch(&[3, 5, 0, 0, 7], &[3, 5, 0, 0, 7], 30);
        assert_relative_eq!(MicroF1::new(0).compute(&b).unwrap(), 100.0);
    }

    #[test]
    fn test_micro_f1_counts() {
        // gold:  1 2 0 1 0
        // pred:  1 0 2 2 0
        // TP = 1 (row 0), FP = 2 (rows 2, 3), FN = 2 (rows 1, 3)
        let b = batch(&[1, 0, 2, 2, 0], &[1, 2, 0, 1, 0], 3);
        let f1 = MicroF1::new(0);
        assert_eq!(f1.counts(&b), (1, 2, 2));
        assert_relative_eq!(f1.compute(&b).unwrap(), 2.0 / 6.0 * 100.0);
    }

    #[test]
    fn test_micro_f1_all_null() {
        let b = batch(&[0, 0, 0], &[0, 0, 0], 3);
        assert_eq!(MicroF1::new(0).compute(&b).unwrap(), 0.0);
    }

    #[test]
    fn test_micro_f1_predicting_null_for_relations() {
        let b = batch(&[0, 0], &[1, 2], 3);
        assert_eq!(MicroF1::new(0).counts(&b), (0, 0, 2));
        assert_eq!(MicroF1::new(0).compute(&b).unwrap(), 0.0);
    }

    #[test]
    fn test_micro_f1_other_excluded_class() {
        let b = batch(&[2, 2, 1], &[2, 1, 1], 3);
        // Excluding class 2: TP = 1 (row 2), FP = 0, FN = 1 (row 1).
        assert_eq!(MicroF1::new(2).counts(&b), (1, 0, 1));
    }
}
