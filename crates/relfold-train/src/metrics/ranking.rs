//! Ranking metrics: precision-recall curves and their area.

use crate::TrainResult;
use scirs2_core::ndarray::ArrayView1;
use std::cmp::Ordering;

use super::{Metric, PredictionBatch, AUPRC_KEY};

/// Precision-recall curve of a binary ranking.
///
/// Points are ordered by non-decreasing recall. The first point is the
/// `(recall 0, precision 1)` anchor; each following point is the cut at one
/// distinct score, highest score first.
#[derive(Debug, Clone, PartialEq)]
pub struct PrCurve {
    /// Precision at each point.
    pub precision: Vec<f64>,
    /// Recall at each point.
    pub recall: Vec<f64>,
    /// Score threshold of each point after the anchor.
    pub thresholds: Vec<f64>,
}

impl PrCurve {
    /// Precision made monotone: at each recall level, the best precision
    /// reachable at that recall or higher.
    pub fn interpolated_precision(&self) -> Vec<f64> {
        let mut interpolated = self.precision.clone();
        let mut running_max = f64::NEG_INFINITY;
        for p in interpolated.iter_mut().rev() {
            running_max = running_max.max(*p);
            *p = running_max;
        }
        interpolated
    }

    /// Trapezoidal area under the interpolated curve.
    pub fn area(&self) -> f64 {
        let precision = self.interpolated_precision();
        self.recall
            .windows(2)
            .zip(precision.windows(2))
            .map(|(r, p)| (r[1] - r[0]) * (p[0] + p[1]) / 2.0)
            .sum()
    }
}

/// Descending score order; NaN scores rank last.
fn descending(a: f64, b: f64) -> Ordering {
    let key = |v: f64| if v.is_nan() { f64::NEG_INFINITY } else { v };
    key(b).total_cmp(&key(a))
}

/// Precision-recall curve of `scores` against binary `targets`.
///
/// Returns `None` when there is no positive target, where recall is undefined.
pub fn precision_recall_curve(scores: ArrayView1<f64>, targets: &[bool]) -> Option<PrCurve> {
    let positives = targets.iter().filter(|&&t| t).count();
    if positives == 0 {
        return None;
    }

    let mut order: Vec<usize> = (0..targets.len()).collect();
    order.sort_by(|&a, &b| descending(scores[a], scores[b]));

    let mut curve = PrCurve {
        precision: vec![1.0],
        recall: vec![0.0],
        thresholds: Vec::new(),
    };

    let mut tp = 0usize;
    let mut fp = 0usize;
    for (rank, &i) in order.iter().enumerate() {
        if targets[i] {
            tp += 1;
        } else {
            fp += 1;
        }

        // Emit a point once every example tied at this score has been counted.
        let last_of_tie = order
            .get(rank + 1)
            .map_or(true, |&next| descending(scores[i], scores[next]) != Ordering::Equal);
        if last_of_tie {
            curve.precision.push(tp as f64 / (tp + fp) as f64);
            curve.recall.push(tp as f64 / positives as f64);
            curve.thresholds.push(scores[i]);
        }
    }

    Some(curve)
}

/// A class with no gold positives in a batch; its AUPRC is undefined and
/// scored as 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MetricDegenerate {
    /// Class index without positives.
    pub class: usize,
}

/// Per-class one-vs-rest AUPRC.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassAuprc {
    /// Area per class in `[0, 1]`; degenerate classes hold 0.
    pub areas: Vec<f64>,
    /// Classes that had no gold positives.
    pub degenerate: Vec<MetricDegenerate>,
}

impl ClassAuprc {
    /// Mean area over all classes, in percent.
    pub fn mean_percent(&self) -> f64 {
        if self.areas.is_empty() {
            return 0.0;
        }
        self.areas.iter().sum::<f64>() / self.areas.len() as f64 * 100.0
    }
}

/// Multi-class AUPRC: one-vs-rest area per class, averaged over every class
/// (including `no_relation`), in percent.
#[derive(Debug, Clone, Copy, Default)]
pub struct Auprc;

impl Auprc {
    /// Area for every class column of the batch.
    pub fn per_class(&self, batch: &PredictionBatch) -> ClassAuprc {
        let probabilities = batch.probabilities();
        let mut areas = Vec::with_capacity(batch.num_classes());
        let mut degenerate = Vec::new();

        for class in 0..batch.num_classes() {
            let targets: Vec<bool> = batch.labels().iter().map(|&l| l == class).collect();
            match precision_recall_curve(probabilities.column(class), &targets) {
                Some(curve) => areas.push(curve.area()),
                None => {
                    areas.push(0.0);
                    degenerate.push(MetricDegenerate { class });
                }
            }
        }

        if !degenerate.is_empty() {
            tracing::debug!(
                classes = ?degenerate.iter().map(|d| d.class).collect::<Vec<_>>(),
                "Classes without gold positives scored as 0 AUPRC"
            );
        }

        ClassAuprc { areas, degenerate }
    }
}

impl Metric for Auprc {
    fn compute(&self, batch: &PredictionBatch) -> TrainResult<f64> {
        if batch.is_empty() {
            return Ok(0.0);
        }
        Ok(self.per_class(batch).mean_percent())
    }

    fn name(&self) -> &str {
        AUPRC_KEY
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use scirs2_core::ndarray::{array, Array1, Array2};

    #[test]
    fn test_curve_perfect_ranking() {
        let scores = array![0.9, 0.8, 0.2, 0.1];
        let curve = precision_recall_curve(scores.view(), &[true, true, false, false]).unwrap();

        assert_eq!(curve.recall, vec![0.0, 0.5, 1.0, 1.0, 1.0]);
        assert_relative_eq!(curve.area(), 1.0);
    }

    #[test]
    fn test_curve_worst_ranking() {
        let scores = array![0.9, 0.8, 0.2, 0.1];
        let curve = precision_recall_curve(scores.view(), &[false, false, true, true]).unwrap();

        // Points: (0, 1) anchor, (0, 0), (0, 0), (0.5, 1/3), (1, 1/2).
        // Interpolated: 1, 0.5, 0.5, 0.5, 0.5 -> area = 0.5 * 0.5 + 0.5 * 0.5.
        assert_relative_eq!(curve.area(), 0.5);
    }

    #[test]
    fn test_curve_ties_form_one_point() {
        let scores = array![0.5, 0.5, 0.5, 0.1];
        let curve = precision_recall_curve(scores.view(), &[true, false, true, false]).unwrap();

        assert_eq!(curve.thresholds, vec![0.5, 0.1]);
        assert_relative_eq!(curve.precision[1], 2.0 / 3.0);
        assert_relative_eq!(curve.recall[1], 1.0);
        // Interpolated precision at recall 1 is 2/3, anchor keeps 1.
        assert_relative_eq!(curve.area(), (1.0 + 2.0 / 3.0) / 2.0);
    }

    #[test]
    fn test_interpolation_is_monotone() {
        let scores = array![0.9, 0.7, 0.6, 0.4, 0.3, 0.2];
        let targets = [true, false, true, false, true, false];
        let curve = precision_recall_curve(scores.view(), &targets).unwrap();

        let interpolated = curve.interpolated_precision();
        for w in interpolated.windows(2) {
            assert!(w[0] >= w[1]);
        }
        let area = curve.area();
        assert!(area > 0.0 && area <= 1.0);
    }

    #[test]
    fn test_curve_no_positives() {
        let scores = Array1::from_vec(vec![0.3, 0.2]);
        assert!(precision_recall_curve(scores.view(), &[false, false]).is_none());
    }

    #[test]
    fn test_zero_support_class_contributes_zero() {
        // Class 2 never appears in gold.
        let probs = array![[0.8, 0.1, 0.1], [0.2, 0.7, 0.1], [0.6, 0.3, 0.1]];
        let batch = PredictionBatch::new(probs, vec![0, 1, 0]).unwrap();

        let per_class = Auprc.per_class(&batch);
        assert_eq!(per_class.degenerate, vec![MetricDegenerate { class: 2 }]);
        assert_eq!(per_class.areas[2], 0.0);
        assert_relative_eq!(per_class.areas[0], 1.0);
        assert_relative_eq!(per_class.areas[1], 1.0);

        let score = Auprc.compute(&batch).unwrap();
        assert_relative_eq!(score, 200.0 / 3.0);
    }

    #[test]
    fn test_one_hot_all_classes_is_perfect() {
        let n_classes = 30;
        let labels: Vec<usize> = (0..90).map(|i| (i * 7) % n_classes).collect();
        let mut probs = Array2::zeros((labels.len(), n_classes));
        for (i, &l) in labels.iter().enumerate() {
            probs[[i, l]] = 1.0;
        }
        let batch = PredictionBatch::new(probs, labels).unwrap();
        assert_relative_eq!(Auprc.compute(&batch).unwrap(), 100.0);
    }

    #[test]
    fn test_uniform_scores() {
        // Every score tied: single point at precision = prevalence.
        let probs = Array2::from_elem((4, 2), 0.5);
        let batch = PredictionBatch::new(probs, vec![0, 0, 0, 1]).unwrap();
        let per_class = Auprc.per_class(&batch);
        assert_relative_eq!(per_class.areas[0], (1.0 + 0.75) / 2.0);
        assert_relative_eq!(per_class.areas[1], (1.0 + 0.25) / 2.0);
    }
}
