//! Binary classification metrics. Class `1` is the positive class.

use serde::{Deserialize, Serialize};

/// Test-set scores of a trained classifier.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClassificationMetrics {
    /// Fraction of correct predictions.
    pub accuracy: f64,
    /// Harmonic mean of precision and recall.
    pub f1_score: f64,
    /// True positives over predicted positives.
    pub precision_score: f64,
    /// True positives over actual positives.
    pub recall_score: f64,
}

#[derive(Default)]
struct Confusion {
    tp: usize,
    fp: usize,
    fn_: usize,
    correct: usize,
    total: usize,
}

impl Confusion {
    fn tally(truth: &[usize], predicted: &[usize]) -> Self {
        let mut c = Self::default();
        for (&t, &p) in truth.iter().zip(predicted) {
            c.total += 1;
            if t == p {
                c.correct += 1;
            }
            match (t == 1, p == 1) {
                (true, true) => c.tp += 1,
                (false, true) => c.fp += 1,
                (true, false) => c.fn_ += 1,
                (false, false) => {}
            }
        }
        c
    }
}

#[allow(clippy::cast_precision_loss)]
fn ratio(numerator: usize, denominator: usize) -> f64 {
    if denominator == 0 {
        0.0
    } else {
        numerator as f64 / denominator as f64
    }
}

impl ClassificationMetrics {
    /// Scores `predicted` against `truth`. Undefined ratios are 0.
    #[must_use]
    pub fn compute(truth: &[usize], predicted: &[usize]) -> Self {
        let c = Confusion::tally(truth, predicted);
        let precision_score = ratio(c.tp, c.tp + c.fp);
        let recall_score = ratio(c.tp, c.tp + c.fn_);
        Self {
            accuracy: ratio(c.correct, c.total),
            f1_score: ratio(2 * c.tp, 2 * c.tp + c.fp + c.fn_),
            precision_score,
            recall_score,
        }
    }
}

/// F1 score of the positive class.
#[must_use]
pub fn f1_score(truth: &[usize], predicted: &[usize]) -> f64 {
    ClassificationMetrics::compute(truth, predicted).f1_score
}
