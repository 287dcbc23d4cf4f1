//! Seeded CART decision trees and a bagged random-forest classifier.

use ndarray::{Array1, ArrayView1, ArrayView2};
use rand::seq::index;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::errors::FailureCause;

/// Impurity measure used to pick splits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SplitCriterion {
    /// Gini impurity.
    #[default]
    Gini,
    /// Shannon entropy.
    Entropy,
}

impl SplitCriterion {
    fn impurity(self, counts: &[usize], total: usize) -> f64 {
        if total == 0 {
            return 0.0;
        }
        #[allow(clippy::cast_precision_loss)]
        let total = total as f64;
        let probabilities = counts.iter().filter(|&&c| c > 0).map(|&c| {
            #[allow(clippy::cast_precision_loss)]
            let c = c as f64;
            c / total
        });
        match self {
            Self::Gini => 1.0 - probabilities.map(|p| p * p).sum::<f64>(),
            Self::Entropy => -probabilities.map(|p| p * p.log2()).sum::<f64>(),
        }
    }
}

impl FromStr for SplitCriterion {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "gini" => Ok(Self::Gini),
            "entropy" => Ok(Self::Entropy),
            other => Err(format!("expected 'gini' or 'entropy', got '{other}'")),
        }
    }
}

impl fmt::Display for SplitCriterion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Gini => f.write_str("gini"),
            Self::Entropy => f.write_str("entropy"),
        }
    }
}

/// Random forest hyperparameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForestParams {
    /// Number of trees.
    pub n_estimators: usize,
    /// Maximum depth of each tree.
    pub max_depth: usize,
    /// Minimum samples a node needs to be split.
    pub min_samples_split: usize,
    /// Minimum samples on each side of a split.
    pub min_samples_leaf: usize,
    /// Split quality measure.
    pub criterion: SplitCriterion,
    /// Seed for bootstrapping and feature sampling.
    pub random_state: u64,
}

impl Default for ForestParams {
    fn default() -> Self {
        Self {
            n_estimators: 100,
            max_depth: 10,
            min_samples_split: 2,
            min_samples_leaf: 1,
            criterion: SplitCriterion::Gini,
            random_state: 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum Node {
    Leaf {
        distribution: Vec<f64>,
    },
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
}

/// A single classification tree. Nodes live in a flat arena, root at 0.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionTree {
    nodes: Vec<Node>,
}

struct TreeBuilder<'a> {
    x: ArrayView2<'a, f64>,
    y: &'a [usize],
    n_classes: usize,
    max_features: usize,
    params: &'a ForestParams,
    nodes: Vec<Node>,
}

struct BestSplit {
    feature: usize,
    threshold: f64,
    impurity: f64,
}

impl TreeBuilder<'_> {
    fn class_counts(&self, indices: &[usize]) -> Vec<usize> {
        let mut counts = vec![0; self.n_classes];
        for &i in indices {
            counts[self.y[i]] += 1;
        }
        counts
    }

    fn leaf(&mut self, counts: &[usize]) -> usize {
        let total: usize = counts.iter().sum();
        #[allow(clippy::cast_precision_loss)]
        let distribution = counts
            .iter()
            .map(|&c| if total == 0 { 0.0 } else { c as f64 / total as f64 })
            .collect();
        self.nodes.push(Node::Leaf { distribution });
        self.nodes.len() - 1
    }

    fn build(&mut self, indices: &mut [usize], depth: usize, rng: &mut ChaCha8Rng) -> usize {
        let counts = self.class_counts(indices);
        let n = indices.len();
        let pure = counts.iter().filter(|&&c| c > 0).count() <= 1;
        if pure || depth >= self.params.max_depth || n < self.params.min_samples_split {
            return self.leaf(&counts);
        }

        let parent_impurity = self.params.criterion.impurity(&counts, n);
        let Some(best) = self.best_split(indices, rng) else {
            return self.leaf(&counts);
        };
        if best.impurity >= parent_impurity - 1e-12 {
            return self.leaf(&counts);
        }

        let mut boundary = 0;
        for i in 0..n {
            if self.x[[indices[i], best.feature]] <= best.threshold {
                indices.swap(i, boundary);
                boundary += 1;
            }
        }

        let slot = self.nodes.len();
        self.nodes.push(Node::Leaf {
            distribution: Vec::new(),
        });
        let (left_idx, right_idx) = indices.split_at_mut(boundary);
        let left = self.build(left_idx, depth + 1, rng);
        let right = self.build(right_idx, depth + 1, rng);
        self.nodes[slot] = Node::Split {
            feature: best.feature,
            threshold: best.threshold,
            left,
            right,
        };
        slot
    }

    fn best_split(&self, indices: &[usize], rng: &mut ChaCha8Rng) -> Option<BestSplit> {
        let n = indices.len();
        let min_leaf = self.params.min_samples_leaf.max(1);
        let total_counts = self.class_counts(indices);
        let mut best: Option<BestSplit> = None;
        let mut sorted = indices.to_vec();

        for feature in index::sample(rng, self.x.ncols(), self.max_features).into_vec() {
            sorted.sort_by(|&a, &b| self.x[[a, feature]].total_cmp(&self.x[[b, feature]]));

            let mut left_counts = vec![0; self.n_classes];
            for split in 1..n {
                left_counts[self.y[sorted[split - 1]]] += 1;
                let lower = self.x[[sorted[split - 1], feature]];
                let upper = self.x[[sorted[split], feature]];
                if lower >= upper || split < min_leaf || n - split < min_leaf {
                    continue;
                }

                let right_counts: Vec<usize> = total_counts
                    .iter()
                    .zip(&left_counts)
                    .map(|(t, l)| t - l)
                    .collect();
                #[allow(clippy::cast_precision_loss)]
                let impurity = (split as f64
                    * self.params.criterion.impurity(&left_counts, split)
                    + (n - split) as f64 * self.params.criterion.impurity(&right_counts, n - split))
                    / n as f64;

                if best.as_ref().map_or(true, |b| impurity < b.impurity) {
                    best = Some(BestSplit {
                        feature,
                        threshold: lower + (upper - lower) / 2.0,
                        impurity,
                    });
                }
            }
        }
        best
    }
}

impl DecisionTree {
    fn fit(
        x: ArrayView2<'_, f64>,
        y: &[usize],
        mut indices: Vec<usize>,
        n_classes: usize,
        params: &ForestParams,
        rng: &mut ChaCha8Rng,
    ) -> Self {
        let max_features = max_features(x.ncols());
        let mut builder = TreeBuilder {
            x,
            y,
            n_classes,
            max_features,
            params,
            nodes: Vec::new(),
        };
        builder.build(&mut indices, 0, rng);
        Self {
            nodes: builder.nodes,
        }
    }

    fn predict_proba(&self, row: ArrayView1<'_, f64>) -> &[f64] {
        let mut id = 0;
        loop {
            match &self.nodes[id] {
                Node::Leaf { distribution } => return distribution,
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => id = if row[*feature] <= *threshold { *left } else { *right },
            }
        }
    }

    /// Number of nodes in the tree.
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }
}

/// `ceil(sqrt(n_features))`, at least 1.
fn max_features(n_features: usize) -> usize {
    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        clippy::cast_precision_loss
    )]
    let k = (n_features as f64).sqrt().ceil() as usize;
    k.clamp(1, n_features.max(1))
}

/// Bagged ensemble of decision trees with soft voting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RandomForestClassifier {
    params: ForestParams,
    n_features: usize,
    n_classes: usize,
    trees: Vec<DecisionTree>,
}

impl RandomForestClassifier {
    /// Fits a forest on feature rows `x` and class labels `y`.
    ///
    /// Identical inputs and `random_state` give identical forests.
    pub fn fit(
        x: ArrayView2<'_, f64>,
        y: ArrayView1<'_, usize>,
        params: ForestParams,
    ) -> Result<Self, FailureCause> {
        let n = x.nrows();
        if n == 0 || x.ncols() == 0 {
            return Err(FailureCause::EmptyDataset {
                name: "training features".to_string(),
                rows: n,
                required: 1,
            });
        }
        if y.len() != n {
            return Err(FailureCause::Schema(format!(
                "{n} feature rows but {} labels",
                y.len()
            )));
        }

        let labels: Vec<usize> = y.to_vec();
        // Labels are dense class indices, so more classes than rows is an encoding bug.
        let n_classes = labels
            .iter()
            .max()
            .map_or(Some(1), |m| m.checked_add(1))
            .filter(|&c| c <= n.max(2))
            .ok_or_else(|| {
                FailureCause::Schema(format!(
                    "labels are not dense class indices for {n} rows"
                ))
            })?
            .max(2);
        let mut rng = ChaCha8Rng::seed_from_u64(params.random_state);

        let trees = (0..params.n_estimators.max(1))
            .map(|_| {
                let mut tree_rng = ChaCha8Rng::seed_from_u64(rng.gen());
                let bootstrap = (0..n).map(|_| tree_rng.gen_range(0..n)).collect();
                DecisionTree::fit(x, &labels, bootstrap, n_classes, &params, &mut tree_rng)
            })
            .collect();

        Ok(Self {
            params,
            n_features: x.ncols(),
            n_classes,
            trees,
        })
    }

    /// Predicts one class per row by averaging tree class probabilities.
    pub fn predict(&self, x: ArrayView2<'_, f64>) -> Result<Array1<usize>, FailureCause> {
        if x.ncols() != self.n_features {
            return Err(FailureCause::Schema(format!(
                "model expects {} features, got {}",
                self.n_features,
                x.ncols()
            )));
        }

        Ok(x.rows()
            .into_iter()
            .map(|row| {
                let mut votes = vec![0.0; self.n_classes];
                for tree in &self.trees {
                    for (v, p) in votes.iter_mut().zip(tree.predict_proba(row)) {
                        *v += p;
                    }
                }
                argmax(&votes)
            })
            .collect())
    }

    /// Hyperparameters used for fitting.
    #[must_use]
    pub fn params(&self) -> &ForestParams {
        &self.params
    }

    /// Number of trees.
    #[must_use]
    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    /// Number of input features.
    #[must_use]
    pub fn n_features(&self) -> usize {
        self.n_features
    }
}

fn argmax(values: &[f64]) -> usize {
    let mut best = 0;
    for (i, v) in values.iter().enumerate() {
        if *v > values[best] {
            best = i;
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{array, Array2};

    fn params(n_estimators: usize) -> ForestParams {
        ForestParams {
            n_estimators,
            max_depth: 6,
            min_samples_split: 2,
            min_samples_leaf: 1,
            criterion: SplitCriterion::Entropy,
            random_state: 101,
        }
    }

    fn separable(n: usize) -> (Array2<f64>, Array1<usize>) {
        let x = Array2::from_shape_fn((n, 3), |(i, j)| match j {
            0 => i as f64,
            1 => ((i * 7) % 5) as f64,
            _ => 1.0,
        });
        let y = (0..n).map(|i| usize::from(i >= n / 2)).collect();
        (x, y)
    }

    #[test]
    fn test_impurity() {
        assert_eq!(SplitCriterion::Gini.impurity(&[5, 0], 5), 0.0);
        assert!((SplitCriterion::Gini.impurity(&[5, 5], 10) - 0.5).abs() < 1e-12);
        assert!((SplitCriterion::Entropy.impurity(&[5, 5], 10) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_learns_threshold() {
        let (x, y) = separable(40);
        let forest = RandomForestClassifier::fit(x.view(), y.view(), params(15)).unwrap();
        let predictions = forest.predict(x.view()).unwrap();
        let correct = predictions.iter().zip(&y).filter(|(p, t)| p == t).count();
        assert!(correct >= 36, "only {correct} of 40 correct");
    }

    #[test]
    fn test_seeded_fit_is_deterministic() {
        let (x, y) = separable(30);
        let a = RandomForestClassifier::fit(x.view(), y.view(), params(5)).unwrap();
        let b = RandomForestClassifier::fit(x.view(), y.view(), params(5)).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_serde_round_trip_predicts_identically() {
        let (x, y) = separable(30);
        let forest = RandomForestClassifier::fit(x.view(), y.view(), params(5)).unwrap();
        let json = serde_json::to_vec(&forest).unwrap();
        let back: RandomForestClassifier = serde_json::from_slice(&json).unwrap();
        assert_eq!(forest.predict(x.view()).unwrap(), back.predict(x.view()).unwrap());
    }

    #[test]
    fn test_min_samples_leaf_limits_growth() {
        let (x, y) = separable(20);
        let mut p = params(1);
        p.min_samples_leaf = 20;
        let forest = RandomForestClassifier::fit(x.view(), y.view(), p).unwrap();
        assert_eq!(forest.trees[0].node_count(), 1);
    }

    #[test]
    fn test_rejects_bad_input() {
        let empty = Array2::<f64>::zeros((0, 3));
        let labels = Array1::<usize>::zeros(0);
        assert!(matches!(
            RandomForestClassifier::fit(empty.view(), labels.view(), params(1)),
            Err(FailureCause::EmptyDataset { .. })
        ));

        let (x, y) = separable(10);
        let forest = RandomForestClassifier::fit(x.view(), y.view(), params(1)).unwrap();
        let narrow = array![[1.0, 2.0]];
        assert!(forest.predict(narrow.view()).is_err());
    }

    #[test]
    fn test_rejects_sparse_class_indices() {
        let (x, _) = separable(4);
        for top in [usize::MAX, 1_000_000_000] {
            let y = array![0, 1, 0, top];
            assert!(matches!(
                RandomForestClassifier::fit(x.view(), y.view(), params(1)),
                Err(FailureCause::Schema(_))
            ));
        }
    }

    #[test]
    fn test_criterion_parse() {
        assert_eq!("Entropy".parse::<SplitCriterion>().unwrap(), SplitCriterion::Entropy);
        assert!("mse".parse::<SplitCriterion>().is_err());
    }
}
