/// Random Forest Regressor
///
/// Bagged CART regression trees. Each tree is grown on a bootstrap sample
/// with variance-reduction splits; the forest prediction is the mean of the
/// tree predictions. Trees are scale-invariant, so no standardization is
/// applied to their inputs.
use super::{ModelParams, RankingError, Result};
use ndarray::{Array1, ArrayView1, ArrayView2};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TreeNode {
    Leaf {
        value: f64,
    },
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
}

/// A single regression tree stored as a flat node arena (root at index 0).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegressionTree {
    nodes: Vec<TreeNode>,
}

impl RegressionTree {
    /// Grow a tree on the rows named by `indices` (duplicates allowed).
    ///
    /// Returns the tree and the total squared-error reduction per feature.
    pub fn fit(
        x: ArrayView2<f64>,
        y: &[f64],
        indices: Vec<usize>,
        max_depth: usize,
        min_samples_split: usize,
    ) -> (Self, Vec<f64>) {
        let mut builder = TreeBuilder {
            x,
            y,
            max_depth,
            min_samples_split: min_samples_split.max(2),
            nodes: Vec::new(),
            importances: vec![0.0; x.ncols()],
        };
        builder.build(indices, 0);

        (
            Self {
                nodes: builder.nodes,
            },
            builder.importances,
        )
    }

    pub fn predict_row(&self, row: ArrayView1<f64>) -> f64 {
        let mut idx = 0;
        loop {
            match &self.nodes[idx] {
                TreeNode::Leaf { value } => return *value,
                TreeNode::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    idx = if row[*feature] <= *threshold {
                        *left
                    } else {
                        *right
                    };
                }
            }
        }
    }

    pub fn depth(&self) -> usize {
        fn walk(nodes: &[TreeNode], idx: usize) -> usize {
            match &nodes[idx] {
                TreeNode::Leaf { .. } => 0,
                TreeNode::Split { left, right, .. } => {
                    1 + walk(nodes, *left).max(walk(nodes, *right))
                }
            }
        }
        if self.nodes.is_empty() {
            0
        } else {
            walk(&self.nodes, 0)
        }
    }
}

struct TreeBuilder<'a, 'b> {
    x: ArrayView2<'a, f64>,
    y: &'b [f64],
    max_depth: usize,
    min_samples_split: usize,
    nodes: Vec<TreeNode>,
    importances: Vec<f64>,
}

struct SplitCandidate {
    feature: usize,
    threshold: f64,
    decrease: f64,
}

impl TreeBuilder<'_, '_> {
    fn build(&mut self, indices: Vec<usize>, depth: usize) -> usize {
        let node_idx = self.nodes.len();
        let value = indices.iter().map(|&i| self.y[i]).sum::<f64>() / indices.len().max(1) as f64;
        self.nodes.push(TreeNode::Leaf { value });

        if depth >= self.max_depth || indices.len() < self.min_samples_split {
            return node_idx;
        }

        let Some(split) = self.best_split(&indices) else {
            return node_idx;
        };

        let (left_idx, right_idx): (Vec<usize>, Vec<usize>) = indices
            .into_iter()
            .partition(|&i| self.x[[i, split.feature]] <= split.threshold);

        self.importances[split.feature] += split.decrease;

        let left = self.build(left_idx, depth + 1);
        let right = self.build(right_idx, depth + 1);
        self.nodes[node_idx] = TreeNode::Split {
            feature: split.feature,
            threshold: split.threshold,
            left,
            right,
        };

        node_idx
    }

    /// Best variance-reduction split over all features, or `None` when the
    /// node is pure or no split strictly reduces the squared error.
    fn best_split(&self, indices: &[usize]) -> Option<SplitCandidate> {
        let n = indices.len() as f64;
        let total_sum: f64 = indices.iter().map(|&i| self.y[i]).sum();
        let total_sq: f64 = indices.iter().map(|&i| self.y[i] * self.y[i]).sum();
        let parent_sse = total_sq - total_sum * total_sum / n;

        if parent_sse <= 1e-12 {
            return None;
        }

        let mut best: Option<SplitCandidate> = None;
        let mut sorted = indices.to_vec();

        for feature in 0..self.x.ncols() {
            sorted.sort_by(|&a, &b| {
                self.x[[a, feature]]
                    .partial_cmp(&self.x[[b, feature]])
                    .unwrap_or(Ordering::Equal)
            });

            let mut left_sum = 0.0;
            let mut left_sq = 0.0;

            for pos in 0..sorted.len() - 1 {
                let yi = self.y[sorted[pos]];
                left_sum += yi;
                left_sq += yi * yi;

                let current = self.x[[sorted[pos], feature]];
                let next = self.x[[sorted[pos + 1], feature]];
                if next <= current {
                    continue;
                }

                let n_left = (pos + 1) as f64;
                let n_right = n - n_left;
                let right_sum = total_sum - left_sum;
                let right_sq = total_sq - left_sq;

                let left_sse = left_sq - left_sum * left_sum / n_left;
                let right_sse = right_sq - right_sum * right_sum / n_right;
                let decrease = parent_sse - left_sse - right_sse;

                if decrease > 0.0 && best.as_ref().map_or(true, |b| decrease > b.decrease) {
                    best = Some(SplitCandidate {
                        feature,
                        threshold: (current + next) / 2.0,
                        decrease,
                    });
                }
            }
        }

        best
    }
}

/// Bagged ensemble of regression trees.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RandomForestRegressor {
    trees: Vec<RegressionTree>,
    n_features: usize,
    feature_importances: Vec<f64>,
}

impl RandomForestRegressor {
    /// Fit `params.n_estimators` trees, each on a bootstrap sample drawn from
    /// a generator seeded with `params.random_state`.
    pub fn fit(x: ArrayView2<f64>, y: &[f64], params: &ModelParams) -> Result<Self> {
        let n = x.nrows();
        if n == 0 {
            return Err(RankingError::InvalidInput(
                "Cannot fit random forest on zero rows".to_string(),
            ));
        }
        if y.len() != n {
            return Err(RankingError::InvalidInput(format!(
                "Target has {} values for {} rows",
                y.len(),
                n
            )));
        }
        if params.n_estimators == 0 {
            return Err(RankingError::InvalidInput(
                "n_estimators must be greater than 0".to_string(),
            ));
        }

        let mut rng = ChaCha8Rng::seed_from_u64(params.random_state);
        let mut trees = Vec::with_capacity(params.n_estimators);
        let mut importances = vec![0.0; x.ncols()];

        for _ in 0..params.n_estimators {
            let sample: Vec<usize> = (0..n).map(|_| rng.gen_range(0..n)).collect();
            let (tree, tree_importances) =
                RegressionTree::fit(x, y, sample, params.max_depth, params.min_samples_split);

            // Each tree contributes a normalized importance vector
            let total: f64 = tree_importances.iter().sum();
            if total > 0.0 {
                for (acc, v) in importances.iter_mut().zip(&tree_importances) {
                    *acc += v / total;
                }
            }
            trees.push(tree);
        }

        let total: f64 = importances.iter().sum();
        if total > 0.0 {
            importances.iter_mut().for_each(|v| *v /= total);
        }

        debug!(
            n_trees = trees.len(),
            n_rows = n,
            n_features = x.ncols(),
            "Fitted random forest"
        );

        Ok(Self {
            trees,
            n_features: x.ncols(),
            feature_importances: importances,
        })
    }

    pub fn predict(&self, x: ArrayView2<f64>) -> Result<Array1<f64>> {
        if x.ncols() != self.n_features {
            return Err(RankingError::InvalidInput(format!(
                "Expected {} features, got {}",
                self.n_features,
                x.ncols()
            )));
        }

        let n_trees = self.trees.len() as f64;
        Ok(x.outer_iter()
            .map(|row| {
                self.trees
                    .iter()
                    .map(|tree| tree.predict_row(row))
                    .sum::<f64>()
                    / n_trees
            })
            .collect())
    }

    /// Normalized mean impurity decrease per feature (sums to 1 unless every
    /// tree is a single leaf).
    pub fn feature_importances(&self) -> &[f64] {
        &self.feature_importances
    }

    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    pub fn trees(&self) -> &[RegressionTree] {
        &self.trees
    }
}
