//! Random forest regression.
//!
//! # Overview
//!
//! Each tree is grown on a bootstrap sample of the training rows. At every
//! node all features are scanned and the split that minimises the summed
//! squared error of both children is taken; growth stops at `max_depth`,
//! on pure nodes, or when fewer than `min_samples_split` rows remain.
//! Predictions average the leaf values of all trees.
//!
//! [`ForestParams`] is the `linfa` hyper-parameter set: fitting it on a
//! [`linfa::Dataset`] yields a [`RandomForestRegressor`], which predicts
//! through `linfa`'s `Predict`.
//!
//! Feature importance is the total impurity decrease contributed by each
//! feature, normalised per tree, averaged over the forest and normalised
//! again so it sums to one.

use linfa::prelude::{DatasetBase, Fit, PredictInplace};
use ndarray::{Array1, Array2, ArrayView1};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use super::ModelError;

const PURITY_EPSILON: f64 = 1e-12;

// ============================================================================
// ForestParams
// ============================================================================

/// Hyper-parameters of a [`RandomForestRegressor`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ForestParams {
    /// Number of trees in the ensemble.
    pub n_estimators: usize,
    /// Maximum tree depth, `None` grows until nodes are pure.
    pub max_depth: Option<usize>,
    /// Minimum rows a node needs to be split.
    pub min_samples_split: usize,
    /// Seed for the bootstrap sampling.
    pub seed: u64,
}

impl Default for ForestParams {
    fn default() -> Self {
        Self {
            n_estimators: 100,
            max_depth: None,
            min_samples_split: 2,
            seed: 1,
        }
    }
}

// ============================================================================
// Regression tree
// ============================================================================

#[derive(Clone, Debug)]
enum Node {
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

#[derive(Clone, Debug)]
struct RegressionTree {
    nodes: Vec<Node>,
}

struct SplitCandidate {
    feature: usize,
    threshold: f64,
    /// Summed squared error of both children.
    sse: f64,
}

/// Running sums of a set of targets.
#[derive(Clone, Copy, Default)]
struct Moments {
    n: f64,
    sum: f64,
    sum_sq: f64,
}

impl Moments {
    fn push(&mut self, v: f64) {
        self.n += 1.0;
        self.sum += v;
        self.sum_sq += v * v;
    }

    fn sub(self, other: Moments) -> Moments {
        Moments {
            n: self.n - other.n,
            sum: self.sum - other.sum,
            sum_sq: self.sum_sq - other.sum_sq,
        }
    }

    fn sse(&self) -> f64 {
        if self.n == 0.0 {
            return 0.0;
        }
        (self.sum_sq - self.sum * self.sum / self.n).max(0.0)
    }

    fn mean(&self) -> f64 {
        if self.n == 0.0 { 0.0 } else { self.sum / self.n }
    }
}

struct TreeBuilder<'a> {
    x: &'a Array2<f64>,
    y: &'a Array1<f64>,
    params: &'a ForestParams,
    nodes: Vec<Node>,
    importances: Vec<f64>,
}

impl<'a> TreeBuilder<'a> {
    fn build(mut self, rows: Vec<usize>) -> (RegressionTree, Vec<f64>) {
        self.grow(rows, 0);
        (RegressionTree { nodes: self.nodes }, self.importances)
    }

    fn grow(&mut self, rows: Vec<usize>, depth: usize) -> usize {
        let mut moments = Moments::default();
        for &r in &rows {
            moments.push(self.y[r]);
        }

        let depth_reached = self.params.max_depth.is_some_and(|d| depth >= d);
        let parent_sse = moments.sse();
        if depth_reached
            || rows.len() < self.params.min_samples_split.max(2)
            || parent_sse <= PURITY_EPSILON * moments.n
        {
            return self.leaf(moments.mean());
        }

        let Some(best) = self.best_split(&rows, moments) else {
            return self.leaf(moments.mean());
        };

        self.importances[best.feature] += parent_sse - best.sse;

        let (left_rows, right_rows): (Vec<usize>, Vec<usize>) = rows
            .into_iter()
            .partition(|&r| self.x[[r, best.feature]] <= best.threshold);

        let idx = self.nodes.len();
        self.nodes.push(Node::Leaf { value: 0.0 });
        let left = self.grow(left_rows, depth + 1);
        let right = self.grow(right_rows, depth + 1);
        self.nodes[idx] = Node::Split {
            feature: best.feature,
            threshold: best.threshold,
            left,
            right,
        };
        idx
    }

    fn leaf(&mut self, value: f64) -> usize {
        self.nodes.push(Node::Leaf { value });
        self.nodes.len() - 1
    }

    fn best_split(&self, rows: &[usize], total: Moments) -> Option<SplitCandidate> {
        let mut best: Option<SplitCandidate> = None;
        let mut order: Vec<usize> = rows.to_vec();

        for feature in 0..self.x.ncols() {
            order.sort_by(|&a, &b| self.x[[a, feature]].total_cmp(&self.x[[b, feature]]));

            let mut left = Moments::default();
            for pos in 0..order.len() - 1 {
                let row = order[pos];
                left.push(self.y[row]);

                let current = self.x[[row, feature]];
                let next = self.x[[order[pos + 1], feature]];
                if current == next {
                    continue;
                }

                let right = total.sub(left);
                let sse = left.sse() + right.sse();
                if best.as_ref().map_or(true, |b| sse < b.sse) {
                    best = Some(SplitCandidate {
                        feature,
                        threshold: current + (next - current) / 2.0,
                        sse,
                    });
                }
            }
        }

        best
    }
}

impl RegressionTree {
    fn predict_row(&self, row: ArrayView1<'_, f64>) -> f64 {
        let mut idx = 0;
        loop {
            match &self.nodes[idx] {
                Node::Leaf { value } => return *value,
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    idx = if row[*feature] <= *threshold { *left } else { *right };
                }
            }
        }
    }
}

// ============================================================================
// RandomForestRegressor
// ============================================================================

/// Bagged ensemble of regression trees, produced by fitting [`ForestParams`].
#[derive(Clone, Debug)]
pub struct RandomForestRegressor {
    trees: Vec<RegressionTree>,
    n_features: usize,
    importances: Vec<f64>,
}

impl RandomForestRegressor {
    /// Normalised impurity-based importance per fitted feature column.
    pub fn feature_importances(&self) -> &[f64] {
        &self.importances
    }
}

impl Fit<Array2<f64>, Array1<f64>, ModelError> for ForestParams {
    type Object = RandomForestRegressor;

    fn fit(&self, dataset: &DatasetBase<Array2<f64>, Array1<f64>>) -> Result<Self::Object, ModelError> {
        let x = &dataset.records;
        let y = &dataset.targets;
        if x.nrows() != y.len() {
            return Err(ModelError::ShapeMismatch {
                rows: x.nrows(),
                targets: y.len(),
            });
        }
        if x.nrows() == 0 {
            return Err(ModelError::NotEnoughRows { train: 0, test: 0 });
        }

        let n_rows = x.nrows();
        let n_features = x.ncols();
        let mut rng = ChaCha8Rng::seed_from_u64(self.seed);
        let mut trees = Vec::with_capacity(self.n_estimators);
        let mut importances = vec![0.0; n_features];

        for _ in 0..self.n_estimators.max(1) {
            let sample: Vec<usize> = (0..n_rows).map(|_| rng.gen_range(0..n_rows)).collect();
            let builder = TreeBuilder {
                x,
                y,
                params: self,
                nodes: Vec::new(),
                importances: vec![0.0; n_features],
            };
            let (tree, tree_importances) = builder.build(sample);

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

        Ok(RandomForestRegressor {
            trees,
            n_features,
            importances,
        })
    }
}

impl PredictInplace<Array2<f64>, Array1<f64>> for RandomForestRegressor {
    /// Average prediction of all trees, one value per row of `x`.
    ///
    /// # Panics
    ///
    /// If `x` does not have the column count the forest was fitted on, or
    /// `y` does not have one slot per row.
    fn predict_inplace(&self, x: &Array2<f64>, y: &mut Array1<f64>) {
        assert_eq!(
            x.ncols(),
            self.n_features,
            "forest was fitted on {} features",
            self.n_features
        );
        assert_eq!(x.nrows(), y.len(), "one target slot per row");

        let n_trees = self.trees.len() as f64;
        for (row, target) in x.rows().into_iter().zip(y.iter_mut()) {
            *target = self.trees.iter().map(|t| t.predict_row(row)).sum::<f64>() / n_trees;
        }
    }

    fn default_target(&self, x: &Array2<f64>) -> Array1<f64> {
        Array1::zeros(x.nrows())
    }
}
