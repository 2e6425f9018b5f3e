use crate::config::GbmSettings;
use crate::error::{AppError, Result};
use ndarray::Array2;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Hyperparameters for gradient-boosted regression
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GbmParams {
    pub n_estimators: usize,
    pub max_depth: usize,
    pub learning_rate: f64,
    pub min_samples_leaf: usize,
}

impl From<&GbmSettings> for GbmParams {
    fn from(settings: &GbmSettings) -> Self {
        Self {
            n_estimators: settings.n_estimators,
            max_depth: settings.max_depth,
            learning_rate: settings.learning_rate,
            min_samples_leaf: settings.min_samples_leaf,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Split {
    feature: usize,
    threshold: f64,
    left: usize,
    right: usize,
}

/// Tree node; `value` is the mean residual of the training samples that
/// reached it, kept at internal nodes as well for path attribution.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct TreeNode {
    value: f64,
    split: Option<Split>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct RegressionTree {
    nodes: Vec<TreeNode>,
}

struct TreeBuilder<'a> {
    x: &'a Array2<f64>,
    residuals: &'a [f64],
    params: &'a GbmParams,
    nodes: Vec<TreeNode>,
    feature_gains: Vec<f64>,
}

impl<'a> TreeBuilder<'a> {
    fn build(
        x: &'a Array2<f64>,
        residuals: &'a [f64],
        params: &'a GbmParams,
    ) -> (RegressionTree, Vec<f64>) {
        let mut builder = TreeBuilder {
            x,
            residuals,
            params,
            nodes: Vec::new(),
            feature_gains: vec![0.0; x.ncols()],
        };
        let indices: Vec<usize> = (0..residuals.len()).collect();
        builder.grow(&indices, 0);
        (
            RegressionTree {
                nodes: builder.nodes,
            },
            builder.feature_gains,
        )
    }

    fn grow(&mut self, indices: &[usize], depth: usize) -> usize {
        let value = self.mean(indices);
        let node_id = self.nodes.len();
        self.nodes.push(TreeNode { value, split: None });

        if depth >= self.params.max_depth
            || indices.len() < 2 * self.params.min_samples_leaf
        {
            return node_id;
        }

        let Some((feature, threshold, gain)) = self.best_split(indices) else {
            return node_id;
        };

        let (left_indices, right_indices): (Vec<usize>, Vec<usize>) = indices
            .iter()
            .copied()
            .partition(|&i| self.x[[i, feature]] <= threshold);

        self.feature_gains[feature] += gain;
        let left = self.grow(&left_indices, depth + 1);
        let right = self.grow(&right_indices, depth + 1);
        self.nodes[node_id].split = Some(Split {
            feature,
            threshold,
            left,
            right,
        });
        node_id
    }

    fn mean(&self, indices: &[usize]) -> f64 {
        indices.iter().map(|&i| self.residuals[i]).sum::<f64>() / indices.len() as f64
    }

    /// Exhaustive variance-reduction search over all features.
    ///
    /// For each feature the samples are sorted once and candidate
    /// thresholds scanned with running sums, so each evaluation is O(1).
    fn best_split(&self, indices: &[usize]) -> Option<(usize, f64, f64)> {
        let n = indices.len() as f64;
        let total_sum: f64 = indices.iter().map(|&i| self.residuals[i]).sum();
        let total_sq: f64 = indices.iter().map(|&i| self.residuals[i].powi(2)).sum();
        let parent_sse = total_sq - total_sum.powi(2) / n;

        let mut best: Option<(usize, f64, f64)> = None;
        for feature in 0..self.x.ncols() {
            let mut order: Vec<usize> = indices.to_vec();
            order.sort_by(|&a, &b| {
                self.x[[a, feature]]
                    .partial_cmp(&self.x[[b, feature]])
                    .unwrap_or(std::cmp::Ordering::Equal)
            });

            let mut left_sum = 0.0;
            let mut left_sq = 0.0;
            for (k, &i) in order.iter().enumerate().take(order.len() - 1) {
                left_sum += self.residuals[i];
                left_sq += self.residuals[i].powi(2);

                let left_n = (k + 1) as f64;
                let right_n = n - left_n;
                if (k + 1) < self.params.min_samples_leaf
                    || (order.len() - k - 1) < self.params.min_samples_leaf
                {
                    continue;
                }

                let here = self.x[[i, feature]];
                let next = self.x[[order[k + 1], feature]];
                if here == next {
                    continue;
                }

                let right_sum = total_sum - left_sum;
                let right_sq = total_sq - left_sq;
                let children_sse = (left_sq - left_sum.powi(2) / left_n)
                    + (right_sq - right_sum.powi(2) / right_n);
                let gain = parent_sse - children_sse;
                if gain > 1e-12
                    && best.map_or(true, |(_, _, best_gain)| gain > best_gain)
                {
                    best = Some((feature, (here + next) / 2.0, gain));
                }
            }
        }
        best
    }
}

impl RegressionTree {
    fn predict(&self, row: &[f64]) -> f64 {
        let mut node = &self.nodes[0];
        while let Some(split) = &node.split {
            node = if row[split.feature] <= split.threshold {
                &self.nodes[split.left]
            } else {
                &self.nodes[split.right]
            };
        }
        node.value
    }

    /// Walk the decision path, attributing each node-to-child value change
    /// to the split feature. Returns the leaf value.
    fn accumulate_contributions(&self, row: &[f64], out: &mut [f64]) -> f64 {
        let mut node = &self.nodes[0];
        while let Some(split) = &node.split {
            let child = if row[split.feature] <= split.threshold {
                &self.nodes[split.left]
            } else {
                &self.nodes[split.right]
            };
            out[split.feature] += child.value - node.value;
            node = child;
        }
        node.value
    }
}

/// Least-squares gradient-boosted regression over depth-limited trees.
///
/// Fitting is fully deterministic: no subsampling, no randomized feature
/// selection, ties broken by feature index order. Serializing and
/// reloading the model reproduces predictions bit for bit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GbmRegressor {
    base_prediction: f64,
    learning_rate: f64,
    n_features: usize,
    trees: Vec<RegressionTree>,
    feature_gains: Vec<f64>,
}

impl GbmRegressor {
    pub fn fit(x: &Array2<f64>, y: &[f64], params: &GbmParams) -> Result<Self> {
        if x.nrows() == 0 {
            return Err(AppError::Training(
                "cannot fit on an empty training set".to_string(),
            ));
        }
        if x.nrows() != y.len() {
            return Err(AppError::Training(format!(
                "feature matrix has {} rows but target has {}",
                x.nrows(),
                y.len()
            )));
        }
        if x.iter().any(|v| !v.is_finite()) || y.iter().any(|v| !v.is_finite()) {
            return Err(AppError::Training(
                "training data contains non-finite values".to_string(),
            ));
        }

        let base_prediction = y.iter().sum::<f64>() / y.len() as f64;
        let mut predictions = vec![base_prediction; y.len()];
        let mut trees = Vec::with_capacity(params.n_estimators);
        let mut feature_gains = vec![0.0; x.ncols()];

        for round in 0..params.n_estimators {
            let residuals: Vec<f64> = y
                .iter()
                .zip(&predictions)
                .map(|(target, pred)| target - pred)
                .collect();

            let (tree, gains) = TreeBuilder::build(x, &residuals, params);
            for (total, gain) in feature_gains.iter_mut().zip(&gains) {
                *total += gain;
            }

            for (i, prediction) in predictions.iter_mut().enumerate() {
                let row: Vec<f64> = x.row(i).to_vec();
                *prediction += params.learning_rate * tree.predict(&row);
            }
            trees.push(tree);

            if round % 50 == 0 {
                let rmse = (y
                    .iter()
                    .zip(&predictions)
                    .map(|(t, p)| (t - p).powi(2))
                    .sum::<f64>()
                    / y.len() as f64)
                    .sqrt();
                debug!(round, rmse, "Boosting progress");
            }
        }

        Ok(Self {
            base_prediction,
            learning_rate: params.learning_rate,
            n_features: x.ncols(),
            trees,
            feature_gains,
        })
    }

    pub fn n_features(&self) -> usize {
        self.n_features
    }

    pub fn predict_row(&self, row: &[f64]) -> Result<f64> {
        if row.len() != self.n_features {
            return Err(AppError::Internal(format!(
                "model fitted on {} features, got {}",
                self.n_features,
                row.len()
            )));
        }
        Ok(self.base_prediction
            + self
                .trees
                .iter()
                .map(|tree| self.learning_rate * tree.predict(row))
                .sum::<f64>())
    }

    pub fn predict(&self, x: &Array2<f64>) -> Result<Vec<f64>> {
        x.rows()
            .into_iter()
            .map(|row| self.predict_row(&row.to_vec()))
            .collect()
    }

    /// Total split gain per feature, normalized to sum to one.
    /// All zeros when no split was ever made.
    pub fn feature_importances(&self) -> Vec<f64> {
        let total: f64 = self.feature_gains.iter().sum();
        if total <= 0.0 {
            return vec![0.0; self.n_features];
        }
        self.feature_gains.iter().map(|g| g / total).collect()
    }

    /// Per-feature additive contributions for one prediction.
    ///
    /// Returns (bias, contributions) with
    /// prediction = bias + contributions.sum().
    pub fn contributions(&self, row: &[f64]) -> Result<(f64, Vec<f64>)> {
        if row.len() != self.n_features {
            return Err(AppError::Internal(format!(
                "model fitted on {} features, got {}",
                self.n_features,
                row.len()
            )));
        }

        let mut contributions = vec![0.0; self.n_features];
        let mut per_tree = vec![0.0; self.n_features];
        for tree in &self.trees {
            per_tree.iter_mut().for_each(|v| *v = 0.0);
            tree.accumulate_contributions(row, &mut per_tree);
            for (total, c) in contributions.iter_mut().zip(&per_tree) {
                *total += self.learning_rate * c;
            }
        }
        Ok((self.base_prediction, contributions))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array2;

    fn params(n_estimators: usize, max_depth: usize) -> GbmParams {
        GbmParams {
            n_estimators,
            max_depth,
            learning_rate: 0.1,
            min_samples_leaf: 1,
        }
    }

    fn step_data() -> (Array2<f64>, Vec<f64>) {
        // y = 10 for x < 5, y = 50 for x >= 5
        let rows: Vec<f64> = (0..20).map(f64::from).collect();
        let y: Vec<f64> = rows.iter().map(|&x| if x < 5.0 { 10.0 } else { 50.0 }).collect();
        let x = Array2::from_shape_vec((20, 1), rows).unwrap();
        (x, y)
    }

    #[test]
    fn test_learns_step_function() {
        let (x, y) = step_data();
        let model = GbmRegressor::fit(&x, &y, &params(100, 3)).unwrap();

        assert!((model.predict_row(&[2.0]).unwrap() - 10.0).abs() < 1.0);
        assert!((model.predict_row(&[15.0]).unwrap() - 50.0).abs() < 1.0);
    }

    #[test]
    fn test_zero_trees_predicts_target_mean() {
        let (x, y) = step_data();
        let model = GbmRegressor::fit(&x, &y, &params(0, 3)).unwrap();
        let mean = y.iter().sum::<f64>() / y.len() as f64;

        assert!((model.predict_row(&[3.0]).unwrap() - mean).abs() < 1e-12);
    }

    #[test]
    fn test_fit_is_deterministic() {
        let (x, y) = step_data();
        let a = GbmRegressor::fit(&x, &y, &params(30, 3)).unwrap();
        let b = GbmRegressor::fit(&x, &y, &params(30, 3)).unwrap();

        for value in [0.0, 4.5, 7.0, 19.0] {
            assert_eq!(
                a.predict_row(&[value]).unwrap(),
                b.predict_row(&[value]).unwrap()
            );
        }
    }

    #[test]
    fn test_serde_round_trip_preserves_predictions() {
        let (x, y) = step_data();
        let model = GbmRegressor::fit(&x, &y, &params(30, 3)).unwrap();

        let bytes = bincode::serialize(&model).unwrap();
        let restored: GbmRegressor = bincode::deserialize(&bytes).unwrap();

        for value in [1.0, 6.0, 12.0] {
            assert_eq!(
                model.predict_row(&[value]).unwrap(),
                restored.predict_row(&[value]).unwrap()
            );
        }
    }

    #[test]
    fn test_importances_identify_informative_feature() {
        // Column 0 drives the target, column 1 is constant
        let mut data = Vec::new();
        let mut y = Vec::new();
        for i in 0..30 {
            data.push(f64::from(i));
            data.push(7.0);
            y.push(f64::from(i) * 3.0);
        }
        let x = Array2::from_shape_vec((30, 2), data).unwrap();
        let model = GbmRegressor::fit(&x, &y, &params(20, 3)).unwrap();

        let importances = model.feature_importances();
        assert!((importances.iter().sum::<f64>() - 1.0).abs() < 1e-9);
        assert!(importances[0] > 0.99);
        assert!(importances[1] < 0.01);
    }

    #[test]
    fn test_contributions_sum_to_prediction() {
        let (x, y) = step_data();
        let model = GbmRegressor::fit(&x, &y, &params(50, 3)).unwrap();

        for value in [2.0, 8.0, 16.0] {
            let row = [value];
            let prediction = model.predict_row(&row).unwrap();
            let (bias, contributions) = model.contributions(&row).unwrap();
            let reconstructed = bias + contributions.iter().sum::<f64>();
            assert!((prediction - reconstructed).abs() < 1e-9);
        }
    }

    #[test]
    fn test_rejects_non_finite_input() {
        let x = Array2::from_shape_vec((2, 1), vec![1.0, f64::NAN]).unwrap();
        assert!(GbmRegressor::fit(&x, &[1.0, 2.0], &params(5, 2)).is_err());
    }

    #[test]
    fn test_rejects_mismatched_lengths() {
        let x = Array2::from_shape_vec((2, 1), vec![1.0, 2.0]).unwrap();
        assert!(GbmRegressor::fit(&x, &[1.0], &params(5, 2)).is_err());
    }

    #[test]
    fn test_predict_row_rejects_wrong_width() {
        let (x, y) = step_data();
        let model = GbmRegressor::fit(&x, &y, &params(5, 2)).unwrap();
        assert!(model.predict_row(&[1.0, 2.0]).is_err());
    }

    #[test]
    fn test_min_samples_leaf_limits_growth() {
        let (x, y) = step_data();
        let strict = GbmParams {
            n_estimators: 1,
            max_depth: 10,
            learning_rate: 1.0,
            min_samples_leaf: 10,
        };
        let model = GbmRegressor::fit(&x, &y, &strict).unwrap();
        // with 20 samples and leaves of at least 10, only one split fits
        assert!(model.trees[0].nodes.len() <= 3);
    }
}
