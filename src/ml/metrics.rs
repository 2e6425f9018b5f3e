use serde::{Deserialize, Serialize};

/// Train/test regression metrics reported by the forecaster
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegressionMetrics {
    pub train_rmse: f64,
    pub test_rmse: f64,
    pub train_mae: f64,
    pub test_mae: f64,
}

/// Root mean squared error
pub fn rmse(y_true: &[f64], y_pred: &[f64]) -> f64 {
    if y_true.is_empty() {
        return 0.0;
    }
    let sum: f64 = y_true
        .iter()
        .zip(y_pred.iter())
        .map(|(t, p)| (t - p).powi(2))
        .sum();
    (sum / y_true.len() as f64).sqrt()
}

/// Mean absolute error
pub fn mae(y_true: &[f64], y_pred: &[f64]) -> f64 {
    if y_true.is_empty() {
        return 0.0;
    }
    let sum: f64 = y_true
        .iter()
        .zip(y_pred.iter())
        .map(|(t, p)| (t - p).abs())
        .sum();
    sum / y_true.len() as f64
}
