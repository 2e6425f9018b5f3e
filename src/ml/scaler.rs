use crate::error::{AppError, Result};
use ndarray::{Array2, Axis};
use serde::{Deserialize, Serialize};

/// Column-wise standardization fitted on training data only.
///
/// Stored inside the forecast artifact so inference applies the exact
/// training-time statistics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StandardScaler {
    means: Vec<f64>,
    stds: Vec<f64>,
}

impl StandardScaler {
    pub fn fit(data: &Array2<f64>) -> Result<Self> {
        if data.nrows() == 0 {
            return Err(AppError::Training(
                "cannot fit scaler on an empty matrix".to_string(),
            ));
        }

        let n = data.nrows() as f64;
        let means: Vec<f64> = data
            .mean_axis(Axis(0))
            .ok_or_else(|| AppError::Training("failed to compute column means".to_string()))?
            .to_vec();
        let stds: Vec<f64> = data
            .axis_iter(Axis(1))
            .zip(&means)
            .map(|(column, mean)| {
                (column.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n).sqrt()
            })
            .collect();

        Ok(Self { means, stds })
    }

    pub fn transform(&self, data: &Array2<f64>) -> Result<Array2<f64>> {
        if data.ncols() != self.means.len() {
            return Err(AppError::Internal(format!(
                "scaler fitted on {} columns, got {}",
                self.means.len(),
                data.ncols()
            )));
        }

        let mut scaled = data.clone();
        for (j, mut column) in scaled.axis_iter_mut(Axis(1)).enumerate() {
            let std = if self.stds[j] > 0.0 { self.stds[j] } else { 1.0 };
            column.mapv_inplace(|v| (v - self.means[j]) / std);
        }
        Ok(scaled)
    }

    pub fn transform_row(&self, row: &[f64]) -> Result<Vec<f64>> {
        if row.len() != self.means.len() {
            return Err(AppError::Internal(format!(
                "scaler fitted on {} columns, got {}",
                self.means.len(),
                row.len()
            )));
        }

        Ok(row
            .iter()
            .enumerate()
            .map(|(j, v)| {
                let std = if self.stds[j] > 0.0 { self.stds[j] } else { 1.0 };
                (v - self.means[j]) / std
            })
            .collect())
    }
}
