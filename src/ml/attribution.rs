use crate::ml::gbm::GbmRegressor;
use ndarray::Array2;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// Mean absolute per-feature contribution over a sample of rows
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Attribution {
    pub feature_columns: Vec<String>,
    pub mean_abs_contribution: Vec<f64>,
    pub rows_evaluated: usize,
}

impl Attribution {
    /// Features ranked by mean absolute contribution, strongest first
    pub fn ranked(&self) -> Vec<(String, f64)> {
        let mut pairs: Vec<(String, f64)> = self
            .feature_columns
            .iter()
            .cloned()
            .zip(self.mean_abs_contribution.iter().copied())
            .collect();
        pairs.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        pairs
    }
}

/// Local explanation backend for trained forecast models.
///
/// Attribution is diagnostic output: implementations return `None` rather
/// than failing the pipeline when they cannot produce a report.
pub trait Attributor: Send + Sync {
    fn explain(
        &self,
        model: &GbmRegressor,
        data: &Array2<f64>,
        feature_columns: &[String],
    ) -> Option<Attribution>;
}

/// Tree-path attribution: each prediction is decomposed into additive
/// per-feature contributions by walking the decision paths.
pub struct PathAttributor {
    max_rows: usize,
}

impl PathAttributor {
    pub fn new(max_rows: usize) -> Self {
        Self { max_rows }
    }
}

impl Attributor for PathAttributor {
    fn explain(
        &self,
        model: &GbmRegressor,
        data: &Array2<f64>,
        feature_columns: &[String],
    ) -> Option<Attribution> {
        if data.nrows() == 0 || self.max_rows == 0 {
            return None;
        }

        let rows = data.nrows().min(self.max_rows);
        let mut totals = vec![0.0; feature_columns.len()];
        for i in 0..rows {
            let row: Vec<f64> = data.row(i).to_vec();
            match model.contributions(&row) {
                Ok((_, contributions)) => {
                    for (total, c) in totals.iter_mut().zip(&contributions) {
                        *total += c.abs();
                    }
                }
                Err(e) => {
                    warn!(error = %e, "Attribution failed, continuing without it");
                    return None;
                }
            }
        }

        for total in &mut totals {
            *total /= rows as f64;
        }
        info!(rows, "Computed feature attribution");
        Some(Attribution {
            feature_columns: feature_columns.to_vec(),
            mean_abs_contribution: totals,
            rows_evaluated: rows,
        })
    }
}

/// Disabled attribution; always yields no report
pub struct NoopAttributor;

impl Attributor for NoopAttributor {
    fn explain(
        &self,
        _model: &GbmRegressor,
        _data: &Array2<f64>,
        _feature_columns: &[String],
    ) -> Option<Attribution> {
        None
    }
}

/// Select the attribution backend from configuration
pub fn resolve_attributor(enabled: bool, sample_rows: usize) -> Box<dyn Attributor> {
    if enabled {
        Box::new(PathAttributor::new(sample_rows))
    } else {
        Box::new(NoopAttributor)
    }
}
