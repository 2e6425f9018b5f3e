use crate::error::{AppError, Result};
use crate::models::MonthlyAggregation;
use ndarray::Array2;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::f64::consts::PI;
use tracing::info;

/// Ordered feature columns consumed by the crime-count forecaster.
///
/// The same list is stored in the forecast artifact and replayed at
/// inference so both sides project rows identically.
pub const FORECAST_FEATURE_COLUMNS: [&str; 16] = [
    "lag_1",
    "lag_3",
    "lag_6",
    "lag_12",
    "rolling_mean_3",
    "rolling_std_3",
    "rolling_mean_6",
    "trend",
    "month_sin",
    "month_cos",
    "is_summer",
    "is_winter",
    "lat_norm",
    "lon_norm",
    "female_ratio",
    "avg_victim_age",
];

/// Months flagged as summer / winter season
const SUMMER_MONTHS: [u32; 3] = [4, 5, 6];
const WINTER_MONTHS: [u32; 3] = [12, 1, 2];

/// One engineered feature row for a (location, year, month).
///
/// Lag and rolling-std values are `None` when the location has insufficient
/// history at that position; such rows must be dropped before fitting,
/// never imputed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeatureRow {
    pub location_id: String,
    pub year: i32,
    pub month: u32,

    /// Regression target
    pub crime_count: f64,

    pub lag_1: Option<f64>,
    pub lag_3: Option<f64>,
    pub lag_6: Option<f64>,
    pub lag_12: Option<f64>,

    pub rolling_mean_3: f64,
    pub rolling_std_3: Option<f64>,
    pub rolling_mean_6: f64,

    /// Zero-based chronological index within the location
    pub trend: f64,

    pub month_sin: f64,
    pub month_cos: f64,
    pub is_summer: f64,
    pub is_winter: f64,

    pub lat_norm: f64,
    pub lon_norm: f64,

    pub female_ratio: f64,
    pub avg_victim_age: f64,
}

impl FeatureRow {
    /// Look up a feature by column name; `None` means the value is
    /// undefined at this position (insufficient history).
    pub fn value(&self, column: &str) -> Option<f64> {
        match column {
            "lag_1" => self.lag_1,
            "lag_3" => self.lag_3,
            "lag_6" => self.lag_6,
            "lag_12" => self.lag_12,
            "rolling_mean_3" => Some(self.rolling_mean_3),
            "rolling_std_3" => self.rolling_std_3,
            "rolling_mean_6" => Some(self.rolling_mean_6),
            "trend" => Some(self.trend),
            "month_sin" => Some(self.month_sin),
            "month_cos" => Some(self.month_cos),
            "is_summer" => Some(self.is_summer),
            "is_winter" => Some(self.is_winter),
            "lat_norm" => Some(self.lat_norm),
            "lon_norm" => Some(self.lon_norm),
            "female_ratio" => Some(self.female_ratio),
            "avg_victim_age" => Some(self.avg_victim_age),
            _ => None,
        }
    }

    /// Whether every forecast feature column is defined for this row
    pub fn is_complete(&self) -> bool {
        FORECAST_FEATURE_COLUMNS
            .iter()
            .all(|column| self.value(column).is_some())
    }

    /// Project this row onto an ordered column list.
    ///
    /// Shared between training and inference so the feature schema cannot
    /// silently diverge.
    pub fn project(&self, columns: &[String]) -> Result<Vec<f64>> {
        columns
            .iter()
            .map(|column| {
                self.value(column).ok_or_else(|| {
                    AppError::Internal(format!(
                        "undefined feature '{}' reached projection; incomplete rows must be dropped first",
                        column
                    ))
                })
            })
            .collect()
    }
}

/// Derive lag, rolling, trend, seasonality, geographic, and demographic
/// features from monthly aggregation rows.
///
/// Rows are grouped per location and ordered by (year, month); lag and
/// rolling statistics never cross a location boundary. Geographic
/// normalization uses the mean/std of the dataset passed in.
pub fn engineer_features(rows: &[MonthlyAggregation]) -> Vec<FeatureRow> {
    let (lat_mean, lat_std) = mean_std(rows.iter().map(|r| r.latitude));
    let (lon_mean, lon_std) = mean_std(rows.iter().map(|r| r.longitude));

    let mut by_location: BTreeMap<&str, Vec<&MonthlyAggregation>> = BTreeMap::new();
    for row in rows {
        by_location.entry(&row.location_id).or_default().push(row);
    }

    let mut features = Vec::with_capacity(rows.len());
    for (_, mut location_rows) in by_location {
        location_rows.sort_by_key(|r| (r.year, r.month));
        let counts: Vec<f64> = location_rows
            .iter()
            .map(|r| f64::from(r.crime_count))
            .collect();

        for (i, row) in location_rows.iter().enumerate() {
            let month = f64::from(row.month);
            features.push(FeatureRow {
                location_id: row.location_id.clone(),
                year: row.year,
                month: row.month,
                crime_count: counts[i],
                lag_1: lag(&counts, i, 1),
                lag_3: lag(&counts, i, 3),
                lag_6: lag(&counts, i, 6),
                lag_12: lag(&counts, i, 12),
                rolling_mean_3: rolling_mean(&counts, i, 3),
                rolling_std_3: rolling_std(&counts, i, 3),
                rolling_mean_6: rolling_mean(&counts, i, 6),
                trend: i as f64,
                month_sin: (2.0 * PI * month / 12.0).sin(),
                month_cos: (2.0 * PI * month / 12.0).cos(),
                is_summer: f64::from(u8::from(SUMMER_MONTHS.contains(&row.month))),
                is_winter: f64::from(u8::from(WINTER_MONTHS.contains(&row.month))),
                lat_norm: z_score(row.latitude, lat_mean, lat_std),
                lon_norm: z_score(row.longitude, lon_mean, lon_std),
                female_ratio: f64::from(row.female_victims)
                    / (f64::from(row.male_victims) + f64::from(row.female_victims) + 1.0),
                avg_victim_age: row.avg_victim_age,
            });
        }
    }

    features
}

/// Drop rows with any undefined lag/rolling value.
///
/// Required preprocessing before fitting: the regressor rejects undefined
/// inputs, and imputation would leak information across the split.
pub fn drop_incomplete(rows: Vec<FeatureRow>) -> Vec<FeatureRow> {
    let before = rows.len();
    let complete: Vec<FeatureRow> = rows.into_iter().filter(FeatureRow::is_complete).collect();
    info!(
        before,
        after = complete.len(),
        "Dropped feature rows with insufficient history"
    );
    complete
}

/// Build the (features, target) pair for fitting from complete rows
pub fn feature_matrix(rows: &[FeatureRow], columns: &[String]) -> Result<(Array2<f64>, Vec<f64>)> {
    let mut data = Vec::with_capacity(rows.len() * columns.len());
    let mut targets = Vec::with_capacity(rows.len());
    for row in rows {
        data.extend(row.project(columns)?);
        targets.push(row.crime_count);
    }

    let matrix = Array2::from_shape_vec((rows.len(), columns.len()), data)
        .map_err(|e| AppError::Internal(format!("failed to shape feature matrix: {}", e)))?;
    Ok((matrix, targets))
}

fn lag(counts: &[f64], i: usize, offset: usize) -> Option<f64> {
    if i >= offset {
        Some(counts[i - offset])
    } else {
        None
    }
}

fn rolling_window(counts: &[f64], i: usize, window: usize) -> &[f64] {
    let start = (i + 1).saturating_sub(window);
    &counts[start..=i]
}

/// Trailing rolling mean with minimum period 1
fn rolling_mean(counts: &[f64], i: usize, window: usize) -> f64 {
    let slice = rolling_window(counts, i, window);
    slice.iter().sum::<f64>() / slice.len() as f64
}

/// Trailing rolling sample standard deviation; undefined for a single
/// observation
fn rolling_std(counts: &[f64], i: usize, window: usize) -> Option<f64> {
    let slice = rolling_window(counts, i, window);
    if slice.len() < 2 {
        return None;
    }
    let mean = slice.iter().sum::<f64>() / slice.len() as f64;
    let variance =
        slice.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (slice.len() - 1) as f64;
    Some(variance.sqrt())
}

fn mean_std(values: impl Iterator<Item = f64> + Clone) -> (f64, f64) {
    let n = values.clone().count();
    if n == 0 {
        return (0.0, 0.0);
    }
    let mean = values.clone().sum::<f64>() / n as f64;
    if n < 2 {
        return (mean, 0.0);
    }
    let variance = values.map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1) as f64;
    (mean, variance.sqrt())
}

fn z_score(value: f64, mean: f64, std: f64) -> f64 {
    if std > 0.0 {
        (value - mean) / std
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn monthly(location: &str, year: i32, month: u32, count: u32) -> MonthlyAggregation {
        MonthlyAggregation {
            location_id: location.to_string(),
            year,
            month,
            crime_count: count,
            male_victims: 6,
            female_victims: 4,
            avg_victim_age: 32.0,
            latitude: 28.6 + if location == "B" { 10.0 } else { 0.0 },
            longitude: 77.2,
            population: 1_000_000.0,
        }
    }

    fn sequence(location: &str, counts: &[u32]) -> Vec<MonthlyAggregation> {
        counts
            .iter()
            .enumerate()
            .map(|(i, &count)| {
                let year = 2020 + (i / 12) as i32;
                let month = (i % 12) as u32 + 1;
                monthly(location, year, month, count)
            })
            .collect()
    }

    #[test]
    fn test_lag_positions() {
        let rows = sequence("A", &[10, 12, 8, 15, 20]);
        let features = engineer_features(&rows);

        assert_eq!(features[0].lag_1, None);
        assert_eq!(features[1].lag_1, Some(10.0));
        assert_eq!(features[4].lag_1, Some(15.0));
        assert_eq!(features[2].lag_3, None);
        assert_eq!(features[3].lag_3, Some(10.0));
        assert_eq!(features[4].lag_3, Some(12.0));
        assert!(features.iter().all(|f| f.lag_12.is_none()));
    }

    #[test]
    fn test_lag_12_defined_from_thirteenth_observation() {
        let counts = [10, 12, 8, 15, 20, 9, 11, 14, 13, 16, 18, 20, 25];
        let rows = sequence("L", &counts);
        let features = engineer_features(&rows);

        for feature in features.iter().take(12) {
            assert_eq!(feature.lag_12, None);
        }
        assert_eq!(features[12].lag_12, Some(10.0));
    }

    #[test]
    fn test_rolling_statistics() {
        let rows = sequence("A", &[10, 20, 30, 40]);
        let features = engineer_features(&rows);

        // mean over min(w, i+1) observations
        assert!((features[0].rolling_mean_3 - 10.0).abs() < 1e-12);
        assert!((features[1].rolling_mean_3 - 15.0).abs() < 1e-12);
        assert!((features[2].rolling_mean_3 - 20.0).abs() < 1e-12);
        assert!((features[3].rolling_mean_3 - 30.0).abs() < 1e-12);
        assert!((features[3].rolling_mean_6 - 25.0).abs() < 1e-12);

        // std undefined with a single observation, sample std afterwards
        assert_eq!(features[0].rolling_std_3, None);
        let std_2 = features[1].rolling_std_3.unwrap();
        assert!((std_2 - (50.0_f64).sqrt()).abs() < 1e-9);
    }

    #[test]
    fn test_lags_do_not_cross_locations() {
        let mut rows = sequence("A", &[10, 12]);
        rows.extend(sequence("B", &[100, 200]));
        let features = engineer_features(&rows);

        let b_first = features
            .iter()
            .find(|f| f.location_id == "B" && f.trend == 0.0)
            .unwrap();
        assert_eq!(b_first.lag_1, None);
        let b_second = features
            .iter()
            .find(|f| f.location_id == "B" && f.trend == 1.0)
            .unwrap();
        assert_eq!(b_second.lag_1, Some(100.0));
    }

    #[test]
    fn test_seasonality_features() {
        let rows = vec![monthly("A", 2022, 5, 10), monthly("A", 2022, 12, 10)];
        let features = engineer_features(&rows);

        let may = features.iter().find(|f| f.month == 5).unwrap();
        assert_eq!(may.is_summer, 1.0);
        assert_eq!(may.is_winter, 0.0);

        let december = features.iter().find(|f| f.month == 12).unwrap();
        assert_eq!(december.is_summer, 0.0);
        assert_eq!(december.is_winter, 1.0);
        assert!((december.month_sin - (2.0 * PI).sin()).abs() < 1e-9);
    }

    #[test]
    fn test_female_ratio_never_divides_by_zero() {
        let mut row = monthly("A", 2022, 1, 5);
        row.male_victims = 0;
        row.female_victims = 0;
        let features = engineer_features(&[row]);
        assert_eq!(features[0].female_ratio, 0.0);
    }

    #[test]
    fn test_drop_incomplete_removes_short_history() {
        let rows = sequence("A", &[10; 14]);
        let features = engineer_features(&rows);
        let complete = drop_incomplete(features);

        // 14 months: only positions 12 and 13 have lag_12
        assert_eq!(complete.len(), 2);
        assert!(complete.iter().all(|f| f.lag_12.is_some()));
    }

    #[test]
    fn test_projection_matches_column_order() {
        let rows = sequence("A", &[10; 13]);
        let features = drop_incomplete(engineer_features(&rows));
        let columns: Vec<String> = FORECAST_FEATURE_COLUMNS
            .iter()
            .map(|c| c.to_string())
            .collect();

        let vector = features[0].project(&columns).unwrap();
        assert_eq!(vector.len(), 16);
        assert_eq!(vector[0], features[0].lag_1.unwrap());
        assert_eq!(vector[7], features[0].trend);
        assert_eq!(vector[15], features[0].avg_victim_age);
    }

    #[test]
    fn test_projection_of_incomplete_row_fails() {
        let rows = sequence("A", &[10, 12]);
        let features = engineer_features(&rows);
        let columns: Vec<String> = FORECAST_FEATURE_COLUMNS
            .iter()
            .map(|c| c.to_string())
            .collect();

        assert!(features[0].project(&columns).is_err());
    }

    #[test]
    fn test_feature_matrix_shape() {
        let rows = sequence("A", &[10; 15]);
        let features = drop_incomplete(engineer_features(&rows));
        let columns: Vec<String> = FORECAST_FEATURE_COLUMNS
            .iter()
            .map(|c| c.to_string())
            .collect();

        let (matrix, targets) = feature_matrix(&features, &columns).unwrap();
        assert_eq!(matrix.shape(), &[features.len(), 16]);
        assert_eq!(targets.len(), features.len());
    }
}
