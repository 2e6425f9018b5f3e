use crate::config::Config;
use crate::data::AggregationSource;
use crate::error::{AppError, Result};
use crate::ml::{
    build_safety_features, drop_incomplete, engineer_features, feature_matrix, load_artifact,
    mae, resolve_attributor, rmse, save_artifact, split_by_year, ArtifactMetadata, Attribution,
    Attributor, ForecastArtifact, GbmParams, GbmRegressor, RegressionMetrics, SafetyArtifact,
    StandardScaler, ZoneEvaluation, ZoneThresholds, FORECAST_FEATURE_COLUMNS,
};
use crate::models::RawIncident;
use chrono::Utc;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// File name of the forecast artifact inside the training output directory
pub const FORECAST_ARTIFACT_FILE: &str = "crime_forecast_model.bin";

/// Summary of one full training run
#[derive(Debug, Clone)]
pub struct TrainingReport {
    pub forecast_metrics: RegressionMetrics,
    pub zone_evaluation: ZoneEvaluation,
    pub feature_importance: Vec<(String, f64)>,
    pub attribution: Option<Attribution>,
    pub safety_groups: usize,
    pub cities: usize,
    pub forecast_path: PathBuf,
    pub safety_path: PathBuf,
}

/// Offline training pipeline.
///
/// Trains the monthly crime-count forecaster and the personalized safety
/// model from the configured data sources, evaluates both on the held-out
/// year, and persists the artifacts atomically.
pub struct Trainer {
    config: Config,
}

impl Trainer {
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    /// Train both models from in-memory inputs and persist artifacts
    pub fn run(
        &self,
        aggregations: &dyn AggregationSource,
        raw_incidents: Vec<RawIncident>,
    ) -> Result<TrainingReport> {
        let started = std::time::Instant::now();

        let rows = aggregations.load()?;
        info!(rows = rows.len(), "Loaded monthly aggregations");

        let (forecast, zone_evaluation, importance, attribution) = self.train_forecaster(&rows)?;

        let forecast_path = self.config.training.output_dir.join(FORECAST_ARTIFACT_FILE);
        save_artifact(&forecast, &forecast_path)?;

        let metadata = ArtifactMetadata {
            model_version: env!("CARGO_PKG_VERSION").to_string(),
            created_at: Utc::now(),
            train_years: self.config.training.train_years.clone(),
            test_year: self.config.training.test_year,
            forecast_metrics: forecast.metrics.clone(),
            zone_accuracy: zone_evaluation.accuracy,
            feature_importance: importance.clone(),
            attribution: attribution.clone(),
        };
        metadata.write_sidecar(&forecast_path)?;

        let (safety, safety_groups) = self.train_safety(raw_incidents)?;
        let cities = safety.all_cities.len();
        let safety_path = self.config.model.artifact_path.clone();
        save_artifact(&safety, &safety_path)?;

        info!(
            elapsed_secs = started.elapsed().as_secs_f64(),
            test_rmse = forecast.metrics.test_rmse,
            zone_accuracy = zone_evaluation.accuracy,
            safety_groups,
            cities,
            "Training run complete"
        );

        Ok(TrainingReport {
            forecast_metrics: forecast.metrics,
            zone_evaluation,
            feature_importance: importance,
            attribution,
            safety_groups,
            cities,
            forecast_path,
            safety_path,
        })
    }

    fn train_forecaster(
        &self,
        rows: &[crate::models::MonthlyAggregation],
    ) -> Result<(
        ForecastArtifact,
        ZoneEvaluation,
        Vec<(String, f64)>,
        Option<Attribution>,
    )> {
        let training = &self.config.training;

        // Lags and rolling windows need each location's full chronological
        // sequence, so engineering runs before the year split. Lagged
        // values are past observations; the leakage assertions guard the
        // target year membership, which the split enforces below.
        let features = drop_incomplete(engineer_features(rows));
        let (train_features, test_features) = split_by_year(
            &features,
            |row| row.year,
            &training.train_years,
            training.test_year,
        )?;
        if train_features.is_empty() {
            return Err(AppError::Training(
                "no complete training rows; locations need at least 13 months of history"
                    .to_string(),
            ));
        }
        if test_features.is_empty() {
            warn!("No complete test rows; evaluation metrics will be empty");
        }

        let columns: Vec<String> = FORECAST_FEATURE_COLUMNS
            .iter()
            .map(|c| c.to_string())
            .collect();
        let (x_train_raw, y_train) = feature_matrix(&train_features, &columns)?;
        let (x_test_raw, y_test) = feature_matrix(&test_features, &columns)?;

        let scaler = StandardScaler::fit(&x_train_raw)?;
        let x_train = scaler.transform(&x_train_raw)?;
        let x_test = scaler.transform(&x_test_raw)?;

        let params = GbmParams::from(&self.config.model.forecast);
        info!(
            n_estimators = params.n_estimators,
            max_depth = params.max_depth,
            learning_rate = params.learning_rate,
            train_rows = y_train.len(),
            test_rows = y_test.len(),
            "Fitting crime-count forecaster"
        );
        let model = GbmRegressor::fit(&x_train, &y_train, &params)?;

        let train_pred = model.predict(&x_train)?;
        let test_pred = model.predict(&x_test)?;
        let metrics = RegressionMetrics {
            train_rmse: rmse(&y_train, &train_pred),
            test_rmse: rmse(&y_test, &test_pred),
            train_mae: mae(&y_train, &train_pred),
            test_mae: mae(&y_test, &test_pred),
        };

        let thresholds = ZoneThresholds {
            amber: self.config.model.amber_threshold,
            red: self.config.model.red_threshold,
        };
        let zone_evaluation = thresholds.evaluate(&y_test, &test_pred);

        let mut importance: Vec<(String, f64)> = columns
            .iter()
            .cloned()
            .zip(model.feature_importances())
            .collect();
        importance.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));

        let attributor = resolve_attributor(
            self.config.model.attribution_enabled,
            self.config.model.attribution_sample,
        );
        let attribution = attributor.explain(&model, &x_test, &columns);

        let artifact = ForecastArtifact {
            model,
            scaler,
            feature_columns: columns,
            thresholds,
            metrics,
        };
        Ok((artifact, zone_evaluation, importance, attribution))
    }

    fn train_safety(&self, raw: Vec<RawIncident>) -> Result<(SafetyArtifact, usize)> {
        let incidents = crate::data::preprocess_incidents(raw);
        let train_years = &self.config.training.train_years;
        let train_incidents: Vec<_> = incidents
            .into_iter()
            .filter(|incident| train_years.contains(&incident.year))
            .collect();
        info!(
            incidents = train_incidents.len(),
            "Building safety model training set"
        );

        let data = build_safety_features(&train_incidents)?;
        let params = GbmParams::from(&self.config.model.safety);
        let model = GbmRegressor::fit(&data.features, &data.targets, &params)?;

        let groups = data.targets.len();
        let artifact = SafetyArtifact {
            model,
            encoders: data.encoders,
            feature_columns: data.feature_columns,
            all_cities: data.all_cities,
            city_stats: data.city_stats,
        };
        Ok((artifact, groups))
    }
}

/// Load a previously trained forecast artifact
pub fn load_forecast_artifact(output_dir: &Path) -> Result<ForecastArtifact> {
    load_artifact(&output_dir.join(FORECAST_ARTIFACT_FILE))
}
