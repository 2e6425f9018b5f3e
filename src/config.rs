use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Server configuration
    pub server: ServerConfig,

    /// Training pipeline configuration
    pub training: TrainingConfig,

    /// Model configuration
    pub model: ModelConfig,

    /// Observability configuration
    pub observability: ObservabilityConfig,
}

impl Config {
    /// Load configuration from file and environment
    pub fn load() -> Result<Self, config::ConfigError> {
        let config_path =
            std::env::var("CONFIG_PATH").unwrap_or_else(|_| "config/default.toml".to_string());

        config::Config::builder()
            // Start with default values
            .add_source(config::File::from_str(
                include_str!("../config/default.toml"),
                config::FileFormat::Toml,
            ))
            // Override with config file if it exists
            .add_source(config::File::with_name(&config_path).required(false))
            // Override with environment variables (prefix: CRIMESAFE_)
            .add_source(
                config::Environment::with_prefix("CRIMESAFE")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// HTTP server host
    #[serde(default = "default_host")]
    pub host: String,

    /// HTTP server port
    #[serde(default = "default_http_port")]
    pub http_port: u16,

    /// Request timeout (seconds)
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingConfig {
    /// Years whose records form the training partition
    #[serde(default = "default_train_years")]
    pub train_years: Vec<i32>,

    /// Single held-out test year
    #[serde(default = "default_test_year")]
    pub test_year: i32,

    /// Monthly aggregation table (CSV)
    #[serde(default = "default_aggregations_path")]
    pub aggregations_path: PathBuf,

    /// Location metadata table (CSV), joined on location_id
    #[serde(default = "default_locations_path")]
    pub locations_path: PathBuf,

    /// Raw incident-level records (CSV)
    #[serde(default = "default_incidents_path")]
    pub incidents_path: PathBuf,

    /// Directory receiving trained artifacts and the metadata sidecar
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    /// City safety artifact consumed by the serving layer
    #[serde(default = "default_artifact_path")]
    pub artifact_path: PathBuf,

    /// Gradient boosting settings for the crime-count forecaster
    #[serde(default = "default_forecast_params")]
    pub forecast: GbmSettings,

    /// Gradient boosting settings for the personalized safety model
    #[serde(default = "default_safety_params")]
    pub safety: GbmSettings,

    /// Crime-count threshold separating green from amber
    #[serde(default = "default_amber_threshold")]
    pub amber_threshold: f64,

    /// Crime-count threshold separating amber from red
    #[serde(default = "default_red_threshold")]
    pub red_threshold: f64,

    /// Compute local attribution values on a test sample
    #[serde(default = "default_true")]
    pub attribution_enabled: bool,

    /// Maximum test rows attributed (cost control)
    #[serde(default = "default_attribution_sample")]
    pub attribution_sample: usize,
}

/// Hyperparameters for a gradient-boosted regressor
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GbmSettings {
    pub n_estimators: usize,
    pub max_depth: usize,
    pub learning_rate: f64,
    #[serde(default = "default_min_samples_leaf")]
    pub min_samples_leaf: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Enable JSON logging
    #[serde(default)]
    pub json_logs: bool,

    /// Service name
    #[serde(default = "default_service_name")]
    pub service_name: String,
}

// Default value functions
fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_http_port() -> u16 {
    8080
}

fn default_request_timeout() -> u64 {
    30
}

fn default_train_years() -> Vec<i32> {
    vec![2020, 2021, 2022, 2023]
}

fn default_test_year() -> i32 {
    2024
}

fn default_aggregations_path() -> PathBuf {
    "data/monthly_aggregations.csv".into()
}

fn default_locations_path() -> PathBuf {
    "data/location_stats.csv".into()
}

fn default_incidents_path() -> PathBuf {
    "data/crime_dataset_india.csv".into()
}

fn default_output_dir() -> PathBuf {
    "models".into()
}

fn default_artifact_path() -> PathBuf {
    "models/city_safety_model.bin".into()
}

fn default_forecast_params() -> GbmSettings {
    GbmSettings {
        n_estimators: 200,
        max_depth: 6,
        learning_rate: 0.1,
        min_samples_leaf: default_min_samples_leaf(),
    }
}

fn default_safety_params() -> GbmSettings {
    GbmSettings {
        n_estimators: 100,
        max_depth: 5,
        learning_rate: 0.1,
        min_samples_leaf: default_min_samples_leaf(),
    }
}

fn default_amber_threshold() -> f64 {
    20.0
}

fn default_red_threshold() -> f64 {
    50.0
}

fn default_min_samples_leaf() -> usize {
    1
}

fn default_attribution_sample() -> usize {
    100
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_service_name() -> String {
    "crimesafe".to_string()
}

fn default_true() -> bool {
    true
}
