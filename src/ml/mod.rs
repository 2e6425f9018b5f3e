//! Machine learning module for crime forecasting and city safety scoring
//!
//! This module provides the training-side capabilities:
//! - Strict temporal train/test splitting with leakage assertions
//! - Time-series feature engineering (lags, rolling stats, seasonality)
//! - Gradient-boosted regression with gain-based feature importances
//! - Red/amber/green zone classification and evaluation
//! - Personalized safety features and label encoding
//! - Artifact assembly and atomic persistence
pub mod artifact;
pub mod attribution;
pub mod features;
pub mod gbm;
pub mod metrics;
pub mod safety;
pub mod scaler;
pub mod split;
pub mod zones;

pub use artifact::{load_artifact, save_artifact, ArtifactMetadata, ForecastArtifact, SafetyArtifact};
pub use attribution::{resolve_attributor, Attribution, Attributor, NoopAttributor, PathAttributor};
pub use features::{drop_incomplete, engineer_features, feature_matrix, FeatureRow, FORECAST_FEATURE_COLUMNS};
pub use gbm::{GbmParams, GbmRegressor};
pub use metrics::{mae, rmse, RegressionMetrics};
pub use safety::{
    age_group, build_safety_features, profile_vector, CityStats, LabelEncoder, SafetyEncoders,
    SafetyTrainingData, SAFETY_FEATURE_COLUMNS,
};
pub use scaler::StandardScaler;
pub use split::split_by_year;
pub use zones::{Zone, ZoneEvaluation, ZoneThresholds};
