use crate::error::{AppError, Result};
use crate::ml::attribution::Attribution;
use crate::ml::gbm::GbmRegressor;
use crate::ml::metrics::RegressionMetrics;
use crate::ml::safety::{CityStats, SafetyEncoders};
use crate::ml::scaler::StandardScaler;
use crate::ml::zones::ZoneThresholds;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use tracing::info;

/// Trained crime-count forecaster plus everything inference needs to
/// reproduce the training-time feature treatment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForecastArtifact {
    pub model: GbmRegressor,
    pub scaler: StandardScaler,
    pub feature_columns: Vec<String>,
    pub thresholds: ZoneThresholds,
    pub metrics: RegressionMetrics,
}

/// Personalized safety model bundle; the label encoders are stored
/// verbatim so inference encodes categories exactly as training did.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SafetyArtifact {
    pub model: GbmRegressor,
    pub encoders: SafetyEncoders,
    pub feature_columns: Vec<String>,
    pub all_cities: Vec<String>,
    pub city_stats: BTreeMap<String, CityStats>,
}

/// Human-readable training provenance, written as a JSON sidecar next to
/// the binary artifact.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtifactMetadata {
    pub model_version: String,
    pub created_at: DateTime<Utc>,
    pub train_years: Vec<i32>,
    pub test_year: i32,
    pub forecast_metrics: RegressionMetrics,
    pub zone_accuracy: f64,
    pub feature_importance: Vec<(String, f64)>,
    pub attribution: Option<Attribution>,
}

/// Serialize an artifact to disk atomically.
///
/// The bytes land in a temp file in the destination directory and are
/// renamed into place, so readers never observe a half-written artifact.
pub fn save_artifact<T: Serialize>(artifact: &T, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }

    let bytes = bincode::serialize(artifact)?;
    let tmp = path.with_extension("tmp");
    fs::write(&tmp, &bytes)?;
    fs::rename(&tmp, path)?;
    info!(path = %path.display(), bytes = bytes.len(), "Saved model artifact");
    Ok(())
}

pub fn load_artifact<T: DeserializeOwned>(path: &Path) -> Result<T> {
    if !path.exists() {
        return Err(AppError::ModelUnavailable(format!(
            "model artifact not found at {}",
            path.display()
        )));
    }
    let bytes = fs::read(path)?;
    let artifact = bincode::deserialize(&bytes)?;
    info!(path = %path.display(), "Loaded model artifact");
    Ok(artifact)
}

impl ArtifactMetadata {
    /// Path of the JSON sidecar for a given artifact path
    pub fn sidecar_path(artifact_path: &Path) -> std::path::PathBuf {
        artifact_path.with_extension("meta.json")
    }

    pub fn write_sidecar(&self, artifact_path: &Path) -> Result<()> {
        let path = Self::sidecar_path(artifact_path);
        let json = serde_json::to_string_pretty(self)?;
        fs::write(&path, json)?;
        info!(path = %path.display(), "Wrote artifact metadata");
        Ok(())
    }

    pub fn read_sidecar(artifact_path: &Path) -> Result<Self> {
        let path = Self::sidecar_path(artifact_path);
        let json = fs::read_to_string(&path)?;
        Ok(serde_json::from_str(&json)?)
    }
}
