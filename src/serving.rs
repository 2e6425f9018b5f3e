use crate::error::{AppError, Result};
use crate::ml::{profile_vector, SafetyArtifact};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, info, warn};

/// One city's predicted safety for a demographic profile
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CityPrediction {
    pub city: String,
    pub safety_score: f64,
    pub rank: usize,
}

/// Ranked prediction set for one request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SafetyRanking {
    pub predictions: Vec<CityPrediction>,
}

impl SafetyRanking {
    /// Top five safest cities
    pub fn safest(&self) -> &[CityPrediction] {
        &self.predictions[..self.predictions.len().min(5)]
    }

    /// Bottom five cities, most dangerous first
    pub fn most_dangerous(&self) -> Vec<CityPrediction> {
        let start = self.predictions.len().saturating_sub(5);
        let mut tail: Vec<CityPrediction> = self.predictions[start..].to_vec();
        tail.reverse();
        tail
    }
}

/// Online prediction service over the trained safety artifact.
///
/// Starts in degraded mode when the artifact is missing or unreadable;
/// prediction calls then fail with `ModelUnavailable` until a retrain
/// produces a loadable artifact and the service restarts.
pub struct PredictionService {
    artifact: Option<SafetyArtifact>,
}

impl PredictionService {
    pub fn load(artifact_path: &Path) -> Self {
        match crate::ml::load_artifact::<SafetyArtifact>(artifact_path) {
            Ok(artifact) => {
                info!(
                    cities = artifact.all_cities.len(),
                    "Safety model ready"
                );
                Self {
                    artifact: Some(artifact),
                }
            }
            Err(e) => {
                warn!(error = %e, "Starting without a safety model; predictions disabled");
                Self { artifact: None }
            }
        }
    }

    pub fn from_artifact(artifact: SafetyArtifact) -> Self {
        Self {
            artifact: Some(artifact),
        }
    }

    pub fn degraded() -> Self {
        Self { artifact: None }
    }

    pub fn is_ready(&self) -> bool {
        self.artifact.is_some()
    }

    fn artifact(&self) -> Result<&SafetyArtifact> {
        self.artifact.as_ref().ok_or_else(|| {
            AppError::ModelUnavailable("safety model is not loaded".to_string())
        })
    }

    /// Cities the model can score
    pub fn cities(&self) -> Result<&[String]> {
        Ok(&self.artifact()?.all_cities)
    }

    /// Score every known city for the given profile and rank the result.
    ///
    /// `gender` must match a category seen in training ("M" or "F");
    /// normalizing caller input is the API layer's job. Cities whose
    /// categories cannot be encoded are skipped rather than failing the
    /// whole request; scores are clamped to [0, 100].
    pub fn predict(&self, age: u32, gender: &str, year: i32) -> Result<SafetyRanking> {
        let artifact = self.artifact()?;

        let mut predictions = Vec::with_capacity(artifact.all_cities.len());
        for city in &artifact.all_cities {
            let vector = match profile_vector(
                &artifact.feature_columns,
                &artifact.encoders,
                &artifact.city_stats,
                city,
                age,
                gender,
                year,
            ) {
                Ok(vector) => vector,
                Err(e) => {
                    debug!(city = %city, error = %e, "Skipping city");
                    continue;
                }
            };

            let raw = match artifact.model.predict_row(&vector) {
                Ok(raw) => raw,
                Err(e) => {
                    warn!(city = %city, error = %e, "Prediction failed for city");
                    continue;
                }
            };

            let score = (raw.clamp(0.0, 100.0) * 100.0).round() / 100.0;
            predictions.push(CityPrediction {
                city: city.clone(),
                safety_score: score,
                rank: 0,
            });
        }

        if predictions.is_empty() {
            return Err(AppError::Validation(format!(
                "no predictions could be generated for gender '{}'",
                gender
            )));
        }

        predictions.sort_by(|a, b| {
            b.safety_score
                .partial_cmp(&a.safety_score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.city.cmp(&b.city))
        });
        for (i, prediction) in predictions.iter_mut().enumerate() {
            prediction.rank = i + 1;
        }

        Ok(SafetyRanking { predictions })
    }
}
