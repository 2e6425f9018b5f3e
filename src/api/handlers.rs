use crate::api::AppState;
use crate::error::Result;
use crate::serving::CityPrediction;
use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

/// Health check endpoint
pub async fn health_check(State(state): State<AppState>) -> Result<Json<HealthResponse>> {
    Ok(Json(HealthResponse {
        status: "healthy".to_string(),
        model_loaded: state.service.is_ready(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    }))
}

/// Readiness endpoint; not ready while the model is missing
pub async fn readiness_check(
    State(state): State<AppState>,
) -> Result<(StatusCode, Json<HealthResponse>)> {
    let ready = state.service.is_ready();
    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    Ok((
        status,
        Json(HealthResponse {
            status: if ready { "ready" } else { "degraded" }.to_string(),
            model_loaded: ready,
            version: env!("CARGO_PKG_VERSION").to_string(),
        }),
    ))
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub model_loaded: bool,
    pub version: String,
}

/// List the cities the model can score
pub async fn list_cities(State(state): State<AppState>) -> Result<Json<CitiesResponse>> {
    Ok(Json(CitiesResponse {
        cities: state.service.cities()?.to_vec(),
    }))
}

#[derive(Debug, Serialize)]
pub struct CitiesResponse {
    pub cities: Vec<String>,
}

/// Rank all known cities by predicted safety for one demographic profile.
///
/// Bodies that fail deserialization are reported through the same error
/// envelope as semantic validation failures.
pub async fn predict_safety(
    State(state): State<AppState>,
    payload: std::result::Result<Json<PredictRequest>, JsonRejection>,
) -> Result<Json<PredictResponse>> {
    let Json(request) = payload?;
    request.validate()?;

    // Single normalization point; downstream expects the trained category.
    let gender = request.gender.trim().to_uppercase();
    let ranking = state
        .service
        .predict(request.age, &gender, request.year)?;

    Ok(Json(PredictResponse {
        input: PredictInput {
            age: request.age,
            gender,
            year: request.year,
        },
        total_cities_analyzed: ranking.predictions.len(),
        safest_cities: ranking.safest().to_vec(),
        most_dangerous_cities: ranking.most_dangerous(),
    }))
}

#[derive(Debug, Deserialize, Validate)]
pub struct PredictRequest {
    #[validate(range(max = 100))]
    pub age: u32,

    #[validate(custom(function = validate_gender))]
    pub gender: String,

    #[serde(default = "default_year")]
    #[validate(range(min = 2020, max = 2030))]
    pub year: i32,
}

fn default_year() -> i32 {
    2024
}

fn validate_gender(gender: &str) -> std::result::Result<(), ValidationError> {
    match gender.trim().to_uppercase().as_str() {
        "M" | "F" => Ok(()),
        _ => Err(ValidationError::new("gender_must_be_m_or_f")),
    }
}

#[derive(Debug, Serialize)]
pub struct PredictInput {
    pub age: u32,
    pub gender: String,
    pub year: i32,
}

#[derive(Debug, Serialize)]
pub struct PredictResponse {
    pub input: PredictInput,
    pub total_cities_analyzed: usize,
    pub safest_cities: Vec<CityPrediction>,
    pub most_dangerous_cities: Vec<CityPrediction>,
}
