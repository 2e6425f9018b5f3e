use crate::error::{AppError, Result};
use crate::models::IncidentRecord;
use ndarray::Array2;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use tracing::info;

/// Ordered feature columns consumed by the personalized safety model
pub const SAFETY_FEATURE_COLUMNS: [&str; 8] = [
    "victim_age",
    "year",
    "city",
    "victim_gender",
    "age_group",
    "total_crimes",
    "avg_victim_age",
    "city_crime_density",
];

/// Demographic age band used by both training and inference
pub fn age_group(age: u32) -> &'static str {
    match age {
        0..=18 => "0-18",
        19..=25 => "19-25",
        26..=35 => "26-35",
        36..=45 => "36-45",
        46..=55 => "46-55",
        56..=65 => "56-65",
        _ => "65+",
    }
}

/// Maps categorical values to stable integer codes.
///
/// Classes are the sorted distinct values seen at fit time; encoding an
/// unseen value is an error so callers can decide whether to skip or fail.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LabelEncoder {
    classes: Vec<String>,
}

impl LabelEncoder {
    pub fn fit<'a>(values: impl IntoIterator<Item = &'a str>) -> Self {
        let unique: BTreeSet<&str> = values.into_iter().collect();
        Self {
            classes: unique.into_iter().map(String::from).collect(),
        }
    }

    pub fn encode(&self, value: &str) -> Result<f64> {
        self.classes
            .binary_search_by(|c| c.as_str().cmp(value))
            .map(|i| i as f64)
            .map_err(|_| AppError::Validation(format!("unknown category '{}'", value)))
    }

    pub fn classes(&self) -> &[String] {
        &self.classes
    }
}

/// Label encoders retained in the safety artifact
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SafetyEncoders {
    pub city: LabelEncoder,
    pub gender: LabelEncoder,
    pub age_group: LabelEncoder,
}

/// Per-city statistics from the training window, replayed at inference
/// for cities the request does not carry data for.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CityStats {
    /// Average yearly incident count
    pub total_crimes: f64,
    pub avg_victim_age: f64,
    /// Incident count over the whole training window
    pub crime_density: f64,
}

/// Fitted safety features with everything inference needs to reproduce them
#[derive(Debug, Clone)]
pub struct SafetyTrainingData {
    pub features: Array2<f64>,
    pub targets: Vec<f64>,
    pub encoders: SafetyEncoders,
    pub feature_columns: Vec<String>,
    pub all_cities: Vec<String>,
    pub city_stats: BTreeMap<String, CityStats>,
}

/// Aggregate incident records into the safety training set.
///
/// Incidents are grouped by (city, victim age, gender, year); each group's
/// crime count becomes a safety score of `(1 - count / max_count) * 100`,
/// so the most dangerous group scores 0 and groups approach 100 as their
/// counts shrink.
pub fn build_safety_features(incidents: &[IncidentRecord]) -> Result<SafetyTrainingData> {
    if incidents.is_empty() {
        return Err(AppError::Training(
            "no incident records available for the safety model".to_string(),
        ));
    }

    let mut group_counts: BTreeMap<(String, u32, String, i32), u32> = BTreeMap::new();
    let mut city_year: BTreeMap<(String, i32), (u32, f64)> = BTreeMap::new();
    let mut city_totals: BTreeMap<String, (u32, f64, BTreeSet<i32>)> = BTreeMap::new();

    for incident in incidents {
        *group_counts
            .entry((
                incident.city.clone(),
                incident.victim_age,
                incident.victim_gender.clone(),
                incident.year,
            ))
            .or_insert(0) += 1;

        let (count, age_sum) = city_year
            .entry((incident.city.clone(), incident.year))
            .or_insert((0, 0.0));
        *count += 1;
        *age_sum += f64::from(incident.victim_age);

        let (total, age_total, years) = city_totals
            .entry(incident.city.clone())
            .or_insert((0, 0.0, BTreeSet::new()));
        *total += 1;
        *age_total += f64::from(incident.victim_age);
        years.insert(incident.year);
    }

    let max_count = group_counts.values().copied().max().ok_or_else(|| {
        AppError::Training("no demographic groups could be formed".to_string())
    })?;

    let encoders = SafetyEncoders {
        city: LabelEncoder::fit(incidents.iter().map(|i| i.city.as_str())),
        gender: LabelEncoder::fit(incidents.iter().map(|i| i.victim_gender.as_str())),
        age_group: LabelEncoder::fit(
            incidents.iter().map(|i| age_group(i.victim_age)),
        ),
    };

    let city_stats: BTreeMap<String, CityStats> = city_totals
        .iter()
        .map(|(city, (total, age_total, years))| {
            (
                city.clone(),
                CityStats {
                    total_crimes: f64::from(*total) / years.len() as f64,
                    avg_victim_age: age_total / f64::from(*total),
                    crime_density: f64::from(*total),
                },
            )
        })
        .collect();

    let feature_columns: Vec<String> = SAFETY_FEATURE_COLUMNS
        .iter()
        .map(|c| c.to_string())
        .collect();

    let mut data = Vec::with_capacity(group_counts.len() * feature_columns.len());
    let mut targets = Vec::with_capacity(group_counts.len());
    for ((city, age, gender, year), count) in &group_counts {
        let (year_count, year_age_sum) = city_year
            .get(&(city.clone(), *year))
            .copied()
            .ok_or_else(|| {
                AppError::Internal(format!("missing city-year stats for {} {}", city, year))
            })?;

        data.push(f64::from(*age));
        data.push(f64::from(*year));
        data.push(encoders.city.encode(city)?);
        data.push(encoders.gender.encode(gender)?);
        data.push(encoders.age_group.encode(age_group(*age))?);
        data.push(f64::from(year_count));
        data.push(year_age_sum / f64::from(year_count));
        data.push(city_stats[city].crime_density);

        targets.push((1.0 - f64::from(*count) / f64::from(max_count)) * 100.0);
    }

    let features = Array2::from_shape_vec((targets.len(), feature_columns.len()), data)
        .map_err(|e| AppError::Training(format!("failed to shape safety features: {}", e)))?;

    let all_cities: Vec<String> = encoders.city.classes().to_vec();
    info!(
        groups = targets.len(),
        cities = all_cities.len(),
        max_group_count = max_count,
        "Built safety training features"
    );

    Ok(SafetyTrainingData {
        features,
        targets,
        encoders,
        feature_columns,
        all_cities,
        city_stats,
    })
}

/// Assemble the inference feature vector for one (city, profile) pair.
///
/// Fails with a validation error when the gender or city was never seen
/// in training; callers skip that city rather than abort the request.
pub fn profile_vector(
    columns: &[String],
    encoders: &SafetyEncoders,
    city_stats: &BTreeMap<String, CityStats>,
    city: &str,
    age: u32,
    gender: &str,
    year: i32,
) -> Result<Vec<f64>> {
    let stats = city_stats.get(city);
    columns
        .iter()
        .map(|column| match column.as_str() {
            "victim_age" => Ok(f64::from(age)),
            "year" => Ok(f64::from(year)),
            "city" => encoders.city.encode(city),
            "victim_gender" => encoders.gender.encode(gender),
            "age_group" => encoders.age_group.encode(age_group(age)),
            "total_crimes" => Ok(stats.map_or(0.0, |s| s.total_crimes)),
            "avg_victim_age" => Ok(stats.map_or(0.0, |s| s.avg_victim_age)),
            "city_crime_density" => Ok(stats.map_or(0.0, |s| s.crime_density)),
            other => Err(AppError::Internal(format!(
                "unknown safety feature column '{}'",
                other
            ))),
        })
        .collect()
}
