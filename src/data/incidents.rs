use crate::error::{AppError, Result};
use crate::models::{normalize_categorical, parse_occurrence_date, IncidentRecord, RawIncident};
use chrono::Datelike;
use std::collections::HashSet;
use std::path::Path;
use tracing::info;

/// Load the raw incident file for the personalized safety model
pub fn load_incident_file(path: &Path) -> Result<Vec<RawIncident>> {
    if !path.exists() {
        return Err(AppError::Configuration(format!(
            "raw incident file not found at {}",
            path.display()
        )));
    }

    let mut reader = csv::ReaderBuilder::new().flexible(true).from_path(path)?;
    let mut rows = Vec::new();
    for record in reader.deserialize() {
        let raw: RawIncident = record?;
        rows.push(raw);
    }

    info!(records = rows.len(), "Loaded raw incident records");
    Ok(rows)
}

/// Run the preprocessing lifecycle: deduplicate, drop incomplete rows,
/// parse dates, normalize categoricals, filter victim age to [0, 100].
pub fn preprocess_incidents(raw: Vec<RawIncident>) -> Vec<IncidentRecord> {
    let before = raw.len();

    let mut seen = HashSet::with_capacity(raw.len());
    let mut records = Vec::with_capacity(raw.len());

    for row in raw {
        if !seen.insert(row.clone()) {
            continue;
        }
        if let Some(record) = clean_row(&row) {
            records.push(record);
        }
    }

    info!(
        before,
        after = records.len(),
        "Preprocessed incident records"
    );
    records
}

fn clean_row(row: &RawIncident) -> Option<IncidentRecord> {
    let report_number = non_empty(row.report_number.as_deref())?;
    let city = non_empty(row.city.as_deref())?;
    let age_text = non_empty(row.victim_age.as_deref())?;
    let gender = non_empty(row.victim_gender.as_deref())?;
    let date_text = non_empty(row.date_of_occurrence.as_deref())?;
    let description = non_empty(row.crime_description.as_deref())?;
    let weapon = non_empty(row.weapon_used.as_deref())?;
    let domain = non_empty(row.crime_domain.as_deref())?;

    // Victim age is numeric text in the raw file; non-numeric or
    // out-of-range ages drop the row.
    let victim_age = age_text.trim().parse::<f64>().ok()?;
    if !(0.0..=100.0).contains(&victim_age) {
        return None;
    }

    let occurred_on = parse_occurrence_date(date_text)?;

    Some(IncidentRecord {
        report_number: report_number.trim().to_string(),
        city: normalize_categorical(city),
        victim_age: victim_age.round() as u32,
        victim_gender: normalize_categorical(gender),
        year: occurred_on.year(),
        occurred_on,
        crime_description: normalize_categorical(description),
        weapon_used: normalize_categorical(weapon),
        crime_domain: normalize_categorical(domain),
    })
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    match value {
        Some(v) if !v.trim().is_empty() => Some(v),
        _ => None,
    }
}
