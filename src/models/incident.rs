use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// One row of the raw incident file, exactly as shipped.
///
/// Every field is optional at this stage; rows with missing required
/// values are dropped during preprocessing, matching the load → dedup →
/// drop-incomplete lifecycle.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct RawIncident {
    #[serde(rename = "Report Number")]
    pub report_number: Option<String>,

    #[serde(rename = "City")]
    pub city: Option<String>,

    #[serde(rename = "Victim Age")]
    pub victim_age: Option<String>,

    #[serde(rename = "Victim Gender")]
    pub victim_gender: Option<String>,

    #[serde(rename = "Date of Occurrence")]
    pub date_of_occurrence: Option<String>,

    #[serde(rename = "Crime Description")]
    pub crime_description: Option<String>,

    #[serde(rename = "Weapon Used")]
    pub weapon_used: Option<String>,

    #[serde(rename = "Crime Domain")]
    pub crime_domain: Option<String>,
}

/// A preprocessed incident: deduplicated, complete, date-parsed, with
/// categorical fields trimmed and title-cased and age within [0, 100].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IncidentRecord {
    pub report_number: String,
    pub city: String,
    pub victim_age: u32,
    pub victim_gender: String,
    pub occurred_on: NaiveDate,
    pub year: i32,
    pub crime_description: String,
    pub weapon_used: String,
    pub crime_domain: String,
}

/// Trim and title-case a categorical value ("  new delhi " -> "New Delhi")
pub fn normalize_categorical(value: &str) -> String {
    value
        .trim()
        .split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => {
                    first.to_uppercase().collect::<String>() + &chars.as_str().to_lowercase()
                }
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Parse the occurrence date in the formats the raw file has shipped with
pub fn parse_occurrence_date(value: &str) -> Option<NaiveDate> {
    let trimmed = value.trim();
    for format in ["%d-%m-%Y %H:%M", "%d/%m/%Y %H:%M", "%d-%m-%Y", "%Y-%m-%d"] {
        if let Ok(dt) = chrono::NaiveDateTime::parse_from_str(trimmed, format) {
            return Some(dt.date());
        }
        if let Ok(date) = NaiveDate::parse_from_str(trimmed, format) {
            return Some(date);
        }
    }
    None
}
