use serde::{Deserialize, Serialize};

/// One monthly aggregation row, joined with its location metadata.
///
/// Unique per (location_id, year, month); rows must be ordered
/// chronologically within a location before lag features are computed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonthlyAggregation {
    /// Location identifier
    pub location_id: String,

    /// Calendar year
    pub year: i32,

    /// Calendar month (1-12)
    pub month: u32,

    /// Reported crimes in this (location, year, month)
    pub crime_count: u32,

    /// Male victims in the month
    pub male_victims: u32,

    /// Female victims in the month
    pub female_victims: u32,

    /// Mean victim age across the month's incidents
    pub avg_victim_age: f64,

    /// Location latitude
    pub latitude: f64,

    /// Location longitude
    pub longitude: f64,

    /// Location population
    pub population: f64,
}

/// Static per-location metadata, joined onto monthly aggregations
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocationStats {
    pub location_id: String,
    pub latitude: f64,
    pub longitude: f64,
    pub population: f64,
}

/// Raw monthly aggregation row as stored by the data provider,
/// before the location join
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawMonthlyAggregation {
    pub location_id: String,
    pub year: i32,
    pub month: u32,
    pub crime_count: u32,
    pub male_victims: u32,
    pub female_victims: u32,
    pub avg_victim_age: f64,
}

impl RawMonthlyAggregation {
    /// Join this row with its location metadata
    pub fn with_location(self, stats: &LocationStats) -> MonthlyAggregation {
        MonthlyAggregation {
            location_id: self.location_id,
            year: self.year,
            month: self.month,
            crime_count: self.crime_count,
            male_victims: self.male_victims,
            female_victims: self.female_victims,
            avg_victim_age: self.avg_victim_age,
            latitude: stats.latitude,
            longitude: stats.longitude,
            population: stats.population,
        }
    }
}
