use crate::error::{AppError, Result};
use crate::models::{LocationStats, MonthlyAggregation, RawMonthlyAggregation};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Source of monthly aggregation rows joined with location metadata.
///
/// The relational store behind this trait is an opaque provider; the
/// contract is the column set and the (location_id, year, month) ordering.
pub trait AggregationSource: Send + Sync {
    fn load(&self) -> Result<Vec<MonthlyAggregation>>;
}

/// CSV-backed source reading the monthly-aggregation table and the
/// location-metadata table, left-joined on location_id.
pub struct CsvAggregationSource {
    aggregations_path: PathBuf,
    locations_path: PathBuf,
}

impl CsvAggregationSource {
    pub fn new(aggregations_path: impl Into<PathBuf>, locations_path: impl Into<PathBuf>) -> Self {
        Self {
            aggregations_path: aggregations_path.into(),
            locations_path: locations_path.into(),
        }
    }

    fn read_locations(path: &Path) -> Result<HashMap<String, LocationStats>> {
        if !path.exists() {
            return Err(AppError::Configuration(format!(
                "location metadata table not found at {}",
                path.display()
            )));
        }

        let mut reader = csv::Reader::from_path(path)?;
        let mut locations = HashMap::new();
        for record in reader.deserialize() {
            let stats: LocationStats = record?;
            locations.insert(stats.location_id.clone(), stats);
        }
        Ok(locations)
    }
}

impl AggregationSource for CsvAggregationSource {
    fn load(&self) -> Result<Vec<MonthlyAggregation>> {
        if !self.aggregations_path.exists() {
            return Err(AppError::Configuration(format!(
                "monthly aggregation table not found at {}",
                self.aggregations_path.display()
            )));
        }

        let locations = Self::read_locations(&self.locations_path)?;

        let mut reader = csv::Reader::from_path(&self.aggregations_path)?;
        let mut rows = Vec::new();
        let mut unmatched = 0usize;
        for record in reader.deserialize() {
            let raw: RawMonthlyAggregation = record?;
            match locations.get(&raw.location_id) {
                Some(stats) => rows.push(raw.with_location(stats)),
                None => unmatched += 1,
            }
        }

        if unmatched > 0 {
            warn!(
                unmatched,
                "Dropped aggregation rows without location metadata"
            );
        }

        order_and_verify(rows)
    }
}

/// In-memory source, used by tests and the pipeline's internals
pub struct InMemoryAggregationSource {
    rows: Vec<MonthlyAggregation>,
}

impl InMemoryAggregationSource {
    pub fn new(rows: Vec<MonthlyAggregation>) -> Self {
        Self { rows }
    }
}

impl AggregationSource for InMemoryAggregationSource {
    fn load(&self) -> Result<Vec<MonthlyAggregation>> {
        order_and_verify(self.rows.clone())
    }
}

/// Sort rows by (location_id, year, month) and enforce key uniqueness.
///
/// Lag features are only valid over a chronologically ordered, duplicate-free
/// sequence, so a duplicate key is a data integrity violation, not a warning.
fn order_and_verify(mut rows: Vec<MonthlyAggregation>) -> Result<Vec<MonthlyAggregation>> {
    rows.sort_by(|a, b| {
        (&a.location_id, a.year, a.month).cmp(&(&b.location_id, b.year, b.month))
    });

    let mut seen = HashSet::with_capacity(rows.len());
    for row in &rows {
        if !seen.insert((row.location_id.clone(), row.year, row.month)) {
            return Err(AppError::DataIntegrity(format!(
                "duplicate monthly aggregation for location {} at {}-{:02}",
                row.location_id, row.year, row.month
            )));
        }
    }

    info!(records = rows.len(), "Loaded monthly aggregation records");
    Ok(rows)
}
