pub mod aggregations;
pub mod incidents;

pub use aggregations::{AggregationSource, CsvAggregationSource, InMemoryAggregationSource};
pub use incidents::{load_incident_file, preprocess_incidents};
