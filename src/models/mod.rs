pub mod aggregation;
pub mod incident;

pub use aggregation::*;
pub use incident::*;
