//! CrimeSafe: crime-count forecasting and personalized city safety scoring.
//!
//! The crate has two halves. The offline half ([`pipeline`]) trains a
//! monthly crime-count forecaster with red/amber/green zone evaluation and
//! a personalized safety model over demographic profiles, persisting both
//! as atomic artifacts. The online half ([`serving`] behind [`api`]) loads
//! the safety artifact and ranks every known city for a requested profile.

pub mod api;
pub mod config;
pub mod data;
pub mod error;
pub mod ml;
pub mod models;
pub mod pipeline;
pub mod serving;

pub use error::{AppError, Result};
