//! Analytic store
//!
//! A single SQLite table, `app_metrics`, opened read-only for every query.
//! The seed module is the only writer.

mod error;
mod gate;
pub mod seed;

pub use error::GateError;
pub use gate::{ExecutionGate, sanitize};
pub use seed::{MetricRow, SeedSummary, create_schema, demo_rows, insert_rows, seed_database};
