//! Batch path: repeated sequential measurements and their summary.

pub mod runner;
pub mod stats;

pub use runner::{user_payload, BenchmarkRunner, Progress};
pub use stats::{aggregate, BenchmarkReport, DurationSeries, StatsError};
