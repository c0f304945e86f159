//! Reduction of a duration series into a summary report.
//!
//! Median and percentiles use floor indexing into the sorted valid samples
//! (nearest rank, zero-based, no interpolation): `median = s[⌊n/2⌋]`,
//! `pXX = s[⌊n·XX/100⌋]`. For even `n` the median is the upper of the two
//! central values.

use std::fmt;

use serde::Serialize;
use thiserror::Error;

/// Raw measurements in run order, failures included as sentinels.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DurationSeries {
    values: Vec<f64>,
}

/// Finite and non-negative. Everything else (the failure sentinel, NaN,
/// infinities) is dropped before aggregation.
pub fn is_valid(duration: f64) -> bool {
    duration.is_finite() && duration >= 0.0
}

impl DurationSeries {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            values: Vec::with_capacity(capacity),
        }
    }

    pub fn push(&mut self, duration: f64) {
        self.values.push(duration);
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn valid(&self) -> impl Iterator<Item = f64> + '_ {
        self.values.iter().copied().filter(|d| is_valid(*d))
    }

    pub fn failures(&self) -> usize {
        self.values.iter().filter(|d| !is_valid(**d)).count()
    }
}

impl From<Vec<f64>> for DurationSeries {
    fn from(values: Vec<f64>) -> Self {
        Self { values }
    }
}

impl FromIterator<f64> for DurationSeries {
    fn from_iter<I: IntoIterator<Item = f64>>(iter: I) -> Self {
        Self {
            values: iter.into_iter().collect(),
        }
    }
}

/// Summary in milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BenchmarkReport {
    pub min: f64,
    pub max: f64,
    pub avg: f64,
    pub median: f64,
    pub p95: f64,
    pub p99: f64,
    /// Valid samples aggregated
    pub samples: usize,
    /// Measurements excluded as failed
    pub failures: usize,
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum StatsError {
    #[error("no valid samples to aggregate ({failures} failed measurements)")]
    NoValidSamples { failures: usize },
}

pub fn aggregate(series: &DurationSeries) -> Result<BenchmarkReport, StatsError> {
    let mut sorted: Vec<f64> = series.valid().collect();
    let failures = series.len() - sorted.len();
    if sorted.is_empty() {
        return Err(StatsError::NoValidSamples { failures });
    }
    sorted.sort_by(f64::total_cmp);

    let n = sorted.len();
    let sum: f64 = sorted.iter().sum();

    Ok(BenchmarkReport {
        min: sorted[0],
        max: sorted[n - 1],
        avg: sum / n as f64,
        median: sorted[n / 2],
        p95: nearest_rank(&sorted, 0.95),
        p99: nearest_rank(&sorted, 0.99),
        samples: n,
        failures,
    })
}

fn nearest_rank(sorted: &[f64], quantile: f64) -> f64 {
    let idx = (sorted.len() as f64 * quantile).floor() as usize;
    sorted[idx.min(sorted.len() - 1)]
}

impl fmt::Display for BenchmarkReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "  Min:     {:.2}ms", self.min)?;
        writeln!(f, "  Max:     {:.2}ms", self.max)?;
        writeln!(f, "  Average: {:.2}ms", self.avg)?;
        writeln!(f, "  Median:  {:.2}ms", self.median)?;
        writeln!(f, "  P95:     {:.2}ms", self.p95)?;
        writeln!(f, "  P99:     {:.2}ms", self.p99)?;
        write!(
            f,
            "  Samples: {} aggregated, {} failed",
            self.samples, self.failures
        )
    }
}
