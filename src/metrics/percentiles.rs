use hdrhistogram::Histogram;
use serde::Serialize;

/// Percentile breakdown of one endpoint's server durations (μs).
#[derive(Debug, Clone, Serialize)]
pub struct PercentileSet {
    pub min: u64,
    pub max: u64,
    pub mean: f64,
    pub p50: u64,
    pub p95: u64,
    pub p99: u64,
    pub count: u64,
}

impl PercentileSet {
    /// Returns `None` for an empty histogram instead of a zeroed set.
    pub fn from_histogram(hist: &Histogram<u64>) -> Option<Self> {
        if hist.len() == 0 {
            return None;
        }

        Some(Self {
            min: hist.min(),
            max: hist.max(),
            mean: hist.mean(),
            p50: hist.value_at_quantile(0.50),
            p95: hist.value_at_quantile(0.95),
            p99: hist.value_at_quantile(0.99),
            count: hist.len(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_histogram_has_no_percentiles() {
        let hist = Histogram::<u64>::new(3).unwrap();
        assert!(PercentileSet::from_histogram(&hist).is_none());
    }

    #[test]
    fn percentiles_are_ordered() {
        let mut hist = Histogram::<u64>::new(3).unwrap();
        for v in 1..=1_000u64 {
            hist.record(v).unwrap();
        }
        let set = PercentileSet::from_histogram(&hist).unwrap();
        assert_eq!(set.count, 1_000);
        assert_eq!(set.min, 1);
        assert!(set.p50 <= set.p95 && set.p95 <= set.p99 && set.p99 <= set.max);
    }
}
