use std::collections::{BTreeMap, VecDeque};
use std::time::Instant;

use hdrhistogram::Histogram;
use parking_lot::Mutex;
use serde::Serialize;

use super::percentiles::PercentileSet;
use super::ServerSample;

// ─── Configuration ───────────────────────────────────────────────

/// How many individual request records we keep for the live feed
const MAX_RECENT_SAMPLES: usize = 200;

/// HdrHistogram range: 1 μs → 60 s, 3 significant figures
const HIST_LOW: u64 = 1;
const HIST_HIGH: u64 = 60_000_000;
const HIST_SIGFIG: u8 = 3;

// ─── Public types ────────────────────────────────────────────────

/// Thread-safe server metrics.
/// The timing middleware calls `record()`, the metrics endpoints call `snapshot()`.
pub struct MetricsCollector {
    inner: Mutex<Inner>,
}

/// A single entry in the live request feed.
#[derive(Debug, Clone, Serialize)]
pub struct SampleRecord {
    /// Ms since the first sample after startup or the last reset
    pub elapsed_ms: u64,
    pub endpoint: String,
    pub duration_us: u64,
    pub success: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct EndpointStats {
    pub endpoint: String,
    pub errors: u64,
    pub durations: Option<PercentileSet>,
}

#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    pub overall: Option<PercentileSet>,
    pub endpoints: Vec<EndpointStats>,

    pub total_requests: u64,
    pub total_errors: u64,
    pub requests_per_sec: f64,
    pub elapsed_secs: f64,

    pub recent_samples: Vec<SampleRecord>,
}

// ─── Internal state ──────────────────────────────────────────────

struct Inner {
    overall_hist: Histogram<u64>,
    endpoints: BTreeMap<String, EndpointInner>,

    total_requests: u64,
    total_errors: u64,

    recent_samples: VecDeque<SampleRecord>,

    // Anchor for elapsed time, set on the first sample
    start_time: Option<Instant>,
}

struct EndpointInner {
    hist: Histogram<u64>,
    errors: u64,
}

fn new_histogram() -> Histogram<u64> {
    Histogram::<u64>::new_with_bounds(HIST_LOW, HIST_HIGH, HIST_SIGFIG)
        .expect("histogram creation")
}

// ─── MetricsCollector impl ───────────────────────────────────────

impl MetricsCollector {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner::new()),
        }
    }

    pub fn record(&self, sample: ServerSample) {
        self.inner.lock().record(sample);
    }

    pub fn reset(&self) {
        *self.inner.lock() = Inner::new();
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        self.inner.lock().snapshot()
    }
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self::new()
    }
}

// ─── Inner impl ──────────────────────────────────────────────────

impl Inner {
    fn new() -> Self {
        Self {
            overall_hist: new_histogram(),
            endpoints: BTreeMap::new(),
            total_requests: 0,
            total_errors: 0,
            recent_samples: VecDeque::with_capacity(MAX_RECENT_SAMPLES + 1),
            start_time: None,
        }
    }

    fn record(&mut self, sample: ServerSample) {
        let start = *self.start_time.get_or_insert_with(Instant::now);
        let elapsed_ms = start.elapsed().as_millis() as u64;

        // Clamp into the histogram range
        let duration_us = sample.duration_us.clamp(HIST_LOW, HIST_HIGH);

        self.total_requests += 1;
        let _ = self.overall_hist.record(duration_us);

        let endpoint = self
            .endpoints
            .entry(sample.endpoint.clone())
            .or_insert_with(|| EndpointInner {
                hist: new_histogram(),
                errors: 0,
            });
        let _ = endpoint.hist.record(duration_us);
        if !sample.success {
            endpoint.errors += 1;
            self.total_errors += 1;
        }

        self.recent_samples.push_back(SampleRecord {
            elapsed_ms,
            endpoint: sample.endpoint,
            duration_us: sample.duration_us,
            success: sample.success,
        });
        if self.recent_samples.len() > MAX_RECENT_SAMPLES {
            self.recent_samples.pop_front();
        }
    }

    fn snapshot(&self) -> MetricsSnapshot {
        let elapsed_secs = self
            .start_time
            .map(|t| t.elapsed().as_secs_f64())
            .unwrap_or(0.0);

        let rps = if elapsed_secs > 0.0 {
            self.total_requests as f64 / elapsed_secs
        } else {
            0.0
        };

        let endpoints = self
            .endpoints
            .iter()
            .map(|(name, e)| EndpointStats {
                endpoint: name.clone(),
                errors: e.errors,
                durations: PercentileSet::from_histogram(&e.hist),
            })
            .collect();

        MetricsSnapshot {
            overall: PercentileSet::from_histogram(&self.overall_hist),
            endpoints,
            total_requests: self.total_requests,
            total_errors: self.total_errors,
            requests_per_sec: rps,
            elapsed_secs,
            recent_samples: self.recent_samples.iter().cloned().collect(),
        }
    }
}
