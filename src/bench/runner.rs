use serde_json::{json, Value};

use super::stats::DurationSeries;
use crate::client::Probe;
use crate::clock::{Clock, SharedClock};
use crate::config::BenchmarkConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Progress {
    pub completed: usize,
    pub total: usize,
}

type PayloadFn = Box<dyn Fn(usize) -> Value + Send + Sync>;

/// Drives warmup plus measured iterations against one endpoint, one request
/// at a time.
pub struct BenchmarkRunner<P> {
    config: BenchmarkConfig,
    probe: P,
    payloads: PayloadFn,
}

/// Fresh create-user body for request number `n`.
pub fn user_payload(clock: &dyn Clock, n: usize) -> Value {
    let ms = clock.epoch_ms();
    json!({
        "username": format!("user_{ms}_{n}"),
        "email":    format!("test_{ms}_{n}@example.com"),
    })
}

impl<P: Probe> BenchmarkRunner<P> {
    pub fn new(config: BenchmarkConfig, probe: P, clock: SharedClock) -> Self {
        Self {
            config,
            probe,
            payloads: Box::new(move |n| user_payload(clock.as_ref(), n)),
        }
    }

    pub fn with_payloads<F>(mut self, payloads: F) -> Self
    where
        F: Fn(usize) -> Value + Send + Sync + 'static,
    {
        self.payloads = Box::new(payloads);
        self
    }

    pub fn config(&self) -> &BenchmarkConfig {
        &self.config
    }

    /// Runs the benchmark, logging progress.
    pub async fn run(&self) -> DurationSeries {
        self.run_with_progress(|p| {
            tracing::info!(completed = p.completed, total = p.total, "progress");
        })
        .await
    }

    /// Warmup results are discarded. Each measured request is awaited to
    /// completion before the next one starts; `on_progress` fires after
    /// every `progress_every` measured requests.
    pub async fn run_with_progress<F>(&self, mut on_progress: F) -> DurationSeries
    where
        F: FnMut(Progress),
    {
        let cfg = &self.config;

        if cfg.warmup > 0 {
            tracing::info!(warmup = cfg.warmup, "warming up");
        }
        for i in 0..cfg.warmup {
            let discarded = self.probe.execute(&cfg.endpoint, &(self.payloads)(i)).await;
            tracing::debug!(iteration = i, duration_ms = discarded, "warmup request");
            if !cfg.warmup_pause.is_zero() {
                tokio::time::sleep(cfg.warmup_pause).await;
            }
        }

        tracing::info!(
            endpoint = %cfg.endpoint,
            iterations = cfg.iterations,
            "starting benchmark"
        );

        let mut series = DurationSeries::with_capacity(cfg.iterations);
        for i in 0..cfg.iterations {
            let payload = (self.payloads)(cfg.warmup + i);
            series.push(self.probe.execute(&cfg.endpoint, &payload).await);

            let completed = i + 1;
            if completed % cfg.progress_every == 0 {
                on_progress(Progress {
                    completed,
                    total: cfg.iterations,
                });
            }
        }

        tracing::info!(
            measured = series.len(),
            failures = series.failures(),
            "benchmark finished"
        );
        series
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bench::stats::aggregate;
    use crate::client::FAILURE_SENTINEL;
    use crate::clock::ManualClock;
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use std::collections::{HashSet, VecDeque};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;
    use url::Url;

    /// Replays scripted durations and records how it was called.
    #[derive(Default)]
    struct ScriptedProbe {
        script: Mutex<VecDeque<f64>>,
        payloads: Mutex<Vec<Value>>,
        in_flight: AtomicUsize,
        max_in_flight: AtomicUsize,
    }

    impl ScriptedProbe {
        fn new(script: &[f64]) -> Arc<Self> {
            let probe = Self::default();
            probe.script.lock().extend(script.iter().copied());
            Arc::new(probe)
        }
    }

    #[async_trait]
    impl Probe for Arc<ScriptedProbe> {
        async fn execute(&self, _endpoint: &Url, payload: &Value) -> f64 {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(now, Ordering::SeqCst);
            self.payloads.lock().push(payload.clone());

            tokio::task::yield_now().await;

            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            self.script.lock().pop_front().unwrap_or(1.0)
        }
    }

    fn runner(iterations: usize, warmup: usize, probe: Arc<ScriptedProbe>) -> BenchmarkRunner<Arc<ScriptedProbe>> {
        let config =
            BenchmarkConfig::try_new("http://localhost:3000/api/users", iterations, warmup).unwrap();
        BenchmarkRunner::new(config, probe, Arc::new(ManualClock::new(1_000.0)))
    }

    #[tokio::test]
    async fn warmup_results_are_discarded() {
        let probe = ScriptedProbe::new(&[900.0, 800.0, 5.0, 10.0, 15.0]);
        let series = runner(3, 2, probe.clone()).run().await;

        assert_eq!(series.values(), &[5.0, 10.0, 15.0]);
        assert_eq!(probe.payloads.lock().len(), 5);
    }

    #[tokio::test]
    async fn requests_never_overlap() {
        let probe = ScriptedProbe::new(&[]);
        runner(20, 3, probe.clone()).run().await;

        assert_eq!(probe.max_in_flight.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn progress_fires_at_fixed_cadence() {
        let probe = ScriptedProbe::new(&[]);
        let mut seen = Vec::new();
        runner(25, 0, probe)
            .run_with_progress(|p| seen.push(p.completed))
            .await;

        assert_eq!(seen, [10, 20]);
    }

    #[tokio::test]
    async fn custom_progress_cadence() {
        let config = BenchmarkConfig::try_new("http://localhost:3000/api/users", 6, 0)
            .unwrap()
            .with_progress_every(3)
            .unwrap();
        let runner = BenchmarkRunner::new(
            config,
            ScriptedProbe::new(&[]),
            Arc::new(ManualClock::new(0.0)),
        );
        let mut seen = Vec::new();
        runner.run_with_progress(|p| seen.push((p.completed, p.total))).await;

        assert_eq!(seen, [(3, 6), (6, 6)]);
    }

    #[tokio::test]
    async fn failed_measurements_stay_in_the_series() {
        let probe = ScriptedProbe::new(&[FAILURE_SENTINEL, 10.0, 20.0]);
        let series = runner(3, 0, probe).run().await;

        assert_eq!(series.failures(), 1);
        let report = aggregate(&series).unwrap();
        assert_eq!(report.samples, 2);
        assert_eq!(report.median, 20.0);
    }

    #[tokio::test]
    async fn every_request_gets_a_distinct_payload() {
        let probe = ScriptedProbe::new(&[]);
        runner(4, 2, probe.clone()).run().await;

        let payloads = probe.payloads.lock();
        let names: Vec<_> = payloads
            .iter()
            .map(|p| p["username"].as_str().unwrap().to_owned())
            .collect();
        let distinct: HashSet<_> = names.iter().collect();
        assert_eq!(names.len(), 6);
        assert_eq!(distinct.len(), 6);
        assert_eq!(names[0], "user_1000_0");
    }

    #[tokio::test]
    async fn custom_payloads_are_used() {
        let probe = ScriptedProbe::new(&[]);
        runner(2, 0, probe.clone())
            .with_payloads(|n| json!({ "n": n }))
            .run()
            .await;

        assert_eq!(probe.payloads.lock()[1], json!({ "n": 1 }));
    }

    #[tokio::test(start_paused = true)]
    async fn warmup_is_paced() {
        let config = BenchmarkConfig::try_new("http://localhost:3000/api/users", 1, 3)
            .unwrap()
            .with_warmup_pause(Duration::from_millis(100));
        let runner = BenchmarkRunner::new(
            config,
            ScriptedProbe::new(&[]),
            Arc::new(ManualClock::new(0.0)),
        );

        let start = tokio::time::Instant::now();
        runner.run().await;
        assert!(start.elapsed() >= Duration::from_millis(300));
    }
}
