use std::sync::Arc;
use std::time::Instant;

use parking_lot::Mutex;

/// Time source shared by the server tracker, the client collector and the
/// benchmark executor.
///
/// `now_ms` is a monotonic, fractional-millisecond timeline anchored to the
/// Unix epoch at construction, so values read like `Date.now()` stamps but
/// never go backwards.  `epoch_ms` is the plain wall clock, used for
/// `timestamp` / `createdAt` fields and identifiers.
pub trait Clock: Send + Sync + 'static {
    fn now_ms(&self) -> f64;
    fn epoch_ms(&self) -> u64;
}

pub type SharedClock = Arc<dyn Clock>;

// ─── System clock ────────────────────────────────────────────────

pub struct SystemClock {
    anchor: Instant,
    anchor_epoch_ms: f64,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            anchor: Instant::now(),
            anchor_epoch_ms: chrono::Utc::now().timestamp_millis() as f64,
        }
    }

    pub fn shared() -> SharedClock {
        Arc::new(Self::new())
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now_ms(&self) -> f64 {
        self.anchor_epoch_ms + self.anchor.elapsed().as_secs_f64() * 1000.0
    }

    fn epoch_ms(&self) -> u64 {
        chrono::Utc::now().timestamp_millis().max(0) as u64
    }
}

// ─── Manual clock ────────────────────────────────────────────────

/// Deterministic clock for tests.
///
/// Every `now_ms` read returns the current value and then advances it by
/// `step`, so consecutive reads are strictly increasing unless `step` is 0.
pub struct ManualClock {
    state: Mutex<ManualState>,
}

struct ManualState {
    now: f64,
    step: f64,
}

impl ManualClock {
    pub fn new(start_ms: f64) -> Self {
        Self::with_step(start_ms, 0.0)
    }

    pub fn with_step(start_ms: f64, step_ms: f64) -> Self {
        Self {
            state: Mutex::new(ManualState {
                now: start_ms,
                step: step_ms,
            }),
        }
    }

    pub fn advance(&self, ms: f64) {
        self.state.lock().now += ms;
    }

    pub fn set(&self, ms: f64) {
        self.state.lock().now = ms;
    }

    /// Current value without consuming a step.
    pub fn peek(&self) -> f64 {
        self.state.lock().now
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> f64 {
        let mut state = self.state.lock();
        let now = state.now;
        state.now += state.step;
        now
    }

    fn epoch_ms(&self) -> u64 {
        self.state.lock().now.max(0.0) as u64
    }
}
