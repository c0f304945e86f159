use axum::{
    extract::{Request, State},
    http::HeaderValue,
    middleware::Next,
    response::Response,
};
use std::sync::{Arc, OnceLock};

use crate::clock::SharedClock;
use crate::ids;
use crate::metrics::ServerSample;
use crate::timing::ServerTiming;
use crate::AppState;

pub const REQUEST_ID_HEADER: &str = "X-Request-ID";
pub const SERVER_TIMING_HEADER: &str = "Server-Timing";

// ─── Server duration tracker ─────────────────────────────────────

/// Measures server-side processing time for one request.
///
/// Started at the request boundary, finished right before the response body
/// is built. Clones share one result: the first `finish` fixes the timing and
/// every later call, from any clone, returns that same value.
#[derive(Clone)]
pub struct ServerDurationTracker {
    clock: SharedClock,
    start_time: u64,
    start_ms: f64,
    finished: Arc<OnceLock<ServerTiming>>,
}

impl ServerDurationTracker {
    pub fn start(clock: SharedClock) -> Self {
        let start_time = clock.epoch_ms();
        let start_ms = clock.now_ms();
        Self {
            clock,
            start_time,
            start_ms,
            finished: Arc::new(OnceLock::new()),
        }
    }

    pub fn finish(&self) -> ServerTiming {
        *self.finished.get_or_init(|| ServerTiming {
            start_time: self.start_time,
            duration: (self.clock.now_ms() - self.start_ms).max(0.0),
        })
    }

    pub fn is_finished(&self) -> bool {
        self.finished.get().is_some()
    }
}

/// Per-request data handed from the middleware to handlers through request
/// extensions.
#[derive(Clone)]
pub struct RequestContext {
    pub request_id: String,
    pub tracker: ServerDurationTracker,
}

// ─── Middleware ──────────────────────────────────────────────────

/// Starts the duration tracker before routing and, on the way out, adds:
///
///   X-Request-ID   `req-<ms>-<suffix>`, unless the handler already set one
///   Server-Timing  `total;dur=<ms>`, the same value the handler put in
///                  its body; handlers that never finish the tracker are
///                  measured up to the end of `next.run`
///
/// `/api/*` requests (metrics endpoints excluded) are also recorded into the
/// live metrics collector and logged.
pub async fn timing_middleware(
    State(state): State<Arc<AppState>>,
    mut req: Request,
    next: Next,
) -> Response {
    let method = req.method().clone();
    let path = req.uri().path().to_owned();

    let ctx = RequestContext {
        request_id: ids::request_id(state.clock.epoch_ms()),
        tracker: ServerDurationTracker::start(state.clock.clone()),
    };
    req.extensions_mut().insert(ctx.clone());

    let mut response = next.run(req).await;
    // Same value the handler reported, if it finished the tracker itself.
    let timing = ctx.tracker.finish();

    // ── Inject response headers ─────────────────────────────────
    let headers = response.headers_mut();
    if !headers.contains_key(REQUEST_ID_HEADER) {
        if let Ok(val) = HeaderValue::from_str(&ctx.request_id) {
            headers.insert(REQUEST_ID_HEADER, val);
        }
    }
    if let Ok(val) = format!("total;dur={:.3}", timing.duration).parse() {
        headers.insert(SERVER_TIMING_HEADER, val);
    }

    let status = response.status().as_u16();
    if path.starts_with("/api/") && !path.starts_with("/api/metrics") {
        state.metrics.record(ServerSample {
            endpoint: format!("{method} {path}"),
            duration_us: (timing.duration * 1000.0) as u64,
            success: status < 400,
        });

        tracing::info!(
            status,
            method = %method,
            path = %path,
            request_id = %ctx.request_id,
            duration_ms = timing.duration,
            "request handled"
        );
    }

    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;

    #[test]
    fn tracker_reports_elapsed_clock_time() {
        let clock = Arc::new(ManualClock::new(1_000.0));
        let tracker = ServerDurationTracker::start(clock.clone());
        clock.advance(12.5);
        let timing = tracker.finish();
        assert_eq!(timing.start_time, 1_000);
        assert_eq!(timing.duration, 12.5);
    }

    #[test]
    fn tracker_never_reports_negative_durations() {
        let clock = Arc::new(ManualClock::new(1_000.0));
        let tracker = ServerDurationTracker::start(clock.clone());
        clock.set(990.0);
        assert_eq!(tracker.finish().duration, 0.0);
    }

    #[test]
    fn first_finish_fixes_the_timing_for_every_clone() {
        let clock = Arc::new(ManualClock::new(0.0));
        let tracker = ServerDurationTracker::start(clock.clone());
        let handler_copy = tracker.clone();
        assert!(!tracker.is_finished());

        clock.advance(3.0);
        let first = handler_copy.finish();
        clock.advance(4.0);
        let second = tracker.finish();

        assert!(tracker.is_finished());
        assert_eq!(first.duration, 3.0);
        assert_eq!(first, second);
    }
}
