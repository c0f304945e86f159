//! Request-timing lab: a toy "create user" API instrumented with server-side
//! duration tracking, a race-free client timing collector, and a sequential
//! benchmark runner with nearest-rank statistics.

use std::sync::Arc;

pub mod bench;
pub mod client;
pub mod clock;
pub mod config;
pub mod handlers;
pub mod ids;
pub mod metrics;
pub mod middleware;
pub mod server;
pub mod store;
pub mod timing;

use clock::SharedClock;
use metrics::MetricsCollector;
use store::UserStore;

/// Shared application state available to every handler via `State<Arc<AppState>>`.
pub struct AppState {
    /// In-memory users plus the id counter, scoped to this process.
    pub store: UserStore,

    /// Server-side duration histograms. Written by the middleware, read by the metrics endpoints.
    pub metrics: Arc<MetricsCollector>,

    /// Time source for trackers, ids and timestamps.
    pub clock: SharedClock,
}

impl AppState {
    pub fn new(clock: SharedClock, max_users: Option<usize>) -> Self {
        Self {
            store: UserStore::new(max_users),
            metrics: Arc::new(MetricsCollector::new()),
            clock,
        }
    }
}
