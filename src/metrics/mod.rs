pub mod collector;
pub mod percentiles;
pub mod stream;

pub use collector::{MetricsCollector, MetricsSnapshot};

/// One server-side observation, pushed by the timing middleware.
#[derive(Debug, Clone)]
pub struct ServerSample {
    /// e.g. "POST /api/users"
    pub endpoint: String,
    /// Time from request boundary to response, in microseconds
    pub duration_us: u64,
    /// false for 4xx / 5xx responses
    pub success: bool,
}
