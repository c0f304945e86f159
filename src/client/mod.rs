//! Client side of the lab: timing collection for single user actions and the
//! request executor driven by the benchmark runner.

pub mod collector;
pub mod events;
pub mod executor;
pub mod http;

use thiserror::Error;

pub use collector::{ClientTimingCollector, TrackError, Tracked};
pub use events::{ResponseEvent, ResponseEvents, ResponseWaiter, WaitError};
pub use executor::{Probe, RequestExecutor, FAILURE_SENTINEL};
pub use http::{ObservedClient, ObservedResponse};

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("failed to construct HTTP client: {0}")]
    Build(#[source] reqwest::Error),
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("response body is not valid JSON: {0}")]
    MalformedBody(#[from] serde_json::Error),
}
