use async_trait::async_trait;
use serde::de::IgnoredAny;
use serde_json::Value;
use url::Url;

use super::ClientError;
use crate::clock::SharedClock;

/// Duration recorded for a measurement that failed in transport.
pub const FAILURE_SENTINEL: f64 = -1.0;

/// One timed request/response cycle. Implementations never fail: a failed
/// measurement is reported as [`FAILURE_SENTINEL`].
#[async_trait]
pub trait Probe: Send + Sync {
    async fn execute(&self, endpoint: &Url, payload: &Value) -> f64;
}

pub struct RequestExecutor {
    http: reqwest::Client,
    clock: SharedClock,
}

impl RequestExecutor {
    pub fn new(clock: SharedClock) -> Result<Self, ClientError> {
        let http = reqwest::Client::builder()
            // measure the direct path, never an env-configured proxy
            .no_proxy()
            .build()
            .map_err(ClientError::Build)?;
        Ok(Self { http, clock })
    }

    /// Sends the request and consumes the full body, requiring it to be JSON.
    async fn round_trip(&self, endpoint: &Url, payload: &Value) -> Result<(), ClientError> {
        let response = self.http.post(endpoint.clone()).json(payload).send().await?;
        let bytes = response.bytes().await?;
        serde_json::from_slice::<IgnoredAny>(&bytes)?;
        Ok(())
    }
}

#[async_trait]
impl Probe for RequestExecutor {
    async fn execute(&self, endpoint: &Url, payload: &Value) -> f64 {
        let start = self.clock.now_ms();
        match self.round_trip(endpoint, payload).await {
            Ok(()) => (self.clock.now_ms() - start).max(0.0),
            Err(err) => {
                tracing::warn!(endpoint = %endpoint, error = %err, "request failed");
                FAILURE_SENTINEL
            }
        }
    }
}
