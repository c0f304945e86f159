use serde_json::Value;
use url::Url;

use super::events::{ResponseEvent, ResponseEvents};
use super::ClientError;
use crate::clock::SharedClock;
use crate::middleware::timing::REQUEST_ID_HEADER;

/// HTTP client that announces every completed response on a
/// [`ResponseEvents`] bus, stamped with its clock.
#[derive(Clone)]
pub struct ObservedClient {
    http: reqwest::Client,
    events: ResponseEvents,
    clock: SharedClock,
}

#[derive(Debug, Clone)]
pub struct ObservedResponse {
    pub status: u16,
    /// `X-Request-ID`, when the server sent one
    pub request_id: Option<String>,
    pub body: Value,
    pub received_at: f64,
}

impl ObservedClient {
    pub fn new(clock: SharedClock, events: ResponseEvents) -> Result<Self, ClientError> {
        let http = reqwest::Client::builder()
            // measure the direct path, never an env-configured proxy
            .no_proxy()
            .build()
            .map_err(ClientError::Build)?;
        Ok(Self {
            http,
            events,
            clock,
        })
    }

    pub fn events(&self) -> &ResponseEvents {
        &self.events
    }

    pub fn clock(&self) -> &SharedClock {
        &self.clock
    }

    /// POSTs `body` as JSON. The response event is published as soon as the
    /// body bytes are in, before JSON parsing.
    ///
    /// The event carries the requested URL, not the one reqwest ended up at
    /// after redirects, so matchers written against the request still match.
    pub async fn post_json(&self, url: &Url, body: &Value) -> Result<ObservedResponse, ClientError> {
        let response = self.http.post(url.clone()).json(body).send().await?;

        let status = response.status().as_u16();
        let request_id = response
            .headers()
            .get(REQUEST_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::to_owned);
        if response.url() != url {
            tracing::debug!(requested = %url, served = %response.url(), "request was redirected");
        }

        let bytes = response.bytes().await?;
        let received_at = self.clock.now_ms();

        self.events.publish(ResponseEvent {
            url: url.to_string(),
            status,
            received_at,
        });

        Ok(ObservedResponse {
            status,
            request_id,
            body: serde_json::from_slice(&bytes)?,
            received_at,
        })
    }
}
