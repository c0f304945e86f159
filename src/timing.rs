//! Per-request timing records.
//!
//! Both types are created once per request and never mutated afterwards.

use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Error)]
pub enum TimingError {
    /// The three instants of a sample were observed out of causal order.
    /// Always a harness bug; a correct run never produces one.
    #[error(
        "ordering defect: action={action_time}ms sent={request_sent_time}ms \
         received={response_received_time}ms"
    )]
    OrderingDefect {
        action_time: f64,
        request_sent_time: f64,
        response_received_time: f64,
    },
}

/// Client-observed instants (ms) of one user-triggered request.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TimingSample {
    action_time: f64,
    request_sent_time: f64,
    response_received_time: f64,
}

impl TimingSample {
    pub fn new(
        action_time: f64,
        request_sent_time: f64,
        response_received_time: f64,
    ) -> Result<Self, TimingError> {
        let ordered = action_time <= request_sent_time
            && request_sent_time <= response_received_time;
        if !ordered {
            return Err(TimingError::OrderingDefect {
                action_time,
                request_sent_time,
                response_received_time,
            });
        }

        Ok(Self {
            action_time,
            request_sent_time,
            response_received_time,
        })
    }

    pub fn action_time(&self) -> f64 {
        self.action_time
    }

    pub fn request_sent_time(&self) -> f64 {
        self.request_sent_time
    }

    pub fn response_received_time(&self) -> f64 {
        self.response_received_time
    }

    /// Round trip as seen by the client: received − sent.
    pub fn client_duration(&self) -> f64 {
        self.response_received_time - self.request_sent_time
    }

    /// Time between the user action and the request leaving.
    pub fn dispatch_delay(&self) -> f64 {
        self.request_sent_time - self.action_time
    }
}

/// Server-side processing time attached to every `/api/users` response.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerTiming {
    /// Wall-clock ms at which handling started.
    pub start_time: u64,
    /// Always ≥ 0.
    pub duration: f64,
}
