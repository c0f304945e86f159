pub mod users;

use axum::extract::rejection::BytesRejection;
use axum::http::StatusCode;
use serde::Serialize;
use thiserror::Error;

use crate::store::{StoreError, User};
use crate::timing::ServerTiming;

// ─── Shared response envelope ────────────────────────────────────

/// Body of every `POST /api/users` response. `requestDuration` is present on
/// success and on every failure path.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<User>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Wall-clock ms at which the response was built
    pub timestamp: u64,
    /// Server processing time in ms
    pub request_duration: f64,
}

impl ApiResponse {
    pub fn created(user: User, timing: ServerTiming, timestamp: u64) -> Self {
        Self {
            success: true,
            user: Some(user),
            error: None,
            timestamp,
            request_duration: timing.duration,
        }
    }

    pub fn failed(error: String, timing: ServerTiming, timestamp: u64) -> Self {
        Self {
            success: false,
            user: None,
            error: Some(error),
            timestamp,
            request_duration: timing.duration,
        }
    }
}

// ─── Unified error type ──────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ApiError {
    /// The body never reached the handler intact (too large, aborted).
    #[error("Request body could not be read")]
    UnreadableBody(#[from] BytesRejection),
    #[error("Request body must be valid JSON")]
    MalformedBody(#[source] serde_json::Error),
    #[error("Username and email are required and cannot be empty")]
    Validation,
    #[error("store: {0}")]
    Store(#[from] StoreError),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::UnreadableBody(rejection) => rejection.status(),
            Self::MalformedBody(_) | Self::Validation => StatusCode::BAD_REQUEST,
            Self::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Message placed in the response body; internal details stay in the logs.
    pub fn client_message(&self) -> String {
        match self {
            Self::Store(_) => "Internal server error".into(),
            other => other.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn internal_errors_do_not_leak_details() {
        let err = ApiError::from(StoreError::Full { capacity: 3 });
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.client_message(), "Internal server error");
    }

    #[test]
    fn failure_envelope_omits_user() {
        let timing = ServerTiming {
            start_time: 10,
            duration: 0.25,
        };
        let json = serde_json::to_value(ApiResponse::failed("nope".into(), timing, 11)).unwrap();
        assert_eq!(json["success"], false);
        assert_eq!(json["requestDuration"], 0.25);
        assert!(json.get("user").is_none());
    }
}
