use axum::{
    body::Bytes,
    extract::{rejection::BytesRejection, State},
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Extension, Json,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;

use crate::ids;
use crate::middleware::timing::RequestContext;
use crate::store::User;
use crate::AppState;

use super::{ApiError, ApiResponse};

// ─── Request types ───────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct CreateUserRequest {
    pub username: String,
    pub email: String,
}

impl CreateUserRequest {
    /// JSON syntax errors are `MalformedBody`; missing, mistyped or blank
    /// fields are `Validation`. Both fields come back trimmed.
    pub fn parse(body: &[u8]) -> Result<Self, ApiError> {
        let req: Self = serde_json::from_slice(body).map_err(|e| match e.classify() {
            serde_json::error::Category::Data => ApiError::Validation,
            _ => ApiError::MalformedBody(e),
        })?;

        let username = req.username.trim();
        let email = req.email.trim();
        if username.is_empty() || email.is_empty() {
            return Err(ApiError::Validation);
        }

        Ok(Self {
            username: username.to_owned(),
            email: email.to_owned(),
        })
    }
}

// ─── POST /api/users ─────────────────────────────────────────────

pub async fn create_user(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<RequestContext>,
    body: Result<Bytes, BytesRejection>,
) -> Response {
    tracing::debug!(request_id = %ctx.request_id, "request received");

    let outcome = body.map_err(ApiError::from).and_then(|body| {
        let req = CreateUserRequest::parse(&body)?;
        let now = state.clock.epoch_ms();
        let user = User {
            id: ids::user_id(now),
            username: req.username,
            email: req.email,
            created_at: now,
        };
        state.store.insert(user).map_err(ApiError::from)
    });

    // Finish the tracker on every path before the body is built.
    let timing = ctx.tracker.finish();
    let timestamp = state.clock.epoch_ms();

    match outcome {
        Ok(user) => {
            tracing::info!(
                request_id = %ctx.request_id,
                user_id = %user.id,
                duration_ms = timing.duration,
                "user created"
            );
            (
                StatusCode::CREATED,
                Json(ApiResponse::created(user, timing, timestamp)),
            )
                .into_response()
        }
        Err(err) => {
            let status = err.status();
            if status.is_server_error() {
                tracing::error!(
                    request_id = %ctx.request_id,
                    duration_ms = timing.duration,
                    error = %err,
                    "internal error"
                );
            } else {
                tracing::info!(
                    request_id = %ctx.request_id,
                    duration_ms = timing.duration,
                    error = %err,
                    "request rejected"
                );
            }
            (
                status,
                Json(ApiResponse::failed(err.client_message(), timing, timestamp)),
            )
                .into_response()
        }
    }
}

// ─── GET /api/users ──────────────────────────────────────────────

pub async fn list_users(State(state): State<Arc<AppState>>) -> Json<Value> {
    let users = state.store.list();
    Json(json!({
        "success":   true,
        "count":     users.len(),
        "users":     users,
        "timestamp": state.clock.epoch_ms(),
    }))
}

// ─── POST /api/users/optimized ───────────────────────────────────

#[derive(Debug, Serialize)]
struct OptimizedResponse {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    user: Option<User>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<&'static str>,
    timestamp: u64,
    /// Fractional ms, same tracker as the main endpoint
    duration: f64,
}

/// Counter-based ids, no trimming, `Cache-Control: no-store`.
pub async fn create_user_optimized(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<RequestContext>,
    body: Result<Bytes, BytesRejection>,
) -> Response {
    // Unreadable bodies keep the rejection's status; unparsable ones are a 500.
    let body = match body {
        Ok(bytes) => serde_json::from_slice::<Value>(&bytes)
            .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR),
        Err(rejection) => Err(rejection.status()),
    };
    let (status, user, error) = match body {
        Err(status) if status.is_client_error() => {
            (status, None, Some("Request body could not be read"))
        }
        Err(_) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            None,
            Some("Internal server error"),
        ),
        Ok(body) => match (non_empty_str(&body, "username"), non_empty_str(&body, "email")) {
            (Some(username), Some(email)) => {
                let user = User {
                    id: format!("user_{}", state.store.next_sequence()),
                    username: username.to_owned(),
                    email: email.to_owned(),
                    created_at: state.clock.epoch_ms(),
                };
                match state.store.insert(user) {
                    Ok(user) => (StatusCode::CREATED, Some(user), None),
                    Err(_) => (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        None,
                        Some("Internal server error"),
                    ),
                }
            }
            _ => (
                StatusCode::BAD_REQUEST,
                None,
                Some("Username and email are required"),
            ),
        },
    };

    let body = OptimizedResponse {
        success: user.is_some(),
        user,
        error,
        timestamp: state.clock.epoch_ms(),
        duration: ctx.tracker.finish().duration,
    };

    let mut response = (status, Json(body)).into_response();
    response
        .headers_mut()
        .insert(header::CACHE_CONTROL, HeaderValue::from_static("no-store"));
    response
}

// ─── POST /api/users/fast ────────────────────────────────────────

/// Minimal payload: `{ s, d: { i, u, e, t } }`. No body timing; the
/// `Server-Timing` header from the middleware still applies.
///
/// A body that is not JSON is an internal error (500); valid JSON without
/// both fields is `Invalid input` (400).
pub async fn create_user_fast(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Response {
    let Ok(parsed) = serde_json::from_slice::<Value>(&body) else {
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "s": false, "e": "Internal server error" })),
        )
            .into_response();
    };
    let (Some(username), Some(email)) = (
        non_empty_str(&parsed, "username"),
        non_empty_str(&parsed, "email"),
    ) else {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "s": false, "e": "Invalid input" })),
        )
            .into_response();
    };

    let user = User {
        id: format!("u{}", state.store.next_sequence()),
        username: username.to_owned(),
        email: email.to_owned(),
        created_at: state.clock.epoch_ms(),
    };

    let mut response = match state.store.insert(user) {
        Ok(user) => (
            StatusCode::CREATED,
            Json(json!({
                "s": true,
                "d": { "i": user.id, "u": user.username, "e": user.email, "t": user.created_at },
            })),
        )
            .into_response(),
        Err(_) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "s": false, "e": "Internal server error" })),
        )
            .into_response(),
    };
    response
        .headers_mut()
        .insert(header::CACHE_CONTROL, HeaderValue::from_static("no-store"));
    response
}

// ─── Helpers ─────────────────────────────────────────────────────

fn non_empty_str<'a>(body: &'a Value, key: &str) -> Option<&'a str> {
    body.get(key)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
}
