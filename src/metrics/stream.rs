use axum::{
    extract::State,
    http::StatusCode,
    response::sse::{Event, KeepAlive, Sse},
    Json,
};
use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;
use tokio_stream::wrappers::IntervalStream;
use tokio_stream::{Stream, StreamExt};

use super::collector::MetricsSnapshot;
use crate::AppState;

const PUSH_EVERY: Duration = Duration::from_millis(500);
const KEEP_ALIVE_EVERY: Duration = Duration::from_secs(15);

/// GET /api/metrics
pub async fn get_metrics(State(state): State<Arc<AppState>>) -> Json<MetricsSnapshot> {
    Json(state.metrics.snapshot())
}

/// POST /api/metrics/reset
pub async fn reset_metrics(State(state): State<Arc<AppState>>) -> StatusCode {
    state.metrics.reset();
    tracing::info!("server metrics reset");
    StatusCode::NO_CONTENT
}

/// GET /api/metrics/stream
///
/// `snapshot` events every 500 ms; the event id is the request count at the
/// time of the snapshot.
pub async fn metrics_stream(
    State(state): State<Arc<AppState>>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let ticks = IntervalStream::new(tokio::time::interval(PUSH_EVERY));

    let events = ticks.map(move |_| {
        let snapshot = state.metrics.snapshot();
        let event = Event::default()
            .event("snapshot")
            .id(snapshot.total_requests.to_string());
        Ok(match event.json_data(&snapshot) {
            Ok(event) => event,
            Err(err) => {
                tracing::warn!(error = %err, "failed to encode metrics snapshot");
                Event::default().event("error").data("snapshot encoding failed")
            }
        })
    });

    Sse::new(events).keep_alive(KeepAlive::new().interval(KEEP_ALIVE_EVERY).text("keep-alive"))
}
