use std::future::Future;

use thiserror::Error;

use super::events::{ResponseEvent, ResponseEvents, WaitError};
use super::http::ObservedClient;
use crate::clock::SharedClock;
use crate::timing::{TimingError, TimingSample};

#[derive(Debug, Error)]
pub enum TrackError<E> {
    /// The triggering action itself failed; its error is passed through.
    #[error("triggering action failed: {0}")]
    Trigger(#[source] E),
    #[error(transparent)]
    Listener(#[from] WaitError),
    /// The trigger finished but no response it produced matched.
    #[error("trigger completed without a matching response")]
    Unmatched,
    #[error(transparent)]
    Ordering(#[from] TimingError),
}

/// Result of one tracked action: the timing sample, the response event that
/// closed it, and the trigger's own output untouched.
#[derive(Debug)]
pub struct Tracked<T> {
    pub sample: TimingSample,
    pub response: ResponseEvent,
    pub outcome: T,
}

/// Captures action / sent / received instants for one user-triggered request.
///
/// The clock must be the one the response publisher stamps `received_at`
/// with; [`ClientTimingCollector::attached_to`] takes both from the client.
pub struct ClientTimingCollector {
    clock: SharedClock,
    events: ResponseEvents,
}

impl ClientTimingCollector {
    pub fn new(clock: SharedClock, events: ResponseEvents) -> Self {
        Self { clock, events }
    }

    pub fn attached_to(client: &ObservedClient) -> Self {
        Self::new(client.clock().clone(), client.events().clone())
    }

    /// Registers a listener for the first response accepted by `matcher`,
    /// then runs `trigger`, then waits for that response.
    ///
    /// Registration always happens before `trigger` is called, so a response
    /// that lands while the trigger is still running is not lost. A trigger
    /// publishes its response before it resolves; if nothing matching is
    /// queued by then, the call fails with [`TrackError::Unmatched`] rather
    /// than waiting for an event that will never come.
    pub async fn track<M, F, Fut, T, E>(
        &self,
        matcher: M,
        trigger: F,
    ) -> Result<Tracked<T>, TrackError<E>>
    where
        M: Fn(&ResponseEvent) -> bool,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let action_time = self.clock.now_ms();
        tracing::debug!(action_time, "action triggered");

        let mut waiter = self.events.wait_for(matcher);

        let request_sent_time = self.clock.now_ms();
        tracing::debug!(request_sent_time, "request sent");
        let outcome = trigger().await.map_err(TrackError::Trigger)?;

        let response = waiter.try_take()?.ok_or(TrackError::Unmatched)?;
        tracing::debug!(
            response_received_time = response.received_at,
            status = response.status,
            "response received"
        );

        let sample = TimingSample::new(action_time, request_sent_time, response.received_at)?;
        tracing::debug!(client_duration_ms = sample.client_duration(), "response timed");

        Ok(Tracked {
            sample,
            response,
            outcome,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::{Clock, ManualClock};
    use std::sync::Arc;

    fn setup(start: f64, step: f64) -> (Arc<ManualClock>, ResponseEvents, ClientTimingCollector) {
        let clock = Arc::new(ManualClock::with_step(start, step));
        let events = ResponseEvents::new();
        let collector = ClientTimingCollector::new(clock.clone(), events.clone());
        (clock, events, collector)
    }

    fn users_response(received_at: f64) -> ResponseEvent {
        ResponseEvent {
            url: "http://localhost:3000/api/users".into(),
            status: 201,
            received_at,
        }
    }

    #[tokio::test]
    async fn captures_response_published_during_the_trigger() {
        let (clock, events, collector) = setup(100.0, 1.0);

        let tracked = collector
            .track(
                |e| e.path_is("/api/users"),
                || async {
                    // The endpoint answers before the trigger returns.
                    events.publish(users_response(clock.now_ms()));
                    Ok::<_, std::io::Error>("clicked")
                },
            )
            .await
            .unwrap();

        assert_eq!(tracked.outcome, "clicked");
        assert_eq!(tracked.sample.action_time(), 100.0);
        assert_eq!(tracked.sample.request_sent_time(), 101.0);
        assert_eq!(tracked.sample.response_received_time(), 102.0);
        assert_eq!(tracked.sample.client_duration(), 1.0);
    }

    #[tokio::test]
    async fn listener_exists_before_trigger_runs() {
        let (_, events, collector) = setup(0.0, 1.0);

        collector
            .track(
                |_| true,
                || async {
                    assert_eq!(events.listener_count(), 1);
                    events.publish(users_response(10.0));
                    Ok::<_, std::io::Error>(())
                },
            )
            .await
            .unwrap();

        assert_eq!(events.listener_count(), 0);
    }

    #[tokio::test]
    async fn response_stamped_before_dispatch_is_an_ordering_defect() {
        let (_, events, collector) = setup(100.0, 1.0);

        let err = collector
            .track(
                |_| true,
                || async {
                    events.publish(users_response(50.0));
                    Ok::<_, std::io::Error>(())
                },
            )
            .await
            .unwrap_err();

        assert!(matches!(err, TrackError::Ordering(TimingError::OrderingDefect { .. })));
    }

    #[tokio::test]
    async fn trigger_errors_pass_through() {
        let (_, _, collector) = setup(0.0, 1.0);

        let err = collector
            .track(
                |_| true,
                || async { Err::<(), _>(std::io::Error::other("connection reset")) },
            )
            .await
            .unwrap_err();

        match err {
            TrackError::Trigger(e) => assert_eq!(e.to_string(), "connection reset"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn trigger_without_matching_response_fails_instead_of_hanging() {
        let (_, events, collector) = setup(0.0, 1.0);

        let tracked = tokio::time::timeout(
            std::time::Duration::from_secs(5),
            collector.track(
                |e| e.path_is("/api/users"),
                || async {
                    events.publish(ResponseEvent {
                        url: "http://localhost:3000/api/v2/users".into(),
                        status: 201,
                        received_at: 5.0,
                    });
                    Ok::<_, std::io::Error>(())
                },
            ),
        )
        .await
        .expect("track must return once the trigger has resolved");

        assert!(matches!(tracked, Err(TrackError::Unmatched)));
        assert_eq!(events.listener_count(), 0);
    }

    #[tokio::test]
    async fn samples_are_ordered_across_many_actions() {
        let (clock, events, collector) = setup(0.0, 0.25);

        for _ in 0..50 {
            let tracked = collector
                .track(
                    |e| e.path_is("/api/users"),
                    || async {
                        events.publish(users_response(clock.now_ms()));
                        Ok::<_, std::io::Error>(())
                    },
                )
                .await
                .unwrap();
            let s = tracked.sample;
            assert!(s.action_time() <= s.request_sent_time());
            assert!(s.request_sent_time() <= s.response_received_time());
            assert!(s.client_duration() >= 0.0);
        }
    }
}
