//! Response event bus.
//!
//! Whoever completes an HTTP exchange publishes a [`ResponseEvent`]; observers
//! wait for one matching their predicate. A listener sees only events
//! published after it was registered, so a listener registered after the
//! triggering call has already finished can miss a fast response for good.

use thiserror::Error;
use tokio::sync::broadcast;

const CHANNEL_CAPACITY: usize = 64;

#[derive(Debug, Clone, PartialEq)]
pub struct ResponseEvent {
    pub url: String,
    pub status: u16,
    /// Clock ms at which the body was fully read
    pub received_at: f64,
}

impl ResponseEvent {
    /// Path match ignoring query string, e.g. `"/api/users"`.
    pub fn path_is(&self, path: &str) -> bool {
        let without_query = self.url.split(['?', '#']).next().unwrap_or_default();
        without_query.ends_with(path)
    }
}

#[derive(Debug, Error)]
pub enum WaitError {
    #[error("response event bus closed before a matching response arrived")]
    Closed,
}

#[derive(Clone)]
pub struct ResponseEvents {
    tx: broadcast::Sender<ResponseEvent>,
}

impl ResponseEvents {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self { tx }
    }

    /// Returns how many listeners received the event; 0 means nobody was
    /// waiting and the event is gone.
    pub fn publish(&self, event: ResponseEvent) -> usize {
        match self.tx.send(event) {
            Ok(delivered) => delivered,
            Err(broadcast::error::SendError(event)) => {
                tracing::debug!(url = %event.url, "response event had no listener");
                0
            }
        }
    }

    /// Registers the listener immediately.
    ///
    /// This is deliberately a plain `fn`: an `async fn` would not subscribe
    /// until first polled, which is after the trigger in the usual
    /// `let w = wait_for(..); trigger().await; w.recv().await` sequence.
    pub fn wait_for<M>(&self, matcher: M) -> ResponseWaiter<M>
    where
        M: Fn(&ResponseEvent) -> bool,
    {
        ResponseWaiter {
            rx: self.tx.subscribe(),
            matcher,
        }
    }

    pub fn listener_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for ResponseEvents {
    fn default() -> Self {
        Self::new()
    }
}

/// A registered listener. Dropping it unregisters.
pub struct ResponseWaiter<M> {
    rx: broadcast::Receiver<ResponseEvent>,
    matcher: M,
}

impl<M> ResponseWaiter<M>
where
    M: Fn(&ResponseEvent) -> bool,
{
    pub async fn recv(mut self) -> Result<ResponseEvent, WaitError> {
        loop {
            match self.rx.recv().await {
                Ok(event) if (self.matcher)(&event) => return Ok(event),
                Ok(_) => continue,
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "response listener lagged");
                }
                Err(broadcast::error::RecvError::Closed) => return Err(WaitError::Closed),
            }
        }
    }

    /// Non-blocking: the first already-queued matching event, if any.
    /// Non-matching events are consumed along the way.
    pub fn try_take(&mut self) -> Result<Option<ResponseEvent>, WaitError> {
        loop {
            match self.rx.try_recv() {
                Ok(event) if (self.matcher)(&event) => return Ok(Some(event)),
                Ok(_) => continue,
                Err(broadcast::error::TryRecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "response listener lagged");
                }
                Err(broadcast::error::TryRecvError::Empty) => return Ok(None),
                Err(broadcast::error::TryRecvError::Closed) => return Err(WaitError::Closed),
            }
        }
    }
}
