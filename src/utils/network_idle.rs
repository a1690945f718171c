//! Network quiescence detection
//!
//! The search results are rendered by a burst of XHR requests after the
//! form is submitted. There is no DOM signal for "done", so readiness is
//! approximated by waiting until no request has been in flight for a
//! quiet window.

use std::collections::HashSet;
use std::time::Duration;

use chromiumoxide::Page;
use chromiumoxide::cdp::browser_protocol::network::{
    EnableParams, EventLoadingFailed, EventLoadingFinished, EventRequestWillBeSent,
};
use chromiumoxide::listeners::EventStream;
use futures::StreamExt;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::utils::errors::CatalogueError;

/// Tracks in-flight requests by id
#[derive(Debug, Default)]
pub struct InFlightRequests {
    pending: HashSet<String>,
}

impl InFlightRequests {
    pub fn started(&mut self, request_id: &str) {
        self.pending.insert(request_id.to_string());
    }

    /// Finished or failed; unknown ids (requests issued before the
    /// watcher attached) are ignored
    pub fn settled(&mut self, request_id: &str) {
        self.pending.remove(request_id);
    }

    pub fn is_idle(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }
}

/// Subscription to the page's network events
///
/// Attach BEFORE the action whose traffic should be awaited, otherwise the
/// first requests of the burst are missed.
pub struct NetworkIdleWatcher {
    requests: EventStream<EventRequestWillBeSent>,
    finished: EventStream<EventLoadingFinished>,
    failed: EventStream<EventLoadingFailed>,
}

impl NetworkIdleWatcher {
    pub async fn attach(page: &Page) -> Result<Self, CatalogueError> {
        page.execute(EnableParams::default()).await?;

        Ok(Self {
            requests: page.event_listener::<EventRequestWillBeSent>().await?,
            finished: page.event_listener::<EventLoadingFinished>().await?,
            failed: page.event_listener::<EventLoadingFailed>().await?,
        })
    }

    /// Wait until nothing has been in flight for `quiet_window`
    ///
    /// Returns `false` when `max_wait` elapsed first. Quiescence is only a
    /// readiness proxy (long-polling pages never go idle), so callers
    /// proceed either way.
    pub async fn settle(mut self, quiet_window: Duration, max_wait: Duration) -> bool {
        let deadline = Instant::now() + max_wait;
        let mut in_flight = InFlightRequests::default();

        loop {
            tokio::select! {
                Some(event) = self.requests.next() => {
                    in_flight.started(event.request_id.inner());
                }
                Some(event) = self.finished.next() => {
                    in_flight.settled(event.request_id.inner());
                }
                Some(event) = self.failed.next() => {
                    in_flight.settled(event.request_id.inner());
                }
                _ = tokio::time::sleep(quiet_window) => {
                    if in_flight.is_idle() {
                        debug!("Network quiet for {}ms", quiet_window.as_millis());
                        return true;
                    }
                }
                _ = tokio::time::sleep_until(deadline) => {
                    warn!(
                        "Network did not settle within {}ms ({} request(s) still pending), continuing",
                        max_wait.as_millis(),
                        in_flight.len()
                    );
                    return false;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn idle_after_every_request_settles() {
        let mut in_flight = InFlightRequests::default();
        assert!(in_flight.is_idle());

        in_flight.started("1");
        in_flight.started("2");
        assert_eq!(in_flight.len(), 2);

        in_flight.settled("1");
        assert!(!in_flight.is_idle());
        in_flight.settled("2");
        assert!(in_flight.is_idle());
    }

    #[test]
    fn unknown_completion_does_not_underflow() {
        let mut in_flight = InFlightRequests::default();
        in_flight.settled("issued-before-attach");
        assert!(in_flight.is_idle());
    }
}
