//! Match view projection
//!
//! An owned handle that keeps the caller's current match up to date from a
//! live subscription on the caller's Matched requests.

use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::domain::fields::request as fields;
use crate::domain::{Filter, Identity, Match, RequestDoc, RequestStatus};
use crate::state::RequestStore;

/// Live view of one caller's current match
///
/// Dropping the handle stops the background subscription.
pub struct MatchProjection {
    rx: watch::Receiver<Option<Match>>,
    task: JoinHandle<()>,
}

impl MatchProjection {
    /// Start projecting `identity`'s match into `view`
    pub fn start(store: &dyn RequestStore, identity: Identity, view: Arc<watch::Sender<Option<Match>>>) -> Self {
        debug!(%identity, "MatchProjection::start: called");
        let mut subscription = store.subscribe_requests(vec![
            Filter::eq(fields::REQUESTER, identity.as_str()),
            Filter::eq(fields::STATUS, RequestStatus::Matched),
        ]);
        let rx = view.subscribe();

        let task = tokio::spawn(async move {
            while let Some(snapshot) = subscription.next().await {
                let current = select_current(&identity, &snapshot);
                let changed = view.send_if_modified(|cached| {
                    if *cached == current {
                        false
                    } else {
                        *cached = current.clone();
                        true
                    }
                });
                if changed {
                    match &current {
                        Some(m) => info!(%identity, partner = %m.partner, match_id = %m.match_id, "Projection: matched"),
                        None => info!(%identity, "Projection: no current match"),
                    }
                }
            }
            debug!(%identity, "MatchProjection: subscription ended");
        });

        Self { rx, task }
    }

    /// Current match, if any
    pub fn current(&self) -> Option<Match> {
        self.rx.borrow().clone()
    }

    /// Wait for the next change and return the new value
    ///
    /// Returns the current value without waiting if the view was dropped.
    pub async fn changed(&mut self) -> Option<Match> {
        if self.rx.changed().await.is_err() {
            debug!("MatchProjection::changed: view closed");
        }
        self.rx.borrow_and_update().clone()
    }

    /// Wait until a match is present, up to `timeout`
    pub async fn wait_for_match(&mut self, timeout: Duration) -> Option<Match> {
        self.wait_until(timeout, |m| m.is_some()).await.flatten()
    }

    /// Wait until no match is present, up to `timeout`; true if cleared in time
    pub async fn wait_for_none(&mut self, timeout: Duration) -> bool {
        matches!(self.wait_until(timeout, |m| m.is_none()).await, Some(None))
    }

    async fn wait_until(
        &mut self,
        timeout: Duration,
        predicate: impl FnMut(&Option<Match>) -> bool,
    ) -> Option<Option<Match>> {
        match tokio::time::timeout(timeout, self.rx.wait_for(predicate)).await {
            Ok(Ok(value)) => Some(value.clone()),
            Ok(Err(_)) => {
                debug!("MatchProjection::wait_until: view closed");
                None
            }
            Err(_) => {
                debug!(?timeout, "MatchProjection::wait_until: timed out");
                None
            }
        }
    }

    /// Whether the background subscription is still running
    pub fn is_active(&self) -> bool {
        !self.task.is_finished()
    }

    /// Stop the projection
    pub fn stop(self) {
        debug!("MatchProjection::stop: called");
    }
}

impl Drop for MatchProjection {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Derive the current match from the caller's Matched requests
///
/// More than one is a data anomaly; the first by arrival is surfaced.
fn select_current(identity: &Identity, snapshot: &[RequestDoc]) -> Option<Match> {
    if snapshot.len() > 1 {
        warn!(%identity, count = snapshot.len(), "Data anomaly: more than one matched request, surfacing the first");
    }
    let first = snapshot.first()?;
    let current = Match::from_request(first);
    if current.is_none() {
        warn!(%identity, request_id = %first.id, "Data anomaly: matched request without partner fields");
    }
    current
}
