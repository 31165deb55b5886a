//! Live result-set subscriptions
//!
//! A subscription is a task that re-runs one query whenever a store change
//! could alter its result, and forwards the new result set when it differs
//! from the last one delivered.

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use docstore::{Change, Document, Filter};
use futures::Stream;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use super::messages::{StateError, StateResponse};

/// Owned handle to a live query; dropping it stops the background task
pub struct Subscription<T> {
    rx: mpsc::Receiver<Vec<Document<T>>>,
    task: JoinHandle<()>,
}

impl<T: Send + 'static> Subscription<T> {
    /// Start a subscription task
    ///
    /// `changes` must be subscribed before the first fetch runs so no change
    /// between the fetch and the first wait is missed.
    pub(crate) fn spawn<F, Fut>(
        mut changes: broadcast::Receiver<Change>,
        collection: &'static str,
        filters: Vec<Filter>,
        buffer: usize,
        fetch: F,
    ) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = StateResponse<Vec<Document<T>>>> + Send + 'static,
    {
        debug!(%collection, filter_count = filters.len(), "Subscription::spawn: called");
        let (tx, rx) = mpsc::channel(buffer);

        let task = tokio::spawn(async move {
            let mut delivered: Option<Vec<(String, u64)>> = None;
            loop {
                match fetch().await {
                    Ok(snapshot) => {
                        let fingerprint: Vec<(String, u64)> =
                            snapshot.iter().map(|d| (d.id.clone(), d.version)).collect();
                        if delivered.as_ref() != Some(&fingerprint) {
                            if tx.send(snapshot).await.is_err() {
                                debug!(%collection, "Subscription: receiver dropped");
                                return;
                            }
                            delivered = Some(fingerprint);
                        }
                    }
                    Err(StateError::ChannelError) => {
                        debug!(%collection, "Subscription: store stopped");
                        return;
                    }
                    Err(e) => {
                        warn!(%collection, error = %e, "Subscription: refresh failed, waiting for next change");
                    }
                }

                // Wait for a change that can alter the result set
                loop {
                    match changes.recv().await {
                        Ok(change) if change.touches(collection, &filters) => break,
                        Ok(_) => continue,
                        Err(RecvError::Lagged(skipped)) => {
                            debug!(%collection, skipped, "Subscription: lagged, resyncing");
                            break;
                        }
                        Err(RecvError::Closed) => {
                            debug!(%collection, "Subscription: change feed closed");
                            return;
                        }
                    }
                }

                // Coalesce a burst of changes into one refresh
                while changes.try_recv().is_ok() {}
            }
        });

        Self { rx, task }
    }
}

impl<T> Subscription<T> {
    /// Next result set; None once the subscription has ended
    pub async fn next_snapshot(&mut self) -> Option<Vec<Document<T>>> {
        self.rx.recv().await
    }

    /// Whether the background task is still running
    pub fn is_active(&self) -> bool {
        !self.task.is_finished()
    }

    /// Stop delivery and release the task
    pub fn stop(self) {
        debug!("Subscription::stop: called");
    }
}

impl<T> Drop for Subscription<T> {
    fn drop(&mut self) {
        self.task.abort();
    }
}

// No field is structurally pinned
impl<T> Unpin for Subscription<T> {}

impl<T> Stream for Subscription<T> {
    type Item = Vec<Document<T>>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.rx.poll_recv(cx)
    }
}
