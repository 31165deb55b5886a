//! Live ordered message feed

use std::collections::VecDeque;
use std::pin::Pin;
use std::task::{Context, Poll};

use futures::Stream;
use tracing::debug;

use crate::domain::{Document, Message, MessageBody, sort_by_sent_at};
use crate::state::Subscription;

/// One delivery to a feed consumer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedEvent {
    /// Full transcript on first delivery
    Backlog(Vec<Message>),

    /// A message landed after everything already delivered
    Appended(Message),

    /// A message landed before already-delivered ones; here is the new order
    Reordered(Vec<Message>),
}

/// Restartable stream of a match's messages in `sent_at` order
///
/// Dropping the feed stops its subscription.
pub struct MessageFeed {
    subscription: Subscription<MessageBody>,
    transcript: Vec<Message>,
    pending: VecDeque<FeedEvent>,
    started: bool,
}

impl MessageFeed {
    pub(crate) fn new(subscription: Subscription<MessageBody>) -> Self {
        Self {
            subscription,
            transcript: Vec::new(),
            pending: VecDeque::new(),
            started: false,
        }
    }

    /// Everything delivered so far, in order
    pub fn transcript(&self) -> &[Message] {
        &self.transcript
    }

    fn apply(&mut self, snapshot: Vec<Document<MessageBody>>) {
        let mut next: Vec<Message> = snapshot.into_iter().map(Message::from).collect();
        sort_by_sent_at(&mut next);
        let events = diff_transcript(&self.transcript, &next, !self.started);
        debug!(event_count = events.len(), transcript_len = next.len(), "MessageFeed::apply: called");
        self.started = true;
        self.transcript = next;
        self.pending.extend(events);
    }
}

impl Stream for MessageFeed {
    type Item = FeedEvent;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<FeedEvent>> {
        let this = self.get_mut();
        loop {
            if let Some(event) = this.pending.pop_front() {
                return Poll::Ready(Some(event));
            }
            match Pin::new(&mut this.subscription).poll_next(cx) {
                Poll::Ready(Some(snapshot)) => this.apply(snapshot),
                Poll::Ready(None) => return Poll::Ready(None),
                Poll::Pending => return Poll::Pending,
            }
        }
    }
}

/// Events that take a consumer from `delivered` to `next`
pub fn diff_transcript(delivered: &[Message], next: &[Message], first: bool) -> Vec<FeedEvent> {
    if first {
        return vec![FeedEvent::Backlog(next.to_vec())];
    }
    if next.len() >= delivered.len() && next[..delivered.len()] == *delivered {
        next[delivered.len()..].iter().cloned().map(FeedEvent::Appended).collect()
    } else {
        vec![FeedEvent::Reordered(next.to_vec())]
    }
}
