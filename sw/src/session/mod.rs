//! Chat sessions
//!
//! A session is one participant's view of a match: the shared message
//! channel plus a reply scheduler for that participant's messages. Replies
//! are guarded per match, so partners never get two replies for one burst.

mod channel;
mod feed;
mod responder;
mod scheduler;

pub use channel::SessionChannel;
pub use feed::{FeedEvent, MessageFeed, diff_transcript};
pub use responder::{ReplyPrompt, Responder, ResponderError, ScriptedTutor};
pub use scheduler::{ResponseScheduler, ScheduleResult};

#[cfg(test)]
pub use responder::mock;

use std::sync::Arc;

use tokio::sync::watch;
use tracing::{debug, warn};

use crate::config::AssistantConfig;
use crate::domain::{Match, Message, Sender};
use crate::error::MatchError;
use crate::state::RequestStore;

/// One participant's chat session on a match
pub struct Session {
    matched: Match,
    channel: SessionChannel,
    scheduler: ResponseScheduler,
}

impl Session {
    /// Open the session for `matched.me`
    pub fn open(
        store: Arc<dyn RequestStore>,
        matched: Match,
        responder: Arc<dyn Responder>,
        config: &AssistantConfig,
    ) -> Self {
        debug!(match_id = %matched.match_id, me = %matched.me, "Session::open: called");
        let channel = SessionChannel::new(matched.match_id.clone(), store);
        let scheduler = ResponseScheduler::new(
            channel.clone(),
            responder,
            matched.offered_skill.clone(),
            matched.wanted_skill.clone(),
            config,
        );
        Self {
            matched,
            channel,
            scheduler,
        }
    }

    pub fn match_info(&self) -> &Match {
        &self.matched
    }

    pub fn channel(&self) -> &SessionChannel {
        &self.channel
    }

    /// Send as the session owner and schedule the assistant's reply
    pub async fn send(&self, text: &str) -> Result<Message, MatchError> {
        let message = self.channel.send(text, Sender::Human(self.matched.me.clone())).await?;
        match self.scheduler.schedule(&message).await {
            Ok(scheduled) => debug!(message_id = %message.id, ?scheduled, "Session::send: reply scheduling"),
            Err(e) => warn!(message_id = %message.id, error = %e, "Session::send: reply not scheduled"),
        }
        Ok(message)
    }

    /// Live ordered feed of the whole conversation
    pub fn feed(&self) -> MessageFeed {
        self.channel.subscribe()
    }

    pub async fn history(&self) -> Result<Vec<Message>, MatchError> {
        self.channel.history().await
    }

    pub fn is_composing(&self) -> bool {
        self.scheduler.is_composing()
    }

    /// Composing signal: true while an assistant reply is pending on the match
    pub fn composing(&self) -> watch::Receiver<bool> {
        self.scheduler.composing()
    }

    /// Close the session, suppressing any pending reply
    pub async fn close(self) {
        debug!(match_id = %self.matched.match_id, "Session::close: called");
        self.scheduler.shutdown().await;
    }
}
