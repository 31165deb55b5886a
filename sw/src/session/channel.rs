//! Session channel - the ordered message log of one match

use std::sync::Arc;

use tracing::{debug, info};

use crate::domain::fields::request as request_fields;
use crate::domain::{Filter, Identity, Message, MessageBody, RequestStatus, Sender, sort_by_sent_at};
use crate::error::MatchError;
use crate::state::RequestStore;

use super::feed::MessageFeed;

/// Append-only message log keyed by match id
#[derive(Clone)]
pub struct SessionChannel {
    match_id: String,
    store: Arc<dyn RequestStore>,
}

impl SessionChannel {
    pub fn new(match_id: impl Into<String>, store: Arc<dyn RequestStore>) -> Self {
        let match_id = match_id.into();
        debug!(%match_id, "SessionChannel::new: called");
        Self { match_id, store }
    }

    pub fn match_id(&self) -> &str {
        &self.match_id
    }

    pub(crate) fn store(&self) -> &Arc<dyn RequestStore> {
        &self.store
    }

    /// Append a message; the store assigns its timestamp
    pub async fn send(&self, text: &str, sender: Sender) -> Result<Message, MatchError> {
        debug!(match_id = %self.match_id, %sender, "SessionChannel::send: called");
        let text = text.trim();
        if text.is_empty() {
            return Err(MatchError::Validation("message text must not be empty".to_string()));
        }
        if let Some(identity) = sender.identity() {
            self.ensure_participant(identity).await?;
        }

        let doc = self
            .store
            .insert_message(MessageBody {
                match_id: self.match_id.clone(),
                text: text.to_string(),
                sender,
            })
            .await?;
        let message = Message::from(doc);
        info!(match_id = %self.match_id, message_id = %message.id, sender = %message.sender, "Message sent");
        Ok(message)
    }

    /// Live ordered feed, starting with the full backlog
    pub fn subscribe(&self) -> MessageFeed {
        debug!(match_id = %self.match_id, "SessionChannel::subscribe: called");
        MessageFeed::new(self.store.subscribe_messages(&self.match_id))
    }

    /// One-shot ordered backlog
    pub async fn history(&self) -> Result<Vec<Message>, MatchError> {
        debug!(match_id = %self.match_id, "SessionChannel::history: called");
        let mut messages: Vec<Message> = self
            .store
            .query_messages(&self.match_id)
            .await?
            .into_iter()
            .map(Message::from)
            .collect();
        sort_by_sent_at(&mut messages);
        Ok(messages)
    }

    /// A participant owns a Matched request carrying this match id
    async fn ensure_participant(&self, identity: &Identity) -> Result<(), MatchError> {
        let filters = vec![
            Filter::eq(request_fields::REQUESTER, identity.as_str()),
            Filter::eq(request_fields::STATUS, RequestStatus::Matched),
            Filter::eq(request_fields::MATCH_ID, self.match_id.as_str()),
        ];
        if self.store.query_requests(filters).await?.is_empty() {
            debug!(%identity, match_id = %self.match_id, "ensure_participant: rejected");
            return Err(MatchError::NotParticipant {
                identity: identity.clone(),
                match_id: self.match_id.clone(),
            });
        }
        Ok(())
    }
}
