//! Chat message domain types

use docstore::{Document, IndexValue, Record};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::identity::Identity;

/// Indexed field names usable in filters
pub mod fields {
    pub const MATCH_ID: &str = "match_id";
    pub const SENDER_KIND: &str = "sender_kind";
}

/// Author of a chat line
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum Sender {
    /// A match participant
    Human(Identity),
    /// The scripted tutor
    Assistant,
}

impl Sender {
    pub fn is_human(&self) -> bool {
        matches!(self, Sender::Human(_))
    }

    pub fn is_assistant(&self) -> bool {
        matches!(self, Sender::Assistant)
    }

    /// Identity of a human sender
    pub fn identity(&self) -> Option<&Identity> {
        match self {
            Sender::Human(id) => Some(id),
            Sender::Assistant => None,
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            Sender::Human(_) => "human",
            Sender::Assistant => "assistant",
        }
    }
}

impl std::fmt::Display for Sender {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Sender::Human(id) => write!(f, "{}", id),
            Sender::Assistant => write!(f, "assistant"),
        }
    }
}

/// Stored body of a chat line
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageBody {
    pub match_id: String,
    pub text: String,
    pub sender: Sender,
}

impl Record for MessageBody {
    fn collection_name() -> &'static str {
        "messages"
    }

    fn indexed_fields(&self) -> HashMap<String, IndexValue> {
        let mut index = HashMap::new();
        index.insert(fields::MATCH_ID.to_string(), IndexValue::from(&self.match_id));
        index.insert(fields::SENDER_KIND.to_string(), IndexValue::from(self.sender.kind()));
        index
    }
}

/// A delivered chat line
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Message {
    pub id: String,
    pub match_id: String,
    pub text: String,
    pub sender: Sender,
    /// Server timestamp assigned at write time; the only ordering key
    pub sent_at: i64,
}

impl From<Document<MessageBody>> for Message {
    fn from(doc: Document<MessageBody>) -> Self {
        Self {
            id: doc.id,
            match_id: doc.data.match_id,
            text: doc.data.text,
            sender: doc.data.sender,
            sent_at: doc.created_at,
        }
    }
}

/// Sort messages into channel order
///
/// Ties on `sent_at` cannot come from the store's clock, but fall back to id
/// so the order stays total for any input.
pub fn sort_by_sent_at(messages: &mut [Message]) {
    messages.sort_by(|a, b| a.sent_at.cmp(&b.sent_at).then_with(|| a.id.cmp(&b.id)));
}
