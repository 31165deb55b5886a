//! Domain types for SkillSwap
//!
//! Core domain types: MatchRequest, Match, Message, ReplyLease.
//! MatchRequest, MessageBody and ReplyLease implement the Record trait for DocStore persistence.

mod identity;
mod lease;
mod matched;
mod message;
mod request;

pub use identity::Identity;
pub use lease::{LeaseDoc, ReplyLease};
pub use matched::Match;
pub use message::{Message, MessageBody, Sender, sort_by_sent_at};
pub use request::{MatchRequest, RequestDoc, RequestStatus, normalize_skill};

/// Indexed field names for filters
pub mod fields {
    pub use super::lease::fields as lease;
    pub use super::message::fields as message;
    pub use super::request::fields as request;
}

// Re-export docstore types for convenience
pub use docstore::{Document, Filter, FilterOp, IndexValue, Precondition, Record};
