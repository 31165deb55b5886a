//! SkillSwap - peer skill-exchange matching and chat sessions
//!
//! Pairs users whose "I offer X, want Y" requests complement each other and
//! runs a real-time chat channel per pair, with a scripted tutor that answers
//! after a short delay.
//!
//! # Core Concepts
//!
//! - **No central arbiter**: every caller runs its own coordinator; pairs form
//!   through single-document conditional writes on a shared store
//! - **Newer claims older**: a search only claims requests that were Pending
//!   before its own, so simultaneous searches cannot double-match
//! - **Projections over state**: the current match and the message feed are
//!   owned subscription handles, never ambient globals
//!
//! # Modules
//!
//! - [`coordinator`] - request lifecycle, search, claim and rollback
//! - [`projection`] - live view of the caller's current match
//! - [`session`] - message channel, ordered feed and reply scheduler
//! - [`state`] - store actor, `RequestStore` trait and subscriptions
//! - [`config`] - configuration types and loading
//! - [`cli`] - command-line interface

pub mod cli;
pub mod config;
pub mod coordinator;
pub mod domain;
pub mod error;
pub mod projection;
pub mod session;
pub mod state;

// Re-export commonly used types
pub use config::{AssistantConfig, Config, MatchingConfig, ReplyPolicy, StoreConfig};
pub use coordinator::{MatchCoordinator, SearchOutcome};
pub use domain::{Identity, Match, MatchRequest, Message, RequestDoc, RequestStatus, Sender};
pub use error::MatchError;
pub use projection::MatchProjection;
pub use session::{
    FeedEvent, MessageFeed, ReplyPrompt, Responder, ResponderError, ResponseScheduler, ScheduleResult, ScriptedTutor,
    Session, SessionChannel,
};
pub use state::{RequestStore, StateError, StateResponse, StoreManager, Subscription};
