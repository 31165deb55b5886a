//! Store manager messages
//!
//! Commands and responses for the actor pattern.

use docstore::{Document, Filter, Precondition, StoreError};
use thiserror::Error;
use tokio::sync::oneshot;

use crate::domain::{LeaseDoc, MatchRequest, MessageBody, ReplyLease, RequestDoc};

/// Errors from state operations
#[derive(Debug, Error)]
pub enum StateError {
    #[error("Record not found: {0}")]
    NotFound(String),

    /// A conditional write was rejected
    #[error("Conflict on {id}: {reason}")]
    Conflict { id: String, reason: String },

    #[error("Store error: {0}")]
    StoreError(String),

    #[error("Channel error")]
    ChannelError,
}

impl From<StoreError> for StateError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound { collection, id } => StateError::NotFound(format!("{}/{}", collection, id)),
            StoreError::PreconditionFailed { id, reason, .. } => StateError::Conflict { id, reason },
            other => StateError::StoreError(other.to_string()),
        }
    }
}

/// Response from state operations
pub type StateResponse<T> = Result<T, StateError>;

/// Commands sent to the StoreManager actor
#[derive(Debug)]
pub enum StoreCommand {
    // MatchRequest operations
    InsertRequest {
        request: MatchRequest,
        reply: oneshot::Sender<StateResponse<RequestDoc>>,
    },
    GetRequest {
        id: String,
        reply: oneshot::Sender<StateResponse<Option<RequestDoc>>>,
    },
    UpdateRequest {
        id: String,
        request: MatchRequest,
        precondition: Precondition,
        reply: oneshot::Sender<StateResponse<RequestDoc>>,
    },
    DeleteRequest {
        id: String,
        precondition: Precondition,
        reply: oneshot::Sender<StateResponse<bool>>,
    },
    QueryRequests {
        filters: Vec<Filter>,
        reply: oneshot::Sender<StateResponse<Vec<RequestDoc>>>,
    },

    // Message operations
    InsertMessage {
        body: MessageBody,
        reply: oneshot::Sender<StateResponse<Document<MessageBody>>>,
    },
    QueryMessages {
        match_id: String,
        reply: oneshot::Sender<StateResponse<Vec<Document<MessageBody>>>>,
    },

    // ReplyLease operations
    InsertLease {
        lease: ReplyLease,
        reply: oneshot::Sender<StateResponse<LeaseDoc>>,
    },
    GetLease {
        match_id: String,
        reply: oneshot::Sender<StateResponse<Option<LeaseDoc>>>,
    },
    UpdateLease {
        id: String,
        lease: ReplyLease,
        precondition: Precondition,
        reply: oneshot::Sender<StateResponse<LeaseDoc>>,
    },
    DeleteLease {
        id: String,
        precondition: Precondition,
        reply: oneshot::Sender<StateResponse<bool>>,
    },

    // Shutdown
    Shutdown,
}
