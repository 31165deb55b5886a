//! Matching and session error types

use thiserror::Error;

use crate::domain::Identity;
use crate::state::StateError;

/// Errors surfaced by the coordinator, session channel and projection
#[derive(Debug, Error)]
pub enum MatchError {
    /// Rejected before reaching the store
    #[error("Validation error: {0}")]
    Validation(String),

    /// Transient store failure; the whole operation is safe to retry
    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),

    /// The candidate was taken by a concurrent searcher
    #[error("Candidate {candidate_id} was already claimed")]
    ClaimConflict { candidate_id: String },

    #[error("{identity} is not a participant of match {match_id}")]
    NotParticipant { identity: Identity, match_id: String },

    #[error("Not found: {0}")]
    NotFound(String),

    /// Store contents violate a pairing invariant
    #[error("Data anomaly: {0}")]
    DataAnomaly(String),
}

impl MatchError {
    /// Check if this error is retryable
    pub fn is_retryable(&self) -> bool {
        matches!(self, MatchError::StoreUnavailable(_))
    }

    /// Check if this is a lost claim race
    pub fn is_claim_conflict(&self) -> bool {
        matches!(self, MatchError::ClaimConflict { .. })
    }
}

impl From<StateError> for MatchError {
    fn from(err: StateError) -> Self {
        match err {
            StateError::NotFound(what) => MatchError::NotFound(what),
            StateError::Conflict { id, .. } => MatchError::ClaimConflict { candidate_id: id },
            StateError::StoreError(msg) => MatchError::StoreUnavailable(msg),
            StateError::ChannelError => MatchError::StoreUnavailable("store actor is not running".to_string()),
        }
    }
}
