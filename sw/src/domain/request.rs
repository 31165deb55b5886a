//! MatchRequest domain type
//!
//! One record per search attempt. Created Pending, transitions to Matched
//! exactly once, deleted by cancel/clear or superseded by a new search.

use docstore::{Document, IndexValue, Record};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::identity::Identity;
use crate::error::MatchError;

/// Indexed field names usable in filters
pub mod fields {
    pub const REQUESTER: &str = "requester_id";
    pub const OFFERED: &str = "offered_skill";
    pub const WANTED: &str = "wanted_skill";
    pub const STATUS: &str = "status";
    pub const PARTNER: &str = "partner_id";
    pub const MATCH_ID: &str = "match_id";
}

/// Request lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum RequestStatus {
    /// Waiting for a complementary partner
    #[default]
    Pending,
    /// Paired with exactly one partner
    Matched,
}

impl std::fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Matched => write!(f, "matched"),
        }
    }
}

impl From<RequestStatus> for IndexValue {
    fn from(status: RequestStatus) -> Self {
        IndexValue::String(status.to_string())
    }
}

/// A user's "I offer X, want Y" request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchRequest {
    /// Owner of the request
    pub requester_id: Identity,

    /// Skill the requester can teach
    pub offered_skill: String,

    /// Skill the requester wants to learn
    pub wanted_skill: String,

    pub status: RequestStatus,

    /// Identity of the partner (set on match)
    #[serde(default)]
    pub partner_id: Option<Identity>,

    /// Partner's offered skill (set on match)
    #[serde(default)]
    pub partner_offered: Option<String>,

    /// Partner's wanted skill (set on match)
    #[serde(default)]
    pub partner_wanted: Option<String>,

    /// Shared session key, identical on both sides of a pair (set on match)
    #[serde(default)]
    pub match_id: Option<String>,
}

/// A MatchRequest as stored, with id, version and server timestamp
pub type RequestDoc = Document<MatchRequest>;

impl MatchRequest {
    /// New Pending request
    pub fn pending(
        requester_id: Identity,
        offered_skill: impl Into<String>,
        wanted_skill: impl Into<String>,
    ) -> Self {
        Self {
            requester_id,
            offered_skill: offered_skill.into(),
            wanted_skill: wanted_skill.into(),
            status: RequestStatus::Pending,
            partner_id: None,
            partner_offered: None,
            partner_wanted: None,
            match_id: None,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.status == RequestStatus::Pending
    }

    pub fn is_matched(&self) -> bool {
        self.status == RequestStatus::Matched
    }

    /// Whether `other` offers what this request wants and wants what it offers
    pub fn complements(&self, other: &MatchRequest) -> bool {
        self.offered_skill == other.wanted_skill && self.wanted_skill == other.offered_skill
    }

    /// Copy of this request transitioned to Matched with `partner`
    pub fn matched_with(&self, partner: &MatchRequest, match_id: &str) -> Self {
        Self {
            status: RequestStatus::Matched,
            partner_id: Some(partner.requester_id.clone()),
            partner_offered: Some(partner.offered_skill.clone()),
            partner_wanted: Some(partner.wanted_skill.clone()),
            match_id: Some(match_id.to_string()),
            ..self.clone()
        }
    }

    /// Copy of this request back in Pending with partner references cleared
    pub fn reverted(&self) -> Self {
        Self::pending(
            self.requester_id.clone(),
            self.offered_skill.clone(),
            self.wanted_skill.clone(),
        )
    }
}

impl Record for MatchRequest {
    fn collection_name() -> &'static str {
        "match_requests"
    }

    fn indexed_fields(&self) -> HashMap<String, IndexValue> {
        let mut index = HashMap::new();
        index.insert(fields::REQUESTER.to_string(), IndexValue::from(self.requester_id.as_str()));
        index.insert(fields::OFFERED.to_string(), IndexValue::from(&self.offered_skill));
        index.insert(fields::WANTED.to_string(), IndexValue::from(&self.wanted_skill));
        index.insert(fields::STATUS.to_string(), IndexValue::from(self.status));
        if let Some(partner) = &self.partner_id {
            index.insert(fields::PARTNER.to_string(), IndexValue::from(partner.as_str()));
        }
        if let Some(match_id) = &self.match_id {
            index.insert(fields::MATCH_ID.to_string(), IndexValue::from(match_id));
        }
        index
    }
}

/// Trim a skill name, rejecting empty input
pub fn normalize_skill(label: &str, raw: &str) -> Result<String, MatchError> {
    let skill = raw.trim();
    if skill.is_empty() {
        return Err(MatchError::Validation(format!("{} skill must not be empty", label)));
    }
    Ok(skill.to_string())
}
