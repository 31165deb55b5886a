//! Search outcomes

use crate::domain::Match;

/// Result of one search attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchOutcome {
    /// This search claimed an older complementary request
    ImmediateMatch(Match),

    /// No partner yet; the request stays Pending and a later match arrives
    /// through the projection
    PendingWait { request_id: String },
}

impl SearchOutcome {
    pub fn is_immediate(&self) -> bool {
        matches!(self, SearchOutcome::ImmediateMatch(_))
    }

    /// Shared session key, present only for an immediate match
    pub fn match_id(&self) -> Option<&str> {
        match self {
            SearchOutcome::ImmediateMatch(m) => Some(&m.match_id),
            SearchOutcome::PendingWait { .. } => None,
        }
    }
}

impl std::fmt::Display for SearchOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SearchOutcome::ImmediateMatch(m) => write!(f, "ImmediateMatch({})", m.match_id),
            SearchOutcome::PendingWait { .. } => write!(f, "PendingWait"),
        }
    }
}
