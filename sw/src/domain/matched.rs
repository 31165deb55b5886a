//! Match - a confirmed pairing as seen by one participant

use serde::Serialize;

use super::identity::Identity;
use super::request::RequestDoc;

/// A confirmed pairing, derived from the viewer's own Matched request
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Match {
    /// Shared session key for both participants
    pub match_id: String,

    /// The viewer's own request record
    pub request_id: String,

    pub me: Identity,
    pub partner: Identity,

    /// What the viewer teaches
    pub offered_skill: String,

    /// What the viewer learns
    pub wanted_skill: String,

    pub partner_offered: String,
    pub partner_wanted: String,

    /// Server timestamp of the transition to Matched
    pub matched_at: i64,
}

impl Match {
    /// Build from a Matched request; None if the request is not Matched or lacks partner fields
    pub fn from_request(doc: &RequestDoc) -> Option<Self> {
        let request = &doc.data;
        if !request.is_matched() {
            return None;
        }
        Some(Self {
            match_id: request.match_id.clone()?,
            request_id: doc.id.clone(),
            me: request.requester_id.clone(),
            partner: request.partner_id.clone()?,
            offered_skill: request.offered_skill.clone(),
            wanted_skill: request.wanted_skill.clone(),
            partner_offered: request.partner_offered.clone()?,
            partner_wanted: request.partner_wanted.clone()?,
            matched_at: doc.updated_at,
        })
    }

    /// The defining match condition: each side offers what the other wants
    pub fn is_complementary(&self) -> bool {
        self.offered_skill == self.partner_wanted && self.wanted_skill == self.partner_offered
    }

    /// Viewer first, then partner
    pub fn participants(&self) -> [&Identity; 2] {
        [&self.me, &self.partner]
    }
}
