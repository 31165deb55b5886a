//! Reply lease domain type
//!
//! At most one lease exists per match. It names the Human message the next
//! Assistant reply answers, so every session on the match shares one
//! in-flight guard.

use docstore::{Document, IndexValue, Record};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Indexed field names usable in filters
pub mod fields {
    pub const MATCH_ID: &str = "match_id";
    pub const TRIGGER: &str = "trigger_id";
    pub const FIRING: &str = "firing";
}

/// The pending Assistant reply of one match
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplyLease {
    pub match_id: String,

    /// Id of the Human message the reply answers
    pub trigger_id: String,

    /// Set once the delay elapsed and the reply is being written
    #[serde(default)]
    pub firing: bool,
}

/// A ReplyLease as stored
pub type LeaseDoc = Document<ReplyLease>;

impl ReplyLease {
    /// Lease waiting out the reply delay
    pub fn pending(match_id: impl Into<String>, trigger_id: impl Into<String>) -> Self {
        Self {
            match_id: match_id.into(),
            trigger_id: trigger_id.into(),
            firing: false,
        }
    }

    /// Copy of this lease marked as being written
    pub fn fired(&self) -> Self {
        Self {
            firing: true,
            ..self.clone()
        }
    }
}

impl Record for ReplyLease {
    fn collection_name() -> &'static str {
        "reply_leases"
    }

    fn indexed_fields(&self) -> HashMap<String, IndexValue> {
        let mut index = HashMap::new();
        index.insert(fields::MATCH_ID.to_string(), IndexValue::from(&self.match_id));
        index.insert(fields::TRIGGER.to_string(), IndexValue::from(&self.trigger_id));
        index.insert(fields::FIRING.to_string(), IndexValue::from(self.firing));
        index
    }
}
