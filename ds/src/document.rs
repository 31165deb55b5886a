//! Stored documents and change log entries

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::filter::{Filter, matches_all};
use crate::record::IndexValue;

/// A record as returned by the store, with its store-assigned metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document<T> {
    /// Store-assigned identifier
    pub id: String,

    /// Starts at 1, incremented on every update
    pub version: u64,

    /// Server timestamp assigned at insert (Unix milliseconds, strictly increasing)
    pub created_at: i64,

    /// Server timestamp of the last write
    pub updated_at: i64,

    /// The record body
    pub data: T,
}

/// Kind of mutation recorded in the change log
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    Added,
    Modified,
    Removed,
}

/// One mutation of one document
#[derive(Debug, Clone, PartialEq)]
pub struct Change {
    pub collection: String,
    pub id: String,
    pub kind: ChangeKind,
    /// Indexed fields before the mutation (None for inserts)
    pub before: Option<HashMap<String, IndexValue>>,
    /// Indexed fields after the mutation (None for deletes)
    pub after: Option<HashMap<String, IndexValue>>,
    /// Server timestamp of the mutation
    pub at: i64,
}

impl Change {
    /// Whether this change can alter the result set of a query on `collection` with `filters`
    ///
    /// True when the document matched the filters before or after the mutation.
    pub fn touches(&self, collection: &str, filters: &[Filter]) -> bool {
        if self.collection != collection {
            return false;
        }
        let before = self.before.as_ref().is_some_and(|f| matches_all(filters, f));
        let after = self.after.as_ref().is_some_and(|f| matches_all(filters, f));
        before || after
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status(s: &str) -> HashMap<String, IndexValue> {
        HashMap::from([("status".to_string(), IndexValue::from(s))])
    }

    #[test]
    fn test_touches_on_entering_result_set() {
        let change = Change {
            collection: "requests".to_string(),
            id: "r1".to_string(),
            kind: ChangeKind::Modified,
            before: Some(status("pending")),
            after: Some(status("matched")),
            at: 1,
        };
        assert!(change.touches("requests", &[Filter::eq("status", "matched")]));
        assert!(change.touches("requests", &[Filter::eq("status", "pending")]));
        assert!(!change.touches("requests", &[Filter::eq("status", "cancelled")]));
        assert!(!change.touches("messages", &[Filter::eq("status", "matched")]));
    }

    #[test]
    fn test_touches_on_removal() {
        let change = Change {
            collection: "requests".to_string(),
            id: "r1".to_string(),
            kind: ChangeKind::Removed,
            before: Some(status("matched")),
            after: None,
            at: 2,
        };
        assert!(change.touches("requests", &[Filter::eq("status", "matched")]));
        assert!(!change.touches("requests", &[Filter::eq("status", "pending")]));
    }
}
