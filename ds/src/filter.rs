//! Query filters and update preconditions

use std::collections::HashMap;

use crate::record::IndexValue;

/// Comparison applied by a [`Filter`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterOp {
    Eq,
    Ne,
}

/// A single comparison against an indexed field
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Filter {
    pub field: String,
    pub op: FilterOp,
    pub value: IndexValue,
}

impl Filter {
    /// Field must equal the value
    pub fn eq(field: impl Into<String>, value: impl Into<IndexValue>) -> Self {
        Self {
            field: field.into(),
            op: FilterOp::Eq,
            value: value.into(),
        }
    }

    /// Field must be absent or differ from the value
    pub fn ne(field: impl Into<String>, value: impl Into<IndexValue>) -> Self {
        Self {
            field: field.into(),
            op: FilterOp::Ne,
            value: value.into(),
        }
    }

    pub fn matches(&self, fields: &HashMap<String, IndexValue>) -> bool {
        let current = fields.get(&self.field);
        match self.op {
            FilterOp::Eq => current == Some(&self.value),
            FilterOp::Ne => current != Some(&self.value),
        }
    }
}

impl std::fmt::Display for Filter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let op = match self.op {
            FilterOp::Eq => "==",
            FilterOp::Ne => "!=",
        };
        write!(f, "{} {} {}", self.field, op, self.value)
    }
}

/// True when every filter holds (an empty filter list matches everything)
pub fn matches_all(filters: &[Filter], fields: &HashMap<String, IndexValue>) -> bool {
    filters.iter().all(|f| f.matches(fields))
}

/// Condition checked atomically before an update is applied
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Precondition {
    /// Document must still be at this version
    pub version: Option<u64>,
    /// Document's current indexed fields must satisfy these filters
    pub filters: Vec<Filter>,
}

impl Precondition {
    /// Unconditional update
    pub fn none() -> Self {
        Self::default()
    }

    pub fn at_version(version: u64) -> Self {
        Self {
            version: Some(version),
            filters: Vec::new(),
        }
    }

    /// Add a field condition
    pub fn matching(mut self, filter: Filter) -> Self {
        self.filters.push(filter);
        self
    }

    /// Check against the current state of a document, returning the reason on failure
    pub(crate) fn check(&self, version: u64, fields: &HashMap<String, IndexValue>) -> Result<(), String> {
        match self.version {
            Some(expected) if expected != version => {
                return Err(format!("expected version {}, found {}", expected, version));
            }
            _ => {}
        }
        if let Some(failed) = self.filters.iter().find(|f| !f.matches(fields)) {
            return Err(format!("condition `{}` does not hold", failed));
        }
        Ok(())
    }
}
