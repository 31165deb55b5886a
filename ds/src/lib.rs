//! DocStore - in-process document store
//!
//! Records are grouped into named collections and stored as JSON documents.
//! The store assigns each document an id, a version and a server timestamp,
//! answers conjunctive equality queries over a record's indexed fields, and
//! supports single-document conditional updates. Every mutation is appended to
//! a change log that the owner drains to drive live subscriptions.
//!
//! The store is synchronous and not thread-safe on its own: it is meant to be
//! owned by a single actor task that serializes all access.
//!
//! # Example
//!
//! ```ignore
//! use docstore::{Filter, Precondition, Store};
//!
//! let mut store = Store::new();
//! let doc = store.insert(record)?;
//! let pending = store.query::<MyRecord>(&[Filter::eq("status", "pending")])?;
//! store.update(&doc.id, changed, &Precondition::at_version(doc.version))?;
//! for change in store.drain_changes() {
//!     // fan out to subscribers
//! }
//! ```

mod clock;
mod document;
mod error;
mod filter;
mod record;
mod store;

pub use clock::{ServerClock, now_ms};
pub use document::{Change, ChangeKind, Document};
pub use error::StoreError;
pub use filter::{Filter, FilterOp, Precondition, matches_all};
pub use record::{IndexValue, Record};
pub use store::Store;
