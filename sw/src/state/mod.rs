//! State management with actor pattern
//!
//! StoreManager owns the DocStore and processes messages via channels,
//! providing serialized access to shared state. Store mutations are fanned
//! out on a broadcast channel that drives live subscriptions.

mod manager;
mod messages;
mod store;
mod subscription;

pub use manager::StoreManager;
pub use messages::{StateError, StateResponse, StoreCommand};
pub use store::RequestStore;
pub use subscription::Subscription;

#[cfg(test)]
pub use store::mock;
