//! RequestStore trait - the narrow store interface the coordinator and session use

use async_trait::async_trait;
use docstore::{Document, Filter, Precondition};

use crate::domain::{LeaseDoc, MatchRequest, MessageBody, ReplyLease, RequestDoc};

use super::messages::StateResponse;
use super::subscription::Subscription;

/// Atomic single-document operations plus live result-set subscriptions
///
/// Every method is one store round trip; there are no multi-document
/// transactions. Conditional writes fail with `StateError::Conflict` when the
/// precondition no longer holds.
#[async_trait]
pub trait RequestStore: Send + Sync {
    async fn insert_request(&self, request: MatchRequest) -> StateResponse<RequestDoc>;

    async fn get_request(&self, id: &str) -> StateResponse<Option<RequestDoc>>;

    /// Replace a request if `precondition` holds
    async fn update_request(
        &self,
        id: &str,
        request: MatchRequest,
        precondition: Precondition,
    ) -> StateResponse<RequestDoc>;

    /// Delete a request if `precondition` holds; Ok(false) if it was already gone
    async fn delete_request(&self, id: &str, precondition: Precondition) -> StateResponse<bool>;

    /// Requests matching every filter, oldest first
    async fn query_requests(&self, filters: Vec<Filter>) -> StateResponse<Vec<RequestDoc>>;

    async fn insert_message(&self, body: MessageBody) -> StateResponse<Document<MessageBody>>;

    /// All messages of one match, in store order
    async fn query_messages(&self, match_id: &str) -> StateResponse<Vec<Document<MessageBody>>>;

    /// Create the match's reply lease; Conflict if the match already has one
    async fn insert_lease(&self, lease: ReplyLease) -> StateResponse<LeaseDoc>;

    async fn get_lease(&self, match_id: &str) -> StateResponse<Option<LeaseDoc>>;

    /// Replace a lease if `precondition` holds
    async fn update_lease(&self, id: &str, lease: ReplyLease, precondition: Precondition) -> StateResponse<LeaseDoc>;

    /// Delete a lease if `precondition` holds; Ok(false) if it was already gone
    async fn delete_lease(&self, id: &str, precondition: Precondition) -> StateResponse<bool>;

    /// Live result set of a request query
    fn subscribe_requests(&self, filters: Vec<Filter>) -> Subscription<MatchRequest>;

    /// Live result set of one match's messages
    fn subscribe_messages(&self, match_id: &str) -> Subscription<MessageBody>;

    /// Live view of one match's reply lease (empty or one document)
    fn subscribe_lease(&self, match_id: &str) -> Subscription<ReplyLease>;
}
