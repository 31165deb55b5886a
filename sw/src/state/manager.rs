//! StoreManager - actor that owns the DocStore
//!
//! Processes commands via channels for serialized access to shared state and
//! broadcasts every store mutation to subscribers.

use async_trait::async_trait;
use docstore::{Change, Document, Filter, Precondition, Store};
use tokio::sync::{broadcast, mpsc, oneshot};
use tracing::{debug, info};

use crate::config::StoreConfig;
use crate::domain::fields::lease as lease_fields;
use crate::domain::fields::message as message_fields;
use crate::domain::{LeaseDoc, MatchRequest, MessageBody, Record, ReplyLease, RequestDoc};

use super::messages::{StateError, StateResponse, StoreCommand};
use super::store::RequestStore;
use super::subscription::Subscription;

/// Handle to send commands to the StoreManager
#[derive(Clone)]
pub struct StoreManager {
    tx: mpsc::Sender<StoreCommand>,
    /// Broadcast sender for store change notifications
    change_tx: broadcast::Sender<Change>,
    subscription_buffer: usize,
}

impl StoreManager {
    /// Spawn a new StoreManager actor
    pub fn spawn(config: &StoreConfig) -> Self {
        debug!(?config, "spawn: called");
        let (tx, rx) = mpsc::channel(config.channel_buffer.max(1));

        // Subscriptions hold receivers; the actor holds the sender
        let (change_tx, _) = broadcast::channel(config.event_buffer.max(1));

        tokio::spawn(actor_loop(Store::new(), rx, change_tx.clone()));

        info!("StoreManager spawned");

        Self {
            tx,
            change_tx,
            subscription_buffer: config.subscription_buffer.max(1),
        }
    }

    /// Subscribe to raw store change events
    pub fn subscribe_changes(&self) -> broadcast::Receiver<Change> {
        self.change_tx.subscribe()
    }

    /// Number of live change receivers (one per running subscription)
    pub fn subscriber_count(&self) -> usize {
        self.change_tx.receiver_count()
    }

    async fn request<T>(&self, build: impl FnOnce(oneshot::Sender<StateResponse<T>>) -> StoreCommand) -> StateResponse<T> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(build(reply_tx))
            .await
            .map_err(|_| StateError::ChannelError)?;
        reply_rx.await.map_err(|_| StateError::ChannelError)?
    }

    /// Shutdown the StoreManager
    pub async fn shutdown(&self) -> Result<(), StateError> {
        debug!("shutdown: called");
        self.tx
            .send(StoreCommand::Shutdown)
            .await
            .map_err(|_| StateError::ChannelError)
    }
}

#[async_trait]
impl RequestStore for StoreManager {
    async fn insert_request(&self, request: MatchRequest) -> StateResponse<RequestDoc> {
        debug!(requester = %request.requester_id, status = %request.status, "insert_request: called");
        self.request(|reply| StoreCommand::InsertRequest { request, reply }).await
    }

    async fn get_request(&self, id: &str) -> StateResponse<Option<RequestDoc>> {
        debug!(%id, "get_request: called");
        let id = id.to_string();
        self.request(|reply| StoreCommand::GetRequest { id, reply }).await
    }

    async fn update_request(
        &self,
        id: &str,
        request: MatchRequest,
        precondition: Precondition,
    ) -> StateResponse<RequestDoc> {
        debug!(%id, status = %request.status, ?precondition, "update_request: called");
        let id = id.to_string();
        self.request(|reply| StoreCommand::UpdateRequest {
            id,
            request,
            precondition,
            reply,
        })
        .await
    }

    async fn delete_request(&self, id: &str, precondition: Precondition) -> StateResponse<bool> {
        debug!(%id, ?precondition, "delete_request: called");
        let id = id.to_string();
        self.request(|reply| StoreCommand::DeleteRequest {
            id,
            precondition,
            reply,
        })
        .await
    }

    async fn query_requests(&self, filters: Vec<Filter>) -> StateResponse<Vec<RequestDoc>> {
        debug!(filter_count = filters.len(), "query_requests: called");
        self.request(|reply| StoreCommand::QueryRequests { filters, reply }).await
    }

    async fn insert_message(&self, body: MessageBody) -> StateResponse<Document<MessageBody>> {
        debug!(match_id = %body.match_id, sender = %body.sender, "insert_message: called");
        self.request(|reply| StoreCommand::InsertMessage { body, reply }).await
    }

    async fn query_messages(&self, match_id: &str) -> StateResponse<Vec<Document<MessageBody>>> {
        debug!(%match_id, "query_messages: called");
        let match_id = match_id.to_string();
        self.request(|reply| StoreCommand::QueryMessages { match_id, reply }).await
    }

    async fn insert_lease(&self, lease: ReplyLease) -> StateResponse<LeaseDoc> {
        debug!(match_id = %lease.match_id, trigger_id = %lease.trigger_id, "insert_lease: called");
        self.request(|reply| StoreCommand::InsertLease { lease, reply }).await
    }

    async fn get_lease(&self, match_id: &str) -> StateResponse<Option<LeaseDoc>> {
        debug!(%match_id, "get_lease: called");
        let match_id = match_id.to_string();
        self.request(|reply| StoreCommand::GetLease { match_id, reply }).await
    }

    async fn update_lease(&self, id: &str, lease: ReplyLease, precondition: Precondition) -> StateResponse<LeaseDoc> {
        debug!(%id, trigger_id = %lease.trigger_id, firing = lease.firing, ?precondition, "update_lease: called");
        let id = id.to_string();
        self.request(|reply| StoreCommand::UpdateLease {
            id,
            lease,
            precondition,
            reply,
        })
        .await
    }

    async fn delete_lease(&self, id: &str, precondition: Precondition) -> StateResponse<bool> {
        debug!(%id, ?precondition, "delete_lease: called");
        let id = id.to_string();
        self.request(|reply| StoreCommand::DeleteLease {
            id,
            precondition,
            reply,
        })
        .await
    }

    fn subscribe_requests(&self, filters: Vec<Filter>) -> Subscription<MatchRequest> {
        debug!(filter_count = filters.len(), "subscribe_requests: called");
        let store = self.clone();
        let query = filters.clone();
        Subscription::spawn(
            self.subscribe_changes(),
            MatchRequest::collection_name(),
            filters,
            self.subscription_buffer,
            move || {
                let store = store.clone();
                let query = query.clone();
                async move { store.query_requests(query).await }
            },
        )
    }

    fn subscribe_messages(&self, match_id: &str) -> Subscription<MessageBody> {
        debug!(%match_id, "subscribe_messages: called");
        let store = self.clone();
        let key = match_id.to_string();
        Subscription::spawn(
            self.subscribe_changes(),
            MessageBody::collection_name(),
            vec![Filter::eq(message_fields::MATCH_ID, match_id)],
            self.subscription_buffer,
            move || {
                let store = store.clone();
                let key = key.clone();
                async move { store.query_messages(&key).await }
            },
        )
    }

    fn subscribe_lease(&self, match_id: &str) -> Subscription<ReplyLease> {
        debug!(%match_id, "subscribe_lease: called");
        let store = self.clone();
        let key = match_id.to_string();
        Subscription::spawn(
            self.subscribe_changes(),
            ReplyLease::collection_name(),
            vec![Filter::eq(lease_fields::MATCH_ID, match_id)],
            self.subscription_buffer,
            move || {
                let store = store.clone();
                let key = key.clone();
                async move { store.get_lease(&key).await.map(|lease| lease.into_iter().collect()) }
            },
        )
    }
}

/// The actor loop that processes commands
async fn actor_loop(mut store: Store, mut rx: mpsc::Receiver<StoreCommand>, change_tx: broadcast::Sender<Change>) {
    debug!("actor_loop: called");
    debug!("StoreManager actor started");

    while let Some(cmd) = rx.recv().await {
        match cmd {
            // MatchRequest operations
            StoreCommand::InsertRequest { request, reply } => {
                debug!(requester = %request.requester_id, "actor_loop: InsertRequest command");
                let result = store.insert(request).map_err(StateError::from);
                publish_changes(&mut store, &change_tx);
                let _ = reply.send(result);
            }

            StoreCommand::GetRequest { id, reply } => {
                debug!(%id, "actor_loop: GetRequest command");
                let result: StateResponse<Option<RequestDoc>> = store.get(&id).map_err(StateError::from);
                let _ = reply.send(result);
            }

            StoreCommand::UpdateRequest {
                id,
                request,
                precondition,
                reply,
            } => {
                debug!(%id, "actor_loop: UpdateRequest command");
                let result = store.update(&id, request, &precondition).map_err(StateError::from);
                publish_changes(&mut store, &change_tx);
                let _ = reply.send(result);
            }

            StoreCommand::DeleteRequest { id, precondition, reply } => {
                debug!(%id, "actor_loop: DeleteRequest command");
                let result = store
                    .delete_if::<MatchRequest>(&id, &precondition)
                    .map_err(StateError::from);
                publish_changes(&mut store, &change_tx);
                let _ = reply.send(result);
            }

            StoreCommand::QueryRequests { filters, reply } => {
                debug!(filter_count = filters.len(), "actor_loop: QueryRequests command");
                let result: StateResponse<Vec<RequestDoc>> = store.query(&filters).map_err(StateError::from);
                let _ = reply.send(result);
            }

            // Message operations
            StoreCommand::InsertMessage { body, reply } => {
                debug!(match_id = %body.match_id, "actor_loop: InsertMessage command");
                let result = store.insert(body).map_err(StateError::from);
                publish_changes(&mut store, &change_tx);
                let _ = reply.send(result);
            }

            StoreCommand::QueryMessages { match_id, reply } => {
                debug!(%match_id, "actor_loop: QueryMessages command");
                let filters = [Filter::eq(message_fields::MATCH_ID, match_id.as_str())];
                let result: StateResponse<Vec<Document<MessageBody>>> =
                    store.query(&filters).map_err(StateError::from);
                let _ = reply.send(result);
            }

            // ReplyLease operations
            StoreCommand::InsertLease { lease, reply } => {
                debug!(match_id = %lease.match_id, "actor_loop: InsertLease command");
                let unique = [Filter::eq(lease_fields::MATCH_ID, lease.match_id.as_str())];
                let result = store.insert_unique(lease, &unique).map_err(StateError::from);
                publish_changes(&mut store, &change_tx);
                let _ = reply.send(result);
            }

            StoreCommand::GetLease { match_id, reply } => {
                debug!(%match_id, "actor_loop: GetLease command");
                let filters = [Filter::eq(lease_fields::MATCH_ID, match_id.as_str())];
                let result: StateResponse<Option<LeaseDoc>> = store
                    .query::<ReplyLease>(&filters)
                    .map(|leases| leases.into_iter().next())
                    .map_err(StateError::from);
                let _ = reply.send(result);
            }

            StoreCommand::UpdateLease {
                id,
                lease,
                precondition,
                reply,
            } => {
                debug!(%id, "actor_loop: UpdateLease command");
                let result = store.update(&id, lease, &precondition).map_err(StateError::from);
                publish_changes(&mut store, &change_tx);
                let _ = reply.send(result);
            }

            StoreCommand::DeleteLease { id, precondition, reply } => {
                debug!(%id, "actor_loop: DeleteLease command");
                let result = store
                    .delete_if::<ReplyLease>(&id, &precondition)
                    .map_err(StateError::from);
                publish_changes(&mut store, &change_tx);
                let _ = reply.send(result);
            }

            // Shutdown
            StoreCommand::Shutdown => {
                debug!("actor_loop: Shutdown command");
                info!("StoreManager shutting down");
                break;
            }
        }
    }

    debug!("StoreManager actor stopped");
}

/// Broadcast everything the last command changed, before its reply is sent
fn publish_changes(store: &mut Store, change_tx: &broadcast::Sender<Change>) {
    for change in store.drain_changes() {
        debug!(collection = %change.collection, id = %change.id, kind = ?change.kind, "publish_changes: change");
        // No receivers is not an error: nobody is subscribed yet
        if change_tx.send(change).is_err() {
            debug!("publish_changes: no subscribers");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::fields::request as request_fields;
    use crate::domain::{Identity, RequestStatus, Sender};
    use futures::StreamExt;
    use std::time::Duration;

    fn spawn() -> StoreManager {
        StoreManager::spawn(&StoreConfig::default())
    }

    fn guitar_for_spanish(who: &str) -> MatchRequest {
        MatchRequest::pending(Identity::from(who), "Guitar", "Spanish")
    }

    #[tokio::test]
    async fn test_store_manager_request_crud() {
        let manager = spawn();

        // Insert
        let doc = manager.insert_request(guitar_for_spanish("u1")).await.unwrap();
        assert_eq!(doc.version, 1);

        // Get
        let fetched = manager.get_request(&doc.id).await.unwrap().unwrap();
        assert_eq!(fetched, doc);

        // Query
        let pending = manager
            .query_requests(vec![Filter::eq(request_fields::STATUS, RequestStatus::Pending)])
            .await
            .unwrap();
        assert_eq!(pending.len(), 1);

        // Delete
        assert!(manager.delete_request(&doc.id, Precondition::none()).await.unwrap());
        assert!(!manager.delete_request(&doc.id, Precondition::none()).await.unwrap());
        assert!(manager.get_request(&doc.id).await.unwrap().is_none());

        // Shutdown
        manager.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_conditional_update_conflict() {
        let manager = spawn();
        let doc = manager.insert_request(guitar_for_spanish("u1")).await.unwrap();
        let partner = MatchRequest::pending(Identity::from("u2"), "Spanish", "Guitar");
        let guard = Precondition::at_version(doc.version).matching(Filter::eq(request_fields::STATUS, RequestStatus::Pending));

        manager
            .update_request(&doc.id, doc.data.matched_with(&partner, &doc.id), guard.clone())
            .await
            .unwrap();
        let err = manager
            .update_request(&doc.id, doc.data.matched_with(&partner, &doc.id), guard)
            .await
            .unwrap_err();
        assert!(matches!(err, StateError::Conflict { .. }));

        let err = manager
            .update_request("ghost", guitar_for_spanish("u1"), Precondition::none())
            .await
            .unwrap_err();
        assert!(matches!(err, StateError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_messages_are_scoped_to_match() {
        let manager = spawn();
        for (match_id, text) in [("m-1", "a"), ("m-2", "b"), ("m-1", "c")] {
            manager
                .insert_message(MessageBody {
                    match_id: match_id.to_string(),
                    text: text.to_string(),
                    sender: Sender::Assistant,
                })
                .await
                .unwrap();
        }
        let texts: Vec<String> = manager
            .query_messages("m-1")
            .await
            .unwrap()
            .into_iter()
            .map(|d| d.data.text)
            .collect();
        assert_eq!(texts, vec!["a", "c"]);
    }

    #[tokio::test]
    async fn test_changes_are_broadcast() {
        let manager = spawn();
        let mut changes = manager.subscribe_changes();
        let doc = manager.insert_request(guitar_for_spanish("u1")).await.unwrap();

        let change = changes.recv().await.unwrap();
        assert_eq!(change.id, doc.id);
        assert_eq!(change.kind, docstore::ChangeKind::Added);
    }

    #[tokio::test]
    async fn test_subscription_tracks_result_set() {
        let manager = spawn();
        let mut sub =
            manager.subscribe_requests(vec![Filter::eq(request_fields::REQUESTER, "u1")]);

        // Initial snapshot is empty
        assert!(sub.next().await.unwrap().is_empty());

        // Unrelated write does not produce a snapshot
        manager.insert_request(guitar_for_spanish("u2")).await.unwrap();
        let doc = manager.insert_request(guitar_for_spanish("u1")).await.unwrap();
        let snapshot = sub.next().await.unwrap();
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot[0].id, doc.id);

        manager.delete_request(&doc.id, Precondition::none()).await.unwrap();
        assert!(sub.next().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_one_lease_per_match() {
        let manager = spawn();
        let lease = manager.insert_lease(ReplyLease::pending("m-1", "msg-1")).await.unwrap();

        let err = manager.insert_lease(ReplyLease::pending("m-1", "msg-2")).await.unwrap_err();
        assert!(matches!(err, StateError::Conflict { .. }));
        manager.insert_lease(ReplyLease::pending("m-2", "msg-3")).await.unwrap();

        let current = manager.get_lease("m-1").await.unwrap().unwrap();
        assert_eq!(current.data.trigger_id, "msg-1");

        // Only the named trigger can delete it
        let other = Precondition::none().matching(Filter::eq(lease_fields::TRIGGER, "msg-9"));
        let err = manager.delete_lease(&lease.id, other).await.unwrap_err();
        assert!(matches!(err, StateError::Conflict { .. }));

        let mine = Precondition::none().matching(Filter::eq(lease_fields::TRIGGER, "msg-1"));
        assert!(manager.delete_lease(&lease.id, mine).await.unwrap());
        assert!(manager.get_lease("m-1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_shutdown_makes_calls_fail() {
        let manager = spawn();
        manager.shutdown().await.unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;
        let err = manager.insert_request(guitar_for_spanish("u1")).await.unwrap_err();
        assert!(matches!(err, StateError::ChannelError));
    }
}
