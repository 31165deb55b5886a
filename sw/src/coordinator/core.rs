//! MatchCoordinator implementation

use std::sync::{Arc, Mutex};

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::MatchingConfig;
use crate::domain::fields::request as fields;
use crate::domain::{Filter, Identity, Match, MatchRequest, Precondition, RequestDoc, RequestStatus, normalize_skill};
use crate::error::MatchError;
use crate::projection::MatchProjection;
use crate::state::{RequestStore, StateError};

use super::outcome::SearchOutcome;

/// Request lifecycle state machine for one caller
///
/// Each caller owns a coordinator; coordinators of different callers share
/// one store and never talk to each other directly.
pub struct MatchCoordinator {
    identity: Identity,
    store: Arc<dyn RequestStore>,
    config: MatchingConfig,
    /// Cached current match, shared with projections
    view: Arc<watch::Sender<Option<Match>>>,
    /// Give-up timer for the current Pending request
    give_up: Mutex<Option<JoinHandle<()>>>,
}

impl MatchCoordinator {
    pub fn new(identity: Identity, store: Arc<dyn RequestStore>, config: MatchingConfig) -> Self {
        debug!(%identity, ?config, "MatchCoordinator::new: called");
        let (view, _) = watch::channel(None);
        Self {
            identity,
            store,
            config,
            view: Arc::new(view),
            give_up: Mutex::new(None),
        }
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    /// Last match observed by this coordinator or its projections
    pub fn cached_match(&self) -> Option<Match> {
        self.view.borrow().clone()
    }

    /// Start a projection of this caller's current match
    pub fn watch_match(&self) -> MatchProjection {
        MatchProjection::start(self.store.as_ref(), self.identity.clone(), Arc::clone(&self.view))
    }

    /// Search for a complementary partner
    ///
    /// Inserts the caller's Pending request first, then tries to claim an
    /// older complementary Pending request. Only newer requests claim older
    /// ones, so two simultaneous complementary searches produce exactly one
    /// ImmediateMatch.
    pub async fn search_for_match(&self, offered: &str, wanted: &str) -> Result<SearchOutcome, MatchError> {
        let offered = normalize_skill("offered", offered)?;
        let wanted = normalize_skill("wanted", wanted)?;
        debug!(identity = %self.identity, %offered, %wanted, "search_for_match: called");

        self.abort_give_up();
        let removed = self.remove_pending().await?;
        if removed > 0 {
            debug!(removed, "search_for_match: removed stale pending requests");
        }

        let mine = self
            .store
            .insert_request(MatchRequest::pending(self.identity.clone(), &offered, &wanted))
            .await?;
        info!(identity = %self.identity, request_id = %mine.id, %offered, %wanted, "Pending request created");

        let attempts = self.config.claim_attempts.max(1);
        let candidates: Vec<RequestDoc> = self
            .find_candidates(&offered, &wanted)
            .await?
            .into_iter()
            .filter(|c| c.created_at < mine.created_at)
            .take(attempts)
            .collect();
        debug!(candidate_count = candidates.len(), "search_for_match: older candidates");

        for candidate in &candidates {
            match self.claim(candidate, &mine.data).await {
                Ok(claimed) => return self.complete_claim(&mine, claimed).await,
                Err(MatchError::ClaimConflict { candidate_id }) => {
                    debug!(%candidate_id, "search_for_match: candidate already taken, trying next");
                }
                Err(e) => return Err(e),
            }
        }

        self.start_give_up(&mine.id);
        info!(identity = %self.identity, request_id = %mine.id, "No partner yet, waiting");
        Ok(SearchOutcome::PendingWait { request_id: mine.id })
    }

    /// Withdraw the caller's Pending requests; returns how many were removed
    pub async fn cancel_search(&self) -> Result<usize, MatchError> {
        debug!(identity = %self.identity, "cancel_search: called");
        self.abort_give_up();
        let removed = self.remove_pending().await?;
        info!(identity = %self.identity, removed, "Search cancelled");
        Ok(removed)
    }

    /// Delete all of the caller's requests, Pending and Matched
    pub async fn clear_all_matches(&self) -> Result<usize, MatchError> {
        debug!(identity = %self.identity, "clear_all_matches: called");
        self.abort_give_up();
        let mine = self
            .store
            .query_requests(vec![Filter::eq(fields::REQUESTER, self.identity.as_str())])
            .await?;

        let mut removed = 0;
        for doc in &mine {
            if self.store.delete_request(&doc.id, Precondition::none()).await? {
                removed += 1;
            }
        }
        self.view.send_replace(None);
        info!(identity = %self.identity, removed, "Cleared all requests");
        Ok(removed)
    }

    /// Complementary Pending requests of other users, oldest first
    pub async fn browse_candidates(&self, offered: &str, wanted: &str) -> Result<Vec<RequestDoc>, MatchError> {
        let offered = normalize_skill("offered", offered)?;
        let wanted = normalize_skill("wanted", wanted)?;
        debug!(identity = %self.identity, %offered, %wanted, "browse_candidates: called");
        self.find_candidates(&offered, &wanted).await
    }

    /// Claim one chosen candidate
    ///
    /// Unlike search, losing the race is an error here: the caller picked
    /// this candidate and gets ClaimConflict if someone else took it first.
    pub async fn connect_with(&self, candidate_id: &str, offered: &str, wanted: &str) -> Result<Match, MatchError> {
        let offered = normalize_skill("offered", offered)?;
        let wanted = normalize_skill("wanted", wanted)?;
        debug!(identity = %self.identity, %candidate_id, "connect_with: called");

        let candidate = self
            .store
            .get_request(candidate_id)
            .await?
            .ok_or_else(|| MatchError::NotFound(format!("request {}", candidate_id)))?;

        if candidate.data.requester_id == self.identity {
            return Err(MatchError::Validation("cannot connect with your own request".to_string()));
        }
        let proposal = MatchRequest::pending(self.identity.clone(), &offered, &wanted);
        if !proposal.complements(&candidate.data) {
            return Err(MatchError::Validation(format!(
                "request {} does not offer {} for {}",
                candidate_id, wanted, offered
            )));
        }
        if !candidate.data.is_pending() {
            return Err(MatchError::ClaimConflict {
                candidate_id: candidate_id.to_string(),
            });
        }

        self.abort_give_up();
        self.remove_pending().await?;
        let mine = self.store.insert_request(proposal).await?;

        let claimed = match self.claim(&candidate, &mine.data).await {
            Ok(claimed) => claimed,
            Err(e) => {
                self.withdraw(&mine.id).await;
                return Err(e);
            }
        };

        match self.complete_claim(&mine, claimed).await? {
            SearchOutcome::ImmediateMatch(m) => Ok(m),
            SearchOutcome::PendingWait { .. } => Err(MatchError::ClaimConflict {
                candidate_id: candidate_id.to_string(),
            }),
        }
    }

    /// The caller's current Pending request, if any
    pub async fn pending_request(&self) -> Result<Option<RequestDoc>, MatchError> {
        debug!(identity = %self.identity, "pending_request: called");
        let pending = self.own_requests(RequestStatus::Pending).await?;
        if pending.len() > 1 {
            debug!(count = pending.len(), "pending_request: duplicate pending requests");
        }
        Ok(pending.into_iter().next())
    }

    /// The caller's current match read directly from the store
    pub async fn current_match(&self) -> Result<Option<Match>, MatchError> {
        debug!(identity = %self.identity, "current_match: called");
        let matched = self.own_requests(RequestStatus::Matched).await?;
        if matched.len() > 1 {
            warn!(identity = %self.identity, count = matched.len(), "Data anomaly: more than one matched request");
        }
        Ok(matched.first().and_then(Match::from_request))
    }

    async fn own_requests(&self, status: RequestStatus) -> Result<Vec<RequestDoc>, MatchError> {
        let filters = vec![
            Filter::eq(fields::REQUESTER, self.identity.as_str()),
            Filter::eq(fields::STATUS, status),
        ];
        Ok(self.store.query_requests(filters).await?)
    }

    async fn find_candidates(&self, offered: &str, wanted: &str) -> Result<Vec<RequestDoc>, MatchError> {
        let filters = vec![
            Filter::eq(fields::OFFERED, wanted),
            Filter::eq(fields::WANTED, offered),
            Filter::eq(fields::STATUS, RequestStatus::Pending),
            Filter::ne(fields::REQUESTER, self.identity.as_str()),
        ];
        Ok(self.store.query_requests(filters).await?)
    }

    /// Delete the caller's Pending requests, skipping any claimed meanwhile
    async fn remove_pending(&self) -> Result<usize, MatchError> {
        let mut removed = 0;
        for doc in self.own_requests(RequestStatus::Pending).await? {
            match self.store.delete_request(&doc.id, still_pending()).await {
                Ok(true) => removed += 1,
                Ok(false) => {}
                Err(StateError::Conflict { id, reason }) => {
                    debug!(%id, %reason, "remove_pending: request was matched meanwhile");
                }
                Err(e) => return Err(e.into()),
            }
        }
        Ok(removed)
    }

    /// Best-effort delete of one Pending request
    async fn withdraw(&self, request_id: &str) {
        if let Err(e) = self.store.delete_request(request_id, still_pending()).await {
            debug!(%request_id, error = %e, "withdraw: request not withdrawn");
        }
    }

    /// Conditionally move `candidate` to Matched with `me` as partner
    async fn claim(&self, candidate: &RequestDoc, me: &MatchRequest) -> Result<RequestDoc, MatchError> {
        debug!(candidate_id = %candidate.id, version = candidate.version, "claim: called");
        let match_id = candidate.id.clone();
        let guard = Precondition::at_version(candidate.version).matching(Filter::eq(fields::STATUS, RequestStatus::Pending));

        match self
            .store
            .update_request(&candidate.id, candidate.data.matched_with(me, &match_id), guard)
            .await
        {
            Ok(claimed) => {
                debug!(candidate_id = %claimed.id, "claim: candidate claimed");
                Ok(claimed)
            }
            Err(StateError::Conflict { .. }) | Err(StateError::NotFound(_)) => Err(MatchError::ClaimConflict {
                candidate_id: candidate.id.clone(),
            }),
            Err(e) => Err(e.into()),
        }
    }

    /// Move the caller's own request to Matched after a successful claim,
    /// rolling the claim back if the caller's request changed meanwhile
    async fn complete_claim(&self, mine: &RequestDoc, claimed: RequestDoc) -> Result<SearchOutcome, MatchError> {
        let match_id = claimed.id.clone();
        let guard = Precondition::at_version(mine.version).matching(Filter::eq(fields::STATUS, RequestStatus::Pending));

        match self
            .store
            .update_request(&mine.id, mine.data.matched_with(&claimed.data, &match_id), guard)
            .await
        {
            Ok(doc) => {
                let matched = Match::from_request(&doc)
                    .ok_or_else(|| MatchError::DataAnomaly(format!("request {} matched without partner fields", doc.id)))?;
                self.view.send_replace(Some(matched.clone()));
                info!(
                    identity = %self.identity,
                    partner = %matched.partner,
                    %match_id,
                    "Matched"
                );
                Ok(SearchOutcome::ImmediateMatch(matched))
            }
            Err(err) => {
                warn!(
                    request_id = %mine.id,
                    candidate_id = %claimed.id,
                    error = %err,
                    "Own transition failed, releasing claimed candidate"
                );
                self.release(&claimed).await;
                match err {
                    StateError::Conflict { .. } | StateError::NotFound(_) => Ok(SearchOutcome::PendingWait {
                        request_id: mine.id.clone(),
                    }),
                    other => Err(other.into()),
                }
            }
        }
    }

    /// Roll a claimed candidate back to Pending, if nobody touched it since
    async fn release(&self, claimed: &RequestDoc) {
        let guard = Precondition::at_version(claimed.version)
            .matching(Filter::eq(fields::STATUS, RequestStatus::Matched))
            .matching(Filter::eq(fields::PARTNER, self.identity.as_str()));
        match self.store.update_request(&claimed.id, claimed.data.reverted(), guard).await {
            Ok(_) => info!(candidate_id = %claimed.id, "Claimed candidate released"),
            Err(e) => warn!(candidate_id = %claimed.id, error = %e, "Failed to release claimed candidate"),
        }
    }

    fn start_give_up(&self, request_id: &str) {
        let Some(timeout) = self.config.search_timeout() else {
            return;
        };
        debug!(%request_id, ?timeout, "start_give_up: called");
        let store = Arc::clone(&self.store);
        let request_id = request_id.to_string();
        let handle = tokio::spawn(async move {
            tokio::time::sleep(timeout).await;
            match store.delete_request(&request_id, still_pending()).await {
                Ok(true) => info!(%request_id, "Search timed out, pending request withdrawn"),
                Ok(false) => debug!(%request_id, "give_up: request already gone"),
                Err(e) => debug!(%request_id, error = %e, "give_up: request not withdrawn"),
            }
        });
        if let Ok(mut slot) = self.give_up.lock() {
            if let Some(previous) = slot.replace(handle) {
                previous.abort();
            }
        }
    }

    fn abort_give_up(&self) {
        if let Ok(mut slot) = self.give_up.lock() {
            if let Some(handle) = slot.take() {
                debug!("abort_give_up: timer aborted");
                handle.abort();
            }
        }
    }
}

impl Drop for MatchCoordinator {
    fn drop(&mut self) {
        self.abort_give_up();
    }
}

fn still_pending() -> Precondition {
    Precondition::none().matching(Filter::eq(fields::STATUS, RequestStatus::Pending))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StoreConfig;
    use crate::state::StoreManager;
    use crate::state::mock::FlakyStore;
    use std::time::Duration;

    fn store() -> Arc<StoreManager> {
        Arc::new(StoreManager::spawn(&StoreConfig::default()))
    }

    fn coordinator(store: &Arc<StoreManager>, who: &str) -> MatchCoordinator {
        let shared: Arc<dyn RequestStore> = store.clone();
        MatchCoordinator::new(Identity::from(who), shared, MatchingConfig::default())
    }

    async fn all_requests(store: &StoreManager) -> Vec<RequestDoc> {
        store.query_requests(vec![]).await.unwrap()
    }

    #[tokio::test]
    async fn test_empty_skill_is_rejected_without_store_access() {
        let store = store();
        let alice = coordinator(&store, "alice");

        let err = alice.search_for_match("  ", "Spanish").await.unwrap_err();
        assert!(matches!(err, MatchError::Validation(_)));
        let err = alice.search_for_match("Guitar", "").await.unwrap_err();
        assert!(matches!(err, MatchError::Validation(_)));
        assert!(all_requests(&store).await.is_empty());
    }

    #[tokio::test]
    async fn test_first_search_waits() {
        let store = store();
        let alice = coordinator(&store, "alice");

        let outcome = alice.search_for_match(" Guitar ", "Spanish").await.unwrap();
        assert!(!outcome.is_immediate());

        let pending = alice.pending_request().await.unwrap().unwrap();
        assert_eq!(pending.data.offered_skill, "Guitar");
        assert!(pending.data.is_pending());
        assert_eq!(all_requests(&store).await.len(), 1);
    }

    #[tokio::test]
    async fn test_complementary_search_matches_both_sides() {
        let store = store();
        let alice = coordinator(&store, "alice");
        let bob = coordinator(&store, "bob");

        alice.search_for_match("Guitar", "Spanish").await.unwrap();
        let outcome = bob.search_for_match("Spanish", "Guitar").await.unwrap();
        let SearchOutcome::ImmediateMatch(bob_view) = outcome else {
            panic!("expected an immediate match");
        };

        assert_eq!(bob_view.partner, Identity::from("alice"));
        assert_eq!(bob_view.partner_offered, "Guitar");
        assert!(bob_view.is_complementary());
        assert_eq!(bob.cached_match(), Some(bob_view.clone()));

        let alice_view = alice.current_match().await.unwrap().unwrap();
        assert_eq!(alice_view.partner, Identity::from("bob"));
        assert_eq!(alice_view.partner_offered, "Spanish");
        assert_eq!(alice_view.partner_wanted, "Guitar");
        assert_eq!(alice_view.match_id, bob_view.match_id);
        assert_eq!(alice_view.match_id, alice_view.request_id);

        assert!(alice.pending_request().await.unwrap().is_none());
        assert!(bob.pending_request().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_non_complementary_requests_stay_pending() {
        let store = store();
        let alice = coordinator(&store, "alice");
        let bob = coordinator(&store, "bob");

        alice.search_for_match("Guitar", "Spanish").await.unwrap();
        // Case differs, so no match
        let outcome = bob.search_for_match("spanish", "Guitar").await.unwrap();
        assert!(!outcome.is_immediate());
        assert_eq!(all_requests(&store).await.iter().filter(|d| d.data.is_pending()).count(), 2);
    }

    #[tokio::test]
    async fn test_own_request_is_never_a_candidate() {
        let store = store();
        let alice = coordinator(&store, "alice");

        alice.search_for_match("Guitar", "Spanish").await.unwrap();
        let outcome = alice.search_for_match("Spanish", "Guitar").await.unwrap();
        assert!(!outcome.is_immediate());

        let all = all_requests(&store).await;
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].data.offered_skill, "Spanish");
    }

    #[tokio::test]
    async fn test_oldest_candidate_is_claimed_first() {
        let store = store();
        let carol = coordinator(&store, "carol");
        let dave = coordinator(&store, "dave");
        let bob = coordinator(&store, "bob");

        carol.search_for_match("Guitar", "Spanish").await.unwrap();
        dave.search_for_match("Guitar", "Spanish").await.unwrap();

        let outcome = bob.search_for_match("Spanish", "Guitar").await.unwrap();
        let SearchOutcome::ImmediateMatch(m) = outcome else {
            panic!("expected an immediate match");
        };
        assert_eq!(m.partner, Identity::from("carol"));
        assert!(dave.pending_request().await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_cancel_search_is_idempotent() {
        let store = store();
        let alice = coordinator(&store, "alice");

        alice.search_for_match("Guitar", "Spanish").await.unwrap();
        assert_eq!(alice.cancel_search().await.unwrap(), 1);
        assert_eq!(alice.cancel_search().await.unwrap(), 0);
        assert!(all_requests(&store).await.is_empty());
    }

    #[tokio::test]
    async fn test_cancel_leaves_matched_request() {
        let store = store();
        let alice = coordinator(&store, "alice");
        let bob = coordinator(&store, "bob");

        alice.search_for_match("Guitar", "Spanish").await.unwrap();
        bob.search_for_match("Spanish", "Guitar").await.unwrap();

        assert_eq!(alice.cancel_search().await.unwrap(), 0);
        assert!(alice.current_match().await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_clear_all_matches_is_idempotent_and_resets_view() {
        let store = store();
        let alice = coordinator(&store, "alice");
        let bob = coordinator(&store, "bob");

        alice.search_for_match("Guitar", "Spanish").await.unwrap();
        bob.search_for_match("Spanish", "Guitar").await.unwrap();
        assert!(bob.cached_match().is_some());

        assert_eq!(bob.clear_all_matches().await.unwrap(), 1);
        assert!(bob.cached_match().is_none());
        assert!(bob.current_match().await.unwrap().is_none());
        assert_eq!(bob.clear_all_matches().await.unwrap(), 0);

        // Alice's side is hers to clear
        assert!(alice.current_match().await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_stale_claim_is_a_conflict() {
        let store = store();
        let carol = coordinator(&store, "carol");
        let bob = coordinator(&store, "bob");

        carol.search_for_match("Guitar", "Spanish").await.unwrap();
        let stale = carol.pending_request().await.unwrap().unwrap();

        // Someone else claims carol first
        let eve = MatchRequest::pending(Identity::from("eve"), "Spanish", "Guitar");
        store
            .update_request(&stale.id, stale.data.matched_with(&eve, &stale.id), Precondition::none())
            .await
            .unwrap();

        let me = MatchRequest::pending(Identity::from("bob"), "Spanish", "Guitar");
        let err = bob.claim(&stale, &me).await.unwrap_err();
        assert!(err.is_claim_conflict());

        let current = store.get_request(&stale.id).await.unwrap().unwrap();
        assert_eq!(current.data.partner_id, Some(Identity::from("eve")));
    }

    #[tokio::test]
    async fn test_failed_own_transition_rolls_back_candidate() {
        let inner = StoreManager::spawn(&StoreConfig::default());
        let flaky = Arc::new(FlakyStore::new(inner.clone()));
        let shared: Arc<dyn RequestStore> = flaky.clone();
        let alice = MatchCoordinator::new(Identity::from("alice"), shared.clone(), MatchingConfig::default());
        let bob = MatchCoordinator::new(Identity::from("bob"), shared, MatchingConfig::default());

        alice.search_for_match("Guitar", "Spanish").await.unwrap();

        // Update 0 is the claim, update 1 is bob's own transition
        flaky.fail_update(1);
        let err = bob.search_for_match("Spanish", "Guitar").await.unwrap_err();
        assert!(err.is_retryable());

        let alice_request = alice.pending_request().await.unwrap().unwrap();
        assert!(alice_request.data.partner_id.is_none());
        assert!(alice.current_match().await.unwrap().is_none());

        // Retrying the whole search succeeds
        let outcome = bob.search_for_match("Spanish", "Guitar").await.unwrap();
        assert!(outcome.is_immediate());
        assert_eq!(
            inner
                .query_requests(vec![Filter::eq(fields::STATUS, RequestStatus::Pending)])
                .await
                .unwrap()
                .len(),
            0
        );
    }

    #[tokio::test]
    async fn test_store_outage_is_retryable() {
        let inner = StoreManager::spawn(&StoreConfig::default());
        let flaky = Arc::new(FlakyStore::new(inner));
        let shared: Arc<dyn RequestStore> = flaky.clone();
        let alice = MatchCoordinator::new(Identity::from("alice"), shared, MatchingConfig::default());

        flaky.fail_next_queries(1);
        let err = alice.search_for_match("Guitar", "Spanish").await.unwrap_err();
        assert!(matches!(err, MatchError::StoreUnavailable(_)));
        assert!(err.is_retryable());

        assert!(!alice.search_for_match("Guitar", "Spanish").await.unwrap().is_immediate());
    }

    #[tokio::test]
    async fn test_browse_and_connect() {
        let store = store();
        let carol = coordinator(&store, "carol");
        let dave = coordinator(&store, "dave");
        let bob = coordinator(&store, "bob");
        let erin = coordinator(&store, "erin");

        carol.search_for_match("Guitar", "Spanish").await.unwrap();
        dave.search_for_match("Guitar", "Spanish").await.unwrap();

        let candidates = bob.browse_candidates("Spanish", "Guitar").await.unwrap();
        let owners: Vec<&str> = candidates.iter().map(|c| c.data.requester_id.as_str()).collect();
        assert_eq!(owners, vec!["carol", "dave"]);

        let chosen = &candidates[1];
        let m = bob.connect_with(&chosen.id, "Spanish", "Guitar").await.unwrap();
        assert_eq!(m.partner, Identity::from("dave"));
        assert_eq!(m.match_id, chosen.id);
        assert!(carol.pending_request().await.unwrap().is_some());

        // Dave is taken now
        let err = erin.connect_with(&chosen.id, "Spanish", "Guitar").await.unwrap_err();
        assert!(err.is_claim_conflict());
        assert!(erin.pending_request().await.unwrap().is_none());

        let err = erin.connect_with(&candidates[0].id, "Cooking", "Guitar").await.unwrap_err();
        assert!(matches!(err, MatchError::Validation(_)));

        let err = erin.connect_with("ghost", "Spanish", "Guitar").await.unwrap_err();
        assert!(matches!(err, MatchError::NotFound(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_give_up_timer_withdraws_pending_request() {
        let store = store();
        let shared: Arc<dyn RequestStore> = store.clone();
        let config = MatchingConfig {
            search_timeout_ms: Some(1_000),
            ..MatchingConfig::default()
        };
        let alice = MatchCoordinator::new(Identity::from("alice"), shared, config);

        alice.search_for_match("Guitar", "Spanish").await.unwrap();
        tokio::time::sleep(Duration::from_millis(500)).await;
        assert!(alice.pending_request().await.unwrap().is_some());

        tokio::time::sleep(Duration::from_millis(1_000)).await;
        assert!(alice.pending_request().await.unwrap().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_give_up_timer_spares_matched_request() {
        let store = store();
        let shared: Arc<dyn RequestStore> = store.clone();
        let config = MatchingConfig {
            search_timeout_ms: Some(1_000),
            ..MatchingConfig::default()
        };
        let alice = MatchCoordinator::new(Identity::from("alice"), shared, config);
        let bob = coordinator(&store, "bob");

        alice.search_for_match("Guitar", "Spanish").await.unwrap();
        bob.search_for_match("Spanish", "Guitar").await.unwrap();

        tokio::time::sleep(Duration::from_millis(2_000)).await;
        assert!(alice.current_match().await.unwrap().is_some());
    }
}
