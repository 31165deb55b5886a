//! Response scheduler
//!
//! Schedules one delayed Assistant reply per Human message. The guard is a
//! `ReplyLease` in the store, one per match, so every session on a channel
//! sees the same pending reply and the same composing signal.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use docstore::now_ms;
use futures::StreamExt;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::{AssistantConfig, ReplyPolicy};
use crate::domain::fields::lease as lease_fields;
use crate::domain::{Filter, LeaseDoc, Message, Precondition, ReplyLease, Sender};
use crate::error::MatchError;
use crate::state::{RequestStore, StateError};

use super::channel::SessionChannel;
use super::responder::{ReplyPrompt, Responder};

/// Attempts at taking the lease before reporting Busy
const LEASE_ATTEMPTS: usize = 4;

/// How long past its delay a lease may sit before another session takes it over
const LEASE_GRACE: Duration = Duration::from_secs(60);

/// Result of a scheduling attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScheduleResult {
    /// A reply is now pending for this message
    Scheduled,

    /// A pending reply was superseded by one for this message
    Rescheduled,

    /// A reply is already pending on the match; this message gets none
    Busy,

    /// Only Human messages trigger replies
    Ignored,
}

/// The reply this session is waiting on or writing
struct InFlight {
    lease_id: String,
    trigger_id: String,
    task: JoinHandle<()>,
}

/// Delayed, debounced Assistant replies for one channel
pub struct ResponseScheduler {
    channel: SessionChannel,
    store: Arc<dyn RequestStore>,
    responder: Arc<dyn Responder>,
    offered_topic: String,
    wanted_topic: String,
    delay: Duration,
    policy: ReplyPolicy,
    composing: Arc<watch::Sender<bool>>,
    in_flight: Arc<Mutex<Option<InFlight>>>,
    watcher: JoinHandle<()>,
}

impl ResponseScheduler {
    pub fn new(
        channel: SessionChannel,
        responder: Arc<dyn Responder>,
        offered_topic: impl Into<String>,
        wanted_topic: impl Into<String>,
        config: &AssistantConfig,
    ) -> Self {
        debug!(match_id = %channel.match_id(), ?config, "ResponseScheduler::new: called");
        let store = Arc::clone(channel.store());
        let (composing, _) = watch::channel(false);
        let composing = Arc::new(composing);
        let watcher = tokio::spawn(watch_lease(store.clone(), channel.match_id().to_string(), composing.clone()));
        Self {
            channel,
            store,
            responder,
            offered_topic: offered_topic.into(),
            wanted_topic: wanted_topic.into(),
            delay: config.reply_delay(),
            policy: config.reply_policy,
            composing,
            in_flight: Arc::new(Mutex::new(None)),
            watcher,
        }
    }

    /// Schedule a reply to `trigger`
    pub async fn schedule(&self, trigger: &Message) -> Result<ScheduleResult, MatchError> {
        debug!(message_id = %trigger.id, policy = %self.policy, "ResponseScheduler::schedule: called");
        if !trigger.sender.is_human() {
            return Ok(ScheduleResult::Ignored);
        }

        let match_id = self.channel.match_id();
        for attempt in 1..=LEASE_ATTEMPTS {
            let taken = match self.store.get_lease(match_id).await? {
                None => self
                    .store
                    .insert_lease(ReplyLease::pending(match_id, &trigger.id))
                    .await
                    .map(|lease| (lease, ScheduleResult::Scheduled)),
                Some(current) => {
                    let stale = self.is_stale(&current);
                    if !stale && self.policy == ReplyPolicy::DropWhileBusy {
                        debug!(trigger_id = %current.data.trigger_id, "ResponseScheduler::schedule: busy, message dropped");
                        return Ok(ScheduleResult::Busy);
                    }
                    let result = if stale || current.data.firing {
                        ScheduleResult::Scheduled
                    } else {
                        ScheduleResult::Rescheduled
                    };
                    debug!(
                        trigger_id = %current.data.trigger_id,
                        stale,
                        "ResponseScheduler::schedule: superseding lease"
                    );
                    self.store
                        .update_lease(
                            &current.id,
                            ReplyLease::pending(match_id, &trigger.id),
                            Precondition::at_version(current.version),
                        )
                        .await
                        .map(|lease| (lease, result))
                }
            };

            match taken {
                Ok((lease, result)) => {
                    self.start(lease, trigger);
                    return Ok(result);
                }
                Err(StateError::Conflict { .. }) | Err(StateError::NotFound(_)) => {
                    debug!(attempt, "ResponseScheduler::schedule: lease raced, retrying");
                }
                Err(e) => return Err(e.into()),
            }
        }

        warn!(%match_id, "ResponseScheduler::schedule: lease contended, reply skipped");
        Ok(ScheduleResult::Busy)
    }

    /// Suppress this session's pending reply; returns whether one was pending
    pub async fn cancel(&self) -> bool {
        debug!(match_id = %self.channel.match_id(), "ResponseScheduler::cancel: called");
        let pending = self.in_flight.lock().ok().and_then(|mut slot| slot.take());
        let Some(current) = pending else {
            return false;
        };
        current.task.abort();

        match self.store.delete_lease(&current.lease_id, owned_by(&current.trigger_id)).await {
            Ok(removed) => {
                if removed {
                    self.composing.send_replace(false);
                }
                removed
            }
            Err(e) => {
                debug!(error = %e, "ResponseScheduler::cancel: lease already superseded");
                false
            }
        }
    }

    /// Cancel and stop scheduling for good
    pub async fn shutdown(self) {
        self.cancel().await;
    }

    pub fn is_composing(&self) -> bool {
        *self.composing.borrow()
    }

    /// Composing signal: true while a reply is pending on the match
    pub fn composing(&self) -> watch::Receiver<bool> {
        self.composing.subscribe()
    }

    fn is_stale(&self, lease: &LeaseDoc) -> bool {
        let limit = (self.delay + LEASE_GRACE).as_millis() as i64;
        now_ms() - lease.updated_at > limit
    }

    /// Spawn the delayed reply for a freshly taken lease
    fn start(&self, lease: LeaseDoc, trigger: &Message) {
        let prompt = ReplyPrompt {
            message: trigger.text.clone(),
            offered_topic: self.offered_topic.clone(),
            wanted_topic: self.wanted_topic.clone(),
        };
        let Ok(mut slot) = self.in_flight.lock() else {
            warn!("ResponseScheduler::start: state poisoned, reply skipped");
            return;
        };
        // A superseded timer is left to fail its fire precondition; it may already be writing
        if let Some(previous) = slot.take() {
            debug!(trigger_id = %previous.trigger_id, "ResponseScheduler::start: detaching previous reply");
        }
        self.composing.send_replace(true);

        let task = tokio::spawn(reply_after_delay(
            lease.id.clone(),
            lease.data.trigger_id.clone(),
            self.delay,
            prompt,
            self.channel.clone(),
            Arc::clone(&self.responder),
            Arc::clone(&self.in_flight),
        ));
        *slot = Some(InFlight {
            lease_id: lease.id,
            trigger_id: lease.data.trigger_id,
            task,
        });
    }
}

impl Drop for ResponseScheduler {
    fn drop(&mut self) {
        self.watcher.abort();
        let Some(current) = self.in_flight.lock().ok().and_then(|mut slot| slot.take()) else {
            return;
        };
        current.task.abort();

        // Release the lease so partners are not left composing
        if let Ok(handle) = tokio::runtime::Handle::try_current() {
            let store = Arc::clone(&self.store);
            handle.spawn(async move {
                if let Err(e) = store.delete_lease(&current.lease_id, owned_by(&current.trigger_id)).await {
                    debug!(error = %e, "ResponseScheduler::drop: lease already superseded");
                }
            });
        }
    }
}

/// Precondition holding while the lease still names `trigger_id`
fn owned_by(trigger_id: &str) -> Precondition {
    Precondition::none().matching(Filter::eq(lease_fields::TRIGGER, trigger_id))
}

/// Mirror the lease's existence into the composing signal
async fn watch_lease(store: Arc<dyn RequestStore>, match_id: String, composing: Arc<watch::Sender<bool>>) {
    let mut lease = store.subscribe_lease(&match_id);
    while let Some(snapshot) = lease.next().await {
        let busy = !snapshot.is_empty();
        composing.send_if_modified(|current| {
            let changed = *current != busy;
            *current = busy;
            changed
        });
    }
    debug!(%match_id, "watch_lease: subscription ended");
}

async fn reply_after_delay(
    lease_id: String,
    trigger_id: String,
    delay: Duration,
    prompt: ReplyPrompt,
    channel: SessionChannel,
    responder: Arc<dyn Responder>,
    in_flight: Arc<Mutex<Option<InFlight>>>,
) {
    tokio::time::sleep(delay).await;
    debug!(%trigger_id, match_id = %channel.match_id(), "reply_after_delay: delay elapsed");

    // Firing fails if another message took the lease in the meantime
    let fire = owned_by(&trigger_id).matching(Filter::eq(lease_fields::FIRING, false));
    let firing = ReplyLease::pending(channel.match_id(), &trigger_id).fired();
    let store = Arc::clone(channel.store());
    if let Err(e) = store.update_lease(&lease_id, firing, fire).await {
        debug!(%trigger_id, error = %e, "reply_after_delay: superseded, no reply");
        clear_slot(&in_flight, &trigger_id);
        return;
    }

    match responder.respond(&prompt).await {
        Ok(text) => match channel.send(&text, Sender::Assistant).await {
            Ok(message) => info!(match_id = %message.match_id, message_id = %message.id, "Assistant replied"),
            Err(e) => warn!(%trigger_id, error = %e, "Assistant reply could not be appended"),
        },
        Err(e) => warn!(%trigger_id, error = %e, "Responder failed, reply dropped"),
    }

    if let Err(e) = store.delete_lease(&lease_id, owned_by(&trigger_id)).await {
        debug!(%trigger_id, error = %e, "reply_after_delay: lease taken by a newer message");
    }
    clear_slot(&in_flight, &trigger_id);
}

/// Clear the local slot only if a newer reply has not replaced this one
fn clear_slot(in_flight: &Mutex<Option<InFlight>>, trigger_id: &str) {
    if let Ok(mut slot) = in_flight.lock() {
        if slot.as_ref().map(|current| current.trigger_id.as_str()) == Some(trigger_id) {
            *slot = None;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StoreConfig;
    use crate::domain::{Identity, MatchRequest};
    use crate::session::responder::mock::EchoResponder;
    use crate::state::StoreManager;

    /// A store with a matched pair between u1 and u2 and a channel on it
    async fn matched_channel() -> (Arc<StoreManager>, SessionChannel) {
        let store = Arc::new(StoreManager::spawn(&StoreConfig::default()));
        let a = store
            .insert_request(MatchRequest::pending(Identity::from("u1"), "Guitar", "Spanish"))
            .await
            .unwrap();
        let b = MatchRequest::pending(Identity::from("u2"), "Spanish", "Guitar");
        store
            .update_request(&a.id, a.data.matched_with(&b, &a.id), Precondition::none())
            .await
            .unwrap();
        let shared: Arc<dyn RequestStore> = store.clone();
        (store, SessionChannel::new(a.id.clone(), shared))
    }

    fn config(policy: ReplyPolicy) -> AssistantConfig {
        AssistantConfig {
            reply_delay_ms: 1_500,
            reply_policy: policy,
            seed: None,
        }
    }

    fn scheduler(channel: &SessionChannel, responder: &Arc<EchoResponder>, policy: ReplyPolicy) -> ResponseScheduler {
        ResponseScheduler::new(channel.clone(), responder.clone(), "Guitar", "Spanish", &config(policy))
    }

    /// Let the store actor and subscriptions catch up
    async fn settle() {
        tokio::time::sleep(Duration::from_millis(1)).await;
    }

    async fn human(channel: &SessionChannel, text: &str) -> Message {
        channel.send(text, Sender::Human(Identity::from("u1"))).await.unwrap()
    }

    async fn assistant_count(channel: &SessionChannel) -> usize {
        channel
            .history()
            .await
            .unwrap()
            .iter()
            .filter(|m| m.sender.is_assistant())
            .count()
    }

    #[tokio::test(start_paused = true)]
    async fn test_one_reply_after_delay() {
        let (_store, channel) = matched_channel().await;
        let responder = Arc::new(EchoResponder::new());
        let scheduler = scheduler(&channel, &responder, ReplyPolicy::Debounce);

        let trigger = human(&channel, "Hi, ready to learn").await;
        assert_eq!(scheduler.schedule(&trigger).await.unwrap(), ScheduleResult::Scheduled);
        settle().await;
        assert!(scheduler.is_composing());

        tokio::time::sleep(Duration::from_millis(1_000)).await;
        assert_eq!(assistant_count(&channel).await, 0);
        assert!(scheduler.is_composing());

        tokio::time::sleep(Duration::from_millis(1_000)).await;
        assert_eq!(assistant_count(&channel).await, 1);
        settle().await;
        assert!(!scheduler.is_composing());

        let prompts = responder.prompts();
        assert_eq!(prompts.len(), 1);
        assert_eq!(prompts[0].message, "Hi, ready to learn");
        assert_eq!(prompts[0].offered_topic, "Guitar");
        assert_eq!(prompts[0].wanted_topic, "Spanish");
    }

    #[tokio::test(start_paused = true)]
    async fn test_debounce_replies_to_newest() {
        let (_store, channel) = matched_channel().await;
        let responder = Arc::new(EchoResponder::new());
        let scheduler = scheduler(&channel, &responder, ReplyPolicy::Debounce);

        let first = human(&channel, "first").await;
        assert_eq!(scheduler.schedule(&first).await.unwrap(), ScheduleResult::Scheduled);
        tokio::time::sleep(Duration::from_millis(1_000)).await;

        let second = human(&channel, "second").await;
        assert_eq!(scheduler.schedule(&second).await.unwrap(), ScheduleResult::Rescheduled);

        // The first timer would have fired here
        tokio::time::sleep(Duration::from_millis(1_000)).await;
        assert_eq!(assistant_count(&channel).await, 0);
        assert!(scheduler.is_composing());

        tokio::time::sleep(Duration::from_millis(1_000)).await;
        assert_eq!(assistant_count(&channel).await, 1);
        assert_eq!(responder.call_count(), 1);
        assert_eq!(responder.prompts()[0].message, "second");
        settle().await;
        assert!(!scheduler.is_composing());
    }

    #[tokio::test(start_paused = true)]
    async fn test_drop_while_busy_keeps_first() {
        let (_store, channel) = matched_channel().await;
        let responder = Arc::new(EchoResponder::new());
        let scheduler = scheduler(&channel, &responder, ReplyPolicy::DropWhileBusy);

        let first = human(&channel, "first").await;
        let second = human(&channel, "second").await;
        assert_eq!(scheduler.schedule(&first).await.unwrap(), ScheduleResult::Scheduled);
        assert_eq!(scheduler.schedule(&second).await.unwrap(), ScheduleResult::Busy);

        tokio::time::sleep(Duration::from_millis(2_000)).await;
        assert_eq!(assistant_count(&channel).await, 1);
        assert_eq!(responder.prompts()[0].message, "first");

        // Free again after the reply
        let third = human(&channel, "third").await;
        assert_eq!(scheduler.schedule(&third).await.unwrap(), ScheduleResult::Scheduled);
    }

    #[tokio::test(start_paused = true)]
    async fn test_schedulers_on_one_match_share_the_guard() {
        let (store, channel) = matched_channel().await;
        let responder = Arc::new(EchoResponder::new());
        let mine = scheduler(&channel, &responder, ReplyPolicy::Debounce);
        let theirs = scheduler(&channel, &responder, ReplyPolicy::Debounce);

        let first = human(&channel, "first").await;
        assert_eq!(mine.schedule(&first).await.unwrap(), ScheduleResult::Scheduled);
        settle().await;
        assert!(theirs.is_composing());

        tokio::time::sleep(Duration::from_millis(500)).await;
        let second = human(&channel, "second").await;
        assert_eq!(theirs.schedule(&second).await.unwrap(), ScheduleResult::Rescheduled);

        tokio::time::sleep(Duration::from_millis(3_000)).await;
        assert_eq!(assistant_count(&channel).await, 1);
        assert_eq!(responder.call_count(), 1);
        assert_eq!(responder.prompts()[0].message, "second");
        assert!(store.get_lease(channel.match_id()).await.unwrap().is_none());
        assert!(!mine.is_composing());
        assert!(!theirs.is_composing());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_suppresses_reply() {
        let (_store, channel) = matched_channel().await;
        let responder = Arc::new(EchoResponder::new());
        let scheduler = scheduler(&channel, &responder, ReplyPolicy::Debounce);
        let mut composing = scheduler.composing();

        let trigger = human(&channel, "hello").await;
        scheduler.schedule(&trigger).await.unwrap();
        settle().await;
        assert!(*composing.borrow_and_update());

        assert!(scheduler.cancel().await);
        assert!(!scheduler.cancel().await);
        settle().await;
        assert!(!*composing.borrow_and_update());

        tokio::time::sleep(Duration::from_millis(3_000)).await;
        assert_eq!(assistant_count(&channel).await, 0);
        assert_eq!(responder.call_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_leaves_a_partners_reply() {
        let (_store, channel) = matched_channel().await;
        let responder = Arc::new(EchoResponder::new());
        let mine = scheduler(&channel, &responder, ReplyPolicy::Debounce);
        let theirs = scheduler(&channel, &responder, ReplyPolicy::Debounce);

        let first = human(&channel, "first").await;
        mine.schedule(&first).await.unwrap();
        let second = human(&channel, "second").await;
        theirs.schedule(&second).await.unwrap();

        // My reply was already superseded, so cancelling removes nothing
        assert!(!mine.cancel().await);

        tokio::time::sleep(Duration::from_millis(2_000)).await;
        assert_eq!(assistant_count(&channel).await, 1);
        assert_eq!(responder.prompts()[0].message, "second");
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_suppresses_reply() {
        let (store, channel) = matched_channel().await;
        let responder = Arc::new(EchoResponder::new());
        let scheduler = scheduler(&channel, &responder, ReplyPolicy::Debounce);

        let trigger = human(&channel, "hello").await;
        scheduler.schedule(&trigger).await.unwrap();
        scheduler.shutdown().await;

        tokio::time::sleep(Duration::from_millis(3_000)).await;
        assert_eq!(responder.call_count(), 0);
        assert!(store.get_lease(channel.match_id()).await.unwrap().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_drop_releases_lease() {
        let (store, channel) = matched_channel().await;
        let responder = Arc::new(EchoResponder::new());
        let scheduler = scheduler(&channel, &responder, ReplyPolicy::Debounce);

        let trigger = human(&channel, "hello").await;
        scheduler.schedule(&trigger).await.unwrap();
        drop(scheduler);
        settle().await;

        assert!(store.get_lease(channel.match_id()).await.unwrap().is_none());
        tokio::time::sleep(Duration::from_millis(3_000)).await;
        assert_eq!(responder.call_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_lease_goes_stale_after_grace() {
        let (store, channel) = matched_channel().await;
        let responder = Arc::new(EchoResponder::new());
        let scheduler = scheduler(&channel, &responder, ReplyPolicy::DropWhileBusy);

        // A lease left behind by a session that went away long ago
        let lease = store
            .insert_lease(ReplyLease::pending(channel.match_id(), "gone"))
            .await
            .unwrap();
        assert!(!scheduler.is_stale(&lease));
        let old = LeaseDoc {
            updated_at: lease.updated_at - 120_000,
            ..lease
        };
        assert!(scheduler.is_stale(&old));
    }

    #[tokio::test(start_paused = true)]
    async fn test_responder_failure_drops_reply() {
        let (store, channel) = matched_channel().await;
        let responder = Arc::new(EchoResponder::failing());
        let scheduler = scheduler(&channel, &responder, ReplyPolicy::Debounce);

        let trigger = human(&channel, "hello").await;
        scheduler.schedule(&trigger).await.unwrap();
        tokio::time::sleep(Duration::from_millis(2_000)).await;

        assert_eq!(responder.call_count(), 1);
        assert_eq!(assistant_count(&channel).await, 0);
        assert!(store.get_lease(channel.match_id()).await.unwrap().is_none());
        settle().await;
        assert!(!scheduler.is_composing());
    }

    #[tokio::test]
    async fn test_assistant_messages_are_ignored() {
        let (_store, channel) = matched_channel().await;
        let responder = Arc::new(EchoResponder::new());
        let scheduler = scheduler(&channel, &responder, ReplyPolicy::Debounce);

        let reply = channel.send("tip", Sender::Assistant).await.unwrap();
        assert_eq!(scheduler.schedule(&reply).await.unwrap(), ScheduleResult::Ignored);
        assert!(!scheduler.is_composing());
    }
}
