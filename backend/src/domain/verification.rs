//! User verification workflow: event publication and reconciliation.
//!
//! When a user row is committed, a [`VerificationEvent`] is published to the
//! durable channel. A consumer receives it (at-least-once, unordered), loads
//! the user, attempts the operator notification, and reconciles the outcome
//! into the persisted tri-state. Deliveries are acknowledged unconditionally
//! once their outcome is persisted: a failing notifier yields a durable
//! `Failed` marker instead of a redelivery storm.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use crate::domain::ports::{
    ChannelError, Delivery, EmailNotifier, UserPersistenceError, UserRepository,
    VerificationChannel,
};
use crate::domain::user::{UserId, VerificationState};

/// Channel payload signalling "attempt to notify and verify this user".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerificationEvent {
    /// Identifier of the freshly committed user.
    pub user_id: UserId,
}

impl VerificationEvent {
    /// Serialize to the wire representation (`{"userId": n}` UTF-8 bytes).
    ///
    /// # Errors
    /// Returns [`ChannelError::Rejected`] when serialization fails.
    pub fn encode(&self) -> Result<Vec<u8>, ChannelError> {
        serde_json::to_vec(self).map_err(|err| ChannelError::rejected(err.to_string()))
    }

    /// Parse the wire representation; `None` for malformed payloads.
    #[must_use]
    pub fn decode(payload: &[u8]) -> Option<Self> {
        serde_json::from_slice(payload).ok()
    }
}

/// Publishes verification events after user creation.
///
/// Publication is best-effort and never blocks or rolls back the entity
/// write: [`VerificationPublisher::announce_detached`] runs the publish off
/// the request path and only logs failures.
#[derive(Clone)]
pub struct VerificationPublisher {
    channel: Arc<dyn VerificationChannel>,
}

impl VerificationPublisher {
    /// Create a publisher over the given channel.
    pub fn new(channel: Arc<dyn VerificationChannel>) -> Self {
        Self { channel }
    }

    /// Publish a verification event for `user_id`.
    ///
    /// # Errors
    /// Propagates [`ChannelError`] when provisioning or the append fails.
    pub async fn announce(&self, user_id: UserId) -> Result<(), ChannelError> {
        let payload = VerificationEvent { user_id }.encode()?;
        self.channel.ensure_provisioned().await?;
        self.channel.publish(&payload).await
    }

    /// Publish from a spawned task so the caller's response is never
    /// delayed or failed by the channel.
    pub fn announce_detached(&self, user_id: UserId) {
        let publisher = self.clone();
        tokio::spawn(async move {
            if let Err(err) = publisher.announce(user_id).await {
                warn!(%user_id, error = %err, "verification event publish failed");
            }
        });
    }
}

/// Terminal outcome of reconciling one delivered message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// The user was already verified; no side effect.
    AlreadyVerified,
    /// The notification was sent and `Verified` persisted.
    Verified,
    /// The notification failed and `Failed` persisted.
    Failed,
    /// The referenced user does not exist; message dropped.
    UserMissing,
    /// The payload was unparseable; message dropped.
    MalformedPayload,
}

/// Errors that abort reconciliation before an outcome is persisted.
///
/// The delivery is left unacknowledged so the channel redelivers it after
/// the lease expires.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ReconcileError {
    /// The user store rejected a read or write.
    #[error(transparent)]
    Store(#[from] UserPersistenceError),
}

/// Consumer loop configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConsumerConfig {
    /// Delay between polls when the channel is empty.
    pub poll_interval: Duration,
    /// Delay after a channel error before polling again.
    pub error_backoff: Duration,
}

impl Default for ConsumerConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(500),
            error_backoff: Duration::from_secs(5),
        }
    }
}

/// Consumer-side reconciler turning deliveries into persisted state.
pub struct VerificationConsumer {
    channel: Arc<dyn VerificationChannel>,
    users: Arc<dyn UserRepository>,
    notifier: Arc<dyn EmailNotifier>,
    config: ConsumerConfig,
}

impl VerificationConsumer {
    /// Create a consumer over the given ports.
    pub fn new(
        channel: Arc<dyn VerificationChannel>,
        users: Arc<dyn UserRepository>,
        notifier: Arc<dyn EmailNotifier>,
        config: ConsumerConfig,
    ) -> Self {
        Self {
            channel,
            users,
            notifier,
            config,
        }
    }

    /// Run the consumer until the task is dropped.
    ///
    /// Channel and store errors are logged and retried after a backoff; a
    /// single bad message never stops the loop.
    pub async fn run(&self) {
        if let Err(err) = self.channel.ensure_provisioned().await {
            error!(error = %err, "verification channel provisioning failed");
        }
        loop {
            match self.poll_once().await {
                Ok(Some(outcome)) => debug!(?outcome, "verification message reconciled"),
                Ok(None) => tokio::time::sleep(self.config.poll_interval).await,
                Err(err) => {
                    warn!(error = %err, "verification poll failed");
                    tokio::time::sleep(self.config.error_backoff).await;
                }
            }
        }
    }

    /// Receive and reconcile at most one message.
    ///
    /// Returns `Ok(None)` when the channel is empty. The delivery is
    /// acknowledged exactly when an outcome was reached; store failures
    /// leave it leased for redelivery.
    ///
    /// # Errors
    /// Propagates channel failures and [`ReconcileError`] store failures.
    pub async fn poll_once(&self) -> Result<Option<ReconcileOutcome>, PollError> {
        let Some(delivery) = self.channel.receive().await? else {
            return Ok(None);
        };
        let Delivery { id, payload } = delivery;

        let outcome = self.reconcile(&payload).await?;
        self.channel.ack(id).await?;
        Ok(Some(outcome))
    }

    /// The state machine from the transition table: load the user, check
    /// idempotency, attempt notification, persist the tri-state.
    async fn reconcile(&self, payload: &[u8]) -> Result<ReconcileOutcome, ReconcileError> {
        let Some(event) = VerificationEvent::decode(payload) else {
            // Retrying a malformed payload can never succeed; drop it.
            error!("malformed verification payload; dropping message");
            return Ok(ReconcileOutcome::MalformedPayload);
        };
        let user_id = event.user_id;

        let Some(user) = self.users.find_by_id(user_id).await? else {
            info!(%user_id, "verification message for unknown user; dropping");
            return Ok(ReconcileOutcome::UserMissing);
        };

        if user.verified.is_verified() {
            debug!(%user_id, "user already verified; skipping notification");
            return Ok(ReconcileOutcome::AlreadyVerified);
        }

        match self.notifier.user_created(user_id).await {
            Ok(()) => {
                self.users
                    .set_verification(user_id, VerificationState::Verified)
                    .await?;
                info!(%user_id, "user verified");
                Ok(ReconcileOutcome::Verified)
            }
            Err(err) => {
                warn!(%user_id, error = %err, "new-user notification failed");
                self.users
                    .set_verification(user_id, VerificationState::Failed)
                    .await?;
                Ok(ReconcileOutcome::Failed)
            }
        }
    }
}

/// Errors surfaced by one consumer poll.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PollError {
    /// The channel failed to deliver or acknowledge.
    #[error(transparent)]
    Channel(#[from] ChannelError),
    /// Reconciliation aborted before persisting an outcome.
    #[error(transparent)]
    Reconcile(#[from] ReconcileError),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ports::{InMemoryChannel, NotifyError};
    use crate::domain::user::{NewUser, TopUser, User, UserUpdate};
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use rstest::rstest;

    #[derive(Default)]
    struct StubUsers {
        state: Mutex<StubUsersState>,
    }

    #[derive(Default)]
    struct StubUsersState {
        users: Vec<User>,
        set_failures: u32,
    }

    impl StubUsers {
        fn with_user(user: User) -> Self {
            Self {
                state: Mutex::new(StubUsersState {
                    users: vec![user],
                    set_failures: 0,
                }),
            }
        }

        fn fail_next_set_verification(&self, count: u32) {
            self.state.lock().expect("state lock").set_failures = count;
        }

        fn force_verified(&self, id: UserId) {
            if let Some(user) = self
                .state
                .lock()
                .expect("state lock")
                .users
                .iter_mut()
                .find(|user| user.id == id)
            {
                user.verified = VerificationState::Verified;
            }
        }

        fn verification_of(&self, id: UserId) -> Option<VerificationState> {
            self.state
                .lock()
                .expect("state lock")
                .users
                .iter()
                .find(|user| user.id == id)
                .map(|user| user.verified)
        }
    }

    #[async_trait]
    impl UserRepository for StubUsers {
        async fn create(&self, _user: &NewUser) -> Result<User, UserPersistenceError> {
            unimplemented!("not exercised by consumer tests")
        }

        async fn find_by_id(&self, id: UserId) -> Result<Option<User>, UserPersistenceError> {
            Ok(self
                .state
                .lock()
                .expect("state lock")
                .users
                .iter()
                .find(|user| user.id == id)
                .cloned())
        }

        async fn list_all(&self) -> Result<Vec<User>, UserPersistenceError> {
            Ok(self.state.lock().expect("state lock").users.clone())
        }

        async fn update(
            &self,
            _id: UserId,
            _update: &UserUpdate,
        ) -> Result<Option<User>, UserPersistenceError> {
            unimplemented!("not exercised by consumer tests")
        }

        async fn delete(&self, _id: UserId) -> Result<Option<User>, UserPersistenceError> {
            unimplemented!("not exercised by consumer tests")
        }

        async fn set_verification(
            &self,
            id: UserId,
            state: VerificationState,
        ) -> Result<(), UserPersistenceError> {
            let mut guard = self.state.lock().expect("state lock");
            if guard.set_failures > 0 {
                guard.set_failures -= 1;
                return Err(UserPersistenceError::query("store offline"));
            }
            if let Some(user) = guard.users.iter_mut().find(|user| user.id == id) {
                // Store contract: a Failed write never demotes Verified.
                if !(state == VerificationState::Failed && user.verified.is_verified()) {
                    user.verified = state;
                }
            }
            Ok(())
        }

        async fn top_by_order_count(
            &self,
            _limit: i64,
        ) -> Result<Vec<TopUser>, UserPersistenceError> {
            unimplemented!("not exercised by consumer tests")
        }
    }

    struct ScriptedNotifier {
        calls: AtomicUsize,
        failures_before_success: usize,
    }

    impl ScriptedNotifier {
        fn succeeding() -> Self {
            Self {
                calls: AtomicUsize::new(0),
                failures_before_success: 0,
            }
        }

        fn failing_then_succeeding(failures: usize) -> Self {
            Self {
                calls: AtomicUsize::new(0),
                failures_before_success: failures,
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl EmailNotifier for ScriptedNotifier {
        async fn user_created(&self, _user_id: UserId) -> Result<(), NotifyError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if call < self.failures_before_success {
                Err(NotifyError::send("smtp unreachable"))
            } else {
                Ok(())
            }
        }
    }

    /// Notifier whose failing send is overtaken by a concurrent delivery
    /// that verifies the user first.
    struct RacingNotifier {
        users: Arc<StubUsers>,
    }

    #[async_trait]
    impl EmailNotifier for RacingNotifier {
        async fn user_created(&self, user_id: UserId) -> Result<(), NotifyError> {
            self.users.force_verified(user_id);
            Err(NotifyError::send("smtp unreachable"))
        }
    }

    fn user(id: i32, verified: VerificationState) -> User {
        User {
            id: UserId::new(id),
            email: format!("user{id}@example.com"),
            name: format!("User {id}"),
            verified,
        }
    }

    struct Harness {
        channel: Arc<InMemoryChannel>,
        users: Arc<StubUsers>,
        notifier: Arc<ScriptedNotifier>,
        consumer: VerificationConsumer,
    }

    fn harness(stored: User, notifier: ScriptedNotifier) -> Harness {
        let channel = Arc::new(InMemoryChannel::new());
        let users = Arc::new(StubUsers::with_user(stored));
        let notifier = Arc::new(notifier);
        let consumer = VerificationConsumer::new(
            channel.clone(),
            users.clone(),
            notifier.clone(),
            ConsumerConfig::default(),
        );
        Harness {
            channel,
            users,
            notifier,
            consumer,
        }
    }

    async fn publish_event(channel: &InMemoryChannel, user_id: i32) {
        let payload = VerificationEvent {
            user_id: UserId::new(user_id),
        }
        .encode()
        .expect("encode event");
        channel.publish(&payload).await.expect("publish");
    }

    #[tokio::test]
    async fn event_wire_format_uses_camel_case() {
        let payload = VerificationEvent {
            user_id: UserId::new(7),
        }
        .encode()
        .expect("encode event");
        assert_eq!(payload, br#"{"userId":7}"#);
        assert_eq!(
            VerificationEvent::decode(&payload),
            Some(VerificationEvent {
                user_id: UserId::new(7)
            })
        );
    }

    #[tokio::test]
    async fn publisher_appends_one_message() {
        let channel = Arc::new(InMemoryChannel::new());
        let publisher = VerificationPublisher::new(channel.clone());

        publisher.announce(UserId::new(3)).await.expect("announce");

        assert_eq!(channel.queued_len(), 1);
    }

    #[tokio::test]
    async fn successful_notification_persists_verified_and_acks() {
        let h = harness(
            user(1, VerificationState::Unverified),
            ScriptedNotifier::succeeding(),
        );
        publish_event(&h.channel, 1).await;

        let outcome = h.consumer.poll_once().await.expect("poll");

        assert_eq!(outcome, Some(ReconcileOutcome::Verified));
        assert_eq!(
            h.users.verification_of(UserId::new(1)),
            Some(VerificationState::Verified)
        );
        assert_eq!(h.channel.in_flight_len(), 0);
        assert_eq!(h.notifier.calls(), 1);
    }

    #[tokio::test]
    async fn failed_delivery_never_demotes_a_verified_user() {
        let channel = Arc::new(InMemoryChannel::new());
        let users = Arc::new(StubUsers::with_user(user(1, VerificationState::Unverified)));
        let consumer = VerificationConsumer::new(
            channel.clone(),
            users.clone(),
            Arc::new(RacingNotifier {
                users: users.clone(),
            }),
            ConsumerConfig::default(),
        );
        publish_event(&channel, 1).await;

        let outcome = consumer.poll_once().await.expect("poll");

        assert_eq!(outcome, Some(ReconcileOutcome::Failed));
        assert_eq!(
            users.verification_of(UserId::new(1)),
            Some(VerificationState::Verified)
        );
    }

    #[tokio::test]
    async fn already_verified_user_is_acked_without_notification() {
        let h = harness(
            user(1, VerificationState::Verified),
            ScriptedNotifier::succeeding(),
        );
        publish_event(&h.channel, 1).await;

        let outcome = h.consumer.poll_once().await.expect("poll");

        assert_eq!(outcome, Some(ReconcileOutcome::AlreadyVerified));
        assert_eq!(h.notifier.calls(), 0);
        assert_eq!(h.channel.in_flight_len(), 0);
    }

    #[tokio::test]
    async fn redelivery_after_success_never_notifies_again() {
        let h = harness(
            user(1, VerificationState::Unverified),
            ScriptedNotifier::succeeding(),
        );
        publish_event(&h.channel, 1).await;
        publish_event(&h.channel, 1).await;
        publish_event(&h.channel, 1).await;

        let mut outcomes = Vec::new();
        while let Some(outcome) = h.consumer.poll_once().await.expect("poll") {
            outcomes.push(outcome);
        }

        assert_eq!(
            outcomes,
            vec![
                ReconcileOutcome::Verified,
                ReconcileOutcome::AlreadyVerified,
                ReconcileOutcome::AlreadyVerified,
            ]
        );
        assert_eq!(h.notifier.calls(), 1);
    }

    #[tokio::test]
    async fn failed_notification_persists_failed_and_still_acks() {
        let h = harness(
            user(1, VerificationState::Unverified),
            ScriptedNotifier::failing_then_succeeding(1),
        );
        publish_event(&h.channel, 1).await;

        let outcome = h.consumer.poll_once().await.expect("poll");

        assert_eq!(outcome, Some(ReconcileOutcome::Failed));
        assert_eq!(
            h.users.verification_of(UserId::new(1)),
            Some(VerificationState::Failed)
        );
        // Failure is recorded, not retried via the channel.
        assert_eq!(h.channel.in_flight_len(), 0);
        assert_eq!(h.channel.queued_len(), 0);
    }

    #[tokio::test]
    async fn failed_user_converges_to_verified_on_later_delivery() {
        let h = harness(
            user(1, VerificationState::Unverified),
            ScriptedNotifier::failing_then_succeeding(1),
        );
        publish_event(&h.channel, 1).await;
        publish_event(&h.channel, 1).await;

        let first = h.consumer.poll_once().await.expect("poll");
        let second = h.consumer.poll_once().await.expect("poll");

        assert_eq!(first, Some(ReconcileOutcome::Failed));
        assert_eq!(second, Some(ReconcileOutcome::Verified));
        assert_eq!(
            h.users.verification_of(UserId::new(1)),
            Some(VerificationState::Verified)
        );
    }

    #[tokio::test]
    async fn unknown_user_is_dropped_without_mutation() {
        let h = harness(
            user(1, VerificationState::Unverified),
            ScriptedNotifier::succeeding(),
        );
        publish_event(&h.channel, 99).await;

        let outcome = h.consumer.poll_once().await.expect("poll");

        assert_eq!(outcome, Some(ReconcileOutcome::UserMissing));
        assert_eq!(h.notifier.calls(), 0);
        assert_eq!(
            h.users.verification_of(UserId::new(1)),
            Some(VerificationState::Unverified)
        );
        assert_eq!(h.channel.in_flight_len(), 0);
    }

    #[rstest]
    #[case(&b"not json"[..])]
    #[case(&b"{\"wrong\":1}"[..])]
    #[case(&b"{\"userId\":\"abc\"}"[..])]
    #[tokio::test]
    async fn malformed_payload_is_acked_and_dropped(#[case] payload: &[u8]) {
        let h = harness(
            user(1, VerificationState::Unverified),
            ScriptedNotifier::succeeding(),
        );
        h.channel.publish(payload).await.expect("publish");

        let outcome = h.consumer.poll_once().await.expect("poll");

        assert_eq!(outcome, Some(ReconcileOutcome::MalformedPayload));
        assert_eq!(h.notifier.calls(), 0);
        assert_eq!(h.channel.in_flight_len(), 0);
    }

    #[tokio::test]
    async fn store_failure_leaves_delivery_leased_for_redelivery() {
        let h = harness(
            user(1, VerificationState::Unverified),
            ScriptedNotifier::succeeding(),
        );
        h.users.fail_next_set_verification(1);
        publish_event(&h.channel, 1).await;

        let err = h.consumer.poll_once().await.expect_err("store failure");

        assert!(matches!(err, PollError::Reconcile(_)));
        assert_eq!(h.channel.in_flight_len(), 1);

        // The lease expires and the retried delivery succeeds.
        h.channel.redeliver_unacked();
        let outcome = h.consumer.poll_once().await.expect("poll");
        assert_eq!(outcome, Some(ReconcileOutcome::Verified));
    }

    #[tokio::test]
    async fn empty_channel_polls_to_none() {
        let h = harness(
            user(1, VerificationState::Unverified),
            ScriptedNotifier::succeeding(),
        );
        assert_eq!(h.consumer.poll_once().await.expect("poll"), None);
    }
}
