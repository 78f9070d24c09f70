//! Port describing the durable at-least-once verification channel.
//!
//! The channel is unordered and may redeliver: a received message stays
//! invisible for a lease period and becomes deliverable again unless it is
//! acknowledged. Adapters own topic/subscription provisioning; provisioning
//! is idempotent.

use std::collections::HashMap;
use std::collections::VecDeque;
use std::fmt;
use std::sync::Mutex;

use async_trait::async_trait;
use thiserror::Error;

/// Errors surfaced by channel adapters.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChannelError {
    /// Channel infrastructure is unavailable.
    #[error("verification channel is unavailable: {message}")]
    Unavailable {
        /// Adapter-provided diagnostic.
        message: String,
    },
    /// The message could not be appended or acknowledged.
    #[error("verification channel rejected the operation: {message}")]
    Rejected {
        /// Adapter-provided diagnostic.
        message: String,
    },
}

impl ChannelError {
    /// Build an unavailable error from an adapter diagnostic.
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::Unavailable {
            message: message.into(),
        }
    }

    /// Build a rejected error from an adapter diagnostic.
    pub fn rejected(message: impl Into<String>) -> Self {
        Self::Rejected {
            message: message.into(),
        }
    }
}

/// Identifier of one delivered message, used to acknowledge it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DeliveryId(i64);

impl DeliveryId {
    /// Wrap a raw delivery identifier.
    #[must_use]
    pub fn new(id: i64) -> Self {
        Self(id)
    }

    /// Raw identifier value.
    #[must_use]
    pub fn value(&self) -> i64 {
        self.0
    }
}

impl fmt::Display for DeliveryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One message leased from the channel, pending acknowledgment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    /// Handle for acknowledging this delivery.
    pub id: DeliveryId,
    /// Opaque message payload.
    pub payload: Vec<u8>,
}

/// Durable publish/consume port between user creation and verification.
#[async_trait]
pub trait VerificationChannel: Send + Sync {
    /// Idempotently create the underlying topic/subscription storage.
    async fn ensure_provisioned(&self) -> Result<(), ChannelError>;

    /// Append one message to the channel.
    async fn publish(&self, payload: &[u8]) -> Result<(), ChannelError>;

    /// Lease the next deliverable message, if any.
    async fn receive(&self) -> Result<Option<Delivery>, ChannelError>;

    /// Acknowledge a delivery so it is never redelivered.
    async fn ack(&self, id: DeliveryId) -> Result<(), ChannelError>;
}

/// Channel variant used when the integration is disabled: publishes are
/// dropped with a log line and the consumer never sees a message.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopChannel;

#[async_trait]
impl VerificationChannel for NoopChannel {
    async fn ensure_provisioned(&self) -> Result<(), ChannelError> {
        Ok(())
    }

    async fn publish(&self, _payload: &[u8]) -> Result<(), ChannelError> {
        tracing::debug!("verification channel disabled; message skipped");
        Ok(())
    }

    async fn receive(&self) -> Result<Option<Delivery>, ChannelError> {
        Ok(None)
    }

    async fn ack(&self, _id: DeliveryId) -> Result<(), ChannelError> {
        Ok(())
    }
}

/// In-memory channel with lease/ack semantics for tests and local runs.
///
/// `receive` moves the oldest queued message into an in-flight set;
/// [`InMemoryChannel::redeliver_unacked`] simulates lease expiry by moving
/// in-flight messages back onto the queue.
#[derive(Debug, Default)]
pub struct InMemoryChannel {
    state: Mutex<InMemoryState>,
}

#[derive(Debug, Default)]
struct InMemoryState {
    next_id: i64,
    queued: VecDeque<(i64, Vec<u8>)>,
    in_flight: HashMap<i64, Vec<u8>>,
}

impl InMemoryChannel {
    /// Create an empty channel.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of messages waiting for delivery.
    #[must_use]
    pub fn queued_len(&self) -> usize {
        self.lock().queued.len()
    }

    /// Number of delivered but unacknowledged messages.
    #[must_use]
    pub fn in_flight_len(&self) -> usize {
        self.lock().in_flight.len()
    }

    /// Move every unacknowledged delivery back onto the queue, simulating
    /// lease expiry and at-least-once redelivery.
    pub fn redeliver_unacked(&self) {
        let mut state = self.lock();
        let mut expired: Vec<(i64, Vec<u8>)> = state.in_flight.drain().collect();
        expired.sort_by_key(|(id, _)| *id);
        state.queued.extend(expired);
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, InMemoryState> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

#[async_trait]
impl VerificationChannel for InMemoryChannel {
    async fn ensure_provisioned(&self) -> Result<(), ChannelError> {
        Ok(())
    }

    async fn publish(&self, payload: &[u8]) -> Result<(), ChannelError> {
        let mut state = self.lock();
        state.next_id += 1;
        let id = state.next_id;
        state.queued.push_back((id, payload.to_vec()));
        Ok(())
    }

    async fn receive(&self) -> Result<Option<Delivery>, ChannelError> {
        let mut state = self.lock();
        let Some((id, payload)) = state.queued.pop_front() else {
            return Ok(None);
        };
        state.in_flight.insert(id, payload.clone());
        Ok(Some(Delivery {
            id: DeliveryId::new(id),
            payload,
        }))
    }

    async fn ack(&self, id: DeliveryId) -> Result<(), ChannelError> {
        self.lock().in_flight.remove(&id.value());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn receive_leases_and_ack_settles() {
        let channel = InMemoryChannel::new();
        channel.publish(b"one").await.expect("publish");

        let delivery = channel.receive().await.expect("receive").expect("message");
        assert_eq!(delivery.payload, b"one");
        assert_eq!(channel.queued_len(), 0);
        assert_eq!(channel.in_flight_len(), 1);

        channel.ack(delivery.id).await.expect("ack");
        assert_eq!(channel.in_flight_len(), 0);
    }

    #[tokio::test]
    async fn unacked_messages_are_redelivered() {
        let channel = InMemoryChannel::new();
        channel.publish(b"again").await.expect("publish");

        let first = channel.receive().await.expect("receive").expect("message");
        channel.redeliver_unacked();

        let second = channel.receive().await.expect("receive").expect("message");
        assert_eq!(first.payload, second.payload);
    }

    #[tokio::test]
    async fn empty_channel_yields_nothing() {
        let channel = InMemoryChannel::new();
        assert_eq!(channel.receive().await.expect("receive"), None);
    }
}
