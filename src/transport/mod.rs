//! Transport seam - the traits the pool consumes from a broker client.
//!
//! The pool owns no connections and speaks no wire protocol. A transport
//! supplies a [`Connection`] that opens queue, topic and subscription handles;
//! the pool only calls [`Destination::send`] and [`Destination::schedule`] on
//! the handles it resolved.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    DispatchPool                              │
//! │  - queue() / topic() routes                                 │
//! │  - validate whole batch, then forward in order              │
//! └─────────────────────────────────────────────────────────────┘
//!                            │
//!                            ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │           Destination (Queue / Topic) + Subscription         │
//! │  Destination: send / schedule / cancel_scheduled            │
//! │  Subscription: receive / complete / abandon                 │
//! └─────────────────────────────────────────────────────────────┘
//!          │                  │                     │
//!          ▼                  ▼                     ▼
//! ┌─────────────┐    ┌─────────────┐    ┌─────────────────────┐
//! │  InMemory   │    │ EmitterTopic│    │ Service bus client  │
//! │ (included)  │    │  (emitter)  │    │    (external)       │
//! └─────────────┘    └─────────────┘    └─────────────────────┘
//! ```

#[cfg(feature = "emitter")]
mod emitter;
mod in_memory;
mod options;

use std::error::Error as StdError;
use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::envelope::Envelope;

#[cfg(feature = "emitter")]
pub use emitter::EmitterTopic;
pub use in_memory::{
    InMemoryConnection, InMemoryEntity, InMemorySubscription, OpenedEntity, ScheduledMessage,
};
pub use options::{QueueOptions, ReceiveMode, RetryPolicy, SubscriptionOptions, TopicOptions};

/// Error type for transport operations.
///
/// Returned by handles and passed through the pool untouched.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Connection to the broker failed
    #[error("connection failed: {0}")]
    ConnectionFailed(String),
    /// The broker rejected the message
    #[error("message rejected: {0}")]
    Rejected(String),
    /// The entity or scheduled message does not exist
    #[error("not found: {0}")]
    NotFound(String),
    /// Timeout waiting for acknowledgment
    #[error("transport timeout")]
    Timeout,
    /// Other error
    #[error("transport error: {0}")]
    Other(#[source] Box<dyn StdError + Send + Sync>),
}

/// Which table a destination belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DestinationKind {
    Queue,
    Topic,
}

impl fmt::Display for DestinationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DestinationKind::Queue => f.write_str("queue"),
            DestinationKind::Topic => f.write_str("topic"),
        }
    }
}

/// Broker-assigned number identifying a scheduled message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SequenceNumber(pub i64);

impl fmt::Display for SequenceNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A message pulled from a subscription.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceivedMessage {
    pub sequence: SequenceNumber,
    pub envelope: Envelope,
    /// How many times this message has been handed out, starting at 1.
    pub delivery_count: u32,
}

/// A channel that accepts serialized messages.
pub trait Destination: Send + Sync {
    /// Entity path on the broker (queue or topic name).
    fn path(&self) -> &str;

    /// Send an envelope for immediate delivery.
    fn send(&self, envelope: &Envelope) -> Result<(), TransportError>;

    /// Send multiple envelopes.
    ///
    /// Default implementation sends sequentially and stops at the first failure.
    fn send_batch(&self, envelopes: &[Envelope]) -> Result<(), TransportError> {
        for envelope in envelopes {
            self.send(envelope)?;
        }
        Ok(())
    }

    /// Hand an envelope to the broker for delivery at `deliver_at`.
    fn schedule(
        &self,
        envelope: &Envelope,
        deliver_at: DateTime<Utc>,
    ) -> Result<SequenceNumber, TransportError>;

    /// Cancel a message previously scheduled on this destination.
    fn cancel_scheduled(&self, sequence: SequenceNumber) -> Result<(), TransportError>;
}

/// Point-to-point destination: each message goes to one consumer.
pub trait Queue: Destination {}

/// Publish/subscribe destination: each message fans out to every subscription.
pub trait Topic: Destination {}

/// Pull-based receiver bound to one topic subscription.
pub trait Subscription: Send + Sync {
    fn topic_path(&self) -> &str;

    fn name(&self) -> &str;

    /// Poll for the next message, blocking until one is available or timeout.
    fn receive(&self, timeout_ms: u64) -> Result<Option<ReceivedMessage>, TransportError>;

    /// Settle a received message so it is not delivered again.
    fn complete(&self, sequence: SequenceNumber) -> Result<(), TransportError>;

    /// Release a received message for redelivery.
    fn abandon(&self, sequence: SequenceNumber, reason: &str) -> Result<(), TransportError>;
}

/// A broker connection able to open destination and subscription handles.
///
/// Opening is lazy: creating a handle performs no I/O, so these calls cannot fail.
pub trait Connection: Send + Sync {
    type Subscription: Subscription;

    fn queue(&self, path: &str, options: &QueueOptions) -> Arc<dyn Queue>;

    fn topic(&self, path: &str, options: &TopicOptions) -> Arc<dyn Topic>;

    /// Open a new subscription handle. Each call returns a fresh instance.
    fn subscription(
        &self,
        topic_path: &str,
        subscription_name: &str,
        options: &SubscriptionOptions,
    ) -> Self::Subscription;
}
