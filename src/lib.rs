//! Registry-driven dispatch of typed messages to service bus queues and topics.
//!
//! A [`DispatchPool`] is configured once with a mapping from message kind to
//! destination, then sends, schedules and opens subscriptions by kind alone.
//! Payloads are carried as compact JSON [`Envelope`]s over a pluggable
//! [`Connection`].
//!
//! ```
//! use bus_pool::{DispatchPool, InMemoryConnection, Message};
//! use serde::Serialize;
//!
//! #[derive(Serialize, Message)]
//! struct OrderPlaced {
//!     order_id: String,
//! }
//!
//! let connection = InMemoryConnection::new();
//! let pool = DispatchPool::configure(connection.clone(), |pool| {
//!     pool.add_queue::<OrderPlaced>("orders");
//! });
//!
//! pool.queue()
//!     .send(&OrderPlaced { order_id: "o-1".into() })
//!     .unwrap();
//!
//! assert_eq!(connection.entity("orders").bodies(), vec![r#"{"order_id":"o-1"}"#]);
//! ```

extern crate self as bus_pool;

pub mod config;
mod envelope;
mod error;
mod message;
mod pool;
pub mod transport;

pub use config::{
    ConfigError, ConnectionConfig, Credential, DestinationConfig, PoolConfig, QueueBinding,
    TopicBinding, TransportMode,
};
pub use envelope::{from_json_bytes, to_json_bytes, Envelope, EnvelopeError, CONTENT_TYPE};
pub use error::DispatchError;
pub use message::{Message, MessageKind};
pub use pool::{DestinationSnapshot, DestinationTable, DispatchPool, PoolBuilder, Route};
pub use transport::{
    Connection, Destination, DestinationKind, InMemoryConnection, InMemoryEntity,
    InMemorySubscription, OpenedEntity, Queue, QueueOptions, ReceiveMode, ReceivedMessage,
    RetryPolicy, ScheduledMessage, SequenceNumber, Subscription, SubscriptionOptions, Topic,
    TopicOptions, TransportError,
};

#[cfg(feature = "emitter")]
pub use transport::EmitterTopic;

// Derive macro shares the trait's name, as serde's derives do
pub use bus_pool_macros::Message;

#[doc(hidden)]
pub mod __private {
    pub use serde::Serialize;
}

// Re-export the EventEmitter from the event_emitter_rs crate
#[cfg(feature = "emitter")]
pub use event_emitter_rs::EventEmitter;
