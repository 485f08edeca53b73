//! Dispatch pool - typed messages to preconfigured queues and topics.
//!
//! ## Architecture
//!
//! ```text
//! PoolBuilder (owns tables while registering)
//!     │  add_queue / add_topic / configure
//!     ▼
//! DispatchPool (frozen Arc snapshots, Send + Sync)
//!     │  queue() / topic()  ->  Route
//!     ▼
//! Route: resolve whole batch -> encode -> forward in order
//!     │
//!     ▼
//! Destination handle (transport)
//! ```
//!
//! ## Example
//!
//! ```ignore
//! let pool = DispatchPool::configure(connection, |pool| {
//!     pool.add_queue::<OrderPlaced>("orders")
//!         .add_topic::<ForecastUpdated>("forecasts");
//! });
//!
//! pool.queue().send(&OrderPlaced { order_id: "o-1".into() })?;
//! pool.topic().schedule(&forecast, Utc::now() + Duration::minutes(5))?;
//!
//! let audit = pool.topic_subscription::<ForecastUpdated>("audit", &SubscriptionOptions::default())?;
//! ```

mod builder;
mod registry;
mod route;

use std::sync::Arc;

pub use builder::PoolBuilder;
pub use registry::{DestinationSnapshot, DestinationTable};
pub use route::Route;

use crate::config::DestinationConfig;
use crate::error::DispatchError;
use crate::message::Message;
use crate::transport::{Connection, Queue, SubscriptionOptions, Topic};

/// Sends and schedules typed messages through registered destinations.
pub struct DispatchPool<C: Connection> {
    connection: C,
    queues: DestinationSnapshot<dyn Queue>,
    topics: DestinationSnapshot<dyn Topic>,
}

impl<C: Connection> DispatchPool<C> {
    pub fn builder(connection: C) -> PoolBuilder<C> {
        PoolBuilder::new(connection)
    }

    /// Build a pool by running `register` against a fresh builder.
    pub fn configure(connection: C, register: impl FnOnce(&mut PoolBuilder<C>)) -> Self {
        let mut builder = PoolBuilder::new(connection);
        register(&mut builder);
        builder.build()
    }

    /// Build a pool from a configuration document.
    pub fn from_config(connection: C, config: &DestinationConfig) -> Self {
        Self::configure(connection, |builder| {
            builder.configure(config);
        })
    }

    fn new(
        connection: C,
        queues: DestinationSnapshot<dyn Queue>,
        topics: DestinationSnapshot<dyn Topic>,
    ) -> Self {
        Self {
            connection,
            queues,
            topics,
        }
    }

    pub fn connection(&self) -> &C {
        &self.connection
    }

    /// Point-to-point operations.
    pub fn queue(&self) -> Route<'_, dyn Queue> {
        Route::new(&self.queues)
    }

    /// Publish/subscribe operations.
    pub fn topic(&self) -> Route<'_, dyn Topic> {
        Route::new(&self.topics)
    }

    pub fn queues(&self) -> &DestinationSnapshot<dyn Queue> {
        &self.queues
    }

    pub fn topics(&self) -> &DestinationSnapshot<dyn Topic> {
        &self.topics
    }

    /// The queue client registered for `M`, e.g. to attach a receiver to it.
    pub fn queue_client<M: Message>(&self) -> Result<Arc<dyn Queue>, DispatchError> {
        self.queue().client::<M>()
    }

    pub fn topic_client<M: Message>(&self) -> Result<Arc<dyn Topic>, DispatchError> {
        self.topic().client::<M>()
    }

    /// Open a new subscription handle on the topic registered for `M`.
    ///
    /// Handles are not cached; every call asks the connection for a fresh one.
    pub fn topic_subscription<M: Message>(
        &self,
        subscription_name: &str,
        options: &SubscriptionOptions,
    ) -> Result<C::Subscription, DispatchError> {
        let topic = self.topics.get(&M::kind())?;
        Ok(self
            .connection
            .subscription(topic.path(), subscription_name, options))
    }
}
