//! PoolBuilder - accumulates kind → destination registrations.

use std::sync::Arc;

use tracing::debug;

use super::registry::{DestinationSnapshot, DestinationTable};
use super::DispatchPool;
use crate::config::DestinationConfig;
use crate::message::{Message, MessageKind};
use crate::transport::{Connection, DestinationKind, Queue, QueueOptions, Topic, TopicOptions};

/// Builder for a [`DispatchPool`].
///
/// Handles are either opened through the connection from a path, or supplied
/// ready-made (e.g. test doubles). Registering a kind twice replaces the
/// earlier handle.
///
/// ## Example
///
/// ```ignore
/// let mut builder = PoolBuilder::new(connection);
/// builder
///     .add_queue::<OrderPlaced>("orders")
///     .add_topic::<ForecastUpdated>("forecasts");
///
/// let pool = builder.build();
/// ```
pub struct PoolBuilder<C: Connection> {
    connection: C,
    queues: DestinationTable<dyn Queue>,
    topics: DestinationTable<dyn Topic>,
}

impl<C: Connection> PoolBuilder<C> {
    pub fn new(connection: C) -> Self {
        Self {
            connection,
            queues: DestinationTable::new(DestinationKind::Queue),
            topics: DestinationTable::new(DestinationKind::Topic),
        }
    }

    pub fn connection(&self) -> &C {
        &self.connection
    }

    /// Route `M` to the queue at `path`, with default options.
    pub fn add_queue<M: Message>(&mut self, path: &str) -> &mut Self {
        self.add_queue_with::<M>(path, QueueOptions::default())
    }

    pub fn add_queue_with<M: Message>(&mut self, path: &str, options: QueueOptions) -> &mut Self {
        self.add_queue_for(M::kind(), path, options)
    }

    /// Route a runtime kind tag to the queue at `path`.
    pub fn add_queue_for(
        &mut self,
        kind: impl Into<MessageKind>,
        path: &str,
        options: QueueOptions,
    ) -> &mut Self {
        let client = self.connection.queue(path, &options);
        self.register_queue(kind.into(), client)
    }

    /// Route `M` to a pre-built queue client.
    pub fn add_queue_client<M: Message>(&mut self, client: Arc<dyn Queue>) -> &mut Self {
        self.register_queue(M::kind(), client)
    }

    /// Route `M` to the topic at `path`, with default options.
    pub fn add_topic<M: Message>(&mut self, path: &str) -> &mut Self {
        self.add_topic_with::<M>(path, TopicOptions::default())
    }

    pub fn add_topic_with<M: Message>(&mut self, path: &str, options: TopicOptions) -> &mut Self {
        self.add_topic_for(M::kind(), path, options)
    }

    /// Route a runtime kind tag to the topic at `path`.
    pub fn add_topic_for(
        &mut self,
        kind: impl Into<MessageKind>,
        path: &str,
        options: TopicOptions,
    ) -> &mut Self {
        let client = self.connection.topic(path, &options);
        self.register_topic(kind.into(), client)
    }

    /// Route `M` to a pre-built topic client.
    ///
    /// Subscriptions for `M` are still opened through the connection, by the
    /// client's path.
    pub fn add_topic_client<M: Message>(&mut self, client: Arc<dyn Topic>) -> &mut Self {
        self.register_topic(M::kind(), client)
    }

    /// Register every binding of a configuration document.
    pub fn configure(&mut self, config: &DestinationConfig) -> &mut Self {
        for (kind, binding) in &config.queues {
            self.add_queue_for(kind.clone(), &binding.path, binding.options.clone());
        }
        for (kind, binding) in &config.topics {
            self.add_topic_for(kind.clone(), &binding.path, binding.options.clone());
        }
        self
    }

    /// Read-only copy of the queue registrations so far.
    pub fn queues(&self) -> DestinationSnapshot<dyn Queue> {
        self.queues.snapshot()
    }

    /// Read-only copy of the topic registrations so far.
    pub fn topics(&self) -> DestinationSnapshot<dyn Topic> {
        self.topics.snapshot()
    }

    /// Freeze the registrations into a pool.
    pub fn build(self) -> DispatchPool<C> {
        debug!(
            queues = self.queues.len(),
            topics = self.topics.len(),
            "dispatch pool built"
        );
        DispatchPool::new(self.connection, self.queues.snapshot(), self.topics.snapshot())
    }

    fn register_queue(&mut self, kind: MessageKind, client: Arc<dyn Queue>) -> &mut Self {
        let path = client.path().to_string();
        if let Some(previous) = self.queues.register(kind.clone(), client) {
            debug!(%kind, path = path.as_str(), replaced = previous.path(), "queue mapping replaced");
        } else {
            debug!(%kind, path = path.as_str(), "queue mapped");
        }
        self
    }

    fn register_topic(&mut self, kind: MessageKind, client: Arc<dyn Topic>) -> &mut Self {
        let path = client.path().to_string();
        if let Some(previous) = self.topics.register(kind.clone(), client) {
            debug!(%kind, path = path.as_str(), replaced = previous.path(), "topic mapping replaced");
        } else {
            debug!(%kind, path = path.as_str(), "topic mapped");
        }
        self
    }
}
