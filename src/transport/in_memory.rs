//! In-memory transport for testing and single-process scenarios.
//!
//! [`InMemoryConnection`] implements [`Connection`] without any broker:
//! - Queues and topics are append-only logs keyed by entity path
//! - Handles opened for the same path share one log
//! - Scheduled messages wait until [`InMemoryEntity::release_due`] moves them
//! - Subscriptions keep a broker-side cursor per (topic, name), so fresh
//!   handles for the same subscription compete for messages

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};

use super::{
    Connection, Destination, DestinationKind, Queue, QueueOptions, ReceiveMode, ReceivedMessage,
    RetryPolicy, SequenceNumber, Subscription, SubscriptionOptions, Topic, TopicOptions,
    TransportError,
};
use crate::config::ConnectionConfig;
use crate::envelope::Envelope;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// A message waiting for its scheduled delivery time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduledMessage {
    pub sequence: SequenceNumber,
    pub deliver_at: DateTime<Utc>,
    pub envelope: Envelope,
}

#[derive(Debug, Clone)]
struct Stored {
    sequence: SequenceNumber,
    envelope: Envelope,
}

struct EntityState {
    path: String,
    log: RwLock<Vec<Stored>>,
    scheduled: Mutex<Vec<ScheduledMessage>>,
    next_sequence: AtomicI64,
    /// Remaining sends before the entity starts failing; `None` never fails.
    send_budget: Mutex<Option<usize>>,
}

/// In-memory queue or topic.
///
/// Cheap to clone; clones share the same log. An entity created with
/// [`InMemoryEntity::new`] belongs to no connection: get it from
/// [`InMemoryConnection::entity`] or pass it to [`InMemoryConnection::adopt`]
/// before opening subscriptions on its path.
///
/// ## Example
///
/// ```
/// use bus_pool::{Destination, Envelope, InMemoryEntity};
///
/// let orders = InMemoryEntity::new("orders");
/// orders.send(&Envelope::from_bytes("OrderPlaced", br#"{"id":"1"}"#.to_vec())).unwrap();
///
/// assert_eq!(orders.len(), 1);
/// assert_eq!(orders.kinds(), vec!["OrderPlaced"]);
/// ```
#[derive(Clone)]
pub struct InMemoryEntity {
    state: Arc<EntityState>,
}

impl InMemoryEntity {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            state: Arc::new(EntityState {
                path: path.into(),
                log: RwLock::new(Vec::new()),
                scheduled: Mutex::new(Vec::new()),
                next_sequence: AtomicI64::new(1),
                send_budget: Mutex::new(None),
            }),
        }
    }

    /// Get all delivered envelopes in order.
    pub fn messages(&self) -> Vec<Envelope> {
        self.read_log().iter().map(|s| s.envelope.clone()).collect()
    }

    /// Get the kinds of all delivered envelopes in order.
    pub fn kinds(&self) -> Vec<String> {
        self.read_log()
            .iter()
            .map(|s| s.envelope.kind().to_string())
            .collect()
    }

    /// Get the delivered bodies as UTF-8 strings.
    pub fn bodies(&self) -> Vec<String> {
        self.read_log()
            .iter()
            .map(|s| String::from_utf8_lossy(s.envelope.body()).into_owned())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.read_log().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read_log().is_empty()
    }

    /// Find the first delivered envelope of a kind.
    pub fn find_by_kind(&self, kind: &str) -> Option<Envelope> {
        self.read_log()
            .iter()
            .find(|s| s.envelope.kind().as_str() == kind)
            .map(|s| s.envelope.clone())
    }

    /// Get messages still waiting for their delivery time.
    pub fn scheduled(&self) -> Vec<ScheduledMessage> {
        lock(&self.state.scheduled).clone()
    }

    /// Deliver every scheduled message due at `now`, earliest first.
    ///
    /// Returns how many messages were released.
    pub fn release_due(&self, now: DateTime<Utc>) -> usize {
        let mut due: Vec<ScheduledMessage> = {
            let mut scheduled = lock(&self.state.scheduled);
            let (due, pending): (Vec<_>, Vec<_>) =
                scheduled.drain(..).partition(|m| m.deliver_at <= now);
            *scheduled = pending;
            due
        };
        due.sort_by_key(|m| (m.deliver_at, m.sequence));

        let released = due.len();
        let mut log = self.write_log();
        log.extend(due.into_iter().map(|m| Stored {
            sequence: m.sequence,
            envelope: m.envelope,
        }));
        released
    }

    /// Let the next `sends` sends succeed, then fail every later one.
    pub fn fail_after(&self, sends: usize) {
        *lock(&self.state.send_budget) = Some(sends);
    }

    /// Stop injecting failures.
    pub fn recover(&self) {
        *lock(&self.state.send_budget) = None;
    }

    /// Clear all delivered and scheduled messages (useful for test cleanup).
    pub fn clear(&self) {
        self.write_log().clear();
        lock(&self.state.scheduled).clear();
    }

    fn read_log(&self) -> std::sync::RwLockReadGuard<'_, Vec<Stored>> {
        self.state.log.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_log(&self) -> std::sync::RwLockWriteGuard<'_, Vec<Stored>> {
        self.state.log.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn next_sequence(&self) -> SequenceNumber {
        SequenceNumber(self.state.next_sequence.fetch_add(1, Ordering::SeqCst))
    }

    fn admit(&self) -> Result<(), TransportError> {
        let mut budget = lock(&self.state.send_budget);
        match budget.as_mut() {
            None => Ok(()),
            Some(0) => Err(TransportError::ConnectionFailed(format!(
                "{}: injected send failure",
                self.state.path
            ))),
            Some(remaining) => {
                *remaining -= 1;
                Ok(())
            }
        }
    }

    fn stored_from(&self, position: usize) -> Option<Stored> {
        self.read_log().get(position).cloned()
    }
}

impl Destination for InMemoryEntity {
    fn path(&self) -> &str {
        &self.state.path
    }

    fn send(&self, envelope: &Envelope) -> Result<(), TransportError> {
        self.admit()?;
        let mut log = self.write_log();
        let sequence = self.next_sequence();
        log.push(Stored {
            sequence,
            envelope: envelope.clone(),
        });
        Ok(())
    }

    fn schedule(
        &self,
        envelope: &Envelope,
        deliver_at: DateTime<Utc>,
    ) -> Result<SequenceNumber, TransportError> {
        self.admit()?;
        let mut scheduled = lock(&self.state.scheduled);
        let sequence = self.next_sequence();
        scheduled.push(ScheduledMessage {
            sequence,
            deliver_at,
            envelope: envelope.clone(),
        });
        Ok(sequence)
    }

    fn cancel_scheduled(&self, sequence: SequenceNumber) -> Result<(), TransportError> {
        let mut scheduled = lock(&self.state.scheduled);
        let before = scheduled.len();
        scheduled.retain(|m| m.sequence != sequence);
        if scheduled.len() == before {
            return Err(TransportError::NotFound(format!(
                "{}: no scheduled message {}",
                self.state.path, sequence
            )));
        }
        Ok(())
    }
}

impl Queue for InMemoryEntity {}

impl Topic for InMemoryEntity {}

/// A handle opened through [`InMemoryConnection`], with the options it was given.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenedEntity {
    pub path: String,
    pub destination: DestinationKind,
    pub receive_mode: Option<ReceiveMode>,
    pub retry_policy: RetryPolicy,
}

#[derive(Default)]
struct SubscriptionState {
    /// Next log position this subscription has not seen
    cursor: usize,
    redeliver: VecDeque<(Stored, u32)>,
    in_flight: HashMap<SequenceNumber, (Stored, u32)>,
    completed: Vec<SequenceNumber>,
}

#[derive(Default)]
struct ConnectionState {
    config: Option<ConnectionConfig>,
    entities: RwLock<HashMap<String, InMemoryEntity>>,
    subscriptions: Mutex<HashMap<(String, String), Arc<Mutex<SubscriptionState>>>>,
    opened: Mutex<Vec<OpenedEntity>>,
}

/// Connection to an in-process broker.
///
/// ## Example
///
/// ```
/// use bus_pool::{Connection, Destination, InMemoryConnection, QueueOptions};
///
/// let connection = InMemoryConnection::new();
/// let queue = connection.queue("orders", &QueueOptions::default());
///
/// assert_eq!(queue.path(), "orders");
/// assert_eq!(connection.opened().len(), 1);
/// ```
#[derive(Clone, Default)]
pub struct InMemoryConnection {
    state: Arc<ConnectionState>,
}

impl InMemoryConnection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a connection that remembers the configuration it stands in for.
    pub fn from_config(config: ConnectionConfig) -> Self {
        Self {
            state: Arc::new(ConnectionState {
                config: Some(config),
                ..ConnectionState::default()
            }),
        }
    }

    pub fn config(&self) -> Option<&ConnectionConfig> {
        self.state.config.as_ref()
    }

    /// Get (or create) the entity behind a path.
    pub fn entity(&self, path: &str) -> InMemoryEntity {
        if let Some(entity) = self
            .state
            .entities
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(path)
        {
            return entity.clone();
        }

        self.state
            .entities
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(path.to_string())
            .or_insert_with(|| InMemoryEntity::new(path))
            .clone()
    }

    /// Put a pre-built entity behind its path.
    ///
    /// Handles and subscriptions opened through this connection afterwards
    /// share the entity's log, so an entity registered directly with
    /// `add_topic_client` is also what `topic_subscription` reads from.
    /// Replaces any entity previously known under that path.
    pub fn adopt(&self, entity: &InMemoryEntity) -> &Self {
        self.state
            .entities
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(entity.path().to_string(), entity.clone());
        self
    }

    /// Every handle opened so far, in order.
    pub fn opened(&self) -> Vec<OpenedEntity> {
        lock(&self.state.opened).clone()
    }

    /// Sequence numbers completed on a subscription.
    pub fn completed(&self, topic_path: &str, subscription_name: &str) -> Vec<SequenceNumber> {
        lock(&self.subscription_state(topic_path, subscription_name)).completed.clone()
    }

    fn subscription_state(
        &self,
        topic_path: &str,
        subscription_name: &str,
    ) -> Arc<Mutex<SubscriptionState>> {
        let mut subscriptions = lock(&self.state.subscriptions);
        Arc::clone(
            subscriptions
                .entry((topic_path.to_string(), subscription_name.to_string()))
                .or_default(),
        )
    }

    fn record(&self, opened: OpenedEntity) {
        lock(&self.state.opened).push(opened);
    }
}

impl Connection for InMemoryConnection {
    type Subscription = InMemorySubscription;

    fn queue(&self, path: &str, options: &QueueOptions) -> Arc<dyn Queue> {
        self.record(OpenedEntity {
            path: path.to_string(),
            destination: DestinationKind::Queue,
            receive_mode: Some(options.receive_mode),
            retry_policy: options.retry_policy.clone(),
        });
        Arc::new(self.entity(path))
    }

    fn topic(&self, path: &str, options: &TopicOptions) -> Arc<dyn Topic> {
        self.record(OpenedEntity {
            path: path.to_string(),
            destination: DestinationKind::Topic,
            receive_mode: None,
            retry_policy: options.retry_policy.clone(),
        });
        Arc::new(self.entity(path))
    }

    fn subscription(
        &self,
        topic_path: &str,
        subscription_name: &str,
        options: &SubscriptionOptions,
    ) -> InMemorySubscription {
        InMemorySubscription {
            topic: self.entity(topic_path),
            name: subscription_name.to_string(),
            options: options.clone(),
            state: self.subscription_state(topic_path, subscription_name),
        }
    }
}

/// Receiver for one topic subscription.
///
/// Handles for the same (topic, subscription) share a cursor, so two handles
/// compete for messages the way two receivers on a broker subscription do.
pub struct InMemorySubscription {
    topic: InMemoryEntity,
    name: String,
    options: SubscriptionOptions,
    state: Arc<Mutex<SubscriptionState>>,
}

impl InMemorySubscription {
    pub fn options(&self) -> &SubscriptionOptions {
        &self.options
    }

    fn try_take(&self) -> Option<ReceivedMessage> {
        let mut state = lock(&self.state);

        let (stored, delivery_count) = match state.redeliver.pop_front() {
            Some((stored, count)) => (stored, count + 1),
            None => {
                let stored = self.topic.stored_from(state.cursor)?;
                state.cursor += 1;
                (stored, 1)
            }
        };

        if self.options.receive_mode == ReceiveMode::PeekLock {
            state
                .in_flight
                .insert(stored.sequence, (stored.clone(), delivery_count));
        }

        Some(ReceivedMessage {
            sequence: stored.sequence,
            envelope: stored.envelope,
            delivery_count,
        })
    }
}

impl Subscription for InMemorySubscription {
    fn topic_path(&self) -> &str {
        self.topic.path()
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn receive(&self, timeout_ms: u64) -> Result<Option<ReceivedMessage>, TransportError> {
        let deadline = Instant::now() + Duration::from_millis(timeout_ms);

        loop {
            if let Some(message) = self.try_take() {
                return Ok(Some(message));
            }

            if Instant::now() >= deadline {
                return Ok(None);
            }

            // Small sleep to avoid busy-waiting
            std::thread::sleep(Duration::from_millis(1));
        }
    }

    fn complete(&self, sequence: SequenceNumber) -> Result<(), TransportError> {
        let mut state = lock(&self.state);
        if state.in_flight.remove(&sequence).is_none() {
            return Err(TransportError::NotFound(format!(
                "{}/{}: message {} is not locked",
                self.topic.path(),
                self.name,
                sequence
            )));
        }
        state.completed.push(sequence);
        Ok(())
    }

    fn abandon(&self, sequence: SequenceNumber, _reason: &str) -> Result<(), TransportError> {
        let mut state = lock(&self.state);
        match state.in_flight.remove(&sequence) {
            Some(entry) => {
                state.redeliver.push_back(entry);
                Ok(())
            }
            None => Err(TransportError::NotFound(format!(
                "{}/{}: message {} is not locked",
                self.topic.path(),
                self.name,
                sequence
            ))),
        }
    }
}
