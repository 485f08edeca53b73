//! Message kinds - stable tags binding payload types to destinations.
//!
//! Every payload routed through a [`DispatchPool`](crate::DispatchPool) declares a
//! kind. The registry maps kinds (not Rust types) to queues and topics, so a
//! kind can also be named at runtime, e.g. from a configuration document or a
//! replayed envelope.
//!
//! ## Example
//!
//! ```ignore
//! use bus_pool::Message;
//!
//! #[derive(Serialize, Deserialize, Message)]
//! #[message(kind = "orders.placed")]
//! struct OrderPlaced {
//!     order_id: String,
//! }
//!
//! assert_eq!(OrderPlaced::kind().as_str(), "orders.placed");
//! ```

use std::borrow::{Borrow, Cow};
use std::fmt;

use serde::Serialize;

/// Trait for payload types that can be dispatched through the pool.
pub trait Message: Serialize {
    /// The kind tag for this message type (e.g., "orders.placed").
    /// Must be unique across the application's message set; the derive
    /// defaults it to the module-qualified type name.
    const KIND: &'static str;

    /// Returns the kind tag as a [`MessageKind`].
    fn kind() -> MessageKind {
        MessageKind::from_static(Self::KIND)
    }
}

/// Stable identifier of an application message schema.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MessageKind(Cow<'static, str>);

impl MessageKind {
    /// Create a kind from any string tag.
    pub fn new(kind: impl Into<Cow<'static, str>>) -> Self {
        MessageKind(kind.into())
    }

    /// Create a kind from a static tag without allocating.
    pub const fn from_static(kind: &'static str) -> Self {
        MessageKind(Cow::Borrowed(kind))
    }

    /// Kind of the given message type.
    pub fn of<M: Message>() -> Self {
        M::kind()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Borrow<str> for MessageKind {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl From<&'static str> for MessageKind {
    fn from(kind: &'static str) -> Self {
        MessageKind::from_static(kind)
    }
}

impl From<String> for MessageKind {
    fn from(kind: String) -> Self {
        MessageKind(Cow::Owned(kind))
    }
}
