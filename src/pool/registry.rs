//! Destination tables - message kind to handle, one table per destination kind.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::error::DispatchError;
use crate::message::MessageKind;
use crate::transport::{Destination, DestinationKind};

/// Mutable kind → handle table, owned by the builder.
pub struct DestinationTable<H: ?Sized> {
    destination: DestinationKind,
    entries: HashMap<MessageKind, Arc<H>>,
}

impl<H: ?Sized> DestinationTable<H> {
    pub fn new(destination: DestinationKind) -> Self {
        Self {
            destination,
            entries: HashMap::new(),
        }
    }

    pub fn destination(&self) -> DestinationKind {
        self.destination
    }

    /// Insert or overwrite the handle for `kind`.
    ///
    /// Returns the handle that was replaced, if any. Last write wins.
    pub fn register(&mut self, kind: MessageKind, handle: Arc<H>) -> Option<Arc<H>> {
        self.entries.insert(kind, handle)
    }

    pub fn lookup(&self, kind: &str) -> Option<&Arc<H>> {
        self.entries.get(kind)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Freeze a copy of the current registrations.
    ///
    /// Later registrations on this table are not visible through the snapshot.
    pub fn snapshot(&self) -> DestinationSnapshot<H> {
        DestinationSnapshot {
            destination: self.destination,
            entries: Arc::new(self.entries.clone()),
        }
    }
}

impl<H: Destination + ?Sized> fmt::Debug for DestinationTable<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map()
            .entries(self.entries.iter().map(|(k, h)| (k.as_str(), h.path())))
            .finish()
    }
}

/// Read-only view of a destination table, shared by the pool.
pub struct DestinationSnapshot<H: ?Sized> {
    destination: DestinationKind,
    entries: Arc<HashMap<MessageKind, Arc<H>>>,
}

impl<H: ?Sized> Clone for DestinationSnapshot<H> {
    fn clone(&self) -> Self {
        Self {
            destination: self.destination,
            entries: Arc::clone(&self.entries),
        }
    }
}

impl<H: ?Sized> DestinationSnapshot<H> {
    pub fn destination(&self) -> DestinationKind {
        self.destination
    }

    pub fn lookup(&self, kind: &str) -> Option<&Arc<H>> {
        self.entries.get(kind)
    }

    pub fn contains(&self, kind: &str) -> bool {
        self.entries.contains_key(kind)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Registered kinds, sorted.
    pub fn kinds(&self) -> Vec<&MessageKind> {
        let mut kinds: Vec<_> = self.entries.keys().collect();
        kinds.sort();
        kinds
    }

    /// Resolve the handle for one kind, for accessor calls.
    pub fn get(&self, kind: &MessageKind) -> Result<&Arc<H>, DispatchError> {
        self.lookup(kind.as_str())
            .ok_or_else(|| DispatchError::UnregisteredDestination {
                kind: kind.clone(),
                destination: self.destination,
            })
    }

    /// Resolve a handle for every kind of a batch, in order.
    ///
    /// Fails on the first unmapped kind; nothing is returned for a partial batch.
    pub fn resolve_all<'k>(
        &self,
        kinds: impl IntoIterator<Item = &'k MessageKind>,
    ) -> Result<Vec<&Arc<H>>, DispatchError> {
        kinds
            .into_iter()
            .map(|kind| {
                self.lookup(kind.as_str())
                    .ok_or_else(|| DispatchError::UnmappedMessageKind {
                        kind: kind.clone(),
                        destination: self.destination,
                    })
            })
            .collect()
    }
}

impl<H: Destination + ?Sized> fmt::Debug for DestinationSnapshot<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map()
            .entries(self.entries.iter().map(|(k, h)| (k.as_str(), h.path())))
            .finish()
    }
}
