//! Route - send and schedule operations over one destination table.

use std::slice;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::debug;

use super::registry::DestinationSnapshot;
use crate::envelope::Envelope;
use crate::error::DispatchError;
use crate::message::{Message, MessageKind};
use crate::transport::{Destination, DestinationKind, SequenceNumber, TransportError};

/// The pool's view of its queue table or its topic table.
///
/// Every batch is resolved against the table in full before the first message
/// is forwarded: one unmapped kind rejects the whole batch with
/// [`DispatchError::UnmappedMessageKind`] and nothing reaches the transport.
/// Forwarding is sequential in input order and stops at the first transport
/// failure.
pub struct Route<'a, H: ?Sized> {
    table: &'a DestinationSnapshot<H>,
}

impl<'a, H: Destination + ?Sized> Route<'a, H> {
    pub(crate) fn new(table: &'a DestinationSnapshot<H>) -> Self {
        Self { table }
    }

    pub fn destination(&self) -> DestinationKind {
        self.table.destination()
    }

    /// Whether `M` has a destination in this table.
    pub fn is_mapped<M: Message>(&self) -> bool {
        self.table.contains(M::KIND)
    }

    /// The handle registered for `M`.
    pub fn client<M: Message>(&self) -> Result<Arc<H>, DispatchError> {
        self.table.get(&M::kind()).map(Arc::clone)
    }

    pub fn send<M: Message>(&self, message: &M) -> Result<(), DispatchError> {
        self.send_all(slice::from_ref(message))
    }

    pub fn send_all<M: Message>(&self, messages: &[M]) -> Result<(), DispatchError> {
        let envelopes = self.encode_all(messages)?;
        self.send_envelopes(&envelopes)
    }

    pub fn send_envelope(&self, envelope: &Envelope) -> Result<(), DispatchError> {
        self.send_envelopes(slice::from_ref(envelope))
    }

    /// Consecutive envelopes bound for the same handle go out as one
    /// [`Destination::send_batch`] call.
    pub fn send_envelopes(&self, envelopes: &[Envelope]) -> Result<(), DispatchError> {
        let targets = self.resolve_batch(envelopes, "send")?;

        let mut start = 0;
        while start < envelopes.len() {
            let target = targets[start];
            let end = targets[start..]
                .iter()
                .position(|next| !Arc::ptr_eq(next, target))
                .map_or(envelopes.len(), |run| start + run);
            target.send_batch(&envelopes[start..end])?;
            start = end;
        }
        Ok(())
    }

    /// Schedule `message` for delivery at `deliver_at`.
    pub fn schedule<M: Message>(
        &self,
        message: &M,
        deliver_at: DateTime<Utc>,
    ) -> Result<SequenceNumber, DispatchError> {
        let envelope = self.encode_one(message)?;
        self.schedule_envelope(&envelope, deliver_at)
    }

    /// Schedule a batch; sequence numbers are returned in input order.
    pub fn schedule_all<M: Message>(
        &self,
        messages: &[M],
        deliver_at: DateTime<Utc>,
    ) -> Result<Vec<SequenceNumber>, DispatchError> {
        let envelopes = self.encode_all(messages)?;
        self.schedule_envelopes(&envelopes, deliver_at)
    }

    pub fn schedule_envelope(
        &self,
        envelope: &Envelope,
        deliver_at: DateTime<Utc>,
    ) -> Result<SequenceNumber, DispatchError> {
        let target = self.resolve(envelope.kind())?;
        debug!(
            destination = %self.destination(),
            kind = %envelope.kind(),
            path = target.path(),
            %deliver_at,
            "scheduling message"
        );
        Ok(target.schedule(envelope, deliver_at)?)
    }

    pub fn schedule_envelopes(
        &self,
        envelopes: &[Envelope],
        deliver_at: DateTime<Utc>,
    ) -> Result<Vec<SequenceNumber>, DispatchError> {
        self.forward(envelopes, "schedule", |target, envelope| {
            target.schedule(envelope, deliver_at)
        })
    }

    /// Cancel a message scheduled for `M`.
    pub fn cancel_scheduled<M: Message>(&self, sequence: SequenceNumber) -> Result<(), DispatchError> {
        let target = self.table.get(&M::kind())?;
        Ok(target.cancel_scheduled(sequence)?)
    }

    fn resolve(&self, kind: &MessageKind) -> Result<&'a Arc<H>, DispatchError> {
        let mut targets = self.table.resolve_all([kind])?;
        targets.pop().ok_or_else(|| DispatchError::UnmappedMessageKind {
            kind: kind.clone(),
            destination: self.destination(),
        })
    }

    fn encode_one<M: Message>(&self, message: &M) -> Result<Envelope, DispatchError> {
        // Reject unmapped kinds before paying for serialization
        self.resolve(&M::kind())?;
        Ok(Envelope::encode(message)?)
    }

    fn encode_all<M: Message>(&self, messages: &[M]) -> Result<Vec<Envelope>, DispatchError> {
        if messages.is_empty() {
            return Ok(Vec::new());
        }
        self.resolve(&M::kind())?;
        messages
            .iter()
            .map(|message| Envelope::encode(message).map_err(DispatchError::from))
            .collect()
    }

    fn resolve_batch(
        &self,
        envelopes: &[Envelope],
        operation: &'static str,
    ) -> Result<Vec<&'a Arc<H>>, DispatchError> {
        if envelopes.is_empty() {
            return Ok(Vec::new());
        }

        let targets = self.table.resolve_all(envelopes.iter().map(Envelope::kind))?;
        debug!(
            destination = %self.destination(),
            operation,
            count = envelopes.len(),
            "forwarding batch"
        );
        Ok(targets)
    }

    fn forward<R>(
        &self,
        envelopes: &[Envelope],
        operation: &'static str,
        mut deliver: impl FnMut(&H, &Envelope) -> Result<R, TransportError>,
    ) -> Result<Vec<R>, DispatchError> {
        let targets = self.resolve_batch(envelopes, operation)?;

        targets
            .into_iter()
            .zip(envelopes)
            .map(|(target, envelope)| deliver(&**target, envelope).map_err(DispatchError::from))
            .collect()
    }
}
