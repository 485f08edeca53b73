use thiserror::Error;

use crate::envelope::EnvelopeError;
use crate::message::MessageKind;
use crate::transport::{DestinationKind, TransportError};

/// Error type for pool operations.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// A batch contained a kind with no destination; nothing was sent.
    #[error("there is no {destination} client registered for the message kind {kind}")]
    UnmappedMessageKind {
        kind: MessageKind,
        destination: DestinationKind,
    },
    /// A handle was requested for a kind that was never registered.
    #[error("{destination} has not been registered for the message kind {kind}")]
    UnregisteredDestination {
        kind: MessageKind,
        destination: DestinationKind,
    },
    /// Payload serialization failed before anything was sent.
    #[error(transparent)]
    Envelope(#[from] EnvelopeError),
    /// The transport failed; later messages of the batch were not sent.
    #[error(transparent)]
    Transport(#[from] TransportError),
}

impl DispatchError {
    /// The kind the error is about, if it is a mapping error.
    pub fn kind(&self) -> Option<&MessageKind> {
        match self {
            DispatchError::UnmappedMessageKind { kind, .. }
            | DispatchError::UnregisteredDestination { kind, .. } => Some(kind),
            DispatchError::Envelope(_) | DispatchError::Transport(_) => None,
        }
    }

    pub fn is_transport(&self) -> bool {
        matches!(self, DispatchError::Transport(_))
    }
}
