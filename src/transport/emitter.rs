//! Topic that fans out to in-process listeners via an `EventEmitter`.

use std::sync::{Mutex, PoisonError};

use chrono::{DateTime, Utc};
use event_emitter_rs::EventEmitter;

use super::{Destination, SequenceNumber, Topic, TransportError};
use crate::envelope::Envelope;

/// A topic whose subscribers are closures in the same process.
///
/// Bodies are emitted as UTF-8 JSON strings on an event named after the topic
/// path. Listeners run on the emitter's own threads. Scheduled delivery is not
/// supported.
///
/// **Requires the `emitter` feature to be enabled.**
pub struct EmitterTopic {
    path: String,
    emitter: Mutex<EventEmitter>,
}

impl EmitterTopic {
    pub fn new(path: impl Into<String>) -> Self {
        Self::with_emitter(path, EventEmitter::new())
    }

    pub fn with_emitter(path: impl Into<String>, emitter: EventEmitter) -> Self {
        Self {
            path: path.into(),
            emitter: Mutex::new(emitter),
        }
    }

    /// Register a listener receiving each JSON body sent to this topic.
    pub fn on<F>(&self, listener: F)
    where
        F: Fn(String) + Send + Sync + 'static,
    {
        self.emitter
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .on(&self.path, listener);
    }

    fn unsupported(&self) -> TransportError {
        TransportError::Rejected(format!(
            "{}: scheduled delivery is not supported by emitter topics",
            self.path
        ))
    }
}

impl Destination for EmitterTopic {
    fn path(&self) -> &str {
        &self.path
    }

    fn send(&self, envelope: &Envelope) -> Result<(), TransportError> {
        let body = String::from_utf8_lossy(envelope.body()).into_owned();
        self.emitter
            .lock()
            .map_err(|_| TransportError::ConnectionFailed(format!("{}: emitter poisoned", self.path)))?
            .emit(&self.path, body);
        Ok(())
    }

    fn schedule(
        &self,
        _envelope: &Envelope,
        _deliver_at: DateTime<Utc>,
    ) -> Result<SequenceNumber, TransportError> {
        Err(self.unsupported())
    }

    fn cancel_scheduled(&self, _sequence: SequenceNumber) -> Result<(), TransportError> {
        Err(self.unsupported())
    }
}

impl Topic for EmitterTopic {}
