//! Protocol dispatcher: routes decoded envelopes to the text handler.
//!
//! The dispatcher runs on the pump thread and is called once per retrieved
//! envelope, before the next retrieval. It never stores envelopes.

use crate::error::ProtocolError;
use crate::protocol::{Envelope, MessageTag, decode_text};

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use log::{debug, error, trace, warn};

/// Receives text sent by a client.
///
/// # Backpressure
///
/// `receive` is called synchronously on the pump thread. While it runs, the
/// pump retrieves nothing: a handler that blocks for a second delays every
/// later message by that second. This is how a slow consumer throttles
/// senders; there is no internal queue to overflow. Invocations are strictly
/// sequential, never concurrent.
pub trait TextHandler: Send + Sync + 'static {
    fn receive(&self, text: &str);
}

impl<F> TextHandler for F
where
    F: Fn(&str) + Send + Sync + 'static,
{
    fn receive(&self, text: &str) {
        self(text)
    }
}

/// What the dispatcher did with one envelope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dispatched {
    /// Tag 0: the handler was invoked with the decoded text.
    Delivered,
    /// Tag 20: the encoding name was decoded and discarded.
    EncodingAnnounced(String),
    /// Any other tag, reserved or not.
    Ignored(MessageTag),
}

/// Snapshot of a dispatcher's counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchCounts {
    pub delivered: u64,
    pub encodings: u64,
    pub ignored: u64,
    pub rejected: u64,
}

impl DispatchCounts {
    pub fn total(&self) -> u64 {
        self.delivered + self.encodings + self.ignored + self.rejected
    }
}

#[derive(Debug, Default)]
pub(crate) struct DispatchStats {
    delivered: AtomicU64,
    encodings: AtomicU64,
    ignored: AtomicU64,
    rejected: AtomicU64,
}

impl DispatchStats {
    pub(crate) fn snapshot(&self) -> DispatchCounts {
        DispatchCounts {
            delivered: self.delivered.load(Ordering::Relaxed),
            encodings: self.encodings.load(Ordering::Relaxed),
            ignored: self.ignored.load(Ordering::Relaxed),
            rejected: self.rejected.load(Ordering::Relaxed),
        }
    }
}

/// Decodes envelopes by tag and invokes the handler for recognized ones.
#[derive(Clone)]
pub struct Dispatcher {
    handler: Arc<dyn TextHandler>,
    stats: Arc<DispatchStats>,
}

impl Dispatcher {
    pub fn new(handler: Arc<dyn TextHandler>) -> Self {
        Self {
            handler,
            stats: Arc::new(DispatchStats::default()),
        }
    }

    /// Dispatch a single envelope.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::Decode`] if a tag-0 or tag-20 payload is not
    /// valid UTF-8. The handler is not invoked in that case.
    pub fn dispatch(&self, envelope: &Envelope) -> Result<Dispatched, ProtocolError> {
        let tag = envelope.message_tag();
        trace!("Dispatching {tag} with {} payload bytes", envelope.payload.len());

        match tag {
            MessageTag::Keys => {
                let text = decode_text(&envelope.payload)?;
                self.handler.receive(text);
                Ok(Dispatched::Delivered)
            }
            MessageTag::Encoding => {
                // Translation is not implemented; the name is only decoded.
                let encoding = decode_text(&envelope.payload)?;
                debug!("Client announced encoding {encoding:?}, not translated");
                Ok(Dispatched::EncodingAnnounced(encoding.to_string()))
            }
            other => {
                debug!("Ignoring message with tag {other}");
                Ok(Dispatched::Ignored(other))
            }
        }
    }

    /// Dispatch on behalf of an endpoint: never fails, never unwinds.
    ///
    /// Decode failures and handler panics are logged and counted as rejected
    /// so a single bad message cannot end the pump.
    pub fn route(&self, envelope: &Envelope) {
        match catch_unwind(AssertUnwindSafe(|| self.dispatch(envelope))) {
            Ok(Ok(Dispatched::Delivered)) => {
                self.stats.delivered.fetch_add(1, Ordering::Relaxed);
            }
            Ok(Ok(Dispatched::EncodingAnnounced(_))) => {
                self.stats.encodings.fetch_add(1, Ordering::Relaxed);
            }
            Ok(Ok(Dispatched::Ignored(_))) => {
                self.stats.ignored.fetch_add(1, Ordering::Relaxed);
            }
            Ok(Err(e)) => self.reject(e),
            Err(_) => {
                error!(
                    "Handler panicked on a {} message; message dropped",
                    envelope.message_tag()
                );
                self.stats.rejected.fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    /// Record a message the endpoint could not turn into an envelope.
    pub fn reject(&self, error: ProtocolError) {
        warn!("Dropping malformed message: {error}");
        self.stats.rejected.fetch_add(1, Ordering::Relaxed);
    }

    pub fn counts(&self) -> DispatchCounts {
        self.stats.snapshot()
    }
}
