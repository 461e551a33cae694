//! Single-slot shutdown signal between `stop()` and the pump thread.
//!
//! `stop()` may run before the pump has an endpoint to post to. The slot
//! remembers the request and the pump honours it the moment it arms the slot
//! with its quit poster, so no stop is ever lost and at most one sentinel is
//! posted per pump.
//!
//! Posting never blocks. When the sentinel cannot be enqueued (the
//! endpoint's queue is full, or posting failed) the request is marked
//! deferred and the pump checks the mark before every retrieval.

use crate::error::EndpointError;
use crate::registrar::QuitPoster;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use log::{debug, warn};

enum SignalSlot {
    Pending { requested: bool },
    Armed(Box<dyn QuitPoster>),
    Closed,
}

pub(crate) struct ShutdownSignal {
    slot: Mutex<SignalSlot>,
    deferred: AtomicBool,
}

impl ShutdownSignal {
    pub(crate) fn new() -> Self {
        Self {
            slot: Mutex::new(SignalSlot::Pending { requested: false }),
            deferred: AtomicBool::new(false),
        }
    }

    /// Ask the pump to stop. Idempotent.
    pub(crate) fn request(&self) {
        let mut slot = self.lock();
        match std::mem::replace(&mut *slot, SignalSlot::Closed) {
            SignalSlot::Pending { .. } => {
                debug!("Shutdown requested before the endpoint exists");
                *slot = SignalSlot::Pending { requested: true };
            }
            SignalSlot::Armed(poster) => self.post(poster.as_ref()),
            SignalSlot::Closed => {}
        }
    }

    /// Install the endpoint's quit poster. Posts immediately if a stop was
    /// already requested.
    pub(crate) fn arm(&self, poster: Box<dyn QuitPoster>) {
        let mut slot = self.lock();
        match *slot {
            SignalSlot::Pending { requested: true } => {
                debug!("Honouring early shutdown request");
                self.post(poster.as_ref());
                *slot = SignalSlot::Closed;
            }
            SignalSlot::Pending { requested: false } | SignalSlot::Armed(_) => {
                *slot = SignalSlot::Armed(poster);
            }
            SignalSlot::Closed => {}
        }
    }

    /// True once a stop could not be posted and must be honoured by the pump.
    pub(crate) fn is_deferred(&self) -> bool {
        self.deferred.load(Ordering::Acquire)
    }

    /// The pump is done with its endpoint; later requests do nothing.
    pub(crate) fn close(&self) {
        *self.lock() = SignalSlot::Closed;
    }

    fn post(&self, poster: &dyn QuitPoster) {
        match poster.post_quit() {
            Ok(()) => return,
            Err(EndpointError::QueueFull { message, .. }) => {
                debug!("Quit sentinel deferred: {message}");
            }
            Err(e) => warn!("Failed to post quit sentinel, deferring to the pump: {e}"),
        }
        self.deferred.store(true, Ordering::Release);
    }

    fn lock(&self) -> MutexGuard<'_, SignalSlot> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
