//! Message pump: one dedicated thread per running server.
//!
//! # Architecture
//!
//! The pump acquires its endpoint, blocks in the endpoint's retrieval loop,
//! and releases the endpoint when the loop ends. All three happen on the
//! pump thread; the endpoint never leaves it.
//!
//! ```text
//! Created ──acquire ok──▶ Listening ──quit sentinel──▶ Draining ──release──▶ Terminated
//!    │                        │
//!    └──acquire failed──▶ Failed ◀──transport dead (max_consecutive_failures)
//! ```
//!
//! The only inbound cross-thread traffic is the quit sentinel, posted through
//! the [`ShutdownSignal`](signal::ShutdownSignal) slot. A sentinel that could
//! not be enqueued is honoured before the next retrieval instead; messages
//! still queued at that point are dropped with the endpoint.

pub mod handle;
pub(crate) mod signal;
pub(crate) mod status;

pub use handle::PumpHandle;
pub use status::PumpPhase;

use crate::dispatcher::{DispatchCounts, Dispatcher, TextHandler};
use crate::error::{EndpointError, ServerError};
use crate::identity::ServerIdentity;
use crate::pump::signal::ShutdownSignal;
use crate::pump::status::PumpStatus;
use crate::registrar::{Endpoint, Registrar, Retrieved};

use common::ErrorLocation;

use std::panic::Location;
use std::sync::Arc;

use log::{debug, error, info, warn};

pub const MAX_CONSECUTIVE_FAILURES_DEFAULT: u32 = 64;

/// Tunables for the retrieval loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PumpSettings {
    /// Retrieval errors in a row, with no successful retrieval between them,
    /// after which the endpoint is considered dead.
    pub max_consecutive_failures: u32,
}

impl Default for PumpSettings {
    fn default() -> Self {
        Self {
            max_consecutive_failures: MAX_CONSECUTIVE_FAILURES_DEFAULT,
        }
    }
}

/// What a pump did, returned when its thread exits cleanly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PumpReport {
    pub identity: ServerIdentity,
    pub class_label: String,
    pub counts: DispatchCounts,
    /// Non-fatal retrieval errors over the pump's life.
    pub retrieval_errors: u64,
    /// Teardown steps that reported an error (each was logged).
    pub teardown_errors: usize,
}

pub(crate) struct Pump<R: Registrar> {
    identity: ServerIdentity,
    registrar: Arc<R>,
    dispatcher: Dispatcher,
    settings: PumpSettings,
    status: Arc<PumpStatus>,
    signal: Arc<ShutdownSignal>,
    previous: Option<Arc<PumpStatus>>,
}

impl<R: Registrar> Pump<R> {
    pub(crate) fn new(
        identity: ServerIdentity,
        registrar: Arc<R>,
        handler: Arc<dyn TextHandler>,
        settings: PumpSettings,
        status: Arc<PumpStatus>,
        signal: Arc<ShutdownSignal>,
    ) -> Self {
        Self {
            identity,
            registrar,
            dispatcher: Dispatcher::new(handler),
            settings,
            status,
            signal,
            previous: None,
        }
    }

    /// Make `run` wait for the pump of the previous start to finish before
    /// acquiring, so a restart never races the old endpoint for the name.
    pub(crate) fn after(mut self, previous: Option<Arc<PumpStatus>>) -> Self {
        self.previous = previous;
        self
    }

    /// Thread body: acquire, pump until quit, release.
    pub(crate) fn run(self) -> Result<PumpReport, ServerError> {
        if let Some(previous) = &self.previous {
            debug!("Waiting for the previous pump of '{}' to finish", self.identity);
            previous.wait_until_finished();
        }

        let mut endpoint = match self.registrar.acquire(&self.identity, self.dispatcher.clone()) {
            Ok(endpoint) => endpoint,
            Err(e) => {
                error!(
                    "Failed to create {} endpoint for '{}': {e}",
                    self.registrar.backend(),
                    self.identity
                );
                self.signal.close();
                self.status.set_phase(PumpPhase::Failed);
                return Err(ServerError::EndpointCreation {
                    message: format!("Cannot create endpoint '{}'", self.identity),
                    location: ErrorLocation::from(Location::caller()),
                    source: e,
                });
            }
        };

        let class_label = endpoint.class_label().to_string();

        match endpoint.quit_poster() {
            Ok(poster) => self.signal.arm(poster),
            Err(e) => {
                // Without a poster stop() cannot reach this pump.
                error!("No quit poster for '{}': {e}", self.identity);
                self.signal.close();
                let teardown_errors = self.release(endpoint);
                debug!("Released '{}' with {teardown_errors} teardown errors", self.identity);
                self.status.set_phase(PumpPhase::Failed);
                return Err(ServerError::EndpointCreation {
                    message: format!("Cannot signal endpoint '{}'", self.identity),
                    location: ErrorLocation::from(Location::caller()),
                    source: e,
                });
            }
        }

        self.status.set_listening(&class_label);
        info!(
            "Listening as '{}' on {} ({class_label})",
            self.identity,
            self.registrar.backend()
        );

        let outcome = self.pump(&mut endpoint);

        self.signal.close();
        let teardown_errors = self.release(endpoint);

        match outcome {
            Ok(retrieval_errors) => {
                self.status.set_phase(PumpPhase::Terminated);
                info!("Pump for '{}' terminated", self.identity);
                Ok(PumpReport {
                    identity: self.identity.clone(),
                    class_label,
                    counts: self.dispatcher.counts(),
                    retrieval_errors,
                    teardown_errors,
                })
            }
            Err(e) => {
                error!("Pump for '{}' failed: {e}", self.identity);
                self.status.set_phase(PumpPhase::Failed);
                Err(e)
            }
        }
    }

    /// Retrieval loop. Returns the number of non-fatal retrieval errors.
    fn pump(&self, endpoint: &mut R::Endpoint) -> Result<u64, ServerError> {
        let mut retrieval_errors = 0u64;
        let mut consecutive_failures = 0u32;

        loop {
            if self.signal.is_deferred() {
                self.status.set_phase(PumpPhase::Draining);
                debug!("Honouring deferred shutdown of '{}'", self.identity);
                return Ok(retrieval_errors);
            }

            match endpoint.retrieve() {
                Ok(Retrieved::Continue) => consecutive_failures = 0,
                Ok(Retrieved::Quit) => {
                    self.status.set_phase(PumpPhase::Draining);
                    debug!("Quit sentinel retrieved by '{}'", self.identity);
                    return Ok(retrieval_errors);
                }
                Err(e) => {
                    retrieval_errors += 1;
                    consecutive_failures += 1;
                    warn!("Retrieval on '{}' failed: {e}", self.identity);

                    if consecutive_failures >= self.settings.max_consecutive_failures {
                        return Err(dead_endpoint(&self.identity, consecutive_failures, e));
                    }
                }
            }
        }
    }

    fn release(&self, endpoint: R::Endpoint) -> usize {
        let errors = endpoint.release();
        for error in &errors {
            warn!("Teardown of '{}': {error}", self.identity);
        }
        errors.len()
    }
}

#[track_caller]
fn dead_endpoint(identity: &ServerIdentity, failures: u32, last: EndpointError) -> ServerError {
    ServerError::Retrieval {
        message: format!("Endpoint '{identity}' failed {failures} retrievals in a row"),
        location: ErrorLocation::from(Location::caller()),
        source: last,
    }
}
