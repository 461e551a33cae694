//! Caller-side handle to a running pump thread.

use crate::error::ServerError;
use crate::identity::ServerIdentity;
use crate::pump::status::{PumpPhase, PumpStatus};
use crate::pump::PumpReport;

use common::ErrorLocation;

use std::panic::Location;
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

/// Handle to the pump thread started by [`VimServer::start`](crate::VimServer::start).
///
/// Dropping the handle detaches the thread; it keeps running until the server
/// is stopped. Holding it only adds observation: phase, class label, and the
/// pump's final [`PumpReport`] or fatal error through [`join`](Self::join).
///
/// # Examples
///
/// ```no_run
/// use listener_core::{PumpPhase, VimServer};
/// use std::sync::Arc;
/// use std::time::Duration;
///
/// let server = VimServer::new("GVIM").unwrap();
/// let pump = server.start(Arc::new(|text: &str| println!("{text}"))).unwrap();
/// assert_eq!(pump.wait_until_listening(Duration::from_secs(1)), PumpPhase::Listening);
/// server.stop();
/// let report = pump.join().unwrap();
/// println!("{} messages delivered", report.counts.delivered);
/// ```
pub struct PumpHandle {
    identity: ServerIdentity,
    status: Arc<PumpStatus>,
    thread: JoinHandle<Result<PumpReport, ServerError>>,
}

impl PumpHandle {
    pub(crate) fn new(
        identity: ServerIdentity,
        status: Arc<PumpStatus>,
        thread: JoinHandle<Result<PumpReport, ServerError>>,
    ) -> Self {
        Self {
            identity,
            status,
            thread,
        }
    }

    pub fn identity(&self) -> &ServerIdentity {
        &self.identity
    }

    pub fn phase(&self) -> PumpPhase {
        self.status.phase()
    }

    /// Class label of the endpoint, once the pump has reached `Listening`.
    pub fn class_label(&self) -> Option<String> {
        self.status.class_label()
    }

    /// Wait up to `timeout` for the pump to leave `Created` and return the
    /// phase it is in. `Listening` means the endpoint is reachable by name;
    /// `Failed` means it never will be.
    pub fn wait_until_listening(&self, timeout: Duration) -> PumpPhase {
        self.status.wait_until_started(timeout)
    }

    pub fn is_finished(&self) -> bool {
        self.thread.is_finished()
    }

    /// Wait for the pump thread to exit and return its outcome.
    ///
    /// Blocks until the server is stopped (or the pump fails on its own).
    pub fn join(self) -> Result<PumpReport, ServerError> {
        match self.thread.join() {
            Ok(outcome) => outcome,
            Err(_) => Err(ServerError::PumpPanicked {
                message: format!("Pump thread for '{}' panicked", self.identity),
                location: ErrorLocation::from(Location::caller()),
            }),
        }
    }
}
