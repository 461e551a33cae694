//! Lifecycle facade: start and stop one named listener.
//!
//! # Architecture
//!
//! [`VimServer`] holds the identity, the registrar, and a lock-guarded
//! lifecycle. `start` spawns a pump thread and returns without waiting for
//! the endpoint; `stop` posts the quit sentinel and returns without waiting
//! for the thread. Both take the same lock, so concurrent calls serialize.
//!
//! A restart hands the new pump the status of the old one; the new thread
//! waits for the old pump to finish its teardown before acquiring the name.

use crate::dispatcher::TextHandler;
use crate::error::ServerError;
use crate::identity::ServerIdentity;
use crate::pump::signal::ShutdownSignal;
use crate::pump::status::PumpStatus;
use crate::pump::{Pump, PumpHandle, PumpPhase, PumpSettings};
use crate::registrar::{NativeRegistrar, Registrar};

use common::ErrorLocation;

use std::fmt;
use std::panic::{AssertUnwindSafe, Location, catch_unwind};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::Builder as ThreadBuilder;

use log::{debug, error, info};

/// Whether a server currently owns a pump.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ServerState {
    Stopped,
    Running,
}

impl fmt::Display for ServerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServerState::Stopped => f.write_str("stopped"),
            ServerState::Running => f.write_str("running"),
        }
    }
}

enum Lifecycle {
    Stopped {
        previous: Option<Arc<PumpStatus>>,
    },
    Running {
        status: Arc<PumpStatus>,
        signal: Arc<ShutdownSignal>,
    },
}

/// A named, one-directional message receiver.
///
/// Messages sent to the server's name are decoded on a dedicated pump thread
/// and handed to the [`TextHandler`] given to [`start`](Self::start).
/// Dropping the server stops it.
pub struct VimServer<R: Registrar = NativeRegistrar> {
    identity: ServerIdentity,
    registrar: Arc<R>,
    settings: PumpSettings,
    lifecycle: Mutex<Lifecycle>,
}

impl VimServer<NativeRegistrar> {
    /// Server using the OS-native backend with its default settings.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::InvalidIdentity`] if `name` is not a valid
    /// server name.
    #[track_caller]
    pub fn new(name: impl Into<String>) -> Result<Self, ServerError> {
        Ok(Self::with_registrar(
            ServerIdentity::new(name)?,
            NativeRegistrar::default(),
        ))
    }
}

impl<R: Registrar> VimServer<R> {
    pub fn with_registrar(identity: ServerIdentity, registrar: R) -> Self {
        Self {
            identity,
            registrar: Arc::new(registrar),
            settings: PumpSettings::default(),
            lifecycle: Mutex::new(Lifecycle::Stopped { previous: None }),
        }
    }

    pub fn with_settings(mut self, settings: PumpSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn identity(&self) -> &ServerIdentity {
        &self.identity
    }

    pub fn registrar(&self) -> &R {
        &self.registrar
    }

    pub fn settings(&self) -> PumpSettings {
        self.settings
    }

    pub fn state(&self) -> ServerState {
        match &*self.lock() {
            Lifecycle::Stopped { .. } => ServerState::Stopped,
            Lifecycle::Running { .. } => ServerState::Running,
        }
    }

    /// Start receiving messages for this server's name.
    ///
    /// Returns as soon as the pump thread exists. The endpoint is created on
    /// that thread afterwards; use [`PumpHandle::wait_until_listening`] to
    /// wait for it. A creation failure is reported through the handle, not
    /// here.
    ///
    /// # Errors
    ///
    /// - [`ServerError::AlreadyStarted`] - the server is running; the current
    ///   handler stays bound
    /// - [`ServerError::Spawn`] - the OS refused to create the thread
    #[track_caller]
    pub fn start(&self, handler: Arc<dyn TextHandler>) -> Result<PumpHandle, ServerError> {
        let mut lifecycle = self.lock();

        let previous = match &*lifecycle {
            Lifecycle::Running { .. } => {
                return Err(ServerError::AlreadyStarted {
                    message: format!("Server '{}' is already running", self.identity),
                    location: ErrorLocation::from(Location::caller()),
                });
            }
            Lifecycle::Stopped { previous } => previous
                .as_ref()
                .filter(|status| !status.phase().is_terminal())
                .cloned(),
        };

        let status = Arc::new(PumpStatus::new());
        let signal = Arc::new(ShutdownSignal::new());

        let pump = Pump::new(
            self.identity.clone(),
            Arc::clone(&self.registrar),
            handler,
            self.settings,
            Arc::clone(&status),
            Arc::clone(&signal),
        )
        .after(previous);

        let thread_status = Arc::clone(&status);
        let thread_signal = Arc::clone(&signal);
        let identity = self.identity.clone();

        let thread = ThreadBuilder::new()
            .name(format!("vimserver-pump-{}", self.identity))
            .spawn(move || match catch_unwind(AssertUnwindSafe(|| pump.run())) {
                Ok(outcome) => outcome,
                Err(_) => {
                    error!("Pump thread for '{identity}' panicked");
                    thread_signal.close();
                    thread_status.set_phase(PumpPhase::Failed);
                    Err(ServerError::PumpPanicked {
                        message: format!("Pump thread for '{identity}' panicked"),
                        location: ErrorLocation::from(Location::caller()),
                    })
                }
            })
            .map_err(|e| ServerError::Spawn {
                message: format!("Cannot spawn pump thread for '{}'", self.identity),
                location: ErrorLocation::from(Location::caller()),
                source: e,
            })?;

        *lifecycle = Lifecycle::Running {
            status: Arc::clone(&status),
            signal,
        };
        info!("Started server '{}'", self.identity);

        Ok(PumpHandle::new(self.identity.clone(), status, thread))
    }

    /// Ask the pump to shut down. No-op when stopped.
    ///
    /// Returns once the quit sentinel is posted (or queued for a pump that
    /// has no endpoint yet); it does not wait for the thread to exit.
    pub fn stop(&self) {
        let mut lifecycle = self.lock();

        let Lifecycle::Running { status, signal } = &*lifecycle else {
            debug!("Stop on '{}' ignored: not running", self.identity);
            return;
        };

        signal.request();
        let previous = Some(Arc::clone(status));
        *lifecycle = Lifecycle::Stopped { previous };
        info!("Stopped server '{}'", self.identity);
    }

    fn lock(&self) -> MutexGuard<'_, Lifecycle> {
        self.lifecycle.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<R: Registrar> Drop for VimServer<R> {
    fn drop(&mut self) {
        self.stop();
    }
}

impl<R: Registrar> fmt::Debug for VimServer<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VimServer")
            .field("identity", &self.identity)
            .field("backend", &self.registrar.backend())
            .field("state", &self.state())
            .finish()
    }
}
