//! Endpoint registrar: acquire and release one named receive endpoint.
//!
//! A [`Registrar`] turns a [`ServerIdentity`] into a live [`Endpoint`] bound to
//! a [`Dispatcher`]. The endpoint comes with a fresh class/type label derived
//! from [`PROTOCOL_NAMESPACE`](crate::PROTOCOL_NAMESPACE); both are owned by
//! the thread that acquired them and released together.
//!
//! # Backends
//!
//! - [`local::LocalRegistrar`] - in-process mailboxes, every platform
//! - `unix::UnixRegistrar` - datagram sockets under a socket directory
//! - `win32::Win32Registrar` - hidden windows receiving `WM_COPYDATA`
//!
//! [`NativeRegistrar`] names the OS-native backend for the current target.
//!
//! # Thread affinity
//!
//! Endpoints are `!Send`. The thread that calls [`Registrar::acquire`] is the
//! only thread that can ever call [`Endpoint::retrieve`] on the result, which
//! is what the Win32 message queue requires. Other threads reach the endpoint
//! only through the `Send` [`QuitPoster`] it hands out.

pub mod class_table;
pub mod local;
#[cfg(unix)]
pub mod unix;
#[cfg(windows)]
pub mod win32;

pub use class_table::ClassTable;

use crate::APP_DIRECTORY;
use crate::dispatcher::Dispatcher;
use crate::error::{EndpointError, SendError};
use crate::identity::ServerIdentity;
use crate::protocol::Envelope;

use std::path::PathBuf;

#[cfg(unix)]
pub type NativeRegistrar = unix::UnixRegistrar;

#[cfg(windows)]
pub type NativeRegistrar = win32::Win32Registrar;

#[cfg(not(any(unix, windows)))]
pub type NativeRegistrar = local::LocalRegistrar;

/// Outcome of one blocking retrieval.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Retrieved {
    /// An event was retrieved and handled; keep pumping.
    Continue,
    /// The endpoint's own quit sentinel was retrieved.
    Quit,
}

/// Creates named endpoints for one transport.
pub trait Registrar: Send + Sync + 'static {
    type Endpoint: Endpoint;

    /// Short backend name for logs.
    fn backend(&self) -> &'static str;

    /// Register a fresh class label and create the endpoint named `identity`,
    /// routing its messages to `dispatcher`.
    ///
    /// # Errors
    ///
    /// - [`EndpointError::NameInUse`] - a live endpoint already has this name
    /// - [`EndpointError::Create`] - the transport rejected the registration
    ///
    /// On error nothing stays registered.
    fn acquire(
        &self,
        identity: &ServerIdentity,
        dispatcher: Dispatcher,
    ) -> Result<Self::Endpoint, EndpointError>;
}

/// A live receive endpoint, owned by the thread that acquired it.
pub trait Endpoint {
    fn class_label(&self) -> &str;

    /// Thread-safe handle that posts this endpoint's quit sentinel.
    fn quit_poster(&self) -> Result<Box<dyn QuitPoster>, EndpointError>;

    /// Block until the next event, route protocol messages to the dispatcher,
    /// and report whether the quit sentinel was seen.
    ///
    /// Malformed messages are handled inside (logged and counted by the
    /// dispatcher); an `Err` means the transport itself failed.
    fn retrieve(&mut self) -> Result<Retrieved, EndpointError>;

    /// Unregister the class label, then destroy the endpoint.
    ///
    /// Both steps always run. Failures are returned, never raised.
    fn release(self) -> Vec<EndpointError>;
}

/// Posts the quit sentinel into an endpoint's queue from any thread.
pub trait QuitPoster: Send {
    fn post_quit(&self) -> Result<(), EndpointError>;
}

/// Client side: delivers envelopes to a named endpoint.
pub trait EnvelopeSender {
    fn send(&self, envelope: &Envelope) -> Result<(), SendError>;

    /// Send `text` as keys (tag 0), NUL-terminated.
    fn send_keys(&self, text: &str) -> Result<(), SendError> {
        self.send(&Envelope::keys(text))
    }

    /// Announce the client's encoding (tag 20).
    fn announce_encoding(&self, encoding: &str) -> Result<(), SendError> {
        self.send(&Envelope::encoding(encoding))
    }
}

/// Default directory for Unix endpoints: the user's runtime directory, or the
/// system temp directory when there is none.
pub fn default_socket_dir() -> PathBuf {
    dirs::runtime_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join(APP_DIRECTORY)
}
