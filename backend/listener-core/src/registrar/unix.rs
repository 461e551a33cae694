//! Datagram-socket backend for Unix hosts.
//!
//! Each endpoint is a `SOCK_DGRAM` socket bound at `<socket_dir>/<name>`.
//! One datagram carries one [`frame`](crate::protocol::frame), so message
//! boundaries survive the transport and a full envelope is dispatched per
//! retrieval.
//!
//! # Name exclusivity
//!
//! `bind` refuses an existing path. When it does, the registrar tests the
//! path: a socket nobody is bound to (connection refused) is a leftover from
//! a dead process and is replaced once; anything else means the name is live.

use crate::dispatcher::Dispatcher;
use crate::error::{EndpointError, ProtocolError, SendError};
use crate::identity::ServerIdentity;
use crate::protocol::Envelope;
use crate::protocol::frame::{self, Frame, MAX_FRAME_LEN, MAX_PAYLOAD, QuitToken};
use crate::registrar::class_table::ClassTable;
use crate::registrar::{
    Endpoint, EnvelopeSender, QuitPoster, Registrar, Retrieved, default_socket_dir,
};

use common::ErrorLocation;

use std::fs::{self, DirBuilder};
use std::io::ErrorKind;
use std::marker::PhantomData;
use std::os::unix::fs::{DirBuilderExt, FileTypeExt};
use std::os::unix::net::UnixDatagram;
use std::panic::Location;
use std::path::{Path, PathBuf};
use std::thread::sleep;
use std::time::Duration;

use backoff::{ExponentialBackoff, backoff::Backoff};
use log::{debug, info, trace, warn};
use once_cell::sync::Lazy;
use uuid::Uuid;

const SOCKET_DIR_MODE: u32 = 0o700;
const CONNECT_TIMEOUT_DEFAULT: Duration = Duration::from_secs(2);
const CONNECT_INITIAL_INTERVAL: Duration = Duration::from_millis(10);

static CLASS_TABLE: Lazy<ClassTable> = Lazy::new(ClassTable::new);

/// Class labels registered by Unix endpoints in this process.
pub fn registered_classes() -> &'static ClassTable {
    &CLASS_TABLE
}

/// Registrar binding endpoints below one socket directory.
#[derive(Debug, Clone)]
pub struct UnixRegistrar {
    socket_dir: PathBuf,
}

impl UnixRegistrar {
    pub fn new(socket_dir: impl Into<PathBuf>) -> Self {
        Self {
            socket_dir: socket_dir.into(),
        }
    }

    pub fn socket_dir(&self) -> &Path {
        &self.socket_dir
    }

    pub fn socket_path(&self, identity: &ServerIdentity) -> PathBuf {
        self.socket_dir.join(identity.as_str())
    }

    fn ensure_socket_dir(&self) -> Result<(), EndpointError> {
        DirBuilder::new()
            .recursive(true)
            .mode(SOCKET_DIR_MODE)
            .create(&self.socket_dir)
            .map_err(|e| EndpointError::Create {
                message: format!(
                    "Failed to create socket directory {}: {e}",
                    self.socket_dir.display()
                ),
                location: ErrorLocation::from(Location::caller()),
            })
    }
}

impl Default for UnixRegistrar {
    fn default() -> Self {
        Self::new(default_socket_dir())
    }
}

impl Registrar for UnixRegistrar {
    type Endpoint = UnixEndpoint;

    fn backend(&self) -> &'static str {
        "unix"
    }

    fn acquire(
        &self,
        identity: &ServerIdentity,
        dispatcher: Dispatcher,
    ) -> Result<UnixEndpoint, EndpointError> {
        self.ensure_socket_dir()?;

        let class_label = CLASS_TABLE.register(identity)?;
        let path = self.socket_path(identity);

        let socket = match bind_exclusive(&path) {
            Ok(socket) => socket,
            Err(e) => {
                if let Err(unregister) = CLASS_TABLE.unregister(&class_label) {
                    warn!("Failed to unregister {class_label} after bind failure: {unregister}");
                }
                return Err(e);
            }
        };

        debug!(
            "Bound unix endpoint '{identity}' at {} ({class_label})",
            path.display()
        );

        Ok(UnixEndpoint {
            identity: identity.clone(),
            class_label,
            path,
            token: *Uuid::new_v4().as_bytes(),
            socket,
            buffer: vec![0; MAX_FRAME_LEN + 1],
            dispatcher,
            released: false,
            _not_send: PhantomData,
        })
    }
}

fn bind_exclusive(path: &Path) -> Result<UnixDatagram, EndpointError> {
    match UnixDatagram::bind(path) {
        Ok(socket) => return Ok(socket),
        Err(e) if e.kind() == ErrorKind::AddrInUse => {}
        Err(e) => {
            return Err(EndpointError::Create {
                message: format!("Failed to bind {}: {e}", path.display()),
                location: ErrorLocation::from(Location::caller()),
            });
        }
    }

    if !is_stale_socket(path) {
        return Err(EndpointError::NameInUse {
            message: format!("An endpoint is already listening at {}", path.display()),
            location: ErrorLocation::from(Location::caller()),
        });
    }

    info!("Replacing stale socket at {}", path.display());
    fs::remove_file(path).map_err(|e| EndpointError::Create {
        message: format!("Failed to remove stale socket {}: {e}", path.display()),
        location: ErrorLocation::from(Location::caller()),
    })?;

    UnixDatagram::bind(path).map_err(|e| {
        let kind = e.kind();
        let message = format!("Failed to bind {}: {e}", path.display());
        let location = ErrorLocation::from(Location::caller());
        if kind == ErrorKind::AddrInUse {
            EndpointError::NameInUse { message, location }
        } else {
            EndpointError::Create { message, location }
        }
    })
}

fn is_stale_socket(path: &Path) -> bool {
    let is_socket = fs::symlink_metadata(path)
        .map(|meta| meta.file_type().is_socket())
        .unwrap_or(false);
    if !is_socket {
        return false;
    }

    match UnixDatagram::unbound().and_then(|socket| socket.connect(path)) {
        Ok(()) => false,
        Err(e) => e.kind() == ErrorKind::ConnectionRefused,
    }
}

/// Bound datagram socket plus its class label.
pub struct UnixEndpoint {
    identity: ServerIdentity,
    class_label: String,
    path: PathBuf,
    token: QuitToken,
    socket: UnixDatagram,
    buffer: Vec<u8>,
    dispatcher: Dispatcher,
    released: bool,
    _not_send: PhantomData<*const ()>,
}

impl UnixEndpoint {
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn teardown(&mut self) -> Vec<EndpointError> {
        if self.released {
            return Vec::new();
        }
        self.released = true;

        let mut errors = Vec::new();

        if let Err(e) = CLASS_TABLE.unregister(&self.class_label) {
            errors.push(e);
        }

        if let Err(e) = fs::remove_file(&self.path) {
            errors.push(EndpointError::Destroy {
                message: format!("Failed to remove socket {}: {e}", self.path.display()),
                location: ErrorLocation::from(Location::caller()),
            });
        }

        errors
    }
}

impl Endpoint for UnixEndpoint {
    fn class_label(&self) -> &str {
        &self.class_label
    }

    fn quit_poster(&self) -> Result<Box<dyn QuitPoster>, EndpointError> {
        let datagram = frame::encode(&Frame::Quit(self.token)).map_err(|e| EndpointError::Post {
            message: format!("Failed to encode quit frame: {e}"),
            location: ErrorLocation::from(Location::caller()),
        })?;

        Ok(Box::new(UnixQuitPoster {
            path: self.path.clone(),
            datagram,
        }))
    }

    fn retrieve(&mut self) -> Result<Retrieved, EndpointError> {
        let received = match self.socket.recv(&mut self.buffer) {
            Ok(received) => received,
            Err(e) if e.kind() == ErrorKind::Interrupted => return Ok(Retrieved::Continue),
            Err(e) => {
                return Err(EndpointError::Retrieve {
                    message: format!("recv on {} failed: {e}", self.path.display()),
                    location: ErrorLocation::from(Location::caller()),
                });
            }
        };

        trace!("Received {received}-byte datagram on '{}'", self.identity);

        if received > MAX_FRAME_LEN {
            self.dispatcher.reject(ProtocolError::Oversized {
                message: format!("Datagram exceeds the {MAX_PAYLOAD}-byte payload limit"),
                location: ErrorLocation::from(Location::caller()),
            });
            return Ok(Retrieved::Continue);
        }

        match frame::decode(&self.buffer[..received]) {
            Ok(Frame::Envelope(envelope)) => self.dispatcher.route(&envelope),
            Ok(Frame::Quit(token)) if token == self.token => return Ok(Retrieved::Quit),
            Ok(Frame::Quit(_)) => self.dispatcher.reject(ProtocolError::Frame {
                message: "Quit frame with a foreign token".to_string(),
                location: ErrorLocation::from(Location::caller()),
            }),
            Err(e) => self.dispatcher.reject(e),
        }

        Ok(Retrieved::Continue)
    }

    fn release(mut self) -> Vec<EndpointError> {
        self.teardown()
    }
}

impl Drop for UnixEndpoint {
    fn drop(&mut self) {
        for error in self.teardown() {
            warn!("Unix endpoint teardown on drop: {error}");
        }
    }
}

struct UnixQuitPoster {
    path: PathBuf,
    datagram: Vec<u8>,
}

impl QuitPoster for UnixQuitPoster {
    fn post_quit(&self) -> Result<(), EndpointError> {
        let socket = UnixDatagram::unbound()?;
        socket.set_nonblocking(true)?;

        match socket.send_to(&self.datagram, &self.path) {
            Ok(_) => Ok(()),
            Err(e) if e.kind() == ErrorKind::WouldBlock => Err(EndpointError::QueueFull {
                message: format!("Receive queue of {} is full", self.path.display()),
                location: ErrorLocation::from(Location::caller()),
            }),
            Err(e) => Err(EndpointError::Post {
                message: format!("Failed to post quit to {}: {e}", self.path.display()),
                location: ErrorLocation::from(Location::caller()),
            }),
        }
    }
}

/// Client for Unix endpoints below one socket directory.
#[derive(Debug, Clone)]
pub struct UnixSender {
    socket_dir: PathBuf,
    connect_timeout: Duration,
}

impl UnixSender {
    pub fn new(socket_dir: impl Into<PathBuf>) -> Self {
        Self {
            socket_dir: socket_dir.into(),
            connect_timeout: CONNECT_TIMEOUT_DEFAULT,
        }
    }

    /// How long [`connect`](Self::connect) keeps retrying a missing endpoint.
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Connect to the endpoint named `name`, retrying with exponential
    /// backoff while it does not exist yet.
    ///
    /// # Errors
    ///
    /// - [`SendError::Timeout`] - the endpoint did not appear in time
    /// - [`SendError::Io`] - any other socket failure
    #[track_caller]
    pub fn connect(&self, name: &str) -> Result<UnixConnection, SendError> {
        let path = self.socket_dir.join(name);
        let socket = UnixDatagram::unbound()?;

        let mut backoff = ExponentialBackoff {
            initial_interval: CONNECT_INITIAL_INTERVAL,
            max_elapsed_time: Some(self.connect_timeout),
            ..Default::default()
        };

        loop {
            match socket.connect(&path) {
                Ok(()) => {
                    debug!("Connected to {}", path.display());
                    return Ok(UnixConnection { path, socket });
                }
                Err(e) if is_not_ready(&e) => match backoff.next_backoff() {
                    Some(duration) => {
                        trace!("{} not ready ({e}), retrying after {duration:?}", path.display());
                        sleep(duration);
                    }
                    None => {
                        return Err(SendError::Timeout {
                            message: format!(
                                "No endpoint at {} within {:?}",
                                path.display(),
                                self.connect_timeout
                            ),
                            location: ErrorLocation::from(Location::caller()),
                        });
                    }
                },
                Err(e) => return Err(SendError::from(e)),
            }
        }
    }
}

fn is_not_ready(error: &std::io::Error) -> bool {
    matches!(error.kind(), ErrorKind::NotFound | ErrorKind::ConnectionRefused)
}

/// A datagram socket connected to one endpoint.
#[derive(Debug)]
pub struct UnixConnection {
    path: PathBuf,
    socket: UnixDatagram,
}

impl UnixConnection {
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Send raw bytes as one datagram, bypassing framing.
    pub fn send_raw(&self, bytes: &[u8]) -> Result<(), SendError> {
        self.socket.send(bytes)?;
        Ok(())
    }
}

impl EnvelopeSender for UnixConnection {
    #[track_caller]
    fn send(&self, envelope: &Envelope) -> Result<(), SendError> {
        let datagram = frame::encode(&Frame::Envelope(envelope.clone())).map_err(|e| {
            SendError::Oversized {
                message: e.to_string(),
                location: ErrorLocation::from(Location::caller()),
            }
        })?;

        match self.socket.send(&datagram) {
            Ok(_) => Ok(()),
            Err(e) if e.kind() == ErrorKind::ConnectionRefused => Err(SendError::NotFound {
                message: format!("Endpoint at {} is gone", self.path.display()),
                location: ErrorLocation::from(Location::caller()),
            }),
            Err(e) => Err(SendError::from(e)),
        }
    }
}
