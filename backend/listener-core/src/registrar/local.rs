//! In-process registrar: named mailboxes in a registrar-owned table.
//!
//! Behaves like the OS backends (exclusive names, class labels, token-checked
//! quit sentinel, `!Send` endpoints) without touching the host, which makes it
//! the backend for embedding the receiver inside one process and for tests.

use crate::dispatcher::Dispatcher;
use crate::error::{EndpointError, SendError};
use crate::identity::ServerIdentity;
use crate::protocol::Envelope;
use crate::protocol::frame::{QUIT_TOKEN_LEN, QuitToken};
use crate::registrar::class_table::ClassTable;
use crate::registrar::{Endpoint, EnvelopeSender, QuitPoster, Registrar, Retrieved};

use common::ErrorLocation;

use std::collections::HashMap;
use std::marker::PhantomData;
use std::panic::Location;
use std::sync::mpsc::{Receiver, Sender, channel};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use log::{debug, warn};
use uuid::Uuid;

enum LocalFrame {
    Envelope(Envelope),
    Quit(QuitToken),
}

type Mailboxes = HashMap<ServerIdentity, Sender<LocalFrame>>;

/// Registrar whose endpoints live in this process only.
///
/// Clones share the same name table, so a clone handed to a client can reach
/// endpoints acquired through the original.
#[derive(Clone, Default)]
pub struct LocalRegistrar {
    mailboxes: Arc<Mutex<Mailboxes>>,
    classes: Arc<ClassTable>,
}

impl LocalRegistrar {
    pub fn new() -> Self {
        Self::default()
    }

    /// Client handle addressing the endpoint currently named `name`.
    ///
    /// # Errors
    ///
    /// Returns [`SendError::NotFound`] if no endpoint has that name.
    #[track_caller]
    pub fn sender(&self, name: &str) -> Result<LocalSender, SendError> {
        let tx = self
            .lock()
            .iter()
            .find(|(identity, _)| identity.as_str() == name)
            .map(|(_, tx)| tx.clone())
            .ok_or_else(|| SendError::NotFound {
                message: format!("No local endpoint named '{name}'"),
                location: ErrorLocation::from(Location::caller()),
            })?;

        Ok(LocalSender {
            name: name.to_string(),
            tx,
        })
    }

    pub fn is_registered(&self, name: &str) -> bool {
        self.lock().keys().any(|identity| identity.as_str() == name)
    }

    pub fn classes(&self) -> &ClassTable {
        &self.classes
    }

    fn lock(&self) -> MutexGuard<'_, Mailboxes> {
        self.mailboxes.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Registrar for LocalRegistrar {
    type Endpoint = LocalEndpoint;

    fn backend(&self) -> &'static str {
        "local"
    }

    fn acquire(
        &self,
        identity: &ServerIdentity,
        dispatcher: Dispatcher,
    ) -> Result<LocalEndpoint, EndpointError> {
        let class_label = self.classes.register(identity)?;

        let (tx, rx) = channel();
        {
            let mut mailboxes = self.lock();
            if mailboxes.contains_key(identity) {
                drop(mailboxes);
                if let Err(e) = self.classes.unregister(&class_label) {
                    warn!("Failed to unregister {class_label} after name clash: {e}");
                }
                return Err(EndpointError::NameInUse {
                    message: format!("Local endpoint '{identity}' already exists"),
                    location: ErrorLocation::from(Location::caller()),
                });
            }
            mailboxes.insert(identity.clone(), tx.clone());
        }

        debug!("Acquired local endpoint '{identity}' ({class_label})");

        Ok(LocalEndpoint {
            identity: identity.clone(),
            class_label,
            token: *Uuid::new_v4().as_bytes(),
            rx,
            tx,
            registrar: self.clone(),
            dispatcher,
            released: false,
            _not_send: PhantomData,
        })
    }
}

/// Mailbox endpoint; see [`LocalRegistrar`].
pub struct LocalEndpoint {
    identity: ServerIdentity,
    class_label: String,
    token: QuitToken,
    rx: Receiver<LocalFrame>,
    tx: Sender<LocalFrame>,
    registrar: LocalRegistrar,
    dispatcher: Dispatcher,
    released: bool,
    _not_send: PhantomData<*const ()>,
}

impl LocalEndpoint {
    fn teardown(&mut self) -> Vec<EndpointError> {
        if self.released {
            return Vec::new();
        }
        self.released = true;

        let mut errors = Vec::new();

        if let Err(e) = self.registrar.classes.unregister(&self.class_label) {
            errors.push(e);
        }

        if self.registrar.lock().remove(&self.identity).is_none() {
            errors.push(EndpointError::Destroy {
                message: format!("Local endpoint '{}' was not in the table", self.identity),
                location: ErrorLocation::from(Location::caller()),
            });
        }

        errors
    }
}

impl Endpoint for LocalEndpoint {
    fn class_label(&self) -> &str {
        &self.class_label
    }

    fn quit_poster(&self) -> Result<Box<dyn QuitPoster>, EndpointError> {
        Ok(Box::new(LocalQuitPoster {
            tx: self.tx.clone(),
            token: self.token,
        }))
    }

    fn retrieve(&mut self) -> Result<Retrieved, EndpointError> {
        // The endpoint holds a sender itself, so recv only fails if that
        // invariant is broken.
        let frame = self.rx.recv().map_err(|e| EndpointError::Retrieve {
            message: format!("Local mailbox '{}' disconnected: {e}", self.identity),
            location: ErrorLocation::from(Location::caller()),
        })?;

        match frame {
            LocalFrame::Envelope(envelope) => {
                self.dispatcher.route(&envelope);
                Ok(Retrieved::Continue)
            }
            LocalFrame::Quit(token) if token == self.token => Ok(Retrieved::Quit),
            LocalFrame::Quit(_) => {
                debug!("Ignoring quit frame with a foreign token on '{}'", self.identity);
                Ok(Retrieved::Continue)
            }
        }
    }

    fn release(mut self) -> Vec<EndpointError> {
        self.teardown()
    }
}

impl Drop for LocalEndpoint {
    fn drop(&mut self) {
        for error in self.teardown() {
            warn!("Local endpoint teardown on drop: {error}");
        }
    }
}

struct LocalQuitPoster {
    tx: Sender<LocalFrame>,
    token: QuitToken,
}

impl QuitPoster for LocalQuitPoster {
    fn post_quit(&self) -> Result<(), EndpointError> {
        self.tx
            .send(LocalFrame::Quit(self.token))
            .map_err(|_| EndpointError::Post {
                message: "Local endpoint is already gone".to_string(),
                location: ErrorLocation::from(Location::caller()),
            })
    }
}

/// Client handle for one local endpoint.
///
/// Bound to the endpoint that existed when it was created: after that
/// endpoint is released, sends fail even if a new endpoint takes the name.
pub struct LocalSender {
    name: String,
    tx: Sender<LocalFrame>,
}

impl LocalSender {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Send a quit frame carrying an arbitrary token, as a foreign process
    /// would. The endpoint ignores it unless the token happens to match.
    pub fn send_forged_quit(&self) -> Result<(), SendError> {
        self.deliver(LocalFrame::Quit([0; QUIT_TOKEN_LEN]))
    }

    #[track_caller]
    fn deliver(&self, frame: LocalFrame) -> Result<(), SendError> {
        self.tx.send(frame).map_err(|_| SendError::NotFound {
            message: format!("Local endpoint '{}' has been released", self.name),
            location: ErrorLocation::from(Location::caller()),
        })
    }
}

impl EnvelopeSender for LocalSender {
    fn send(&self, envelope: &Envelope) -> Result<(), SendError> {
        self.deliver(LocalFrame::Envelope(envelope.clone()))
    }
}
