pub mod config;
pub mod dispatcher;
pub mod error;
pub mod identity;
pub mod protocol;
pub mod pump;
pub mod registrar;
pub mod server;

#[cfg(test)]
mod tests;

pub use dispatcher::{Dispatched, Dispatcher, TextHandler};
pub use identity::ServerIdentity;
pub use protocol::{Envelope, MessageTag};
pub use pump::{PumpHandle, PumpPhase, PumpReport};
pub use registrar::{EnvelopeSender, Registrar};
pub use server::{ServerState, VimServer};

/// Fixed namespace every class/type label is derived from.
pub const PROTOCOL_NAMESPACE: &str = "VIM_MESSAGES";
pub const CLASS_LABEL_PREFIX: &str = const_format::concatcp!(PROTOCOL_NAMESPACE, "_");

/// Directory name used below the runtime, config and data directories.
pub const APP_DIRECTORY: &str = "vimserver";
