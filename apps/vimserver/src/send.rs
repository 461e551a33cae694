//! `vimserver send`: deliver keys to a listening server.

use crate::cli::{SendArgs, config_dir};
use crate::error::AppError;

use listener_core::config::ListenerConfig;
use listener_core::{EnvelopeSender, ServerIdentity};

use log::debug;

pub fn run(args: SendArgs) -> Result<(), AppError> {
    let config = ListenerConfig::load(&config_dir(args.config.as_ref()))?;
    let identity = match args.name {
        Some(name) => ServerIdentity::new(name)?,
        None => config.identity()?,
    };

    let sender = connect(&config, &identity)?;

    if let Some(encoding) = &args.encoding {
        sender.announce_encoding(encoding)?;
    }
    sender.send_keys(&args.keys)?;

    debug!("Sent {} bytes to '{identity}'", args.keys.len());
    Ok(())
}

#[cfg(unix)]
fn connect(
    config: &ListenerConfig,
    identity: &ServerIdentity,
) -> Result<impl EnvelopeSender, AppError> {
    use listener_core::registrar::unix::UnixSender;

    Ok(UnixSender::new(&config.server.socket_dir)
        .with_connect_timeout(config.client.connect_timeout)
        .connect(identity.as_str())?)
}

#[cfg(windows)]
fn connect(
    _config: &ListenerConfig,
    identity: &ServerIdentity,
) -> Result<impl EnvelopeSender, AppError> {
    use listener_core::registrar::win32::Win32Sender;

    Ok(Win32Sender::find(identity.as_str())?)
}

#[cfg(not(any(unix, windows)))]
fn connect(
    _config: &ListenerConfig,
    identity: &ServerIdentity,
) -> Result<listener_core::registrar::local::LocalSender, AppError> {
    use common::ErrorLocation;
    use std::panic::Location;

    Err(AppError::Send {
        message: format!("No cross-process transport on this platform to reach '{identity}'"),
        location: ErrorLocation::from(Location::caller()),
    })
}
