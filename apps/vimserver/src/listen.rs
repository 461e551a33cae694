//! `vimserver listen`: run a server until Ctrl-C.

use crate::cli::{ListenArgs, config_dir};
use crate::error::AppError;
use crate::logger::initialize as LoggerInitialize;

use listener_core::config::ListenerConfig;
use listener_core::registrar::NativeRegistrar;
use listener_core::{PumpPhase, ServerIdentity, TextHandler, VimServer};

use common::ErrorLocation;

use std::io::{Write, stdout};
use std::panic::Location;
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use humantime::format_rfc3339;
use log::{error, info, warn};
use serde::Serialize;
use tokio::signal::ctrl_c;
use tokio::task::spawn_blocking;

const STARTUP_TIMEOUT: Duration = Duration::from_secs(5);

/// One received text as printed with `--json`.
#[derive(Debug, Serialize)]
pub struct ReceivedLine<'a> {
    pub server: &'a str,
    pub received_at: String,
    pub text: &'a str,
}

/// Render a received text for stdout.
pub fn format_received(server: &str, text: &str, json: bool) -> String {
    if !json {
        return text.to_string();
    }

    let line = ReceivedLine {
        server,
        received_at: format_rfc3339(SystemTime::now()).to_string(),
        text,
    };
    // Serializing two strings cannot fail.
    serde_json::to_string(&line).unwrap_or_default()
}

/// Handler printing each text on its own stdout line.
pub fn stdout_handler(server: &ServerIdentity, json: bool) -> Arc<dyn TextHandler> {
    let server = server.to_string();
    Arc::new(move |text: &str| {
        let mut out = stdout().lock();
        if let Err(e) = writeln!(out, "{}", format_received(&server, text, json)) {
            warn!("Failed to write received text: {e}");
        }
        if let Err(e) = out.flush() {
            warn!("Failed to flush stdout: {e}");
        }
    })
}

#[cfg(unix)]
pub fn native_registrar(config: &ListenerConfig) -> NativeRegistrar {
    NativeRegistrar::new(&config.server.socket_dir)
}

#[cfg(not(unix))]
pub fn native_registrar(_config: &ListenerConfig) -> NativeRegistrar {
    NativeRegistrar::default()
}

pub async fn run(args: ListenArgs) -> Result<(), AppError> {
    let config = ListenerConfig::load(&config_dir(args.config.as_ref()))?;
    LoggerInitialize(&config.logging.directory, config.log_level())?;

    let identity = match args.name {
        Some(name) => ServerIdentity::new(name)?,
        None => config.identity()?,
    };

    let server = VimServer::with_registrar(identity.clone(), native_registrar(&config))
        .with_settings(config.pump_settings());
    let pump = server.start(stdout_handler(&identity, args.json))?;

    match pump.wait_until_listening(STARTUP_TIMEOUT) {
        PumpPhase::Listening => info!("Listening as '{identity}'; press Ctrl-C to stop"),
        PumpPhase::Created => warn!("'{identity}' is not listening after {STARTUP_TIMEOUT:?}"),
        phase => info!("Pump for '{identity}' is {phase}"),
    }

    let mut joined = spawn_blocking(move || pump.join());

    let outcome = tokio::select! {
        signal = ctrl_c() => {
            if let Err(e) = signal {
                error!("Failed to wait for Ctrl-C: {e}");
            }
            info!("Shutting down '{identity}'");
            server.stop();
            (&mut joined).await
        }
        finished = &mut joined => finished,
    };

    let report = outcome.map_err(|e| AppError::Runtime {
        message: format!("Pump join task failed: {e}"),
        location: ErrorLocation::from(Location::caller()),
    })??;

    info!(
        "'{}' delivered {} texts ({} ignored, {} rejected, {} retrieval errors)",
        report.identity,
        report.counts.delivered,
        report.counts.ignored,
        report.counts.rejected,
        report.retrieval_errors
    );
    Ok(())
}
