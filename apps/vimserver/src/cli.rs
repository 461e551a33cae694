//! Command-line surface.

use listener_core::APP_DIRECTORY;

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(
    name = "vimserver",
    version,
    about = "Receive text sent to a named Vim-style server endpoint"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Listen under a server name and print every text received.
    Listen(ListenArgs),
    /// Send keys to a listening server.
    Send(SendArgs),
}

#[derive(Debug, Args)]
pub struct ListenArgs {
    /// Server name; overrides `[server] name` from the config file.
    #[arg(long)]
    pub name: Option<String>,

    /// Directory holding vimserver.toml.
    #[arg(long, value_name = "DIR")]
    pub config: Option<PathBuf>,

    /// Print one JSON object per received text.
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Args)]
pub struct SendArgs {
    /// Server name; overrides `[server] name` from the config file.
    #[arg(long)]
    pub name: Option<String>,

    /// Directory holding vimserver.toml.
    #[arg(long, value_name = "DIR")]
    pub config: Option<PathBuf>,

    /// Announce this encoding before sending the keys.
    #[arg(long, value_name = "ENC")]
    pub encoding: Option<String>,

    /// Text to send.
    pub keys: String,
}

/// `--config` if given, else the user's config directory.
pub fn config_dir(explicit: Option<&PathBuf>) -> PathBuf {
    match explicit {
        Some(dir) => dir.clone(),
        None => dirs::config_dir()
            .unwrap_or_else(std::env::temp_dir)
            .join(APP_DIRECTORY),
    }
}
