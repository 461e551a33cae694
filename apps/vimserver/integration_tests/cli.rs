//! Argument parsing for the `vimserver` subcommands.

use vimserver::cli::{Cli, Command, config_dir};

use std::path::PathBuf;

use clap::Parser;

#[test]
fn given_listen_with_flags_when_parsed_then_fields_set() {
    let cli = Cli::try_parse_from(["vimserver", "listen", "--name", "GVIM", "--json"]).unwrap();

    let Command::Listen(args) = cli.command else {
        panic!("expected listen");
    };
    assert_eq!(args.name.as_deref(), Some("GVIM"));
    assert!(args.json);
    assert!(args.config.is_none());
}

#[test]
fn given_send_with_encoding_when_parsed_then_keys_positional() {
    let cli = Cli::try_parse_from([
        "vimserver",
        "send",
        "--encoding",
        "utf-8",
        "--config",
        "/tmp/vs",
        ":e foo<CR>",
    ])
    .unwrap();

    let Command::Send(args) = cli.command else {
        panic!("expected send");
    };
    assert_eq!(args.keys, ":e foo<CR>");
    assert_eq!(args.encoding.as_deref(), Some("utf-8"));
    assert_eq!(config_dir(args.config.as_ref()), PathBuf::from("/tmp/vs"));
}

/// **BUG THIS CATCHES**: Would catch `keys` becoming optional, which would
/// let `send` deliver an empty message silently.
#[test]
fn given_send_without_keys_when_parsed_then_error() {
    assert!(Cli::try_parse_from(["vimserver", "send", "--name", "GVIM"]).is_err());
}

#[test]
fn given_no_subcommand_when_parsed_then_error() {
    assert!(Cli::try_parse_from(["vimserver"]).is_err());
}
