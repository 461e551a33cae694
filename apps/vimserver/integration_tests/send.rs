//! `vimserver send` against a live Unix listener.

use vimserver::cli::SendArgs;
use vimserver::error::AppError;
use vimserver::send;

use listener_core::config::ListenerConfig;
use listener_core::registrar::unix::UnixRegistrar;
use listener_core::{PumpPhase, ServerIdentity, TextHandler, VimServer};

use std::os::unix::net::UnixDatagram;
use std::sync::{Arc, Condvar, Mutex};
use std::time::Duration;

use tempfile::TempDir;

const WAIT: Duration = Duration::from_secs(5);

#[derive(Default)]
struct Inbox {
    texts: Mutex<Vec<String>>,
    arrived: Condvar,
}

impl Inbox {
    fn wait_for(&self, count: usize) -> Vec<String> {
        let guard = self.texts.lock().unwrap();
        let (guard, _) = self
            .arrived
            .wait_timeout_while(guard, WAIT, |texts| texts.len() < count)
            .unwrap();
        guard.clone()
    }
}

impl TextHandler for Inbox {
    fn receive(&self, text: &str) {
        self.texts.lock().unwrap().push(text.to_string());
        self.arrived.notify_all();
    }
}

fn write_config(config_dir: &TempDir, socket_dir: &TempDir, timeout: Duration) {
    let mut config = ListenerConfig::default();
    config.server.socket_dir = socket_dir.path().to_path_buf();
    config.client.connect_timeout = timeout;
    config.logging.directory = config_dir.path().join("logs");
    config.save(config_dir.path()).unwrap();
}

/// **VALUE**: Verifies the `send` subcommand reaches a listener through the
/// socket directory named in the config file.
///
/// **BUG THIS CATCHES**: Would catch `send` ignoring `[server] socket_dir`
/// or `--name`, or skipping the encoding announcement.
#[test]
fn given_listening_server_when_send_run_then_keys_delivered() {
    // GIVEN
    let config_dir = TempDir::new().unwrap();
    let socket_dir = TempDir::new().unwrap();
    write_config(&config_dir, &socket_dir, WAIT);

    let server = VimServer::with_registrar(
        ServerIdentity::new("GVIM").unwrap(),
        UnixRegistrar::new(socket_dir.path()),
    );
    let inbox = Arc::new(Inbox::default());
    let pump = server.start(inbox.clone()).unwrap();
    assert_eq!(pump.wait_until_listening(WAIT), PumpPhase::Listening);

    // WHEN
    send::run(SendArgs {
        name: Some("GVIM".to_string()),
        config: Some(config_dir.path().to_path_buf()),
        encoding: Some("utf-8".to_string()),
        keys: ":echo 'hi'<CR>".to_string(),
    })
    .unwrap();

    // THEN
    assert_eq!(inbox.wait_for(1), vec![":echo 'hi'<CR>"]);
    server.stop();
    let report = pump.join().unwrap();
    assert_eq!(report.counts.delivered, 1);
    assert_eq!(report.counts.encodings, 1);
}

#[test]
fn given_no_listener_when_send_run_then_send_error() {
    let config_dir = TempDir::new().unwrap();
    let socket_dir = TempDir::new().unwrap();
    write_config(&config_dir, &socket_dir, Duration::from_millis(50));

    let result = send::run(SendArgs {
        name: Some("NOBODY".to_string()),
        config: Some(config_dir.path().to_path_buf()),
        encoding: None,
        keys: "x".to_string(),
    });

    assert!(matches!(result, Err(AppError::Send { .. })));
}

/// **VALUE**: Verifies `--name` is validated like the listener's name.
///
/// **BUG THIS CATCHES**: Would catch the raw name being joined onto the
/// socket directory, letting `../x` address a socket outside it.
#[test]
fn given_name_escaping_socket_dir_when_send_run_then_rejected_as_invalid_identity() {
    // GIVEN: A live socket one level above the configured socket directory
    let root = TempDir::new().unwrap();
    let socket_dir = root.path().join("sockets");
    std::fs::create_dir(&socket_dir).unwrap();
    let outside = UnixDatagram::bind(root.path().join("x")).unwrap();
    outside.set_nonblocking(true).unwrap();

    let config_dir = TempDir::new().unwrap();
    let mut config = ListenerConfig::default();
    config.server.socket_dir = socket_dir;
    config.logging.directory = config_dir.path().join("logs");
    config.save(config_dir.path()).unwrap();

    // WHEN
    let result = send::run(SendArgs {
        name: Some("../x".to_string()),
        config: Some(config_dir.path().to_path_buf()),
        encoding: None,
        keys: "x".to_string(),
    });

    // THEN: Rejected before connecting, nothing reached the outside socket
    assert!(matches!(result, Err(AppError::Server { .. })));
    let mut buffer = [0u8; 64];
    assert!(outside.recv(&mut buffer).is_err());
}
