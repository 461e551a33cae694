//! End-to-end tests over Unix datagram sockets in a temporary directory.

use crate::helpers::{Recorder, WAIT, wait_listening, wait_until};

use listener_core::error::{EndpointError, SendError, ServerError};
use listener_core::protocol::frame::{self, Frame};
use listener_core::registrar::unix::{UnixRegistrar, UnixSender, registered_classes};
use listener_core::{Envelope, EnvelopeSender, PumpPhase, ServerIdentity, TextHandler, VimServer};

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::os::unix::net::UnixDatagram;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex, mpsc};
use std::thread;
use std::time::Duration;

use tempfile::TempDir;

fn unix_server(dir: &TempDir, name: &str) -> VimServer<UnixRegistrar> {
    VimServer::with_registrar(
        ServerIdentity::new(name).unwrap(),
        UnixRegistrar::new(dir.path()),
    )
}

fn sender(dir: &TempDir) -> UnixSender {
    UnixSender::new(dir.path()).with_connect_timeout(WAIT)
}

/// Handler that holds every call until the gate is opened.
#[derive(Default)]
struct Gate {
    open: Mutex<bool>,
    changed: Condvar,
    entered: AtomicUsize,
}

impl Gate {
    fn open(&self) {
        *self.open.lock().unwrap() = true;
        self.changed.notify_all();
    }
}

impl TextHandler for Gate {
    fn receive(&self, _text: &str) {
        self.entered.fetch_add(1, Ordering::SeqCst);
        let open = self.open.lock().unwrap();
        let _open = self.changed.wait_while(open, |open| !*open).unwrap();
    }
}

/// **VALUE**: Verifies text sent by a separate socket reaches the handler in
/// order.
///
/// **WHY THIS MATTERS**: This is the full path a real client takes: framing,
/// datagram delivery, decoding and dispatch.
#[test]
fn given_listening_unix_server_when_keys_sent_then_handler_receives_in_order() {
    // GIVEN
    let dir = TempDir::new().unwrap();
    let server = unix_server(&dir, "GVIM");
    let recorder = Recorder::new();
    let pump = server.start(recorder.clone()).unwrap();
    wait_listening(&pump);

    // WHEN
    let connection = sender(&dir).connect("GVIM").unwrap();
    connection.announce_encoding("utf-8").unwrap();
    connection.send_keys("hello").unwrap();
    connection.send_keys("wörld").unwrap();

    // THEN
    assert_eq!(recorder.wait_for(2), vec!["hello", "wörld"]);
    server.stop();
    let report = pump.join().unwrap();
    assert_eq!(report.counts.delivered, 2);
    assert_eq!(report.counts.encodings, 1);
}

#[test]
fn given_socket_directory_missing_when_started_then_created_private() {
    let dir = TempDir::new().unwrap();
    let nested = dir.path().join("nested").join("sockets");
    let server = VimServer::with_registrar(
        ServerIdentity::new("GVIM").unwrap(),
        UnixRegistrar::new(&nested),
    );

    let pump = server.start(Recorder::new()).unwrap();
    wait_listening(&pump);

    let mode = fs::metadata(&nested).unwrap().permissions().mode();
    assert_eq!(mode & 0o777, 0o700);
    server.stop();
    pump.join().unwrap();
}

/// **VALUE**: Verifies stop() removes the socket file and unregisters the
/// class label.
///
/// **BUG THIS CATCHES**: Would catch a teardown that only drops the socket,
/// leaving a file that makes the next bind fail with AddrInUse.
#[test]
fn given_stopped_unix_server_when_joined_then_socket_file_and_label_gone() {
    // GIVEN
    let dir = TempDir::new().unwrap();
    let server = unix_server(&dir, "cleanup");
    let pump = server.start(Recorder::new()).unwrap();
    wait_listening(&pump);
    let label = pump.class_label().unwrap();
    let path = server.registrar().socket_path(server.identity());
    assert!(path.exists());
    assert!(registered_classes().contains(&label));

    // WHEN
    server.stop();
    let report = pump.join().unwrap();

    // THEN
    assert_eq!(report.teardown_errors, 0);
    assert!(!path.exists());
    assert!(!registered_classes().contains(&label));
}

#[test]
fn given_stopped_unix_server_when_restarted_immediately_then_listens_again() {
    let dir = TempDir::new().unwrap();
    let server = unix_server(&dir, "restart");
    let first = server.start(Recorder::new()).unwrap();
    wait_listening(&first);

    server.stop();
    let recorder = Recorder::new();
    let second = server.start(recorder.clone()).unwrap();
    wait_listening(&second);
    sender(&dir).connect("restart").unwrap().send_keys("again").unwrap();

    assert_eq!(recorder.wait_for(1), vec!["again"]);
    server.stop();
    first.join().unwrap();
    second.join().unwrap();
}

/// **VALUE**: Verifies a socket file left by a dead process is replaced.
///
/// **WHY THIS MATTERS**: A crashed listener never removes its socket; without
/// stale detection the name would stay unusable until someone deletes it.
#[test]
fn given_stale_socket_file_when_started_then_replaces_it_and_listens() {
    // GIVEN: A socket bound and closed, leaving its file behind
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("stale");
    drop(UnixDatagram::bind(&path).unwrap());
    assert!(path.exists());

    // WHEN
    let server = unix_server(&dir, "stale");
    let recorder = Recorder::new();
    let pump = server.start(recorder.clone()).unwrap();

    // THEN
    wait_listening(&pump);
    sender(&dir).connect("stale").unwrap().send_keys("fresh").unwrap();
    assert_eq!(recorder.wait_for(1), vec!["fresh"]);
    server.stop();
    pump.join().unwrap();
}

#[test]
fn given_live_socket_at_name_when_started_then_endpoint_creation_name_in_use() {
    // GIVEN: Another process (simulated) listening on the name
    let dir = TempDir::new().unwrap();
    let _live = UnixDatagram::bind(dir.path().join("live")).unwrap();

    // WHEN
    let server = unix_server(&dir, "live");
    let pump = server.start(Recorder::new()).unwrap();

    // THEN
    assert_eq!(pump.wait_until_listening(WAIT), PumpPhase::Failed);
    match pump.join() {
        Err(ServerError::EndpointCreation { source, .. }) => {
            assert!(matches!(source, EndpointError::NameInUse { .. }));
        }
        other => panic!("expected EndpointCreation, got {other:?}"),
    }
    assert!(dir.path().join("live").exists());
}

#[test]
fn given_regular_file_at_name_when_started_then_fails_and_leaves_file() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("occupied"), b"not a socket").unwrap();

    let server = unix_server(&dir, "occupied");
    let pump = server.start(Recorder::new()).unwrap();

    assert!(matches!(
        pump.join(),
        Err(ServerError::EndpointCreation { .. })
    ));
    assert_eq!(fs::read(dir.path().join("occupied")).unwrap(), b"not a socket");
}

/// **VALUE**: Verifies quit frames from other processes cannot stop the pump.
///
/// **BUG THIS CATCHES**: Would catch comparing only the frame kind and not
/// the per-endpoint token.
#[test]
fn given_forged_quit_frame_when_received_then_rejected_and_still_listening() {
    // GIVEN
    let dir = TempDir::new().unwrap();
    let server = unix_server(&dir, "forged");
    let recorder = Recorder::new();
    let pump = server.start(recorder.clone()).unwrap();
    wait_listening(&pump);
    let connection = sender(&dir).connect("forged").unwrap();

    // WHEN
    let forged = frame::encode(&Frame::Quit([0xAB; 16])).unwrap();
    connection.send_raw(&forged).unwrap();
    connection.send_keys("still here").unwrap();

    // THEN
    assert_eq!(recorder.wait_for(1), vec!["still here"]);
    assert_eq!(pump.phase(), PumpPhase::Listening);
    server.stop();
    assert_eq!(pump.join().unwrap().counts.rejected, 1);
}

#[test]
fn given_garbage_and_invalid_utf8_when_received_then_dropped_and_pump_continues() {
    let dir = TempDir::new().unwrap();
    let server = unix_server(&dir, "garbage");
    let recorder = Recorder::new();
    let pump = server.start(recorder.clone()).unwrap();
    wait_listening(&pump);
    let connection = sender(&dir).connect("garbage").unwrap();

    connection.send_raw(b"not a frame").unwrap();
    connection.send(&Envelope::new(0, b"\xc3\x28\0".to_vec())).unwrap();
    connection.send_keys("valid").unwrap();

    assert_eq!(recorder.wait_for(1), vec!["valid"]);
    server.stop();
    let report = pump.join().unwrap();
    assert_eq!(report.counts.rejected, 2);
    assert_eq!(report.counts.delivered, 1);
}

#[test]
fn given_no_endpoint_when_connecting_then_times_out() {
    let dir = TempDir::new().unwrap();

    let result = UnixSender::new(dir.path())
        .with_connect_timeout(Duration::from_millis(50))
        .connect("absent");

    assert!(matches!(result, Err(SendError::Timeout { .. })));
}

#[test]
fn given_endpoint_started_after_connect_begins_when_connecting_then_retries_until_present() {
    let dir = TempDir::new().unwrap();
    let server = unix_server(&dir, "late");
    let recorder = Recorder::new();

    let connecting = {
        let sender = sender(&dir);
        std::thread::spawn(move || sender.connect("late"))
    };
    std::thread::sleep(Duration::from_millis(30));
    let pump = server.start(recorder.clone()).unwrap();

    let connection = connecting.join().unwrap().unwrap();
    connection.send_keys("made it").unwrap();
    assert_eq!(recorder.wait_for(1), vec!["made it"]);
    server.stop();
    pump.join().unwrap();
}

#[test]
fn given_oversized_payload_when_sent_then_rejected_before_sending() {
    let dir = TempDir::new().unwrap();
    let server = unix_server(&dir, "oversized");
    let pump = server.start(Recorder::new()).unwrap();
    wait_listening(&pump);
    let connection = sender(&dir).connect("oversized").unwrap();

    let result = connection.send(&Envelope::new(0, vec![b'x'; frame::MAX_PAYLOAD + 1]));

    assert!(matches!(result, Err(SendError::Oversized { .. })));
    server.stop();
    pump.join().unwrap();
    wait_until("socket removal", || {
        !server.registrar().socket_path(server.identity()).exists()
    });
}

/// **VALUE**: Verifies stop() returns promptly while a slow handler has let
/// the endpoint's receive queue fill up.
///
/// **WHY THIS MATTERS**: A slow handler is ordinary backpressure. stop() holds
/// the server's lifecycle lock, so a blocking quit post would also stall
/// state(), start() and Drop until the handler caught up, or forever.
///
/// **BUG THIS CATCHES**: Would catch posting the quit datagram on a blocking
/// socket, or a deferred stop the pump never notices.
#[test]
fn given_full_receive_queue_when_stopped_then_stop_returns_without_waiting_for_handler() {
    // GIVEN: A handler stuck on its first message and a client flooding the queue
    let dir = TempDir::new().unwrap();
    let server = unix_server(&dir, "backlog");
    let gate = Arc::new(Gate::default());
    let pump = server.start(gate.clone()).unwrap();
    wait_listening(&pump);

    let connection = sender(&dir).connect("backlog").unwrap();
    thread::spawn(move || {
        for i in 0..1000 {
            if connection.send_keys(&format!("key {i}")).is_err() {
                break;
            }
        }
    });
    wait_until("handler entered", || gate.entered.load(Ordering::SeqCst) >= 1);
    thread::sleep(Duration::from_millis(200));

    // WHEN
    let (stopped_tx, stopped_rx) = mpsc::channel();
    let stopped_in_time = thread::scope(|scope| {
        scope.spawn(|| {
            server.stop();
            stopped_tx.send(()).unwrap();
        });
        let outcome = stopped_rx.recv_timeout(Duration::from_secs(1));
        gate.open();
        outcome
    });

    // THEN
    assert!(
        stopped_in_time.is_ok(),
        "stop() blocked while the receive queue was full"
    );
    wait_until("pump exit", || pump.is_finished());
    assert_eq!(pump.phase(), PumpPhase::Terminated);
    pump.join().unwrap();
    wait_until("socket removal", || {
        !server.registrar().socket_path(server.identity()).exists()
    });
}
