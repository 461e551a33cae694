//! Lifecycle tests on the in-process backend.

use crate::helpers::{Recorder, WAIT, local_server, local_server_on, wait_listening, wait_until};

use listener_core::error::{EndpointError, ServerError};
use listener_core::registrar::local::LocalRegistrar;
use listener_core::{Envelope, EnvelopeSender, PumpPhase, ServerState, TextHandler};

use std::sync::{Arc, Barrier, Mutex};
use std::thread;
use std::time::{Duration, Instant};

// ============================================
// START / STOP
// ============================================

/// **VALUE**: Verifies stop() on a server that never started is a no-op.
///
/// **BUG THIS CATCHES**: Would catch stop() panicking or flipping state when
/// there is no pump to signal.
#[test]
fn given_never_started_server_when_stopped_repeatedly_then_stays_stopped() {
    // GIVEN
    let server = local_server("never-started");

    // WHEN
    server.stop();
    server.stop();

    // THEN
    assert_eq!(server.state(), ServerState::Stopped);
}

#[test]
fn given_started_server_when_stopped_twice_then_second_stop_is_noop() {
    let server = local_server("stop-twice");
    let pump = server.start(Recorder::new()).unwrap();
    wait_listening(&pump);

    server.stop();
    server.stop();

    assert_eq!(server.state(), ServerState::Stopped);
    assert!(pump.join().is_ok());
}

/// **VALUE**: Verifies a second start() is rejected and the first handler
/// keeps receiving.
///
/// **WHY THIS MATTERS**: Replacing the handler of a running pump would break
/// the "set once at start" contract the pump relies on.
#[test]
fn given_running_server_when_started_again_then_already_started_and_first_handler_bound() {
    // GIVEN
    let server = local_server("double-start");
    let first = Recorder::new();
    let second = Recorder::new();
    let pump = server.start(first.clone()).unwrap();
    wait_listening(&pump);

    // WHEN
    let result = server.start(second.clone());

    // THEN
    assert!(matches!(result, Err(ServerError::AlreadyStarted { .. })));
    assert_eq!(server.state(), ServerState::Running);

    let sender = server.registrar().sender("double-start").unwrap();
    sender.send_keys("still-first").unwrap();
    assert_eq!(first.wait_for(1), vec!["still-first"]);
    assert!(second.received().is_empty());

    server.stop();
    pump.join().unwrap();
}

/// **VALUE**: Verifies a restart builds a brand-new endpoint and routes to
/// the new handler only.
///
/// **BUG THIS CATCHES**: Would catch reusing the old endpoint or dispatcher
/// across starts.
#[test]
fn given_restarted_server_when_message_sent_then_only_new_handler_receives() {
    // GIVEN
    let server = local_server("restart");
    let first = Recorder::new();
    let second = Recorder::new();

    let first_pump = server.start(first.clone()).unwrap();
    wait_listening(&first_pump);
    let first_label = first_pump.class_label().unwrap();
    server.stop();

    // WHEN
    let second_pump = server.start(second.clone()).unwrap();
    wait_listening(&second_pump);
    server
        .registrar()
        .sender("restart")
        .unwrap()
        .send_keys("for-second")
        .unwrap();

    // THEN
    assert_eq!(second.wait_for(1), vec!["for-second"]);
    assert!(first.received().is_empty());
    assert_ne!(second_pump.class_label().unwrap(), first_label);
    assert!(!server.registrar().classes().contains(&first_label));

    server.stop();
    first_pump.join().unwrap();
    second_pump.join().unwrap();
}

/// **VALUE**: Verifies stop() right after start(), before the endpoint
/// exists, still shuts the pump down.
///
/// **WHY THIS MATTERS**: start() does not wait for the endpoint, so this race
/// is the common case for short-lived servers.
#[test]
fn given_immediate_stop_after_start_when_joined_then_pump_terminates() {
    for round in 0..20 {
        let server = local_server(&format!("immediate-stop-{round}"));

        let pump = server.start(Recorder::new()).unwrap();
        server.stop();

        let report = pump.join().unwrap();
        assert_eq!(report.counts.total(), 0);
        assert!(!server.registrar().is_registered(&format!("immediate-stop-{round}")));
    }
}

#[test]
fn given_running_server_when_dropped_then_pump_terminates_and_name_released() {
    let registrar = LocalRegistrar::new();
    let server = local_server_on("dropped", registrar.clone());
    let pump = server.start(Recorder::new()).unwrap();
    wait_listening(&pump);

    drop(server);

    assert!(pump.join().is_ok());
    assert!(!registrar.is_registered("dropped"));
}

/// **VALUE**: Verifies concurrent start() calls serialize: exactly one wins.
///
/// **BUG THIS CATCHES**: Would catch a check-then-set outside the lock,
/// which lets two pumps race for the same name.
#[test]
fn given_concurrent_starts_when_raced_then_exactly_one_succeeds() {
    // GIVEN
    let server = Arc::new(local_server("concurrent"));
    let barrier = Arc::new(Barrier::new(8));

    // WHEN
    let outcomes: Vec<_> = (0..8)
        .map(|_| {
            let server = Arc::clone(&server);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                server.start(Recorder::new())
            })
        })
        .collect::<Vec<_>>()
        .into_iter()
        .map(|thread| thread.join().unwrap())
        .collect();

    // THEN
    let started: Vec<_> = outcomes.into_iter().filter_map(Result::ok).collect();
    assert_eq!(started.len(), 1);

    server.stop();
    for pump in started {
        pump.join().unwrap();
    }
}

// ============================================
// NAME OWNERSHIP
// ============================================

/// **VALUE**: Verifies that after stop() the name can be taken by another
/// server.
///
/// **WHY THIS MATTERS**: A leaked registration would make the name unusable
/// until the process exits.
#[test]
fn given_stopped_server_when_other_server_takes_name_then_starts_listening() {
    // GIVEN
    let registrar = LocalRegistrar::new();
    let original = local_server_on("shared-name", registrar.clone());
    let pump = original.start(Recorder::new()).unwrap();
    wait_listening(&pump);

    // WHEN
    original.stop();
    pump.join().unwrap();
    let successor = local_server_on("shared-name", registrar.clone());
    let successor_pump = successor.start(Recorder::new()).unwrap();

    // THEN
    wait_listening(&successor_pump);
    successor.stop();
    successor_pump.join().unwrap();
}

#[test]
fn given_name_taken_by_live_server_when_second_server_started_then_pump_fails_with_endpoint_creation() {
    // GIVEN
    let registrar = LocalRegistrar::new();
    let owner = local_server_on("taken", registrar.clone());
    let owner_recorder = Recorder::new();
    let owner_pump = owner.start(owner_recorder.clone()).unwrap();
    wait_listening(&owner_pump);

    // WHEN
    let intruder = local_server_on("taken", registrar.clone());
    let intruder_pump = intruder.start(Recorder::new()).unwrap();

    // THEN
    assert_eq!(intruder_pump.wait_until_listening(WAIT), PumpPhase::Failed);
    match intruder_pump.join() {
        Err(ServerError::EndpointCreation { source, .. }) => {
            assert!(matches!(source, EndpointError::NameInUse { .. }));
        }
        other => panic!("expected EndpointCreation, got {other:?}"),
    }

    registrar.sender("taken").unwrap().send_keys("owner").unwrap();
    assert_eq!(owner_recorder.wait_for(1), vec!["owner"]);

    intruder.stop();
    owner.stop();
    owner_pump.join().unwrap();
}

// ============================================
// DISPATCH
// ============================================

/// **VALUE**: Verifies tag 0 reaches the handler once with the text and an
/// unknown tag reaches it never.
#[test]
fn given_keys_and_unknown_tag_when_sent_then_only_keys_delivered() {
    // GIVEN
    let server = local_server("routing");
    let recorder = Recorder::new();
    let pump = server.start(recorder.clone()).unwrap();
    wait_listening(&pump);
    let sender = server.registrar().sender("routing").unwrap();

    // WHEN
    sender.send(&Envelope::new(99, b"ignored\0".to_vec())).unwrap();
    sender.send(&Envelope::new(0, b"hello\0".to_vec())).unwrap();

    // THEN
    assert_eq!(recorder.wait_for(1), vec!["hello"]);
    server.stop();
    let report = pump.join().unwrap();
    assert_eq!(recorder.received(), vec!["hello"]);
    assert_eq!(report.counts.delivered, 1);
    assert_eq!(report.counts.ignored, 1);
}

#[test]
fn given_sequence_of_messages_when_sent_then_delivered_in_order() {
    let server = local_server("ordering");
    let recorder = Recorder::new();
    let pump = server.start(recorder.clone()).unwrap();
    wait_listening(&pump);
    let sender = server.registrar().sender("ordering").unwrap();

    let expected: Vec<String> = (0..50).map(|i| format!("msg-{i}")).collect();
    for text in &expected {
        sender.send_keys(text).unwrap();
    }

    assert_eq!(recorder.wait_for(expected.len()), expected);
    server.stop();
    pump.join().unwrap();
}

#[test]
fn given_encoding_announcement_then_keys_when_sent_then_only_keys_delivered() {
    let server = local_server("encoding");
    let recorder = Recorder::new();
    let pump = server.start(recorder.clone()).unwrap();
    wait_listening(&pump);
    let sender = server.registrar().sender("encoding").unwrap();

    sender.announce_encoding("latin1").unwrap();
    sender.send_keys(":wq").unwrap();

    assert_eq!(recorder.wait_for(1), vec![":wq"]);
    server.stop();
    let report = pump.join().unwrap();
    assert_eq!(report.counts.encodings, 1);
}

/// **VALUE**: Verifies a slow handler delays the next dispatch by at least
/// its own duration.
///
/// **WHY THIS MATTERS**: Delivery is synchronous on the pump thread; this is
/// the receiver's only backpressure.
///
/// **BUG THIS CATCHES**: Would catch dispatching on a worker pool, which
/// breaks ordering and removes backpressure.
#[test]
fn given_slow_handler_when_two_messages_sent_then_second_waits_for_first() {
    // GIVEN: A handler that blocks 100 ms on the first message
    const BLOCK: Duration = Duration::from_millis(100);
    let calls: Arc<Mutex<Vec<Instant>>> = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&calls);
    let handler: Arc<dyn TextHandler> = Arc::new(move |text: &str| {
        sink.lock().unwrap().push(Instant::now());
        if text == "slow" {
            thread::sleep(BLOCK);
        }
    });

    let server = local_server("backpressure");
    let pump = server.start(handler).unwrap();
    wait_listening(&pump);
    let sender = server.registrar().sender("backpressure").unwrap();

    // WHEN
    sender.send_keys("slow").unwrap();
    sender.send_keys("fast").unwrap();
    wait_until("both deliveries", || calls.lock().unwrap().len() == 2);

    // THEN
    let calls = calls.lock().unwrap().clone();
    assert!(calls[1].duration_since(calls[0]) >= BLOCK);

    server.stop();
    pump.join().unwrap();
}

#[test]
fn given_panicking_handler_when_messages_sent_then_pump_survives() {
    let received = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&received);
    let handler: Arc<dyn TextHandler> = Arc::new(move |text: &str| {
        if text == "panic" {
            panic!("handler failure");
        }
        sink.lock().unwrap().push(text.to_string());
    });

    let server = local_server("panicking");
    let pump = server.start(handler).unwrap();
    wait_listening(&pump);
    let sender = server.registrar().sender("panicking").unwrap();

    sender.send_keys("panic").unwrap();
    sender.send_keys("after").unwrap();
    wait_until("delivery after panic", || received.lock().unwrap().len() == 1);

    assert_eq!(pump.phase(), PumpPhase::Listening);
    server.stop();
    let report = pump.join().unwrap();
    assert_eq!(report.counts.rejected, 1);
    assert_eq!(report.counts.delivered, 1);
}
