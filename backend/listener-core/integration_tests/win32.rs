//! Hidden-window backend tests; these need a Windows session.

use crate::helpers::{Recorder, wait_listening};

use listener_core::registrar::Endpoint;
use listener_core::registrar::win32::{Win32Registrar, Win32Sender, registered_classes};
use listener_core::{Dispatcher, EnvelopeSender, Registrar, ServerIdentity, VimServer};

/// **VALUE**: Verifies release frees the window and its class without errors.
///
/// **WHY THIS MATTERS**: Every start registers a fresh class. A teardown
/// that cannot unregister it leaks one OS class per restart.
///
/// **BUG THIS CATCHES**: Would catch unregistering the class while its
/// window still exists, which always fails.
#[test]
fn given_acquired_window_when_released_then_no_teardown_errors() {
    // GIVEN
    let registrar = Win32Registrar::new();
    let identity = ServerIdentity::new("WIN32-RELEASE").unwrap();
    let endpoint = registrar
        .acquire(&identity, Dispatcher::new(Recorder::new()))
        .unwrap();
    let label = endpoint.class_label().to_string();
    assert!(registered_classes().contains(&label));

    // WHEN
    let errors = endpoint.release();

    // THEN
    assert!(errors.is_empty(), "teardown errors: {errors:?}");
    assert!(!registered_classes().contains(&label));
    assert!(Win32Sender::find("WIN32-RELEASE").is_err());
}

#[test]
fn given_repeated_acquire_and_release_when_cycled_then_each_release_is_clean() {
    let registrar = Win32Registrar::new();
    let identity = ServerIdentity::new("WIN32-CYCLE").unwrap();

    for _ in 0..3 {
        let endpoint = registrar
            .acquire(&identity, Dispatcher::new(Recorder::new()))
            .unwrap();
        assert!(endpoint.release().is_empty());
    }
}

#[test]
fn given_running_server_when_stopped_then_report_has_no_teardown_errors() {
    let server = VimServer::with_registrar(
        ServerIdentity::new("WIN32-SERVER").unwrap(),
        Win32Registrar::new(),
    );
    let recorder = Recorder::new();
    let pump = server.start(recorder.clone()).unwrap();
    wait_listening(&pump);

    Win32Sender::find("WIN32-SERVER")
        .unwrap()
        .send_keys("hello")
        .unwrap();

    assert_eq!(recorder.wait_for(1), vec!["hello"]);
    server.stop();
    let report = pump.join().unwrap();
    assert_eq!(report.teardown_errors, 0);
}
