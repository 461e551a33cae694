//! Test helpers for lifecycle integration tests.
//!
//! - A recording handler with blocking waits
//! - Server construction on a private local registrar
//! - Polling until a name is (un)registered

use listener_core::registrar::local::LocalRegistrar;
use listener_core::{PumpHandle, PumpPhase, ServerIdentity, TextHandler, VimServer};

use std::sync::{Arc, Condvar, Mutex};
use std::thread;
use std::time::{Duration, Instant};

pub const WAIT: Duration = Duration::from_secs(5);

/// Handler that records every received text.
#[derive(Default)]
pub struct Recorder {
    received: Mutex<Vec<String>>,
    arrived: Condvar,
}

impl Recorder {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn received(&self) -> Vec<String> {
        self.received.lock().unwrap().clone()
    }

    /// Block until at least `count` texts arrived; panics after [`WAIT`].
    pub fn wait_for(&self, count: usize) -> Vec<String> {
        let guard = self.received.lock().unwrap();
        let (guard, timeout) = self
            .arrived
            .wait_timeout_while(guard, WAIT, |received| received.len() < count)
            .unwrap();
        assert!(
            !timeout.timed_out(),
            "expected {count} messages, got {:?}",
            *guard
        );
        guard.clone()
    }
}

impl TextHandler for Recorder {
    fn receive(&self, text: &str) {
        self.received.lock().unwrap().push(text.to_string());
        self.arrived.notify_all();
    }
}

pub fn local_server(name: &str) -> VimServer<LocalRegistrar> {
    local_server_on(name, LocalRegistrar::new())
}

pub fn local_server_on(name: &str, registrar: LocalRegistrar) -> VimServer<LocalRegistrar> {
    VimServer::with_registrar(ServerIdentity::new(name).unwrap(), registrar)
}

pub fn wait_listening(pump: &PumpHandle) {
    assert_eq!(pump.wait_until_listening(WAIT), PumpPhase::Listening);
}

/// Poll until `condition` holds; panics after [`WAIT`].
pub fn wait_until(what: &str, condition: impl Fn() -> bool) {
    let deadline = Instant::now() + WAIT;
    while !condition() {
        assert!(Instant::now() < deadline, "timed out waiting for {what}");
        thread::sleep(Duration::from_millis(5));
    }
}
