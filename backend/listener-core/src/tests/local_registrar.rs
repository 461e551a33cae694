// Unit tests for the in-process registrar, driven without a pump thread

use crate::dispatcher::{Dispatcher, TextHandler};
use crate::error::{EndpointError, SendError};
use crate::identity::ServerIdentity;
use crate::protocol::Envelope;
use crate::registrar::local::LocalRegistrar;
use crate::registrar::{Endpoint, EnvelopeSender, Registrar, Retrieved};

use std::sync::{Arc, Mutex};

fn recording_dispatcher() -> (Dispatcher, Arc<Mutex<Vec<String>>>) {
    let received = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&received);
    let handler: Arc<dyn TextHandler> = Arc::new(move |text: &str| {
        sink.lock().unwrap().push(text.to_string());
    });
    (Dispatcher::new(handler), received)
}

fn identity(name: &str) -> ServerIdentity {
    ServerIdentity::new(name).unwrap()
}

/// **VALUE**: Verifies acquire registers both the name and a class label,
/// and release removes both.
///
/// **BUG THIS CATCHES**: Would catch a teardown that forgets one of the two
/// steps, leaking the name so the next start fails with NameInUse.
#[test]
fn given_acquired_endpoint_when_released_then_name_and_label_are_gone() {
    // GIVEN
    let registrar = LocalRegistrar::new();
    let (dispatcher, _) = recording_dispatcher();
    let endpoint = registrar.acquire(&identity("GVIM"), dispatcher).unwrap();
    let label = endpoint.class_label().to_string();
    assert!(registrar.is_registered("GVIM"));
    assert!(registrar.classes().contains(&label));

    // WHEN
    let errors = endpoint.release();

    // THEN
    assert!(errors.is_empty());
    assert!(!registrar.is_registered("GVIM"));
    assert!(!registrar.classes().contains(&label));
}

#[test]
fn given_live_endpoint_when_same_name_acquired_then_name_in_use_and_no_label_leak() {
    let registrar = LocalRegistrar::new();
    let (first_dispatcher, _) = recording_dispatcher();
    let (second_dispatcher, _) = recording_dispatcher();
    let _endpoint = registrar.acquire(&identity("GVIM"), first_dispatcher).unwrap();

    let result = registrar.acquire(&identity("GVIM"), second_dispatcher);

    assert!(matches!(result, Err(EndpointError::NameInUse { .. })));
    assert_eq!(registrar.classes().len(), 1);
}

#[test]
fn given_dropped_endpoint_when_name_acquired_again_then_succeeds() {
    let registrar = LocalRegistrar::new();
    let (dispatcher, _) = recording_dispatcher();
    let endpoint = registrar.acquire(&identity("GVIM"), dispatcher.clone()).unwrap();

    drop(endpoint);

    assert!(registrar.acquire(&identity("GVIM"), dispatcher).is_ok());
}

#[test]
fn given_sent_keys_when_retrieved_then_dispatched_to_handler() {
    // GIVEN
    let registrar = LocalRegistrar::new();
    let (dispatcher, received) = recording_dispatcher();
    let mut endpoint = registrar.acquire(&identity("GVIM"), dispatcher).unwrap();
    let sender = registrar.sender("GVIM").unwrap();

    // WHEN
    sender.send_keys("hello").unwrap();
    let outcome = endpoint.retrieve().unwrap();

    // THEN
    assert_eq!(outcome, Retrieved::Continue);
    assert_eq!(*received.lock().unwrap(), vec!["hello".to_string()]);
}

/// **VALUE**: Verifies only the endpoint's own quit sentinel ends retrieval.
///
/// **WHY THIS MATTERS**: Any client can reach the mailbox. A quit frame that
/// anyone could forge would let clients shut the server down.
#[test]
fn given_forged_quit_then_real_quit_when_retrieved_then_only_real_one_quits() {
    // GIVEN
    let registrar = LocalRegistrar::new();
    let (dispatcher, _) = recording_dispatcher();
    let mut endpoint = registrar.acquire(&identity("GVIM"), dispatcher).unwrap();
    let sender = registrar.sender("GVIM").unwrap();
    let poster = endpoint.quit_poster().unwrap();

    // WHEN
    sender.send_forged_quit().unwrap();
    poster.post_quit().unwrap();

    // THEN
    assert_eq!(endpoint.retrieve().unwrap(), Retrieved::Continue);
    assert_eq!(endpoint.retrieve().unwrap(), Retrieved::Quit);
}

#[test]
fn given_unknown_name_when_sender_requested_then_not_found() {
    let registrar = LocalRegistrar::new();

    assert!(matches!(
        registrar.sender("nobody"),
        Err(SendError::NotFound { .. })
    ));
}

#[test]
fn given_released_endpoint_when_old_sender_used_then_not_found() {
    let registrar = LocalRegistrar::new();
    let (dispatcher, _) = recording_dispatcher();
    let endpoint = registrar.acquire(&identity("GVIM"), dispatcher).unwrap();
    let sender = registrar.sender("GVIM").unwrap();

    endpoint.release();

    assert!(matches!(
        sender.send(&Envelope::keys("late")),
        Err(SendError::NotFound { .. })
    ));
}
