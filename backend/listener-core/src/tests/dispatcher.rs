// Unit tests for tag routing and handler invocation

use crate::dispatcher::{DispatchCounts, Dispatched, Dispatcher, TextHandler};
use crate::error::ProtocolError;
use crate::protocol::{Envelope, MessageTag};

use common::ErrorLocation;

use std::panic::Location;
use std::sync::{Arc, Mutex};

#[derive(Default)]
struct Recorder {
    received: Mutex<Vec<String>>,
}

impl Recorder {
    fn received(&self) -> Vec<String> {
        self.received.lock().unwrap().clone()
    }
}

impl TextHandler for Recorder {
    fn receive(&self, text: &str) {
        self.received.lock().unwrap().push(text.to_string());
    }
}

fn dispatcher_with_recorder() -> (Dispatcher, Arc<Recorder>) {
    let recorder = Arc::new(Recorder::default());
    let dispatcher = Dispatcher::new(recorder.clone());
    (dispatcher, recorder)
}

/// **VALUE**: Verifies a tag-0 envelope reaches the handler exactly once,
/// without its terminator.
///
/// **WHY THIS MATTERS**: This is the only delivery path of the receiver.
///
/// **BUG THIS CATCHES**: Would catch passing the raw payload (with `\0`) or
/// invoking the handler twice.
#[test]
fn given_keys_envelope_when_dispatched_then_handler_receives_text_once() {
    // GIVEN
    let (dispatcher, recorder) = dispatcher_with_recorder();

    // WHEN
    let outcome = dispatcher.dispatch(&Envelope::new(0, b"hello\0".to_vec())).unwrap();

    // THEN
    assert_eq!(outcome, Dispatched::Delivered);
    assert_eq!(recorder.received(), vec!["hello"]);
}

/// **VALUE**: Verifies unknown tags never reach the handler.
///
/// **BUG THIS CATCHES**: Would catch a catch-all arm that decodes and delivers
/// every payload as text.
#[test]
fn given_unknown_tag_when_dispatched_then_handler_not_invoked() {
    let (dispatcher, recorder) = dispatcher_with_recorder();

    let outcome = dispatcher.dispatch(&Envelope::new(99, b"hello\0".to_vec())).unwrap();

    assert_eq!(outcome, Dispatched::Ignored(MessageTag::Unknown(99)));
    assert!(recorder.received().is_empty());
}

#[test]
fn given_reserved_request_tags_when_dispatched_then_ignored() {
    let (dispatcher, recorder) = dispatcher_with_recorder();

    for tag in [1, 10, 11, 12] {
        let outcome = dispatcher.dispatch(&Envelope::new(tag, b"x\0".to_vec())).unwrap();
        assert_eq!(outcome, Dispatched::Ignored(MessageTag::from(tag)));
    }

    assert!(recorder.received().is_empty());
}

#[test]
fn given_encoding_envelope_when_dispatched_then_name_decoded_and_discarded() {
    let (dispatcher, recorder) = dispatcher_with_recorder();

    let outcome = dispatcher.dispatch(&Envelope::encoding("latin1")).unwrap();

    assert_eq!(outcome, Dispatched::EncodingAnnounced("latin1".to_string()));
    assert!(recorder.received().is_empty());
}

#[test]
fn given_invalid_utf8_keys_when_dispatched_then_decode_error_and_no_delivery() {
    let (dispatcher, recorder) = dispatcher_with_recorder();

    let result = dispatcher.dispatch(&Envelope::new(0, b"\xff\xfe\0".to_vec()));

    assert!(matches!(result, Err(ProtocolError::Decode { .. })));
    assert!(recorder.received().is_empty());
}

#[test]
fn given_two_keys_envelopes_when_routed_then_delivered_in_order() {
    let (dispatcher, recorder) = dispatcher_with_recorder();

    dispatcher.route(&Envelope::keys("a"));
    dispatcher.route(&Envelope::keys("b"));

    assert_eq!(recorder.received(), vec!["a", "b"]);
}

/// **VALUE**: Verifies route() tallies every outcome.
///
/// **WHY THIS MATTERS**: The counts end up in the pump report, the only
/// record of dropped messages after the pump exits.
#[test]
fn given_mixed_envelopes_when_routed_then_counts_each_outcome() {
    // GIVEN
    let (dispatcher, _recorder) = dispatcher_with_recorder();

    // WHEN
    dispatcher.route(&Envelope::keys("a"));
    dispatcher.route(&Envelope::keys("b"));
    dispatcher.route(&Envelope::encoding("utf-8"));
    dispatcher.route(&Envelope::new(42, Vec::new()));
    dispatcher.route(&Envelope::new(0, b"\xff".to_vec()));
    dispatcher.reject(ProtocolError::Frame {
        message: "bad magic".to_string(),
        location: ErrorLocation::from(Location::caller()),
    });

    // THEN
    assert_eq!(
        dispatcher.counts(),
        DispatchCounts {
            delivered: 2,
            encodings: 1,
            ignored: 1,
            rejected: 2,
        }
    );
    assert_eq!(dispatcher.counts().total(), 6);
}

/// **VALUE**: Verifies a panicking handler does not unwind out of route().
///
/// **WHY THIS MATTERS**: route() runs inside the pump loop (and on Windows
/// inside a window procedure, where unwinding is undefined behavior).
///
/// **BUG THIS CATCHES**: Would catch removing the `catch_unwind` guard.
#[test]
fn given_panicking_handler_when_routed_then_counted_as_rejected_and_later_messages_delivered() {
    // GIVEN: A handler that panics on "boom"
    let received = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&received);
    let dispatcher = Dispatcher::new(Arc::new(move |text: &str| {
        if text == "boom" {
            panic!("handler exploded");
        }
        sink.lock().unwrap().push(text.to_string());
    }));

    // WHEN
    dispatcher.route(&Envelope::keys("boom"));
    dispatcher.route(&Envelope::keys("after"));

    // THEN
    assert_eq!(dispatcher.counts().rejected, 1);
    assert_eq!(dispatcher.counts().delivered, 1);
    assert_eq!(*received.lock().unwrap(), vec!["after".to_string()]);
}

#[test]
fn given_cloned_dispatcher_when_routed_then_counts_are_shared() {
    let (dispatcher, _recorder) = dispatcher_with_recorder();
    let clone = dispatcher.clone();

    clone.route(&Envelope::keys("x"));

    assert_eq!(dispatcher.counts().delivered, 1);
}
