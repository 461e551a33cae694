use listener_core::error::{EndpointError, ProtocolError, SendError};
use listener_core::protocol::decode_text;

use std::io::{Error as IoError, ErrorKind};

/// **VALUE**: Verifies `From<IoError>` records where the conversion happened.
///
/// **WHY THIS MATTERS**: Socket errors are converted with `?` in many places;
/// without the location every IO failure looks the same.
///
/// **BUG THIS CATCHES**: Would catch removing `#[track_caller]` from the
/// `From` impl, which would report the error module's own file instead.
#[test]
fn given_io_error_when_converted_to_endpoint_error_then_location_is_this_file() {
    // GIVEN
    let io_err = IoError::new(ErrorKind::PermissionDenied, "socket dir not writable");

    // WHEN
    let err = EndpointError::from(io_err);

    // THEN
    let error_string = err.to_string();
    assert!(error_string.contains("IO Error"));
    assert!(error_string.contains("socket dir not writable"));
    assert!(error_string.contains("endpoint.rs"));
    assert!(error_string.contains("integration_tests"));
}

#[test]
fn given_io_error_when_converted_to_send_error_then_io_variant() {
    let err = SendError::from(IoError::new(ErrorKind::BrokenPipe, "gone"));

    assert!(matches!(err, SendError::Io { .. }));
    assert!(err.to_string().contains("gone"));
}

#[test]
fn given_decode_failure_when_formatted_then_names_utf8() {
    let err = decode_text(b"\xff").unwrap_err();

    assert!(matches!(err, ProtocolError::Decode { .. }));
    assert!(err.to_string().contains("Decode Error"));
    assert!(err.to_string().contains("UTF-8"));
}
