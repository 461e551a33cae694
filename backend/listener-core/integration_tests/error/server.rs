use listener_core::error::{CoreError, EndpointError, ServerError};
use listener_core::ServerIdentity;

use common::ErrorLocation;

use std::error::Error;
use std::io::{Error as IoError, ErrorKind};
use std::panic::Location;

#[test]
fn given_invalid_identity_when_formatted_then_includes_kind_message_and_location() {
    // GIVEN
    let err = ServerIdentity::new("a/b").unwrap_err();

    // WHEN
    let error_string = format!("{err}");

    // THEN
    assert!(error_string.contains("Invalid Identity Error"));
    assert!(error_string.contains("a/b"));
    assert!(error_string.contains("server.rs"));
}

/// **VALUE**: Verifies `ServerError::AlreadyStarted` renders its kind, message
/// and location.
///
/// **WHY THIS MATTERS**: A double start is a caller bug; the location must
/// lead back to the offending call site.
///
/// **BUG THIS CATCHES**: Would catch a Display format without the location,
/// which leaves nothing pointing back to the call site.
#[test]
fn given_already_started_error_when_formatted_then_includes_location() {
    // GIVEN
    let err = ServerError::AlreadyStarted {
        message: "Server 'GVIM' is already running".to_string(),
        location: ErrorLocation::from(Location::caller()),
    };

    // WHEN
    let error_string = err.to_string();

    // THEN
    assert!(error_string.starts_with("Already Started Error"));
    assert!(error_string.contains("GVIM"));
    assert!(error_string.contains("server.rs"));
}

/// **VALUE**: Verifies endpoint creation failures keep the endpoint error as
/// their source.
///
/// **BUG THIS CATCHES**: Would catch dropping `#[source]`, which hides whether
/// the name was taken or the OS refused the registration.
#[test]
fn given_endpoint_creation_error_when_inspected_then_source_is_endpoint_error() {
    // GIVEN
    let inner = EndpointError::NameInUse {
        message: "GVIM is taken".to_string(),
        location: ErrorLocation::from(Location::caller()),
    };
    let err = ServerError::EndpointCreation {
        message: "Cannot create endpoint 'GVIM'".to_string(),
        location: ErrorLocation::from(Location::caller()),
        source: inner,
    };

    // WHEN
    let source = err.source().expect("source should be preserved");

    // THEN
    assert!(source.to_string().contains("Name In Use Error"));
    assert!(source.to_string().contains("GVIM is taken"));
}

#[test]
fn given_spawn_error_when_inspected_then_preserves_io_source() {
    let err = ServerError::Spawn {
        message: "Cannot spawn pump thread".to_string(),
        location: ErrorLocation::from(Location::caller()),
        source: IoError::new(ErrorKind::OutOfMemory, "no threads left"),
    };

    assert!(err.to_string().contains("Spawn Error"));
    assert!(err.source().unwrap().to_string().contains("no threads left"));
}

#[test]
fn given_server_error_when_converted_to_core_error_then_display_is_transparent() {
    let err = ServerError::PumpPanicked {
        message: "Pump thread for 'GVIM' panicked".to_string(),
        location: ErrorLocation::from(Location::caller()),
    };
    let expected = err.to_string();

    let core: CoreError = err.into();

    assert_eq!(core.to_string(), expected);
}
