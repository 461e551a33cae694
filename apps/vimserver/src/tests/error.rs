// Unit tests for AppError conversions

use crate::error::AppError;

use listener_core::error::{ConfigError, SendError, ServerError};

use common::ErrorLocation;

use std::panic::Location;

/// **VALUE**: Verifies core errors keep their full text when converted.
///
/// **WHY THIS MATTERS**: The binary prints only the AppError; the core's
/// message and location are the useful part.
#[test]
fn given_send_error_when_converted_then_message_preserved() {
    // GIVEN
    let err = SendError::Timeout {
        message: "No endpoint at /run/vimserver/GVIM".to_string(),
        location: ErrorLocation::from(Location::caller()),
    };

    // WHEN
    let app: AppError = AppError::from(err);

    // THEN
    let rendered = app.to_string();
    assert!(rendered.starts_with("Send Error"));
    assert!(rendered.contains("Timeout Error"));
    assert!(rendered.contains("/run/vimserver/GVIM"));
}

#[test]
fn given_server_error_when_converted_then_server_variant() {
    let err = ServerError::InvalidIdentity {
        message: "Invalid server name: \"a/b\"".to_string(),
        location: ErrorLocation::from(Location::caller()),
    };

    let app = AppError::from(err);

    assert!(matches!(app, AppError::Server { .. }));
    assert!(app.to_string().contains("a/b"));
}

#[test]
fn given_config_error_when_converted_then_config_variant_with_location() {
    let err = ConfigError::Validation {
        location: ErrorLocation::from(Location::caller()),
        reason: "Invalid log level: loud".to_string(),
    };

    let app = AppError::from(err);

    assert!(matches!(app, AppError::Config { .. }));
    assert!(app.to_string().contains("loud"));
    assert!(app.to_string().contains("error.rs"));
}
