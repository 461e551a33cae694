use crate::error::endpoint::EndpointError;

use common::ErrorLocation;

use std::io::Error as IoError;

use thiserror::Error as ThisError;

#[derive(Debug, ThisError)]
pub enum ServerError {
    #[error("Already Started Error: {message} {location}")]
    AlreadyStarted {
        message: String,
        location: ErrorLocation,
    },

    #[error("Invalid Identity Error: {message} {location}")]
    InvalidIdentity {
        message: String,
        location: ErrorLocation,
    },

    #[error("Spawn Error: {message} {location}")]
    Spawn {
        message: String,
        location: ErrorLocation,
        #[source]
        source: IoError,
    },

    #[error("Endpoint Creation Error: {message} {location}")]
    EndpointCreation {
        message: String,
        location: ErrorLocation,
        #[source]
        source: EndpointError,
    },

    #[error("Retrieval Error: {message} {location}")]
    Retrieval {
        message: String,
        location: ErrorLocation,
        #[source]
        source: EndpointError,
    },

    #[error("Pump Panicked Error: {message} {location}")]
    PumpPanicked {
        message: String,
        location: ErrorLocation,
    },
}
