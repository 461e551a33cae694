use common::ErrorLocation;

use std::io::Error as IoError;
use std::panic::Location;

use thiserror::Error as ThisError;

#[derive(Debug, ThisError)]
pub enum EndpointError {
    #[error("Name In Use Error: {message} {location}")]
    NameInUse {
        message: String,
        location: ErrorLocation,
    },

    #[error("Create Error: {message} {location}")]
    Create {
        message: String,
        location: ErrorLocation,
    },

    #[error("Retrieve Error: {message} {location}")]
    Retrieve {
        message: String,
        location: ErrorLocation,
    },

    #[error("Post Error: {message} {location}")]
    Post {
        message: String,
        location: ErrorLocation,
    },

    #[error("Queue Full Error: {message} {location}")]
    QueueFull {
        message: String,
        location: ErrorLocation,
    },

    #[error("Unregister Error: {message} {location}")]
    Unregister {
        message: String,
        location: ErrorLocation,
    },

    #[error("Destroy Error: {message} {location}")]
    Destroy {
        message: String,
        location: ErrorLocation,
    },

    #[error("IO Error: {message} {location}")]
    Io {
        message: String,
        location: ErrorLocation,
    },
}

impl From<IoError> for EndpointError {
    #[track_caller]
    fn from(error: IoError) -> Self {
        EndpointError::Io {
            message: error.to_string(),
            location: ErrorLocation::from(Location::caller()),
        }
    }
}
