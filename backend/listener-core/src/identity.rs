//! Server identity: the name a listener endpoint is addressed by.

use crate::error::ServerError;

use common::ErrorLocation;

use std::fmt;
use std::panic::Location;

use once_cell::sync::Lazy;
use regex::Regex;

const IDENTITY_MAX_CHARS: usize = 64;
const IDENTITY_PATTERN: &str = r"^[^/\\\x00]+$";

static IDENTITY_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(IDENTITY_PATTERN).expect("valid regex pattern"));

/// Immutable, validated endpoint name.
///
/// Uniqueness on the host is the caller's responsibility. A clash is only
/// detected when the pump tries to register the endpoint and fails.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ServerIdentity {
    name: String,
}

impl ServerIdentity {
    /// Validate and wrap a server name.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::InvalidIdentity`] if the name is empty, longer
    /// than 64 characters, is `.`/`..`, or contains a path separator or NUL.
    #[track_caller]
    pub fn new(name: impl Into<String>) -> Result<Self, ServerError> {
        let name = name.into();

        if name.chars().count() > IDENTITY_MAX_CHARS {
            return Err(ServerError::InvalidIdentity {
                message: format!(
                    "Server name is {} characters long (max {IDENTITY_MAX_CHARS})",
                    name.chars().count()
                ),
                location: ErrorLocation::from(Location::caller()),
            });
        }

        if name == "." || name == ".." || !IDENTITY_REGEX.is_match(&name) {
            return Err(ServerError::InvalidIdentity {
                message: format!("Invalid server name: {name:?}"),
                location: ErrorLocation::from(Location::caller()),
            });
        }

        Ok(Self { name })
    }

    pub fn as_str(&self) -> &str {
        &self.name
    }
}

impl fmt::Display for ServerIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

impl AsRef<str> for ServerIdentity {
    fn as_ref(&self) -> &str {
        &self.name
    }
}
