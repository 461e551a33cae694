//! Tagged-envelope wire protocol spoken by Vim clients.
//!
//! Every inbound message is an integer tag plus a raw byte payload. Only two
//! tags carry behavior on the receiving side:
//!
//! - [`MessageTag::Keys`] - NUL-terminated text for the handler
//! - [`MessageTag::Encoding`] - the client's text encoding, decoded and discarded
//!
//! The reply/expression tags are reserved so they can be recognized and
//! routed, but this receiver has no request path, so the dispatcher treats
//! them like any other unrecognized tag.

pub mod frame;

use crate::error::ProtocolError;

use common::ErrorLocation;

use std::fmt;
use std::panic::Location;

/// Keys to add to the server's input queue.
pub const TAG_KEYS: u32 = 0;
/// Reply sent in response to a request.
pub const TAG_REPLY: u32 = 1;
/// Expression to evaluate on the server.
pub const TAG_EXPR: u32 = 10;
/// Result of an expression evaluation.
pub const TAG_RESULT: u32 = 11;
/// Error result of an expression evaluation.
pub const TAG_ERROR_RESULT: u32 = 12;
/// Text encoding the client is using.
pub const TAG_ENCODING: u32 = 20;

/// Decoded meaning of an envelope tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageTag {
    Keys,
    Reply,
    Expr,
    ExprResult,
    ErrorResult,
    Encoding,
    Unknown(u32),
}

impl MessageTag {
    /// The integer carried on the wire.
    pub fn code(self) -> u32 {
        match self {
            MessageTag::Keys => TAG_KEYS,
            MessageTag::Reply => TAG_REPLY,
            MessageTag::Expr => TAG_EXPR,
            MessageTag::ExprResult => TAG_RESULT,
            MessageTag::ErrorResult => TAG_ERROR_RESULT,
            MessageTag::Encoding => TAG_ENCODING,
            MessageTag::Unknown(code) => code,
        }
    }

    /// True for every tag the protocol reserves, handled or not.
    pub fn is_reserved(self) -> bool {
        !matches!(self, MessageTag::Unknown(_))
    }
}

impl From<u32> for MessageTag {
    fn from(code: u32) -> Self {
        match code {
            TAG_KEYS => MessageTag::Keys,
            TAG_REPLY => MessageTag::Reply,
            TAG_EXPR => MessageTag::Expr,
            TAG_RESULT => MessageTag::ExprResult,
            TAG_ERROR_RESULT => MessageTag::ErrorResult,
            TAG_ENCODING => MessageTag::Encoding,
            other => MessageTag::Unknown(other),
        }
    }
}

impl fmt::Display for MessageTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MessageTag::Keys => write!(f, "keys({TAG_KEYS})"),
            MessageTag::Reply => write!(f, "reply({TAG_REPLY})"),
            MessageTag::Expr => write!(f, "expr({TAG_EXPR})"),
            MessageTag::ExprResult => write!(f, "result({TAG_RESULT})"),
            MessageTag::ErrorResult => write!(f, "error_result({TAG_ERROR_RESULT})"),
            MessageTag::Encoding => write!(f, "encoding({TAG_ENCODING})"),
            MessageTag::Unknown(code) => write!(f, "unknown({code})"),
        }
    }
}

/// One inbound message: a tag and its raw payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    pub tag: u32,
    pub payload: Vec<u8>,
}

impl Envelope {
    pub fn new(tag: u32, payload: impl Into<Vec<u8>>) -> Self {
        Self {
            tag,
            payload: payload.into(),
        }
    }

    /// Tag-0 envelope carrying `text` with its NUL terminator.
    pub fn keys(text: &str) -> Self {
        Self::new(TAG_KEYS, nul_terminated(text))
    }

    /// Tag-20 envelope announcing the client's encoding name.
    pub fn encoding(name: &str) -> Self {
        Self::new(TAG_ENCODING, nul_terminated(name))
    }

    pub fn message_tag(&self) -> MessageTag {
        MessageTag::from(self.tag)
    }
}

fn nul_terminated(text: &str) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(text.len() + 1);
    bytes.extend_from_slice(text.as_bytes());
    bytes.push(0);
    bytes
}

/// Decode a NUL-terminated text payload.
///
/// Bytes after the first NUL are ignored; a payload without a NUL is used
/// whole. Text must be UTF-8.
///
/// # Errors
///
/// Returns [`ProtocolError::Decode`] if the bytes before the terminator are
/// not valid UTF-8.
#[track_caller]
pub fn decode_text(payload: &[u8]) -> Result<&str, ProtocolError> {
    let end = payload
        .iter()
        .position(|&byte| byte == 0)
        .unwrap_or(payload.len());

    std::str::from_utf8(&payload[..end]).map_err(|e| ProtocolError::Decode {
        message: format!("Payload is not valid UTF-8: {e}"),
        location: ErrorLocation::from(Location::caller()),
    })
}
