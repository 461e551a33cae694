//! Datagram framing for endpoints that carry envelopes over a byte transport.
//!
//! ```text
//! ┌────────┬──────┬───────────┬─────────────────────┐
//! │ "VM"   │ kind │ tag u32LE │ payload (≤ 64 KiB)  │
//! └────────┴──────┴───────────┴─────────────────────┘
//! ```
//!
//! `kind` 0 is an ordinary envelope. `kind` 1 is the quit sentinel: its
//! payload is the 16-byte token of the endpoint it targets, so a quit frame
//! forged by another process without the token is just an unknown message.

use crate::error::ProtocolError;
use crate::protocol::Envelope;

use common::ErrorLocation;

use std::panic::Location;

pub const FRAME_MAGIC: [u8; 2] = *b"VM";
pub const FRAME_HEADER_LEN: usize = 7;
pub const MAX_PAYLOAD: usize = 64 * 1024;
pub const MAX_FRAME_LEN: usize = FRAME_HEADER_LEN + MAX_PAYLOAD;
pub const QUIT_TOKEN_LEN: usize = 16;

const KIND_ENVELOPE: u8 = 0;
const KIND_QUIT: u8 = 1;

pub type QuitToken = [u8; QUIT_TOKEN_LEN];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    Envelope(Envelope),
    Quit(QuitToken),
}

/// Serialize a frame into one datagram.
///
/// # Errors
///
/// Returns [`ProtocolError::Oversized`] if the payload exceeds [`MAX_PAYLOAD`].
#[track_caller]
pub fn encode(frame: &Frame) -> Result<Vec<u8>, ProtocolError> {
    let (kind, tag, payload): (u8, u32, &[u8]) = match frame {
        Frame::Envelope(envelope) => (KIND_ENVELOPE, envelope.tag, &envelope.payload),
        Frame::Quit(token) => (KIND_QUIT, 0, token),
    };

    if payload.len() > MAX_PAYLOAD {
        return Err(ProtocolError::Oversized {
            message: format!(
                "Payload of {} bytes exceeds the {MAX_PAYLOAD}-byte limit",
                payload.len()
            ),
            location: ErrorLocation::from(Location::caller()),
        });
    }

    let mut buf = Vec::with_capacity(FRAME_HEADER_LEN + payload.len());
    buf.extend_from_slice(&FRAME_MAGIC);
    buf.push(kind);
    buf.extend_from_slice(&tag.to_le_bytes());
    buf.extend_from_slice(payload);
    Ok(buf)
}

/// Parse one received datagram.
///
/// # Errors
///
/// - [`ProtocolError::Frame`] - short header, bad magic, unknown kind, or a
///   quit frame whose token has the wrong length
/// - [`ProtocolError::Oversized`] - more than [`MAX_PAYLOAD`] payload bytes
#[track_caller]
pub fn decode(bytes: &[u8]) -> Result<Frame, ProtocolError> {
    if bytes.len() < FRAME_HEADER_LEN {
        return Err(ProtocolError::Frame {
            message: format!("Datagram of {} bytes is shorter than the header", bytes.len()),
            location: ErrorLocation::from(Location::caller()),
        });
    }

    if bytes[..2] != FRAME_MAGIC {
        return Err(ProtocolError::Frame {
            message: format!("Bad frame magic {:02x}{:02x}", bytes[0], bytes[1]),
            location: ErrorLocation::from(Location::caller()),
        });
    }

    let payload = &bytes[FRAME_HEADER_LEN..];
    if payload.len() > MAX_PAYLOAD {
        return Err(ProtocolError::Oversized {
            message: format!(
                "Received payload of {} bytes exceeds the {MAX_PAYLOAD}-byte limit",
                payload.len()
            ),
            location: ErrorLocation::from(Location::caller()),
        });
    }

    let tag = u32::from_le_bytes([bytes[3], bytes[4], bytes[5], bytes[6]]);

    match bytes[2] {
        KIND_ENVELOPE => Ok(Frame::Envelope(Envelope::new(tag, payload))),
        KIND_QUIT => {
            let token: QuitToken = payload.try_into().map_err(|_| ProtocolError::Frame {
                message: format!(
                    "Quit frame carries {} token bytes, expected {QUIT_TOKEN_LEN}",
                    payload.len()
                ),
                location: ErrorLocation::from(Location::caller()),
            })?;
            Ok(Frame::Quit(token))
        }
        other => Err(ProtocolError::Frame {
            message: format!("Unknown frame kind {other}"),
            location: ErrorLocation::from(Location::caller()),
        }),
    }
}
