// Unit tests for datagram framing

use crate::error::ProtocolError;
use crate::protocol::Envelope;
use crate::protocol::frame::{
    FRAME_HEADER_LEN, FRAME_MAGIC, Frame, MAX_FRAME_LEN, MAX_PAYLOAD, decode, encode,
};

/// **VALUE**: Verifies the exact byte layout of an encoded keys envelope.
///
/// **WHY THIS MATTERS**: Senders in other processes, possibly other builds,
/// rely on this layout. A layout change is a protocol break.
#[test]
fn given_keys_envelope_when_encoded_then_matches_wire_layout() {
    // GIVEN
    let frame = Frame::Envelope(Envelope::keys("hi"));

    // WHEN
    let bytes = encode(&frame).unwrap();

    // THEN: magic, kind 0, tag 0 little-endian, payload
    assert_eq!(bytes, b"VM\x00\x00\x00\x00\x00hi\x00");
}

#[test]
fn given_encoded_envelope_with_large_tag_when_decoded_then_tag_is_little_endian() {
    let bytes = encode(&Frame::Envelope(Envelope::new(0x0102_0304, b"x".to_vec()))).unwrap();

    assert_eq!(&bytes[3..7], &[0x04, 0x03, 0x02, 0x01]);
    assert_eq!(
        decode(&bytes).unwrap(),
        Frame::Envelope(Envelope::new(0x0102_0304, b"x".to_vec()))
    );
}

#[test]
fn given_quit_frame_when_encoded_and_decoded_then_token_survives() {
    let token = [7u8; 16];

    let bytes = encode(&Frame::Quit(token)).unwrap();

    assert_eq!(bytes.len(), FRAME_HEADER_LEN + 16);
    assert_eq!(decode(&bytes).unwrap(), Frame::Quit(token));
}

#[test]
fn given_payload_at_limit_when_encoded_then_fits_max_frame() {
    let bytes = encode(&Frame::Envelope(Envelope::new(0, vec![b'a'; MAX_PAYLOAD]))).unwrap();

    assert_eq!(bytes.len(), MAX_FRAME_LEN);
}

/// **VALUE**: Verifies senders cannot build a frame the receiver would reject.
///
/// **BUG THIS CATCHES**: Would catch a missing size check, which would send
/// datagrams the endpoint drops as oversized.
#[test]
fn given_payload_over_limit_when_encoded_then_oversized_error() {
    let result = encode(&Frame::Envelope(Envelope::new(0, vec![0; MAX_PAYLOAD + 1])));

    assert!(matches!(result, Err(ProtocolError::Oversized { .. })));
}

#[test]
fn given_short_datagram_when_decoded_then_frame_error() {
    assert!(matches!(decode(b"VM\x00"), Err(ProtocolError::Frame { .. })));
    assert!(matches!(decode(b""), Err(ProtocolError::Frame { .. })));
}

#[test]
fn given_wrong_magic_when_decoded_then_frame_error() {
    let mut bytes = encode(&Frame::Envelope(Envelope::keys("x"))).unwrap();
    bytes[0] = b'X';

    assert_ne!(bytes[..2], FRAME_MAGIC);
    assert!(matches!(decode(&bytes), Err(ProtocolError::Frame { .. })));
}

#[test]
fn given_unknown_kind_when_decoded_then_frame_error() {
    let bytes = b"VM\x09\x00\x00\x00\x00";

    assert!(matches!(decode(bytes), Err(ProtocolError::Frame { .. })));
}

#[test]
fn given_quit_frame_with_short_token_when_decoded_then_frame_error() {
    let bytes = b"VM\x01\x00\x00\x00\x00abc";

    assert!(matches!(decode(bytes), Err(ProtocolError::Frame { .. })));
}

#[test]
fn given_empty_envelope_when_decoded_then_empty_payload() {
    let bytes = b"VM\x00\x63\x00\x00\x00";

    assert_eq!(decode(bytes).unwrap(), Frame::Envelope(Envelope::new(99, Vec::new())));
}
