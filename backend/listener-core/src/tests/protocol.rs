// Unit tests for tags, envelopes and text decoding

use crate::error::ProtocolError;
use crate::protocol::{
    Envelope, MessageTag, TAG_ENCODING, TAG_ERROR_RESULT, TAG_EXPR, TAG_KEYS, TAG_REPLY,
    TAG_RESULT, decode_text,
};

// ============================================
// MESSAGE TAGS
// ============================================

/// **VALUE**: Verifies the reserved tag numbers map to their named variants.
///
/// **WHY THIS MATTERS**: The numbers are fixed by the clients that send them.
///
/// **BUG THIS CATCHES**: A swapped constant would route keys as something else,
/// and the handler would silently stop receiving text.
#[test]
fn given_reserved_codes_when_converted_then_map_to_named_tags() {
    assert_eq!(MessageTag::from(0), MessageTag::Keys);
    assert_eq!(MessageTag::from(1), MessageTag::Reply);
    assert_eq!(MessageTag::from(10), MessageTag::Expr);
    assert_eq!(MessageTag::from(11), MessageTag::ExprResult);
    assert_eq!(MessageTag::from(12), MessageTag::ErrorResult);
    assert_eq!(MessageTag::from(20), MessageTag::Encoding);
}

#[test]
fn given_any_tag_when_code_taken_then_returns_wire_value() {
    for code in [TAG_KEYS, TAG_REPLY, TAG_EXPR, TAG_RESULT, TAG_ERROR_RESULT, TAG_ENCODING, 99] {
        assert_eq!(MessageTag::from(code).code(), code);
    }
}

#[test]
fn given_unlisted_code_when_converted_then_unknown_and_not_reserved() {
    let tag = MessageTag::from(99);

    assert_eq!(tag, MessageTag::Unknown(99));
    assert!(!tag.is_reserved());
    assert!(MessageTag::Reply.is_reserved());
    assert_eq!(tag.to_string(), "unknown(99)");
    assert_eq!(MessageTag::Keys.to_string(), "keys(0)");
}

// ============================================
// ENVELOPES
// ============================================

#[test]
fn given_text_when_keys_envelope_built_then_tag_zero_and_nul_terminated() {
    let envelope = Envelope::keys("hello");

    assert_eq!(envelope.tag, TAG_KEYS);
    assert_eq!(envelope.payload, b"hello\0");
    assert_eq!(envelope.message_tag(), MessageTag::Keys);
}

#[test]
fn given_encoding_name_when_encoding_envelope_built_then_tag_twenty() {
    let envelope = Envelope::encoding("utf-8");

    assert_eq!(envelope.tag, TAG_ENCODING);
    assert_eq!(envelope.payload, b"utf-8\0");
}

// ============================================
// TEXT DECODING
// ============================================

/// **VALUE**: Verifies decoding stops at the first NUL.
///
/// **WHY THIS MATTERS**: Clients send C strings; anything after the
/// terminator is padding or garbage and must not reach the handler.
#[test]
fn given_payload_with_trailing_bytes_after_nul_when_decoded_then_stops_at_nul() {
    assert_eq!(decode_text(b"hello\0world").unwrap(), "hello");
}

#[test]
fn given_payload_without_nul_when_decoded_then_uses_whole_payload() {
    assert_eq!(decode_text(b"hello").unwrap(), "hello");
}

#[test]
fn given_empty_or_nul_only_payload_when_decoded_then_empty_text() {
    assert_eq!(decode_text(b"").unwrap(), "");
    assert_eq!(decode_text(b"\0").unwrap(), "");
}

#[test]
fn given_multibyte_utf8_when_decoded_then_preserved() {
    assert_eq!(decode_text("héllo wörld\0".as_bytes()).unwrap(), "héllo wörld");
}

/// **VALUE**: Verifies invalid UTF-8 fails instead of being replaced.
///
/// **WHY THIS MATTERS**: A client using a different encoding would otherwise
/// deliver corrupted text without anyone noticing.
///
/// **BUG THIS CATCHES**: Would catch a switch to `from_utf8_lossy`.
#[test]
fn given_latin1_bytes_when_decoded_then_returns_decode_error() {
    // GIVEN: "caf\xe9" in Latin-1, invalid as UTF-8
    let payload = b"caf\xe9\0";

    // WHEN
    let result = decode_text(payload);

    // THEN
    assert!(matches!(result, Err(ProtocolError::Decode { .. })));
}

#[test]
fn given_invalid_bytes_after_nul_when_decoded_then_ignored() {
    assert_eq!(decode_text(b"ok\0\xff\xfe").unwrap(), "ok");
}
