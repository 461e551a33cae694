// Unit tests for received-text rendering

use crate::listen::format_received;

use serde_json::Value;

#[test]
fn given_plain_mode_when_formatted_then_text_verbatim() {
    assert_eq!(format_received("GVIM", ":e foo.txt", false), ":e foo.txt");
}

/// **VALUE**: Verifies `--json` output is one parseable object per text.
///
/// **BUG THIS CATCHES**: Would catch hand-built JSON that breaks on quotes
/// or newlines in the received text.
#[test]
fn given_json_mode_when_text_has_quotes_and_newline_then_valid_json_line() {
    // GIVEN
    let text = "say \"hi\"\nnow";

    // WHEN
    let line = format_received("GVIM", text, true);

    // THEN
    assert!(!line.contains('\n'));
    let value: Value = serde_json::from_str(&line).unwrap();
    assert_eq!(value["server"], "GVIM");
    assert_eq!(value["text"], text);
    assert!(value["received_at"].as_str().unwrap().ends_with('Z'));
}
