// Unit tests for server name validation

use crate::error::ServerError;
use crate::identity::ServerIdentity;

/// **VALUE**: Verifies ordinary Vim-style server names are accepted unchanged.
///
/// **WHY THIS MATTERS**: Names like `GVIM` or `GVIM1` are what clients look up.
/// Any normalization would make the endpoint unreachable by its real name.
#[test]
fn given_plain_name_when_new_then_keeps_name_verbatim() {
    let identity = ServerIdentity::new("GVIM1").unwrap();

    assert_eq!(identity.as_str(), "GVIM1");
    assert_eq!(identity.to_string(), "GVIM1");
}

#[test]
fn given_name_with_spaces_and_unicode_when_new_then_accepts() {
    assert!(ServerIdentity::new("my server").is_ok());
    assert!(ServerIdentity::new("Vïm-λ").is_ok());
}

/// **VALUE**: Verifies names that would escape the socket directory are rejected.
///
/// **WHY THIS MATTERS**: On Unix the name becomes a path component below the
/// socket directory.
///
/// **BUG THIS CATCHES**: Would catch a regex change that lets `../x` or `a/b`
/// through, binding sockets outside the configured directory.
#[test]
fn given_path_like_names_when_new_then_rejects_as_invalid_identity() {
    for name in ["", ".", "..", "a/b", "../escape", "a\\b", "nul\0byte"] {
        let result = ServerIdentity::new(name);
        assert!(
            matches!(result, Err(ServerError::InvalidIdentity { .. })),
            "{name:?} should be rejected"
        );
    }
}

#[test]
fn given_name_at_length_limit_when_new_then_accepts_and_one_more_rejects() {
    // GIVEN: 64 and 65 character names
    let at_limit = "v".repeat(64);
    let over_limit = "v".repeat(65);

    // WHEN/THEN
    assert!(ServerIdentity::new(at_limit).is_ok());
    assert!(matches!(
        ServerIdentity::new(over_limit),
        Err(ServerError::InvalidIdentity { .. })
    ));
}

#[test]
fn given_equal_names_when_compared_then_identities_are_equal() {
    assert_eq!(
        ServerIdentity::new("GVIM").unwrap(),
        ServerIdentity::new(String::from("GVIM")).unwrap()
    );
}
