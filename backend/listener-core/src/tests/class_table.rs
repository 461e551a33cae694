// Unit tests for class label registration

use crate::CLASS_LABEL_PREFIX;
use crate::error::EndpointError;
use crate::identity::ServerIdentity;
use crate::registrar::ClassTable;
use crate::registrar::class_table::fresh_class_label;

#[test]
fn given_fresh_labels_when_generated_then_prefixed_and_distinct() {
    let first = fresh_class_label();
    let second = fresh_class_label();

    assert!(first.starts_with(CLASS_LABEL_PREFIX));
    assert!(first.starts_with("VIM_MESSAGES_"));
    assert_ne!(first, second);
}

/// **VALUE**: Verifies two registrations for the same server get different
/// labels.
///
/// **WHY THIS MATTERS**: A restart registers a new label while the old one
/// may still be in teardown; sharing a label would let one teardown remove
/// the other's registration.
#[test]
fn given_same_identity_when_registered_twice_then_two_labels() {
    // GIVEN
    let table = ClassTable::new();
    let identity = ServerIdentity::new("GVIM").unwrap();

    // WHEN
    let first = table.register(&identity).unwrap();
    let second = table.register(&identity).unwrap();

    // THEN
    assert_ne!(first, second);
    assert_eq!(table.len(), 2);
    let mut labels = table.labels_for(&identity);
    labels.sort();
    let mut expected = vec![first, second];
    expected.sort();
    assert_eq!(labels, expected);
}

#[test]
fn given_registered_label_when_unregistered_then_removed() {
    let table = ClassTable::new();
    let identity = ServerIdentity::new("GVIM").unwrap();
    let label = table.register(&identity).unwrap();

    table.unregister(&label).unwrap();

    assert!(!table.contains(&label));
    assert!(table.is_empty());
}

#[test]
fn given_unknown_label_when_unregistered_then_unregister_error() {
    let table = ClassTable::new();

    let result = table.unregister("VIM_MESSAGES_missing");

    assert!(matches!(result, Err(EndpointError::Unregister { .. })));
}
