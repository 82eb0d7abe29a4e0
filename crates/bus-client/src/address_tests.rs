//! Tests for entity addressing and resolution.

use super::*;

fn unconstrained() -> ConnectionConfig {
    ConnectionConfig::for_namespace("unit.test.bus")
}

fn constrained(entity: &str) -> ConnectionConfig {
    ConnectionConfig {
        host: "unit.test.bus".to_string(),
        entity_path: Some(EntityPath::new(entity).unwrap()),
    }
}

// ============================================================================
// Entity Path Canonicalization
// ============================================================================

#[test]
fn test_queue_resolves_to_its_name() {
    let resolved = resolve(&"orders".into(), None, None, &unconstrained()).unwrap();

    assert_eq!(resolved.entity_path.as_str(), "orders");
}

#[test]
fn test_subscription_resolves_to_path_template() {
    let resolved = resolve(&("topicA", "subB").into(), None, None, &unconstrained()).unwrap();

    assert_eq!(resolved.entity_path.as_str(), "topicA/Subscriptions/subB");
}

#[test]
fn test_subscription_path_is_case_sensitive_and_untrimmed() {
    let resolved = resolve(&("Orders ", " Archivers").into(), None, None, &unconstrained()).unwrap();

    assert_eq!(resolved.entity_path.as_str(), "Orders /Subscriptions/ Archivers");
}

#[test]
fn test_empty_queue_name_is_rejected() {
    let result = resolve(&"".into(), None, None, &unconstrained());

    assert!(matches!(result, Err(BusError::InvalidArgument { .. })));
}

#[test]
fn test_empty_topic_or_subscription_is_rejected() {
    assert!(matches!(
        resolve(&("", "sub").into(), None, None, &unconstrained()),
        Err(BusError::InvalidArgument { .. })
    ));
    assert!(matches!(
        resolve(&("topic", "").into(), None, None, &unconstrained()),
        Err(BusError::InvalidArgument { .. })
    ));
}

// ============================================================================
// Sub-Queue Suffixes
// ============================================================================

#[test]
fn test_dead_letter_suffix_is_exact() {
    let resolved = resolve(
        &"orders".into(),
        None,
        Some(SubQueue::DeadLetter),
        &unconstrained(),
    )
    .unwrap();

    assert_eq!(resolved.entity_path.as_str(), "orders/$DeadLetterQueue");
}

#[test]
fn test_transfer_dead_letter_suffix_is_exact() {
    let resolved = resolve(
        &"orders".into(),
        None,
        Some(SubQueue::TransferDeadLetter),
        &unconstrained(),
    )
    .unwrap();

    assert_eq!(
        resolved.entity_path.as_str(),
        "orders/$Transfer/$DeadLetterQueue"
    );
}

#[test]
fn test_sub_queue_suffix_applies_after_subscription_path() {
    let resolved = resolve(
        &("topicA", "subB").into(),
        None,
        Some(SubQueue::DeadLetter),
        &unconstrained(),
    )
    .unwrap();

    assert_eq!(
        resolved.entity_path.as_str(),
        "topicA/Subscriptions/subB/$DeadLetterQueue"
    );
}

#[test]
fn test_absent_sub_queue_leaves_base_path() {
    let resolved = resolve(&"orders".into(), None, None, &unconstrained()).unwrap();

    assert_eq!(resolved.entity_path.as_str(), "orders");
}

// ============================================================================
// Receive Mode
// ============================================================================

#[test]
fn test_receive_mode_defaults_to_peek_lock() {
    let resolved = resolve(&"orders".into(), None, None, &unconstrained()).unwrap();

    assert_eq!(resolved.receive_mode, ReceiveMode::PeekLock);
}

#[test]
fn test_explicit_receive_mode_is_kept() {
    let resolved = resolve(
        &"orders".into(),
        Some(ReceiveMode::ReceiveAndDelete),
        None,
        &unconstrained(),
    )
    .unwrap();

    assert_eq!(resolved.receive_mode, ReceiveMode::ReceiveAndDelete);
}

#[test]
fn test_receive_mode_parses_known_values() {
    assert_eq!("peekLock".parse::<ReceiveMode>().unwrap(), ReceiveMode::PeekLock);
    assert_eq!(
        "receiveAndDelete".parse::<ReceiveMode>().unwrap(),
        ReceiveMode::ReceiveAndDelete
    );
}

#[test]
fn test_receive_mode_rejects_unknown_value_naming_it() {
    let err = "peeklock".parse::<ReceiveMode>().unwrap_err();

    let message = err.to_string();
    assert!(message.contains("peeklock"), "{}", message);
    assert!(message.contains("peekLock"), "{}", message);
    assert!(message.contains("receiveAndDelete"), "{}", message);
}

#[test]
fn test_sub_queue_parses_known_values() {
    assert_eq!("deadLetter".parse::<SubQueue>().unwrap(), SubQueue::DeadLetter);
    assert_eq!(
        "transferDeadLetter".parse::<SubQueue>().unwrap(),
        SubQueue::TransferDeadLetter
    );
}

#[test]
fn test_sub_queue_rejects_unknown_value_naming_accepted_set() {
    let err = "deadletter".parse::<SubQueue>().unwrap_err();

    let message = err.to_string();
    assert!(message.contains("deadletter"), "{}", message);
    assert!(message.contains("deadLetter"), "{}", message);
    assert!(message.contains("transferDeadLetter"), "{}", message);
}

// ============================================================================
// Entity Constraint
// ============================================================================

#[test]
fn test_matching_entity_passes_constraint() {
    let resolved = resolve(&"Q1".into(), None, None, &constrained("Q1")).unwrap();

    assert_eq!(resolved.entity_path.as_str(), "Q1");
}

#[test]
fn test_mismatched_entity_fails_constraint() {
    let result = resolve(&"Q2".into(), None, None, &constrained("Q1"));

    match result {
        Err(BusError::EntityMismatch {
            requested,
            configured,
        }) => {
            assert_eq!(requested, "Q2");
            assert_eq!(configured, "Q1");
        }
        other => panic!("Expected EntityMismatch, got: {:?}", other),
    }
}

#[test]
fn test_constraint_is_checked_against_base_before_suffix() {
    // The bound entity path never carries a sub-queue suffix, so the check
    // must compare the base path.
    let resolved = resolve(
        &"Q1".into(),
        None,
        Some(SubQueue::DeadLetter),
        &constrained("Q1"),
    )
    .unwrap();

    assert_eq!(resolved.entity_path.as_str(), "Q1/$DeadLetterQueue");
}

#[test]
fn test_constraint_is_case_sensitive() {
    let result = resolve(&"q1".into(), None, None, &constrained("Q1"));

    assert!(matches!(result, Err(BusError::EntityMismatch { .. })));
}

// ============================================================================
// Descriptor Conversions
// ============================================================================

#[test]
fn test_descriptor_from_str_is_a_queue() {
    let descriptor: EntityDescriptor = "orders".into();

    assert_eq!(descriptor, EntityDescriptor::Queue("orders".to_string()));
}

#[test]
fn test_descriptor_from_pair_is_a_subscription() {
    let descriptor: EntityDescriptor = ("orders", "archivers").into();

    assert_eq!(
        descriptor,
        EntityDescriptor::Subscription {
            topic: "orders".to_string(),
            subscription: "archivers".to_string(),
        }
    );
}

#[test]
fn test_entity_path_with_sub_queue_appends_suffix() {
    let base = EntityPath::new("orders").unwrap();

    assert_eq!(
        base.with_sub_queue(SubQueue::TransferDeadLetter).as_str(),
        "orders/$Transfer/$DeadLetterQueue"
    );
}
