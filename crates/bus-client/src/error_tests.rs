//! Tests for the bus client error taxonomy.

use super::*;

// ============================================================================
// Display Tests
// ============================================================================

#[test]
fn test_invalid_argument_names_value_and_accepted_set() {
    let err = BusError::invalid_argument("sub_queue", "bogus", "`deadLetter` or `transferDeadLetter`");

    let message = err.to_string();
    assert!(message.contains("bogus"), "message should name the value: {}", message);
    assert!(message.contains("deadLetter"), "message should name accepted values: {}", message);
    assert!(
        message.contains("transferDeadLetter"),
        "message should name accepted values: {}",
        message
    );
}

#[test]
fn test_entity_mismatch_names_both_paths() {
    let err = BusError::EntityMismatch {
        requested: "Q2".to_string(),
        configured: "Q1".to_string(),
    };

    let message = err.to_string();
    assert!(message.contains("Q1"));
    assert!(message.contains("Q2"));
}

#[test]
fn test_configuration_error_display() {
    let err = BusError::from(ConfigurationError::InvalidRetryTimeout { value_ms: -5 });
    assert!(err.to_string().contains("-5ms"));

    let err = BusError::from(ConfigurationError::Missing {
        key: "Endpoint".to_string(),
    });
    assert!(err.to_string().contains("Endpoint"));
}

// ============================================================================
// Transience Classification
// ============================================================================

#[test]
fn test_validation_errors_are_not_transient() {
    let errors = vec![
        BusError::Configuration(ConfigurationError::InvalidRetryTimeout { value_ms: 0 }),
        BusError::invalid_argument("receive_mode", "x", "y"),
        BusError::EntityMismatch {
            requested: "a".to_string(),
            configured: "b".to_string(),
        },
        BusError::SessionAcquisitionCancelled,
        BusError::SessionNotFound {
            session_id: "s".to_string(),
        },
        BusError::LockLost {
            token: "t".to_string(),
        },
        BusError::ClientClosed,
    ];

    for err in errors {
        assert!(!err.is_transient(), "{} should not be transient", err);
        assert!(!err.should_retry());
    }
}

#[test]
fn test_network_and_contention_errors_are_transient() {
    let errors = vec![
        BusError::Connection {
            message: "reset".to_string(),
        },
        BusError::Timeout {
            duration: Duration::seconds(30),
        },
        BusError::SessionLocked {
            session_id: "s".to_string(),
        },
        BusError::NoSessionAvailable {
            entity_path: "orders".to_string(),
        },
        BusError::Service {
            message: "throttled".to_string(),
        },
    ];

    for err in errors {
        assert!(err.is_transient(), "{} should be transient", err);
        assert!(err.should_retry());
    }
}

#[test]
fn test_retry_after_suggestions() {
    let err = BusError::SessionLocked {
        session_id: "s".to_string(),
    };
    assert_eq!(err.retry_after(), Some(Duration::seconds(5)));

    let err = BusError::Timeout {
        duration: Duration::seconds(1),
    };
    assert_eq!(err.retry_after(), Some(Duration::seconds(1)));

    let err = BusError::ClientClosed;
    assert_eq!(err.retry_after(), None);
}
