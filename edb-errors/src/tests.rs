use crate::*;

#[test]
fn reconnect_implies_retry() {
    // Spec §8: "Retryable-tag monotonicity: an error's ShouldReconnect
    // implies ShouldRetry." Check it against every tagged kind we ship.
    let reconnectable = [
        ClientConnectionFailedTemporarilyError::build(),
        ClientConnectionTimeoutError::build(),
        ClientConnectionClosedError::build(),
    ];
    for e in &reconnectable {
        assert!(e.has_tag(&SHOULD_RECONNECT));
        assert!(e.has_tag(&SHOULD_RETRY));
    }

    // StateMismatchError and IdleSessionTimeoutError are retryable but not
    // reconnectable (retrying them does not require a fresh socket).
    let retry_only = [
        StateMismatchError::build(),
        IdleSessionTimeoutError::build(),
        TransactionConflictError::build(),
        BackendUnavailableError::build(),
    ];
    for e in &retry_only {
        assert!(e.has_tag(&SHOULD_RETRY));
        assert!(!e.has_tag(&SHOULD_RECONNECT));
    }
}

#[test]
fn is_matches_exact_kind_only() {
    let e = ClientConnectionClosedError::build();
    assert!(e.is::<ClientConnectionClosedError>());
    assert!(!e.is::<ClientConnectionTimeoutError>());
}

#[test]
fn fields_roundtrip() {
    let e = InvalidArgumentError::with_message("bad arg").set::<fields::QueryText>("SELECT 1");
    assert_eq!(e.get::<fields::QueryText>().map(String::as_str), Some("SELECT 1"));
    assert_eq!(e.details().as_deref(), Some("bad arg"));
}

#[test]
fn source_is_preserved() {
    let io = std::io::Error::new(std::io::ErrorKind::ConnectionReset, "reset");
    let e = ClientConnectionClosedError::with_source(io);
    assert!(std::error::Error::source(&e).is_some());
}
