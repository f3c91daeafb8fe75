#![allow(clippy::unwrap_used, clippy::expect_used)]
use super::*;

#[test]
fn not_found_kind_and_display() {
    let err = Error::not_found("Session", "ses_abc123def456");
    assert_eq!(err.kind(), "not_found");
    assert_eq!(
        err.to_string(),
        "Session not found: ses_abc123def456"
    );
}

#[test]
fn validation_without_field() {
    let err = Error::validation(None, "directory is required");
    assert_eq!(err.to_string(), "validation failed: directory is required");
}

#[test]
fn validation_with_field() {
    let err = Error::validation(Some("directory".to_string()), "must be absolute");
    assert_eq!(
        err.to_string(),
        "validation failed (directory): must be absolute"
    );
}

#[test]
fn permission_denied_without_message() {
    let err = Error::permission_denied("shell.exec", None);
    assert_eq!(err.to_string(), "permission denied for shell.exec");
}

#[test]
fn timeout_display() {
    let err = Error::timeout("tool:bash", 5000);
    assert_eq!(err.kind(), "timeout");
    assert_eq!(err.to_string(), "tool:bash timed out after 5000ms");
}

#[test]
fn normalize_wraps_as_invalid_operation() {
    let io_err = std::io::Error::other("disk full");
    let err = normalize("writing snapshot history", io_err);
    assert_eq!(err.kind(), "invalid_operation");
    assert!(err.to_string().contains("disk full"));
}
