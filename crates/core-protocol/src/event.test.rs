#![allow(clippy::unwrap_used, clippy::expect_used)]
use super::*;

#[test]
fn session_scoped_event_exposes_session_id() {
    let event = Event::SessionDeleted {
        session_id: "ses_abc123def456".to_string(),
    };
    assert_eq!(event.session_id(), Some("ses_abc123def456"));
    assert_eq!(event.kind(), EventKind::SessionDeleted);
}

#[test]
fn error_event_session_id_is_optional() {
    let event = Event::Error {
        session_id: None,
        message: "boom".to_string(),
    };
    assert_eq!(event.session_id(), None);
}

#[test]
fn event_tag_serializes_snake_case() {
    let event = Event::TaskStarted {
        session_id: "ses_abc123def456".to_string(),
        task_id: "task_1".to_string(),
    };
    let json = serde_json::to_value(&event).unwrap();
    assert_eq!(json["type"], "task_started");
}
