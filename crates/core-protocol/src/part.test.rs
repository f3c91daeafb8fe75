#![allow(clippy::unwrap_used, clippy::expect_used)]
use super::*;

#[test]
fn tool_call_status_predicates() {
    assert!(ToolCallStatus::Running.is_running());
    assert!(!ToolCallStatus::Running.is_terminal());
    assert!(ToolCallStatus::Completed.is_terminal());
    assert!(ToolCallStatus::Failed.is_terminal());
    assert!(ToolCallStatus::Cancelled.is_terminal());
    assert!(!ToolCallStatus::Pending.is_terminal());
}

#[test]
fn part_kind_tags_serialize_kebab_case() {
    let part = Part::new(
        "prt_1",
        "msg_1",
        "ses_1",
        0,
        PartKind::ToolCall {
            tool_name: "bash".to_string(),
            input: serde_json::json!({"cmd": "ls"}),
            status: ToolCallStatus::Pending,
            started_at: None,
            finished_at: None,
        },
    );
    let json = serde_json::to_value(&part).unwrap();
    assert_eq!(json["type"], "tool-call");
    assert_eq!(json["tool_name"], "bash");
}

#[test]
fn tool_result_references_call_id() {
    let part = Part::new(
        "prt_2",
        "msg_1",
        "ses_1",
        1,
        PartKind::ToolResult {
            tool_call_id: "call_1".to_string(),
            output: serde_json::json!("ok"),
            error: None,
        },
    );
    assert_eq!(part.tool_call_id_if_result(), Some("call_1"));
    assert!(!part.is_tool_call());
}
