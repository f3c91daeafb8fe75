#![allow(clippy::unwrap_used, clippy::expect_used)]
use super::*;
use forge_protocol::ToolCallStatus;
use forge_store::InMemoryStore;

async fn store_with_session(session_id: &str) -> InMemoryStore {
    let store = InMemoryStore::default();
    let session = forge_protocol::Session {
        id: session_id.to_string(),
        project_id: "default".to_string(),
        directory: std::path::PathBuf::from("/work/a"),
        title: "Test".to_string(),
        version: "1.0.0".to_string(),
        parent_id: None,
        fork_point: None,
        time_created: chrono::Utc::now(),
        time_updated: chrono::Utc::now(),
        time_archived: None,
        token_count: 0,
        bypass_mode: false,
        model: "gpt-5".to_string(),
        reasoning_effort: "medium".to_string(),
        plugins: Vec::new(),
        revert: None,
    };
    store.save_session(&session).await.unwrap();
    store
}

#[tokio::test]
async fn append_message_assigns_increasing_sort_order() {
    let store = store_with_session("ses_1").await;
    let messages = MessageStore::new(store, BroadcastBus::new());

    let first = messages
        .append_message("ses_1", "msg_1", MessageRole::User)
        .await
        .unwrap();
    let second = messages
        .append_message("ses_1", "msg_2", MessageRole::Assistant)
        .await
        .unwrap();

    assert_eq!(first.sort_order, 0);
    assert_eq!(second.sort_order, 1);
}

#[tokio::test]
async fn append_part_assigns_dense_sort_order_within_message() {
    let store = store_with_session("ses_1").await;
    let messages = MessageStore::new(store, BroadcastBus::new());
    messages
        .append_message("ses_1", "msg_1", MessageRole::Assistant)
        .await
        .unwrap();

    let p1 = messages
        .append_part(
            "ses_1",
            "msg_1",
            "part_1",
            PartKind::Text {
                content: "hello".to_string(),
                streaming: true,
            },
        )
        .await
        .unwrap();
    let p2 = messages
        .append_part(
            "ses_1",
            "msg_1",
            "part_2",
            PartKind::Text {
                content: " world".to_string(),
                streaming: false,
            },
        )
        .await
        .unwrap();

    assert_eq!(p1.sort_order, 0);
    assert_eq!(p2.sort_order, 1);
}

#[tokio::test]
async fn append_part_on_missing_message_fails_not_found() {
    let store = store_with_session("ses_1").await;
    let messages = MessageStore::new(store, BroadcastBus::new());

    let err = messages
        .append_part(
            "ses_1",
            "msg_missing",
            "part_1",
            PartKind::Text {
                content: "x".to_string(),
                streaming: false,
            },
        )
        .await
        .unwrap_err();
    assert_eq!(err.kind(), "not_found");
}

#[tokio::test]
async fn update_part_merges_streaming_text() {
    let store = store_with_session("ses_1").await;
    let messages = MessageStore::new(store, BroadcastBus::new());
    messages
        .append_message("ses_1", "msg_1", MessageRole::Assistant)
        .await
        .unwrap();
    messages
        .append_part(
            "ses_1",
            "msg_1",
            "part_1",
            PartKind::Text {
                content: "hel".to_string(),
                streaming: true,
            },
        )
        .await
        .unwrap();

    let updated = messages
        .update_part(
            "ses_1",
            "msg_1",
            "part_1",
            PartPatch::streaming_text("hello", false),
        )
        .await
        .unwrap();

    match updated.kind {
        PartKind::Text { content, streaming } => {
            assert_eq!(content, "hello");
            assert!(!streaming);
        }
        other => panic!("unexpected part kind: {other:?}"),
    }
}

#[tokio::test]
async fn update_part_transitions_tool_call_status() {
    let store = store_with_session("ses_1").await;
    let messages = MessageStore::new(store, BroadcastBus::new());
    messages
        .append_message("ses_1", "msg_1", MessageRole::Assistant)
        .await
        .unwrap();
    messages
        .append_part(
            "ses_1",
            "msg_1",
            "call_1",
            PartKind::ToolCall {
                tool_name: "bash".to_string(),
                input: serde_json::json!({"command": "ls"}),
                status: ToolCallStatus::Pending,
                started_at: None,
                finished_at: None,
            },
        )
        .await
        .unwrap();

    let running = messages
        .update_part(
            "ses_1",
            "msg_1",
            "call_1",
            PartPatch::tool_call_status(ToolCallStatus::Running),
        )
        .await
        .unwrap();
    match running.kind {
        PartKind::ToolCall { status, started_at, .. } => {
            assert_eq!(status, ToolCallStatus::Running);
            assert!(started_at.is_some());
        }
        other => panic!("unexpected part kind: {other:?}"),
    }

    let completed = messages
        .update_part(
            "ses_1",
            "msg_1",
            "call_1",
            PartPatch::tool_call_status(ToolCallStatus::Completed),
        )
        .await
        .unwrap();
    match completed.kind {
        PartKind::ToolCall { status, finished_at, .. } => {
            assert_eq!(status, ToolCallStatus::Completed);
            assert!(finished_at.is_some());
        }
        other => panic!("unexpected part kind: {other:?}"),
    }
}

#[tokio::test]
async fn complete_message_sets_time_completed() {
    let store = store_with_session("ses_1").await;
    let messages = MessageStore::new(store, BroadcastBus::new());
    messages
        .append_message("ses_1", "msg_1", MessageRole::Assistant)
        .await
        .unwrap();

    let completed = messages
        .complete_message("ses_1", "msg_1", Some(serde_json::json!({"stop": "end"})))
        .await
        .unwrap();

    assert!(completed.is_complete());
    assert_eq!(
        completed.provider_metadata,
        Some(serde_json::json!({"stop": "end"}))
    );
}
