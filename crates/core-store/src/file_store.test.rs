#![allow(clippy::unwrap_used, clippy::expect_used)]
use super::*;
use chrono::Utc;
use std::path::PathBuf;
use tempfile::TempDir;

fn sample_session(id: &str) -> Session {
    Session {
        id: id.to_string(),
        project_id: "default".to_string(),
        directory: PathBuf::from("/work/a"),
        title: "Test".to_string(),
        version: "1.0.0".to_string(),
        parent_id: None,
        fork_point: None,
        time_created: Utc::now(),
        time_updated: Utc::now(),
        time_archived: None,
        token_count: 0,
        bypass_mode: false,
        model: "gpt-5".to_string(),
        reasoning_effort: "medium".to_string(),
        plugins: Vec::new(),
        revert: None,
    }
}

#[tokio::test]
async fn save_and_load_session() {
    let dir = TempDir::new().unwrap();
    let store = FileStore::new(dir.path());
    let session = sample_session("ses_abc123def456");

    store.save_session(&session).await.unwrap();
    assert!(session_exists(dir.path(), "ses_abc123def456").await);

    let loaded = store.get_session("ses_abc123def456").await.unwrap().unwrap();
    assert_eq!(loaded.id, session.id);
    assert_eq!(loaded.model, session.model);
}

#[tokio::test]
async fn delete_session_file() {
    let dir = TempDir::new().unwrap();
    let store = FileStore::new(dir.path());
    let session = sample_session("ses_abc123def456");

    store.save_session(&session).await.unwrap();
    assert!(session_exists(dir.path(), "ses_abc123def456").await);

    store.delete_session("ses_abc123def456").await.unwrap();
    assert!(!session_exists(dir.path(), "ses_abc123def456").await);
}

#[tokio::test]
async fn list_persisted_on_nonexistent_dir() {
    let store = FileStore::new(PathBuf::from("/nonexistent/path/for/forge-tests"));
    let sessions = store.list_sessions().await.unwrap();
    assert!(sessions.is_empty());
}

#[tokio::test]
async fn set_messages_round_trips() {
    let dir = TempDir::new().unwrap();
    let store = FileStore::new(dir.path());
    let session = sample_session("ses_abc123def456");
    store.save_session(&session).await.unwrap();

    let message = Message::new("msg_1", "ses_abc123def456", forge_protocol::MessageRole::User, 0);
    store
        .set_messages("ses_abc123def456", vec![message.clone()])
        .await
        .unwrap();

    let messages = store.get_messages("ses_abc123def456").await.unwrap();
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].id, "msg_1");
}

#[tokio::test]
async fn set_messages_on_missing_session_fails() {
    let dir = TempDir::new().unwrap();
    let store = FileStore::new(dir.path());
    let err = store.set_messages("ses_missing", vec![]).await.unwrap_err();
    assert_eq!(err.kind(), "not_found");
}
