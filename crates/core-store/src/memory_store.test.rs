#![allow(clippy::unwrap_used, clippy::expect_used)]
use super::*;
use chrono::Utc;
use std::path::PathBuf;

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
async fn save_then_get_round_trips() {
    let store = InMemoryStore::new();
    let session = sample_session("ses_abc123def456");
    store.save_session(&session).await.unwrap();

    let loaded = store.get_session("ses_abc123def456").await.unwrap().unwrap();
    assert_eq!(loaded.id, session.id);
}

#[tokio::test]
async fn missing_session_returns_none() {
    let store = InMemoryStore::new();
    assert!(store.get_session("ses_missing").await.unwrap().is_none());
}

#[tokio::test]
async fn delete_cascades_messages_and_history() {
    let store = InMemoryStore::new();
    let session = sample_session("ses_abc123def456");
    store.save_session(&session).await.unwrap();
    store
        .set_snapshot_history("ses_abc123def456", vec!["h0".to_string()])
        .await
        .unwrap();

    store.delete_session("ses_abc123def456").await.unwrap();

    assert!(store.get_session("ses_abc123def456").await.unwrap().is_none());
    assert!(store.get_messages("ses_abc123def456").await.unwrap().is_empty());
    assert!(
        store
            .get_snapshot_history("ses_abc123def456")
            .await
            .unwrap()
            .is_empty()
    );
}

#[tokio::test]
async fn list_sessions_returns_all() {
    let store = InMemoryStore::new();
    store.save_session(&sample_session("ses_a")).await.unwrap();
    store.save_session(&sample_session("ses_b")).await.unwrap();

    let sessions = store.list_sessions().await.unwrap();
    assert_eq!(sessions.len(), 2);
}
