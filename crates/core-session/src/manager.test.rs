#![allow(clippy::unwrap_used, clippy::expect_used)]
use super::*;
use forge_protocol::MessageRole;
use forge_store::InMemoryStore;
use std::fs;
use tempfile::TempDir;

fn new_manager() -> SessionManager<InMemoryStore> {
    SessionManager::new(
        InMemoryStore::default(),
        BroadcastBus::new(),
        SnapshotStore::new(),
        RuntimeState::new(),
    )
}

#[tokio::test]
async fn create_session_initializes_snapshot_history_and_defaults() {
    let dir = TempDir::new().unwrap();
    let manager = new_manager();

    let session = manager
        .create_session(CreateSessionOptions::new(dir.path()))
        .await
        .unwrap();

    assert!(session.id.starts_with("ses_"));
    assert_eq!(session.title, DEFAULT_TITLE);
    assert_eq!(session.model, DEFAULT_MODEL);
    assert_eq!(session.reasoning_effort, DEFAULT_REASONING_EFFORT);
    assert!(!session.bypass_mode);

    let history = manager.store().get_snapshot_history(&session.id).await.unwrap();
    assert_eq!(history.len(), 1);
}

#[tokio::test]
async fn create_session_rejects_duplicate_directory() {
    let dir = TempDir::new().unwrap();
    let manager = new_manager();
    manager
        .create_session(CreateSessionOptions::new(dir.path()))
        .await
        .unwrap();

    let err = manager
        .create_session(CreateSessionOptions::new(dir.path()))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), "invalid_operation");
}

#[tokio::test]
async fn get_session_missing_is_not_found() {
    let manager = new_manager();
    let err = manager.get_session("ses_missing").await.unwrap_err();
    assert_eq!(err.kind(), "not_found");
}

#[tokio::test]
async fn update_session_archives_and_advances_time_updated() {
    let dir = TempDir::new().unwrap();
    let manager = new_manager();
    let session = manager
        .create_session(CreateSessionOptions::new(dir.path()))
        .await
        .unwrap();
    let before = session.time_updated;

    let updated = manager
        .update_session(
            &session.id,
            UpdateSessionOptions {
                archived: Some(true),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    assert!(updated.is_archived());
    assert!(updated.time_updated >= before);

    let unarchived = manager
        .update_session(
            &session.id,
            UpdateSessionOptions {
                archived: Some(false),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert!(!unarchived.is_archived());
}

#[tokio::test]
async fn fork_session_copies_prefix_and_sets_metadata() {
    let dir = TempDir::new().unwrap();
    let manager = new_manager();
    let parent = manager
        .create_session(CreateSessionOptions {
            title: Some("Parent".to_string()),
            ..CreateSessionOptions::new(dir.path())
        })
        .await
        .unwrap();

    let messages = vec![
        Message::new("msg_1", &parent.id, MessageRole::User, 0),
        Message::new("msg_2", &parent.id, MessageRole::Assistant, 1),
        Message::new("msg_3", &parent.id, MessageRole::User, 2),
        Message::new("msg_4", &parent.id, MessageRole::Assistant, 3),
    ];
    manager
        .store()
        .set_messages(&parent.id, messages)
        .await
        .unwrap();

    let child = manager
        .fork_session(&parent.id, Some("msg_2".to_string()), None)
        .await
        .unwrap();

    assert_eq!(child.parent_id.as_deref(), Some(parent.id.as_str()));
    assert_eq!(child.fork_point.as_deref(), Some("msg_2"));
    assert_eq!(child.title, "Parent (fork)");

    let child_messages = manager.store().get_messages(&child.id).await.unwrap();
    assert_eq!(
        child_messages.iter().map(|m| m.id.clone()).collect::<Vec<_>>(),
        vec!["msg_1".to_string(), "msg_2".to_string()]
    );
}

#[tokio::test]
async fn fork_session_with_missing_fork_point_is_not_found() {
    let dir = TempDir::new().unwrap();
    let manager = new_manager();
    let parent = manager
        .create_session(CreateSessionOptions::new(dir.path()))
        .await
        .unwrap();

    let err = manager
        .fork_session(&parent.id, Some("msg_absent".to_string()), None)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), "not_found");
}

#[tokio::test]
async fn revert_then_unrevert_round_trips() {
    let dir = TempDir::new().unwrap();
    let manager = new_manager();
    let session = manager
        .create_session(CreateSessionOptions::new(dir.path()))
        .await
        .unwrap();

    let messages = vec![
        Message::new("msg_1", &session.id, MessageRole::User, 0),
        Message::new("msg_2", &session.id, MessageRole::Assistant, 1),
        Message::new("msg_3", &session.id, MessageRole::User, 2),
    ];
    manager
        .store()
        .set_messages(&session.id, messages)
        .await
        .unwrap();
    let h0 = manager.store().get_snapshot_history(&session.id).await.unwrap()[0].clone();
    manager
        .store()
        .set_snapshot_history(
            &session.id,
            vec![h0.clone(), "h1".to_string(), "h2".to_string(), "h3".to_string()],
        )
        .await
        .unwrap();

    let reverted = manager
        .revert_session(&session.id, "msg_2", None)
        .await
        .unwrap();
    let revert = reverted.revert.as_ref().unwrap();
    assert_eq!(revert.message_id, "msg_2");
    assert_eq!(revert.snapshot, "h2");

    let unreverted = manager.unrevert_session(&session.id).await.unwrap();
    assert!(unreverted.revert.is_none());
    let messages_after = manager.store().get_messages(&session.id).await.unwrap();
    assert_eq!(messages_after.len(), 3);
}

#[tokio::test]
async fn undo_one_turn_restores_prior_snapshot_and_truncates_history() {
    let dir = TempDir::new().unwrap();
    let manager = new_manager();
    let session = manager
        .create_session(CreateSessionOptions::new(dir.path()))
        .await
        .unwrap();

    let path = dir.path().join("a.txt");
    fs::write(&path, "after-msg1").unwrap();
    let c1 = manager.snapshots().commit(dir.path(), "msg1").await.unwrap();
    fs::write(&path, "after-msg2").unwrap();
    let c2 = manager.snapshots().commit(dir.path(), "msg2").await.unwrap();
    fs::write(&path, "after-msg3").unwrap();
    let c3 = manager.snapshots().commit(dir.path(), "msg3").await.unwrap();
    fs::write(&path, "after-msg4").unwrap();
    let c4 = manager.snapshots().commit(dir.path(), "msg4").await.unwrap();

    let h0 = manager.store().get_snapshot_history(&session.id).await.unwrap()[0].clone();
    manager
        .store()
        .set_snapshot_history(
            &session.id,
            vec![h0, c1.commit_id, c2.commit_id.clone(), c3.commit_id, c4.commit_id],
        )
        .await
        .unwrap();
    let messages = vec![
        Message::new("msg_1", &session.id, MessageRole::User, 0),
        Message::new("msg_2", &session.id, MessageRole::Assistant, 1),
        Message::new("msg_3", &session.id, MessageRole::User, 2),
        Message::new("msg_4", &session.id, MessageRole::Assistant, 3),
    ];
    manager
        .store()
        .set_messages(&session.id, messages)
        .await
        .unwrap();

    let outcome = manager.undo_turns(&session.id, 1).await.unwrap();
    assert_eq!(outcome.turns_undone, 1);
    assert_eq!(outcome.messages_removed, 2);
    assert_eq!(outcome.snapshot.as_deref(), Some(c2.commit_id.as_str()));
    assert!(outcome.files_reverted.iter().any(|p| p.ends_with("a.txt")));

    let remaining_messages = manager.store().get_messages(&session.id).await.unwrap();
    assert_eq!(remaining_messages.len(), 2);
    let remaining_history = manager
        .store()
        .get_snapshot_history(&session.id)
        .await
        .unwrap();
    assert_eq!(remaining_history.len(), 3);

    let content = fs::read_to_string(&path).unwrap();
    assert_eq!(content, "after-msg2");
}

#[tokio::test]
async fn undo_turns_is_noop_with_fewer_than_two_turns() {
    let dir = TempDir::new().unwrap();
    let manager = new_manager();
    let session = manager
        .create_session(CreateSessionOptions::new(dir.path()))
        .await
        .unwrap();

    let outcome = manager.undo_turns(&session.id, 1).await.unwrap();
    assert_eq!(outcome, UndoOutcome::default());

    let messages = vec![
        Message::new("msg_1", &session.id, MessageRole::User, 0),
        Message::new("msg_2", &session.id, MessageRole::Assistant, 1),
    ];
    manager
        .store()
        .set_messages(&session.id, messages)
        .await
        .unwrap();
    let outcome = manager.undo_turns(&session.id, 1).await.unwrap();
    assert_eq!(outcome, UndoOutcome::default());
}

#[tokio::test]
async fn abort_session_is_idempotent() {
    let dir = TempDir::new().unwrap();
    let manager = new_manager();
    let session = manager
        .create_session(CreateSessionOptions::new(dir.path()))
        .await
        .unwrap();

    manager.runtime().begin_task(&session.id);
    assert!(manager.abort_session(&session.id).await.unwrap());
    assert!(!manager.abort_session(&session.id).await.unwrap());
}

#[tokio::test]
async fn delete_session_cascades_and_clears_runtime_state() {
    let dir = TempDir::new().unwrap();
    let manager = new_manager();
    let session = manager
        .create_session(CreateSessionOptions::new(dir.path()))
        .await
        .unwrap();
    manager
        .store()
        .set_messages(
            &session.id,
            vec![Message::new("msg_1", &session.id, MessageRole::User, 0)],
        )
        .await
        .unwrap();
    manager.runtime().set_open_snapshot(&session.id, "h0".to_string());

    let deleted = manager.delete_session(&session.id).await.unwrap();
    assert!(deleted);

    assert!(manager.get_session(&session.id).await.is_err());
    assert!(manager.runtime().open_snapshot(&session.id).is_none());
    assert!(!manager.runtime().has_active_task(&session.id));
}

#[tokio::test]
async fn delete_session_waits_for_active_run_to_end_task() {
    let dir = TempDir::new().unwrap();
    let manager = std::sync::Arc::new(new_manager());
    let session = manager
        .create_session(CreateSessionOptions::new(dir.path()))
        .await
        .unwrap();

    let token = manager.runtime().begin_task(&session.id);
    let runtime_clone = manager.runtime();
    let session_id = session.id.clone();
    let delete_manager = manager.clone();
    let delete_handle = tokio::spawn(async move { delete_manager.delete_session(&session_id).await });

    token.cancelled().await;
    tokio::time::sleep(Duration::from_millis(20)).await;
    runtime_clone.end_task(&session.id);

    let deleted = delete_handle.await.unwrap().unwrap();
    assert!(deleted);
}

#[tokio::test]
async fn undo_turns_rejects_during_active_run() {
    let dir = TempDir::new().unwrap();
    let manager = new_manager();
    let session = manager
        .create_session(CreateSessionOptions::new(dir.path()))
        .await
        .unwrap();
    let messages = vec![
        Message::new("msg_1", &session.id, MessageRole::User, 0),
        Message::new("msg_2", &session.id, MessageRole::Assistant, 1),
    ];
    manager
        .store()
        .set_messages(&session.id, messages)
        .await
        .unwrap();

    manager.runtime().begin_task(&session.id);

    let err = manager.undo_turns(&session.id, 1).await.unwrap_err();
    assert_eq!(err.kind(), "invalid_operation");

    // Rejected before touching anything: messages are untouched.
    let remaining = manager.store().get_messages(&session.id).await.unwrap();
    assert_eq!(remaining.len(), 2);
}

/// A [`Store`] wrapper that records, around every `save_session`, how many
/// `update_session` calls are concurrently inside their store round-trip.
/// Proves the per-session lock actually serializes mutating operations
/// rather than merely happening to not race in practice.
struct TrackingStore {
    inner: InMemoryStore,
    in_flight: std::sync::Arc<std::sync::atomic::AtomicUsize>,
    max_observed: std::sync::Arc<std::sync::atomic::AtomicUsize>,
}

impl TrackingStore {
    fn new() -> Self {
        Self {
            inner: InMemoryStore::default(),
            in_flight: std::sync::Arc::new(std::sync::atomic::AtomicUsize::new(0)),
            max_observed: std::sync::Arc::new(std::sync::atomic::AtomicUsize::new(0)),
        }
    }

    fn max_observed(&self) -> usize {
        self.max_observed.load(std::sync::atomic::Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl Store for TrackingStore {
    async fn get_session(&self, id: &str) -> Result<Option<Session>> {
        self.inner.get_session(id).await
    }

    async fn save_session(&self, session: &Session) -> Result<()> {
        let depth = self.in_flight.fetch_add(1, std::sync::atomic::Ordering::SeqCst) + 1;
        self.max_observed.fetch_max(depth, std::sync::atomic::Ordering::SeqCst);
        // Widen the race window so two unserialized callers would overlap here.
        tokio::time::sleep(Duration::from_millis(20)).await;
        let result = self.inner.save_session(session).await;
        self.in_flight.fetch_sub(1, std::sync::atomic::Ordering::SeqCst);
        result
    }

    async fn list_sessions(&self) -> Result<Vec<Session>> {
        self.inner.list_sessions().await
    }

    async fn delete_session(&self, id: &str) -> Result<()> {
        self.inner.delete_session(id).await
    }

    async fn get_messages(&self, session_id: &str) -> Result<Vec<Message>> {
        self.inner.get_messages(session_id).await
    }

    async fn set_messages(&self, session_id: &str, messages: Vec<Message>) -> Result<()> {
        self.inner.set_messages(session_id, messages).await
    }

    async fn get_snapshot_history(&self, session_id: &str) -> Result<Vec<SnapshotHandle>> {
        self.inner.get_snapshot_history(session_id).await
    }

    async fn set_snapshot_history(
        &self,
        session_id: &str,
        history: Vec<SnapshotHandle>,
    ) -> Result<()> {
        self.inner.set_snapshot_history(session_id, history).await
    }
}

#[tokio::test]
async fn update_session_serializes_concurrent_calls() {
    let dir = TempDir::new().unwrap();
    let manager = std::sync::Arc::new(SessionManager::new(
        TrackingStore::new(),
        BroadcastBus::new(),
        SnapshotStore::new(),
        RuntimeState::new(),
    ));
    let session = manager
        .create_session(CreateSessionOptions::new(dir.path()))
        .await
        .unwrap();

    let a = {
        let manager = manager.clone();
        let id = session.id.clone();
        tokio::spawn(async move {
            manager
                .update_session(
                    &id,
                    UpdateSessionOptions {
                        title: Some("from-a".to_string()),
                        ..Default::default()
                    },
                )
                .await
        })
    };
    let b = {
        let manager = manager.clone();
        let id = session.id.clone();
        tokio::spawn(async move {
            manager
                .update_session(
                    &id,
                    UpdateSessionOptions {
                        title: Some("from-b".to_string()),
                        ..Default::default()
                    },
                )
                .await
        })
    };

    let (r1, r2) = tokio::join!(a, b);
    r1.unwrap().unwrap();
    r2.unwrap().unwrap();

    assert_eq!(manager.store().max_observed(), 1);

    // Whichever call went last won; either way the write was not lost.
    let final_session = manager.get_session(&session.id).await.unwrap();
    assert!(final_session.title == "from-a" || final_session.title == "from-b");
}

#[tokio::test]
async fn commit_snapshot_appends_to_history() {
    let dir = TempDir::new().unwrap();
    let manager = new_manager();
    let session = manager
        .create_session(CreateSessionOptions::new(dir.path()))
        .await
        .unwrap();

    fs::write(dir.path().join("a.txt"), "v1").unwrap();
    let info = manager
        .commit_snapshot(&session.id, "user-message")
        .await
        .unwrap();

    let history = manager.store().get_snapshot_history(&session.id).await.unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!(history[1], info.commit_id);
}
