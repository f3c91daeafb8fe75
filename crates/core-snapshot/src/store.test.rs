#![allow(clippy::unwrap_used, clippy::expect_used)]
use super::*;
use std::fs;
use tempfile::TempDir;

async fn configured_repo() -> TempDir {
    let dir = TempDir::new().unwrap();
    dir
}

#[tokio::test]
async fn init_is_idempotent() {
    let dir = configured_repo().await;
    let store = SnapshotStore::new();

    let first = store.init(dir.path()).await.unwrap();
    let second = store.init(dir.path()).await.unwrap();

    assert_eq!(first, second);
}

#[tokio::test]
async fn init_rejects_missing_directory() {
    let store = SnapshotStore::new();
    let err = store
        .init(std::path::Path::new("/nonexistent/forge-snapshot-test-dir"))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), "invalid_operation");
}

#[tokio::test]
async fn commit_produces_a_handle_and_reports_emptiness() {
    let dir = configured_repo().await;
    let store = SnapshotStore::new();
    store.init(dir.path()).await.unwrap();

    let empty_commit = store.commit(dir.path(), "no changes").await.unwrap();
    assert!(empty_commit.is_empty);

    fs::write(dir.path().join("a.txt"), "hello").unwrap();
    let first = store.commit(dir.path(), "add a.txt").await.unwrap();
    assert!(!first.is_empty);
    assert_ne!(first.commit_id, empty_commit.commit_id);
}

#[tokio::test]
async fn diff_and_changed_files_reflect_add_modify_delete() {
    let dir = configured_repo().await;
    let store = SnapshotStore::new();
    let base = store.init(dir.path()).await.unwrap();

    fs::write(dir.path().join("keep.txt"), "v1").unwrap();
    fs::write(dir.path().join("remove.txt"), "bye").unwrap();
    let snap_a = store.commit(dir.path(), "seed files").await.unwrap();

    fs::write(dir.path().join("keep.txt"), "v2").unwrap();
    fs::remove_file(dir.path().join("remove.txt")).unwrap();
    fs::write(dir.path().join("added.txt"), "new").unwrap();
    let snap_b = store.commit(dir.path(), "mutate files").await.unwrap();

    let changed = store
        .changed_files(dir.path(), &snap_a.commit_id, &snap_b.commit_id)
        .await
        .unwrap();
    assert_eq!(
        changed,
        vec![
            std::path::PathBuf::from("added.txt"),
            std::path::PathBuf::from("keep.txt"),
            std::path::PathBuf::from("remove.txt"),
        ]
    );

    let diffs = store
        .diff(dir.path(), &snap_a.commit_id, &snap_b.commit_id)
        .await
        .unwrap();
    assert_eq!(diffs.len(), 3);

    let added = diffs
        .iter()
        .find(|d| d.path == std::path::PathBuf::from("added.txt"))
        .unwrap();
    assert_eq!(added.change_type, ChangeType::Added);
    assert!(added.before_content.is_none());
    assert_eq!(added.after_content.as_deref(), Some("new"));

    let removed = diffs
        .iter()
        .find(|d| d.path == std::path::PathBuf::from("remove.txt"))
        .unwrap();
    assert_eq!(removed.change_type, ChangeType::Deleted);
    assert!(removed.after_content.is_none());

    let modified = diffs
        .iter()
        .find(|d| d.path == std::path::PathBuf::from("keep.txt"))
        .unwrap();
    assert_eq!(modified.change_type, ChangeType::Modified);
    assert_eq!(modified.before_content.as_deref(), Some("v1"));
    assert_eq!(modified.after_content.as_deref(), Some("v2"));

    let _ = base;
}

#[tokio::test]
async fn restore_resets_working_copy_to_handle() {
    let dir = configured_repo().await;
    let store = SnapshotStore::new();
    store.init(dir.path()).await.unwrap();

    fs::write(dir.path().join("file.txt"), "original").unwrap();
    let snapshot = store.commit(dir.path(), "original content").await.unwrap();

    fs::write(dir.path().join("file.txt"), "changed").unwrap();
    fs::write(dir.path().join("untracked.txt"), "scratch").unwrap();

    store.restore(dir.path(), &snapshot.commit_id).await.unwrap();

    let contents = fs::read_to_string(dir.path().join("file.txt")).unwrap();
    assert_eq!(contents, "original");
    assert!(!dir.path().join("untracked.txt").exists());
}

#[tokio::test]
async fn restore_unknown_handle_is_not_found() {
    let dir = configured_repo().await;
    let store = SnapshotStore::new();
    store.init(dir.path()).await.unwrap();

    let err = store
        .restore(dir.path(), &"0000000000000000000000000000000000000".to_string())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), "not_found");
}
