//! Git-backed snapshot store (spec §4.B).
//!
//! All operations are scoped to a session's working directory. Handles are
//! opaque commit hashes. `history(session)` is not implemented here — it is
//! simply the `snapshotHistory` list the persistent store already tracks
//! (spec §4.D); this module only owns the git-level primitives.

use std::path::Path;
use std::sync::Arc;

use chrono::Utc;
use dashmap::DashMap;
use forge_error::Error;
use forge_error::Result;
use forge_protocol::ChangeType;
use forge_protocol::FileDiff;
use forge_protocol::SnapshotHandle;
use forge_protocol::SnapshotInfo;
use tokio::sync::Mutex;
use tracing::debug;

use crate::git::run_git;
use crate::git::run_git_lines;
use crate::git::run_git_with_identity;

/// Wraps the version-control backend. One instance is shared across all
/// sessions; per-directory locks keep concurrent commits against the same
/// directory serialized (spec §4.B invariant).
#[derive(Clone, Default)]
pub struct SnapshotStore {
    locks: Arc<DashMap<std::path::PathBuf, Arc<Mutex<()>>>>,
}

impl SnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock_for(&self, dir: &Path) -> Arc<Mutex<()>> {
        self.locks
            .entry(dir.to_path_buf())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Creates an initial empty commit for `dir`; idempotent (returns the
    /// existing initial commit if one already exists).
    pub async fn init(&self, dir: &Path) -> Result<SnapshotHandle> {
        if !dir.is_dir() {
            return Err(Error::invalid_operation(format!(
                "cannot initialize snapshot store: {} is not a directory",
                dir.display()
            )));
        }
        let lock = self.lock_for(dir);
        let _guard = lock.lock().await;

        if run_git(dir, &["rev-parse", "--is-inside-work-tree"])
            .await
            .is_err()
        {
            run_git(dir, &["init", "--quiet"]).await?;
        }

        if let Ok(head) = run_git(dir, &["rev-parse", "HEAD"]).await {
            return Ok(head);
        }

        run_git_with_identity(dir, &["commit", "--allow-empty", "--quiet", "-m", "init"]).await?;
        let head = run_git(dir, &["rev-parse", "HEAD"]).await?;
        debug!(dir = %dir.display(), handle = %head, "initialized snapshot store");
        Ok(head)
    }

    /// Commits the current working copy and returns its handle. Concurrent
    /// commits against the same directory are serialized.
    pub async fn commit(&self, dir: &Path, description: &str) -> Result<SnapshotInfo> {
        let lock = self.lock_for(dir);
        let _guard = lock.lock().await;

        run_git(dir, &["add", "-A"]).await?;

        let is_empty = run_git(dir, &["diff", "--cached", "--quiet"])
            .await
            .is_ok();

        run_git_with_identity(
            dir,
            &["commit", "--allow-empty", "--quiet", "-m", description],
        )
        .await?;

        let commit_id = run_git(dir, &["rev-parse", "HEAD"]).await?;
        Ok(SnapshotInfo {
            change_id: commit_id.clone(),
            commit_id,
            description: description.to_string(),
            timestamp: Utc::now(),
            is_empty,
        })
    }

    /// Returns the list of paths (sorted) that differ between `a` and `b`.
    pub async fn changed_files(
        &self,
        dir: &Path,
        a: &SnapshotHandle,
        b: &SnapshotHandle,
    ) -> Result<Vec<std::path::PathBuf>> {
        let mut paths: Vec<std::path::PathBuf> =
            run_git_lines(dir, &["diff", "--name-only", a, b])
                .await?
                .into_iter()
                .map(std::path::PathBuf::from)
                .collect();
        paths.sort();
        Ok(paths)
    }

    /// Returns a [`FileDiff`] for every path that changed between `a` and `b`.
    pub async fn diff(
        &self,
        dir: &Path,
        a: &SnapshotHandle,
        b: &SnapshotHandle,
    ) -> Result<Vec<FileDiff>> {
        let status_lines = run_git_lines(dir, &["diff", "--name-status", a, b]).await?;
        let mut diffs = Vec::with_capacity(status_lines.len());

        for line in status_lines {
            let mut parts = line.splitn(2, '\t');
            let status = parts.next().unwrap_or_default();
            let path = match parts.next() {
                Some(p) => p,
                None => continue,
            };

            let change_type = match status.chars().next() {
                Some('A') => ChangeType::Added,
                Some('D') => ChangeType::Deleted,
                _ => ChangeType::Modified,
            };

            let (added_lines, deleted_lines) = numstat(dir, a, b, path).await?;

            let before_content = if change_type == ChangeType::Added {
                None
            } else {
                show_file(dir, a, path).await
            };
            let after_content = if change_type == ChangeType::Deleted {
                None
            } else {
                show_file(dir, b, path).await
            };

            diffs.push(FileDiff {
                path: std::path::PathBuf::from(path),
                change_type,
                before_content,
                after_content,
                added_lines,
                deleted_lines,
            });
        }

        Ok(diffs)
    }

    /// Mutates the working copy to equal the state at `handle`. This
    /// dir-scoped primitive has no view of a session's runtime state, so the
    /// "not during an active agent run" rule (spec §4.B) is enforced by the
    /// caller — `SessionManager::undo_turns`, restore's only caller, checks
    /// `RuntimeState::has_active_task` before calling this and clears the
    /// session's runtime bookkeeping after.
    pub async fn restore(&self, dir: &Path, handle: &SnapshotHandle) -> Result<()> {
        let lock = self.lock_for(dir);
        let _guard = lock.lock().await;

        run_git(dir, &["rev-parse", "--verify", handle.as_str()])
            .await
            .map_err(|_| Error::not_found("SnapshotHandle", handle.clone()))?;

        run_git(dir, &["reset", "--hard", handle]).await?;
        run_git(dir, &["clean", "-fd", "--quiet"]).await?;
        debug!(dir = %dir.display(), handle = %handle, "restored working copy");
        Ok(())
    }
}

async fn numstat(dir: &Path, a: &str, b: &str, path: &str) -> Result<(u32, u32)> {
    let line = run_git(dir, &["diff", "--numstat", a, b, "--", path]).await?;
    let mut cols = line.split_whitespace();
    let added = cols.next().and_then(|s| s.parse().ok()).unwrap_or(0);
    let deleted = cols.next().and_then(|s| s.parse().ok()).unwrap_or(0);
    Ok((added, deleted))
}

async fn show_file(dir: &Path, handle: &str, path: &str) -> Option<String> {
    run_git(dir, &["show", &format!("{handle}:{path}")]).await.ok()
}

#[cfg(test)]
#[path = "store.test.rs"]
mod tests;
