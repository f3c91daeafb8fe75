//! Process-local runtime state (spec §4.C).
//!
//! Two maps keyed by session id, neither of which is persisted: which
//! sessions currently have an agent run in flight, and which snapshot a
//! session is "at" for diffing purposes. Both are cleared wholesale when a
//! session is deleted.

use std::sync::Arc;

use dashmap::DashMap;
use forge_protocol::SessionId;
use forge_protocol::SnapshotHandle;
use tokio_util::sync::CancellationToken;
use tracing::debug;

#[derive(Default)]
struct Inner {
    active_tasks: DashMap<SessionId, CancellationToken>,
    open_snapshots: DashMap<SessionId, SnapshotHandle>,
}

/// Process-local (never persisted) bookkeeping for in-flight agent runs and
/// each session's current snapshot position.
///
/// Cheaply `Clone`: every clone refers to the same underlying maps, so a
/// single instance can be shared between the session manager (which aborts
/// and clears state) and the agent loop (which owns the tasks), the same way
/// `BroadcastBus` and `SnapshotStore` share their inner state.
#[derive(Clone, Default)]
pub struct RuntimeState {
    inner: Arc<Inner>,
}

impl RuntimeState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a new cancellation token for a session's agent run. At most
    /// one token per session; a prior token (if any) is overwritten.
    pub fn begin_task(&self, session_id: &str) -> CancellationToken {
        let token = CancellationToken::new();
        self.inner.active_tasks
            .insert(session_id.to_string(), token.clone());
        token
    }

    /// Returns the session's active cancellation token, if a run is in progress.
    pub fn active_token(&self, session_id: &str) -> Option<CancellationToken> {
        self.inner.active_tasks
            .get(session_id)
            .map(|entry| entry.value().clone())
    }

    /// True if an agent run is currently in progress for this session.
    pub fn has_active_task(&self, session_id: &str) -> bool {
        self.inner.active_tasks.contains_key(session_id)
    }

    /// Removes the session's active-task entry without signaling cancellation
    /// (the run is assumed to have already terminated on its own).
    pub fn end_task(&self, session_id: &str) {
        self.inner.active_tasks.remove(session_id);
    }

    /// Signals cancellation on the session's active token (if present) and
    /// removes it immediately. Used by `abortSession`, which owns both the
    /// signal and the bookkeeping. Returns true if a task was cancelled.
    pub fn cancel_task(&self, session_id: &str) -> bool {
        match self.inner.active_tasks.remove(session_id) {
            Some((_, token)) => {
                token.cancel();
                true
            }
            None => false,
        }
    }

    /// Signals cancellation without removing the entry. Used by
    /// `deleteSession`, which must wait for the run itself to call
    /// `end_task` before the active-task entry actually disappears. Returns
    /// true if a task was signalled.
    pub fn signal_cancel(&self, session_id: &str) -> bool {
        match self.inner.active_tasks.get(session_id) {
            Some(entry) => {
                entry.value().cancel();
                true
            }
            None => false,
        }
    }

    pub fn set_open_snapshot(&self, session_id: &str, handle: SnapshotHandle) {
        self.inner.open_snapshots.insert(session_id.to_string(), handle);
    }

    pub fn open_snapshot(&self, session_id: &str) -> Option<SnapshotHandle> {
        self.inner.open_snapshots
            .get(session_id)
            .map(|entry| entry.value().clone())
    }

    /// Cancels any active task and removes both entries for `session_id`.
    /// Idempotent and infallible: missing entries are simply no-ops.
    pub fn clear_session_state(&self, session_id: &str) {
        if let Some((_, token)) = self.inner.active_tasks.remove(session_id) {
            token.cancel();
        }
        self.inner.open_snapshots.remove(session_id);
        debug!(session_id, "cleared runtime state");
    }
}

#[cfg(test)]
#[path = "lib.test.rs"]
mod tests;
