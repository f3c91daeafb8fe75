//! `SessionManager`: CRUD, fork, revert, undo (spec §4.E).

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use dashmap::DashMap;
use forge_bus::BroadcastBus;
use forge_error::Error;
use forge_error::Result;
use forge_protocol::Event;
use forge_protocol::Message;
use forge_protocol::Session;
use forge_protocol::SessionRevert;
use forge_runtime::RuntimeState;
use forge_snapshot::SnapshotStore;
use forge_store::Store;
use tokio::sync::Mutex;
use tracing::info;
use tracing::warn;

use crate::ids::new_session_id;
use crate::options::CreateSessionOptions;
use crate::options::UndoOutcome;
use crate::options::UpdateSessionOptions;
use crate::options::DEFAULT_MODEL;
use crate::options::DEFAULT_PROJECT_ID;
use crate::options::DEFAULT_REASONING_EFFORT;
use crate::options::DEFAULT_TITLE;
use crate::options::DEFAULT_VERSION;
use crate::turns;

/// Maximum time `deleteSession` waits for an in-flight run to observe
/// cancellation before proceeding anyway (spec §5).
const DELETE_CANCEL_TIMEOUT: Duration = Duration::from_secs(5);

/// Owns session lifecycle operations against a [`Store`], the snapshot
/// store, process-local runtime state, and the event bus.
pub struct SessionManager<S> {
    store: S,
    bus: BroadcastBus,
    snapshots: SnapshotStore,
    runtime: RuntimeState,
    /// Per-session exclusive lock for mutating operations (spec §5: "Session
    /// mutating operations... acquire the session's exclusive lock before
    /// reading and release after all writes and event emissions complete").
    /// Same per-key-lock shape as `forge_snapshot::SnapshotStore`'s
    /// per-directory locks.
    locks: Arc<DashMap<String, Arc<Mutex<()>>>>,
}

impl<S> SessionManager<S>
where
    S: Store,
{
    pub fn new(store: S, bus: BroadcastBus, snapshots: SnapshotStore, runtime: RuntimeState) -> Self {
        Self {
            store,
            bus,
            snapshots,
            runtime,
            locks: Arc::new(DashMap::new()),
        }
    }

    pub fn runtime(&self) -> &RuntimeState {
        &self.runtime
    }

    pub fn snapshots(&self) -> &SnapshotStore {
        &self.snapshots
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// The exclusive lock for `id`'s mutating operations. Held across
    /// read-modify-write-publish so two concurrent calls against the same
    /// session never interleave.
    fn lock_for(&self, id: &str) -> Arc<Mutex<()>> {
        self.locks
            .entry(id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    pub async fn create_session(&self, options: CreateSessionOptions) -> Result<Session> {
        if let Some(existing) = self
            .store
            .list_sessions()
            .await?
            .into_iter()
            .find(|s| s.directory == options.directory)
        {
            return Err(Error::invalid_operation(format!(
                "session {} already owns directory {}",
                existing.id,
                options.directory.display()
            )));
        }

        let id = new_session_id();
        let init_handle = self.snapshots.init(&options.directory).await?;
        let now = Utc::now();

        let session = Session {
            id: id.clone(),
            project_id: DEFAULT_PROJECT_ID.to_string(),
            directory: options.directory,
            title: options.title.unwrap_or_else(|| DEFAULT_TITLE.to_string()),
            version: DEFAULT_VERSION.to_string(),
            parent_id: options.parent_id,
            fork_point: options.fork_point,
            time_created: now,
            time_updated: now,
            time_archived: None,
            token_count: 0,
            bypass_mode: options.bypass_mode.unwrap_or(false),
            model: options.model.unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            reasoning_effort: options
                .reasoning_effort
                .unwrap_or_else(|| DEFAULT_REASONING_EFFORT.to_string()),
            plugins: options.plugins.unwrap_or_default(),
            revert: None,
        };

        self.store.save_session(&session).await?;
        self.store.set_messages(&id, Vec::new()).await?;
        self.store
            .set_snapshot_history(&id, vec![init_handle])
            .await?;

        info!(session_id = %id, "created session");
        self.bus
            .publish(Event::SessionCreated {
                session_id: id.clone(),
                session: session.clone(),
            })
            .await;
        Ok(session)
    }

    pub async fn get_session(&self, id: &str) -> Result<Session> {
        self.store
            .get_session(id)
            .await?
            .ok_or_else(|| Error::not_found("Session", id.to_string()))
    }

    pub async fn list_sessions(&self) -> Result<Vec<Session>> {
        self.store.list_sessions().await
    }

    pub async fn update_session(&self, id: &str, options: UpdateSessionOptions) -> Result<Session> {
        let lock = self.lock_for(id);
        let _guard = lock.lock().await;

        let mut session = self.get_session(id).await?;

        if let Some(title) = options.title {
            session.title = title;
        }
        if let Some(model) = options.model {
            session.model = model;
        }
        if let Some(reasoning_effort) = options.reasoning_effort {
            session.reasoning_effort = reasoning_effort;
        }
        if let Some(plugins) = options.plugins {
            session.plugins = plugins;
        }
        match options.archived {
            Some(true) => session.time_archived = Some(Utc::now()),
            Some(false) => session.time_archived = None,
            None => {}
        }
        session.time_updated = Utc::now();

        self.store.save_session(&session).await?;
        self.bus
            .publish(Event::SessionUpdated {
                session_id: id.to_string(),
                session: session.clone(),
            })
            .await;
        Ok(session)
    }

    pub async fn delete_session(&self, id: &str) -> Result<bool> {
        let lock = self.lock_for(id);
        let _guard = lock.lock().await;

        self.get_session(id).await?;

        if self.runtime.signal_cancel(id) {
            let waited = tokio::time::timeout(DELETE_CANCEL_TIMEOUT, async {
                while self.runtime.has_active_task(id) {
                    tokio::time::sleep(Duration::from_millis(20)).await;
                }
            })
            .await;
            if waited.is_err() {
                warn!(session_id = id, "delete proceeding before run observed cancellation");
                self.bus
                    .publish(Event::Error {
                        session_id: Some(id.to_string()),
                        message: "agent run did not observe cancellation within the delete timeout"
                            .to_string(),
                    })
                    .await;
            }
        }

        self.store.delete_session(id).await?;
        self.runtime.clear_session_state(id);

        self.bus
            .publish(Event::SessionDeleted {
                session_id: id.to_string(),
            })
            .await;
        self.locks.remove(id);
        Ok(true)
    }

    /// Signals cancellation and removes the run's bookkeeping entry.
    /// `task.cancelled` itself is emitted by the agent loop once it actually
    /// observes the cancellation and finishes its cleanup (spec §4.G step
    /// 6), not here: `abortSession` only needs to guarantee the signal is
    /// delivered and `activeTasks` no longer blocks a fresh run.
    pub async fn abort_session(&self, id: &str) -> Result<bool> {
        self.get_session(id).await?;
        Ok(self.runtime.cancel_task(id))
    }

    pub async fn fork_session(
        &self,
        id: &str,
        fork_point: Option<String>,
        title: Option<String>,
    ) -> Result<Session> {
        let lock = self.lock_for(id);
        let _guard = lock.lock().await;

        let parent = self.get_session(id).await?;
        let parent_messages = self.store.get_messages(id).await?;

        let prefix_len = match &fork_point {
            None => parent_messages.len(),
            Some(message_id) => parent_messages
                .iter()
                .position(|m| &m.id == message_id)
                .map(|i| i + 1)
                .ok_or_else(|| Error::not_found("Message", message_id.clone()))?,
        };
        let copied_messages = copy_messages(&parent_messages[..prefix_len]);

        let child_id = new_session_id();
        let init_handle = self.snapshots.init(&parent.directory).await?;
        let now = Utc::now();

        let child = Session {
            id: child_id.clone(),
            project_id: parent.project_id.clone(),
            directory: parent.directory.clone(),
            title: title.unwrap_or_else(|| format!("{} (fork)", parent.title)),
            version: DEFAULT_VERSION.to_string(),
            parent_id: Some(parent.id.clone()),
            fork_point,
            time_created: now,
            time_updated: now,
            time_archived: None,
            token_count: 0,
            bypass_mode: parent.bypass_mode,
            model: parent.model.clone(),
            reasoning_effort: parent.reasoning_effort.clone(),
            plugins: parent.plugins.clone(),
            revert: None,
        };

        self.store.save_session(&child).await?;
        self.store.set_messages(&child_id, copied_messages).await?;
        self.store
            .set_snapshot_history(&child_id, vec![init_handle])
            .await?;

        info!(session_id = %child_id, parent_id = %parent.id, "forked session");
        self.bus
            .publish(Event::SessionCreated {
                session_id: child_id.clone(),
                session: child.clone(),
            })
            .await;
        Ok(child)
    }

    pub async fn revert_session(
        &self,
        id: &str,
        message_id: &str,
        part_id: Option<String>,
    ) -> Result<Session> {
        let lock = self.lock_for(id);
        let _guard = lock.lock().await;

        let mut session = self.get_session(id).await?;
        let messages = self.store.get_messages(id).await?;
        let index = messages
            .iter()
            .position(|m| m.id == message_id)
            .ok_or_else(|| Error::not_found("Message", message_id.to_string()))?;
        let history = self.store.get_snapshot_history(id).await?;
        let snapshot = history
            .get(index)
            .cloned()
            .ok_or_else(|| Error::invalid_operation("snapshot history shorter than message index"))?;

        session.revert = Some(SessionRevert {
            message_id: message_id.to_string(),
            part_id,
            snapshot,
        });
        session.time_updated = Utc::now();
        self.store.save_session(&session).await?;

        self.bus
            .publish(Event::SessionUpdated {
                session_id: id.to_string(),
                session: session.clone(),
            })
            .await;
        Ok(session)
    }

    pub async fn unrevert_session(&self, id: &str) -> Result<Session> {
        let lock = self.lock_for(id);
        let _guard = lock.lock().await;

        let mut session = self.get_session(id).await?;
        session.revert = None;
        session.time_updated = Utc::now();
        self.store.save_session(&session).await?;

        self.bus
            .publish(Event::SessionUpdated {
                session_id: id.to_string(),
                session: session.clone(),
            })
            .await;
        Ok(session)
    }

    pub async fn undo_turns(&self, id: &str, count: u32) -> Result<UndoOutcome> {
        let lock = self.lock_for(id);
        let _guard = lock.lock().await;

        let session = self.get_session(id).await?;
        let messages = self.store.get_messages(id).await?;
        let turns = turns::turns_to_undo(&messages, count);
        if turns == 0 {
            return Ok(UndoOutcome::default());
        }

        if self.runtime.has_active_task(id) {
            return Err(Error::invalid_operation(format!(
                "cannot undo turns on session {id}: an agent run is active"
            )));
        }

        let target_count = turns::target_message_count(&messages, turns);
        let history = self.store.get_snapshot_history(id).await?;
        let current_snapshot = history
            .last()
            .cloned()
            .ok_or_else(|| Error::invalid_operation("snapshot history is empty"))?;
        let target_snapshot = history
            .get(target_count)
            .cloned()
            .ok_or_else(|| Error::invalid_operation("snapshot history shorter than target index"))?;

        let files_reverted = self
            .snapshots
            .changed_files(&session.directory, &target_snapshot, &current_snapshot)
            .await?;

        let new_messages = messages[..target_count].to_vec();
        let new_history = history[..=target_count].to_vec();
        self.store.set_messages(id, new_messages).await?;
        self.store.set_snapshot_history(id, new_history).await?;
        self.snapshots.restore(&session.directory, &target_snapshot).await?;
        // A restore invalidates any runtime cancellation token / open
        // snapshot bookkeeping for this session (spec §4.B). The active-task
        // guard above means there's normally nothing to cancel here; this
        // also covers a token left behind by a run that ended without
        // clearing its own entry.
        self.runtime.clear_session_state(id);

        let messages_removed = (messages.len() - target_count) as u32;
        info!(session_id = id, turns, messages_removed, "undid turns");
        Ok(UndoOutcome {
            turns_undone: turns,
            messages_removed,
            files_reverted,
            snapshot: Some(target_snapshot),
        })
    }

    /// Commits a snapshot for `session_id` with best-effort retry (spec
    /// §4.E), appending the resulting handle to the session's snapshot
    /// history. A persistent failure surfaces as an `error` event rather
    /// than rolling back whatever message/part write preceded it.
    pub async fn commit_snapshot(
        &self,
        session_id: &str,
        description: &str,
    ) -> Result<forge_protocol::SnapshotInfo> {
        let session = self.get_session(session_id).await?;
        let dir: PathBuf = session.directory.clone();
        let snapshots = self.snapshots.clone();

        let result =
            forge_snapshot::with_commit_retry("snapshot.commit", || snapshots.commit(&dir, description))
                .await;

        match result {
            Ok(info) => {
                let mut history = self.store.get_snapshot_history(session_id).await?;
                history.push(info.commit_id.clone());
                self.store.set_snapshot_history(session_id, history).await?;
                Ok(info)
            }
            Err(err) => {
                warn!(session_id, error = %err, "snapshot commit failed after retries");
                self.bus
                    .publish(Event::Error {
                        session_id: Some(session_id.to_string()),
                        message: err.to_string(),
                    })
                    .await;
                Err(err)
            }
        }
    }
}

fn copy_messages(messages: &[Message]) -> Vec<Message> {
    messages
        .iter()
        .map(|message| {
            let mut copy = message.clone();
            copy.parts = message
                .parts
                .iter()
                .map(|part| {
                    let mut part_copy = part.clone();
                    part_copy.id = format!("part_{}", nanoid::nanoid!(10));
                    part_copy
                })
                .collect();
            copy
        })
        .collect()
}

#[cfg(test)]
#[path = "manager.test.rs"]
mod tests;
