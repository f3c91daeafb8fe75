//! In-memory [`Store`] implementation, used by tests and ephemeral sessions.

use std::collections::HashMap;

use async_trait::async_trait;
use forge_error::Result;
use forge_protocol::Message;
use forge_protocol::Session;
use forge_protocol::SnapshotHandle;
use tokio::sync::RwLock;

use crate::Store;

#[derive(Default)]
struct State {
    sessions: HashMap<String, Session>,
    messages: HashMap<String, Vec<Message>>,
    snapshot_history: HashMap<String, Vec<SnapshotHandle>>,
}

/// A `Store` backed entirely by in-process maps. Nothing survives process
/// restart; useful for tests and the `NullBus`-style "don't actually persist"
/// embedding policy.
#[derive(Default)]
pub struct InMemoryStore {
    state: RwLock<State>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Store for InMemoryStore {
    async fn get_session(&self, id: &str) -> Result<Option<Session>> {
        Ok(self.state.read().await.sessions.get(id).cloned())
    }

    async fn save_session(&self, session: &Session) -> Result<()> {
        self.state
            .write()
            .await
            .sessions
            .insert(session.id.clone(), session.clone());
        Ok(())
    }

    async fn list_sessions(&self) -> Result<Vec<Session>> {
        Ok(self.state.read().await.sessions.values().cloned().collect())
    }

    async fn delete_session(&self, id: &str) -> Result<()> {
        let mut state = self.state.write().await;
        state.sessions.remove(id);
        state.messages.remove(id);
        state.snapshot_history.remove(id);
        Ok(())
    }

    async fn get_messages(&self, session_id: &str) -> Result<Vec<Message>> {
        Ok(self
            .state
            .read()
            .await
            .messages
            .get(session_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn set_messages(&self, session_id: &str, messages: Vec<Message>) -> Result<()> {
        self.state
            .write()
            .await
            .messages
            .insert(session_id.to_string(), messages);
        Ok(())
    }

    async fn get_snapshot_history(&self, session_id: &str) -> Result<Vec<SnapshotHandle>> {
        Ok(self
            .state
            .read()
            .await
            .snapshot_history
            .get(session_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn set_snapshot_history(
        &self,
        session_id: &str,
        history: Vec<SnapshotHandle>,
    ) -> Result<()> {
        self.state
            .write()
            .await
            .snapshot_history
            .insert(session_id.to_string(), history);
        Ok(())
    }
}

#[cfg(test)]
#[path = "memory_store.test.rs"]
mod tests;
