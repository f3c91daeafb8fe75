//! JSON-file-per-session [`Store`] implementation.
//!
//! Grounded on `app/session/src/persistence.rs`: one JSON document per
//! session under `<base_dir>/sessions/<id>.json`, versioned so future
//! format changes can be detected on load.

use std::path::Path;
use std::path::PathBuf;

use async_trait::async_trait;
use forge_error::Error;
use forge_error::Result;
use forge_protocol::Message;
use forge_protocol::Session;
use forge_protocol::SnapshotHandle;
use serde::Deserialize;
use serde::Serialize;
use tracing::debug;

use crate::Store;

const CURRENT_VERSION: u32 = 1;

#[derive(Debug, Serialize, Deserialize)]
struct PersistedSession {
    version: u32,
    session: Session,
    #[serde(default)]
    messages: Vec<Message>,
    #[serde(default)]
    snapshot_history: Vec<SnapshotHandle>,
}

/// A `Store` that persists each session as a single JSON file.
pub struct FileStore {
    base_dir: PathBuf,
}

impl FileStore {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    fn session_file_path(&self, id: &str) -> PathBuf {
        self.base_dir.join("sessions").join(format!("{id}.json"))
    }

    async fn read(&self, id: &str) -> Result<Option<PersistedSession>> {
        let path = self.session_file_path(id);
        match tokio::fs::read(&path).await {
            Ok(bytes) => {
                let persisted: PersistedSession = serde_json::from_slice(&bytes)
                    .map_err(|e| forge_error::normalize("parsing session file", e))?;
                Ok(Some(persisted))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(forge_error::normalize("reading session file", e)),
        }
    }

    async fn write(&self, persisted: &PersistedSession) -> Result<()> {
        let path = self.session_file_path(&persisted.session.id);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| forge_error::normalize("creating sessions directory", e))?;
        }
        let bytes = serde_json::to_vec_pretty(persisted)
            .map_err(|e| forge_error::normalize("serializing session", e))?;
        tokio::fs::write(&path, bytes)
            .await
            .map_err(|e| forge_error::normalize("writing session file", e))?;
        debug!(path = %path.display(), "persisted session");
        Ok(())
    }

    async fn list_session_ids(&self) -> Result<Vec<String>> {
        let dir = self.base_dir.join("sessions");
        let mut read_dir = match tokio::fs::read_dir(&dir).await {
            Ok(rd) => rd,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(forge_error::normalize("listing sessions directory", e)),
        };
        let mut ids = Vec::new();
        while let Some(entry) = read_dir
            .next_entry()
            .await
            .map_err(|e| forge_error::normalize("reading sessions directory entry", e))?
        {
            if let Some(stem) = entry.path().file_stem().and_then(|s| s.to_str()) {
                if entry.path().extension().and_then(|e| e.to_str()) == Some("json") {
                    ids.push(stem.to_string());
                }
            }
        }
        Ok(ids)
    }
}

#[async_trait]
impl Store for FileStore {
    async fn get_session(&self, id: &str) -> Result<Option<Session>> {
        Ok(self.read(id).await?.map(|p| p.session))
    }

    async fn save_session(&self, session: &Session) -> Result<()> {
        let mut persisted = self.read(&session.id).await?.unwrap_or(PersistedSession {
            version: CURRENT_VERSION,
            session: session.clone(),
            messages: Vec::new(),
            snapshot_history: Vec::new(),
        });
        persisted.session = session.clone();
        self.write(&persisted).await
    }

    async fn list_sessions(&self) -> Result<Vec<Session>> {
        let mut sessions = Vec::new();
        for id in self.list_session_ids().await? {
            if let Some(persisted) = self.read(&id).await? {
                sessions.push(persisted.session);
            }
        }
        Ok(sessions)
    }

    async fn delete_session(&self, id: &str) -> Result<()> {
        let path = self.session_file_path(id);
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(forge_error::normalize("deleting session file", e)),
        }
    }

    async fn get_messages(&self, session_id: &str) -> Result<Vec<Message>> {
        Ok(self
            .read(session_id)
            .await?
            .map(|p| p.messages)
            .unwrap_or_default())
    }

    async fn set_messages(&self, session_id: &str, messages: Vec<Message>) -> Result<()> {
        let mut persisted =
            self.read(session_id)
                .await?
                .ok_or_else(|| Error::not_found("Session", session_id))?;
        persisted.messages = messages;
        self.write(&persisted).await
    }

    async fn get_snapshot_history(&self, session_id: &str) -> Result<Vec<SnapshotHandle>> {
        Ok(self
            .read(session_id)
            .await?
            .map(|p| p.snapshot_history)
            .unwrap_or_default())
    }

    async fn set_snapshot_history(
        &self,
        session_id: &str,
        history: Vec<SnapshotHandle>,
    ) -> Result<()> {
        let mut persisted =
            self.read(session_id)
                .await?
                .ok_or_else(|| Error::not_found("Session", session_id))?;
        persisted.snapshot_history = history;
        self.write(&persisted).await
    }
}

/// Whether a session file exists on disk, without deserializing it.
pub async fn session_exists(base_dir: &Path, id: &str) -> bool {
    let path = base_dir.join("sessions").join(format!("{id}.json"));
    tokio::fs::metadata(&path).await.is_ok()
}

#[cfg(test)]
#[path = "file_store.test.rs"]
mod tests;
