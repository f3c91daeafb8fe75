//! Persistent store interface (spec §4.D) plus two reference implementations.
//!
//! The core treats storage as a typed key/value + append-only log interface;
//! the actual database schema and SQL dialect are out of scope (spec §1).
//! [`InMemoryStore`] backs unit tests; [`FileStore`] persists one JSON file
//! per session under a `sessions/` directory, grounded on the teacher's
//! `app/session/src/persistence.rs`.

mod file_store;
mod memory_store;

pub use file_store::FileStore;
pub use memory_store::InMemoryStore;

use async_trait::async_trait;
use forge_error::Result;
use forge_protocol::Message;
use forge_protocol::Session;
use forge_protocol::SnapshotHandle;

/// Typed get/put surface consumed by the core. Implementations must make
/// `set_messages` and `set_snapshot_history` atomic per call; the core does
/// not require transactions across calls (spec §6).
#[async_trait]
pub trait Store: Send + Sync {
    async fn get_session(&self, id: &str) -> Result<Option<Session>>;
    async fn save_session(&self, session: &Session) -> Result<()>;
    async fn list_sessions(&self) -> Result<Vec<Session>>;
    async fn delete_session(&self, id: &str) -> Result<()>;

    /// In insertion order; each message carries its own parts.
    async fn get_messages(&self, session_id: &str) -> Result<Vec<Message>>;
    async fn set_messages(&self, session_id: &str, messages: Vec<Message>) -> Result<()>;

    async fn get_snapshot_history(&self, session_id: &str) -> Result<Vec<SnapshotHandle>>;
    async fn set_snapshot_history(
        &self,
        session_id: &str,
        history: Vec<SnapshotHandle>,
    ) -> Result<()>;
}

/// Lets an `Arc<dyn Store>` (or `Arc<ConcreteStore>`) stand in for `S: Store`
/// wherever a single store instance needs to be shared across components
/// (e.g. a session manager and a message store backed by the same data) —
/// `Arc` is already cheap to clone, so callers don't need their own store to
/// implement `Clone`.
#[async_trait]
impl<T: Store + ?Sized> Store for std::sync::Arc<T> {
    async fn get_session(&self, id: &str) -> Result<Option<Session>> {
        (**self).get_session(id).await
    }

    async fn save_session(&self, session: &Session) -> Result<()> {
        (**self).save_session(session).await
    }

    async fn list_sessions(&self) -> Result<Vec<Session>> {
        (**self).list_sessions().await
    }

    async fn delete_session(&self, id: &str) -> Result<()> {
        (**self).delete_session(id).await
    }

    async fn get_messages(&self, session_id: &str) -> Result<Vec<Message>> {
        (**self).get_messages(session_id).await
    }

    async fn set_messages(&self, session_id: &str, messages: Vec<Message>) -> Result<()> {
        (**self).set_messages(session_id, messages).await
    }

    async fn get_snapshot_history(&self, session_id: &str) -> Result<Vec<SnapshotHandle>> {
        (**self).get_snapshot_history(session_id).await
    }

    async fn set_snapshot_history(
        &self,
        session_id: &str,
        history: Vec<SnapshotHandle>,
    ) -> Result<()> {
        (**self).set_snapshot_history(session_id, history).await
    }
}
