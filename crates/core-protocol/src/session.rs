//! Session and message metadata types.
//!
//! This module defines the aggregate [`Session`] entity and the [`Message`]
//! entity that lives inside it. Parts (the streamed fragments of a message)
//! are defined separately in [`crate::part`].

use std::path::PathBuf;

use chrono::DateTime;
use chrono::Utc;
use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;

/// Opaque session identifier, `ses_[a-z0-9]{12}`.
pub type SessionId = String;

/// Opaque message identifier, unique within a session.
pub type MessageId = String;

/// The role a message was authored under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageRole {
    User,
    Assistant,
    System,
}

/// Provider-specific metadata attached to a completed message (token ids,
/// stop reason, etc.) — opaque to the core, passed through verbatim.
pub type ProviderMetadata = Value;

/// One turn in the conversation.
///
/// Ordering: insertion order within a session is the canonical chat order.
/// Invariant: message ids are unique within a session; `time_created` is
/// monotonic non-decreasing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub id: MessageId,
    pub session_id: SessionId,
    pub role: MessageRole,
    pub time_created: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_completed: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider_metadata: Option<ProviderMetadata>,
    /// Insertion order within the session (dense, strictly increasing).
    pub sort_order: i64,
    /// Parts that make up this message, ordered by `Part::sort_order`.
    #[serde(default)]
    pub parts: Vec<crate::part::Part>,
}

impl Message {
    pub fn new(id: impl Into<String>, session_id: impl Into<String>, role: MessageRole, sort_order: i64) -> Self {
        Self {
            id: id.into(),
            session_id: session_id.into(),
            role,
            time_created: Utc::now(),
            time_completed: None,
            model: None,
            provider_metadata: None,
            sort_order,
            parts: Vec::new(),
        }
    }

    pub fn is_complete(&self) -> bool {
        self.time_completed.is_some()
    }
}

/// Marks a session as "viewing" a prior state without discarding history.
/// Non-destructive; cleared by `unrevertSession`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionRevert {
    pub message_id: MessageId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub part_id: Option<String>,
    pub snapshot: crate::snapshot::SnapshotHandle,
}

/// The primary aggregate: a session owns a working directory and an ordered
/// history of filesystem snapshots.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: SessionId,
    pub project_id: String,
    pub directory: PathBuf,
    pub title: String,
    pub version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<SessionId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fork_point: Option<MessageId>,
    pub time_created: DateTime<Utc>,
    pub time_updated: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_archived: Option<DateTime<Utc>>,
    pub token_count: i64,
    pub bypass_mode: bool,
    pub model: String,
    pub reasoning_effort: String,
    pub plugins: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub revert: Option<SessionRevert>,
}

impl Session {
    pub fn is_archived(&self) -> bool {
        self.time_archived.is_some()
    }

    pub fn is_reverted(&self) -> bool {
        self.revert.is_some()
    }
}
