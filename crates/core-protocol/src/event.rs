//! Events published on the event bus (spec §6's stable event type catalogue).
//!
//! Unlike the source's duck-typed `{ type, properties }` payload, this is a
//! closed, tagged `Event` enum: the `any`-valued property map is a transport
//! convenience only and never leaks into the core's own signatures (see
//! spec §9's design notes).

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;

use crate::part::Part;
use crate::session::Message;
use crate::session::Session;

/// A stable tag identifying which catalogue entry an [`Event`] is, without
/// requiring a caller to match the full payload. Useful for subscriber-side
/// coarse filtering/logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    SessionCreated,
    SessionUpdated,
    SessionDeleted,
    MessageCreated,
    MessageUpdated,
    MessageCompleted,
    PartCreated,
    PartUpdated,
    PermissionRequested,
    PermissionResponded,
    TaskStarted,
    TaskCompleted,
    TaskFailed,
    TaskTimeout,
    TaskCancelled,
    Error,
}

/// The closed event sum. Every variant that pertains to a specific session
/// carries a `session_id` field so bus subscribers can filter on it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    SessionCreated {
        session_id: String,
        session: Session,
    },
    SessionUpdated {
        session_id: String,
        session: Session,
    },
    SessionDeleted {
        session_id: String,
    },

    MessageCreated {
        session_id: String,
        message: Message,
    },
    MessageUpdated {
        session_id: String,
        message: Message,
    },
    MessageCompleted {
        session_id: String,
        message_id: String,
    },

    PartCreated {
        session_id: String,
        message_id: String,
        part: Part,
    },
    PartUpdated {
        session_id: String,
        message_id: String,
        part: Part,
    },

    PermissionRequested {
        session_id: String,
        request_id: String,
        kind: String,
        detail: Value,
    },
    PermissionResponded {
        session_id: String,
        request_id: String,
        granted: bool,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        reason: Option<String>,
    },

    TaskStarted {
        session_id: String,
        task_id: String,
    },
    TaskCompleted {
        session_id: String,
        task_id: String,
    },
    TaskFailed {
        session_id: String,
        task_id: String,
        error: String,
    },
    TaskTimeout {
        session_id: String,
        task_id: String,
        timeout_ms: u64,
    },
    TaskCancelled {
        session_id: String,
        task_id: String,
    },

    Error {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        session_id: Option<String>,
        message: String,
    },
}

impl Event {
    /// The `session_id` this event pertains to, if any. Events without a
    /// `session_id` are never delivered to a filtered subscriber (spec §4.A).
    pub fn session_id(&self) -> Option<&str> {
        match self {
            Event::SessionCreated { session_id, .. }
            | Event::SessionUpdated { session_id, .. }
            | Event::SessionDeleted { session_id }
            | Event::MessageCreated { session_id, .. }
            | Event::MessageUpdated { session_id, .. }
            | Event::MessageCompleted { session_id, .. }
            | Event::PartCreated { session_id, .. }
            | Event::PartUpdated { session_id, .. }
            | Event::PermissionRequested { session_id, .. }
            | Event::PermissionResponded { session_id, .. }
            | Event::TaskStarted { session_id, .. }
            | Event::TaskCompleted { session_id, .. }
            | Event::TaskFailed { session_id, .. }
            | Event::TaskTimeout { session_id, .. }
            | Event::TaskCancelled { session_id, .. } => Some(session_id.as_str()),
            Event::Error { session_id, .. } => session_id.as_deref(),
        }
    }

    pub fn kind(&self) -> EventKind {
        match self {
            Event::SessionCreated { .. } => EventKind::SessionCreated,
            Event::SessionUpdated { .. } => EventKind::SessionUpdated,
            Event::SessionDeleted { .. } => EventKind::SessionDeleted,
            Event::MessageCreated { .. } => EventKind::MessageCreated,
            Event::MessageUpdated { .. } => EventKind::MessageUpdated,
            Event::MessageCompleted { .. } => EventKind::MessageCompleted,
            Event::PartCreated { .. } => EventKind::PartCreated,
            Event::PartUpdated { .. } => EventKind::PartUpdated,
            Event::PermissionRequested { .. } => EventKind::PermissionRequested,
            Event::PermissionResponded { .. } => EventKind::PermissionResponded,
            Event::TaskStarted { .. } => EventKind::TaskStarted,
            Event::TaskCompleted { .. } => EventKind::TaskCompleted,
            Event::TaskFailed { .. } => EventKind::TaskFailed,
            Event::TaskTimeout { .. } => EventKind::TaskTimeout,
            Event::TaskCancelled { .. } => EventKind::TaskCancelled,
            Event::Error { .. } => EventKind::Error,
        }
    }
}

#[cfg(test)]
#[path = "event.test.rs"]
mod tests;
