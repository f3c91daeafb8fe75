//! Typed conversation parts.
//!
//! A [`Part`] is a fragment of a message: streamed text, a tool call and its
//! eventual result, a file change observed during tool execution, or a step
//! marker. Parts are appended then mutated in place as a turn progresses.

use chrono::DateTime;
use chrono::Utc;
use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;

use crate::snapshot::ChangeType;

/// Lifecycle of a `tool-call` part.
///
/// Mirrors the teacher's `ToolCallStatus` lifecycle (`start`/`complete`/
/// `fail`/`abort`) with the same terminal/running predicates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolCallStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl ToolCallStatus {
    pub fn is_running(&self) -> bool {
        matches!(self, ToolCallStatus::Running)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ToolCallStatus::Completed | ToolCallStatus::Failed | ToolCallStatus::Cancelled
        )
    }
}

/// The typed payload of a [`Part`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum PartKind {
    Text {
        content: String,
        #[serde(default, skip_serializing_if = "std::ops::Not::not")]
        streaming: bool,
    },
    Reasoning {
        content: String,
        #[serde(default, skip_serializing_if = "std::ops::Not::not")]
        streaming: bool,
    },
    ToolCall {
        tool_name: String,
        input: Value,
        status: ToolCallStatus,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        started_at: Option<DateTime<Utc>>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        finished_at: Option<DateTime<Utc>>,
    },
    ToolResult {
        tool_call_id: String,
        output: Value,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },
    File {
        path: std::path::PathBuf,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        before_hash: Option<String>,
        after_hash: String,
        change_type: ChangeType,
    },
    StepStart {
        step_name: String,
    },
    StepFinish {
        step_name: String,
        ok: bool,
    },
}

/// A typed fragment of a message.
///
/// Invariant: a `tool-result` part references exactly one prior `tool-call`
/// part in the same message; its `sort_order` is greater than the call's.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Part {
    pub id: String,
    pub message_id: String,
    pub session_id: String,
    /// Dense, strictly increasing within the message.
    pub sort_order: i64,
    #[serde(flatten)]
    pub kind: PartKind,
}

impl Part {
    pub fn new(id: impl Into<String>, message_id: impl Into<String>, session_id: impl Into<String>, sort_order: i64, kind: PartKind) -> Self {
        Self {
            id: id.into(),
            message_id: message_id.into(),
            session_id: session_id.into(),
            sort_order,
            kind,
        }
    }

    pub fn tool_call_id_if_result(&self) -> Option<&str> {
        match &self.kind {
            PartKind::ToolResult { tool_call_id, .. } => Some(tool_call_id),
            _ => None,
        }
    }

    pub fn is_tool_call(&self) -> bool {
        matches!(self.kind, PartKind::ToolCall { .. })
    }
}

#[cfg(test)]
#[path = "part.test.rs"]
mod tests;
