//! Patches applied in place to a part's kind-specific fields.
//!
//! Only the fields a streaming update or a tool-call status transition
//! actually needs are exposed; applying a patch to a part of the wrong kind
//! is a validation error rather than a silent no-op.

use chrono::DateTime;
use chrono::Utc;
use forge_error::Error;
use forge_error::Result;
use forge_protocol::PartKind;
use forge_protocol::ToolCallStatus;
use serde_json::Value;

/// A merge patch for [`PartKind`], used by `MessageStore::update_part`.
#[derive(Debug, Clone, Default)]
pub struct PartPatch {
    pub content: Option<String>,
    pub streaming: Option<bool>,
    pub status: Option<ToolCallStatus>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    pub output: Option<Value>,
    pub error: Option<String>,
}

impl PartPatch {
    pub fn streaming_text(content: impl Into<String>, streaming: bool) -> Self {
        Self {
            content: Some(content.into()),
            streaming: Some(streaming),
            ..Self::default()
        }
    }

    pub fn tool_call_status(status: ToolCallStatus) -> Self {
        let now = Utc::now();
        Self {
            status: Some(status),
            started_at: matches!(status, ToolCallStatus::Running).then_some(now),
            finished_at: status.is_terminal().then_some(now),
            ..Self::default()
        }
    }

    pub fn tool_result(output: Value, error: Option<String>) -> Self {
        Self {
            output: Some(output),
            error,
            ..Self::default()
        }
    }

    /// Merges this patch's present fields into `kind` in place.
    pub fn apply(self, kind: &mut PartKind) -> Result<()> {
        match kind {
            PartKind::Text { content, streaming } | PartKind::Reasoning { content, streaming } => {
                if let Some(c) = self.content {
                    *content = c;
                }
                if let Some(s) = self.streaming {
                    *streaming = s;
                }
                Ok(())
            }
            PartKind::ToolCall {
                status,
                started_at,
                finished_at,
                ..
            } => {
                if let Some(s) = self.status {
                    *status = s;
                }
                if self.started_at.is_some() {
                    *started_at = self.started_at;
                }
                if self.finished_at.is_some() {
                    *finished_at = self.finished_at;
                }
                Ok(())
            }
            PartKind::ToolResult { output, error, .. } => {
                if let Some(o) = self.output {
                    *output = o;
                }
                if self.error.is_some() {
                    *error = self.error;
                }
                Ok(())
            }
            PartKind::File { .. } | PartKind::StepStart { .. } | PartKind::StepFinish { .. } => {
                Err(Error::invalid_operation(
                    "this part kind does not support in-place patching",
                ))
            }
        }
    }
}
