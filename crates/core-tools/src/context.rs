//! Execution context handed to a tool's `execute` call.

use std::path::Path;
use std::path::PathBuf;
use std::time::Instant;

use forge_protocol::ChangeType;
use tokio::sync::mpsc::UnboundedSender;
use tokio_util::sync::CancellationToken;

/// Emitted by a tool when it observes a file change; the agent loop turns
/// these into `file` parts (spec §4.F).
#[derive(Debug, Clone)]
pub struct FileChange {
    pub path: PathBuf,
    pub change_type: ChangeType,
}

/// Everything a tool handler needs to do its work and cooperate with
/// cancellation. One instance is built per tool invocation.
#[derive(Clone)]
pub struct ToolContext {
    pub session_id: String,
    pub directory: PathBuf,
    pub cancel_token: CancellationToken,
    pub deadline: Instant,
    file_changes: UnboundedSender<FileChange>,
}

impl ToolContext {
    pub fn new(
        session_id: impl Into<String>,
        directory: impl Into<PathBuf>,
        cancel_token: CancellationToken,
        deadline: Instant,
        file_changes: UnboundedSender<FileChange>,
    ) -> Self {
        Self {
            session_id: session_id.into(),
            directory: directory.into(),
            cancel_token,
            deadline,
            file_changes,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel_token.is_cancelled()
    }

    pub async fn cancelled(&self) {
        self.cancel_token.cancelled().await
    }

    /// Resolves a tool-supplied path relative to the session's directory.
    pub fn resolve_path(&self, path: &str) -> PathBuf {
        let path = Path::new(path);
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.directory.join(path)
        }
    }

    /// Record that `path` changed as a side effect of this tool call.
    pub fn emit_file(&self, path: impl Into<PathBuf>, change_type: ChangeType) {
        let _ = self.file_changes.send(FileChange {
            path: path.into(),
            change_type,
        });
    }
}
