//! Option structs for `SessionManager` mutating operations.

use std::path::PathBuf;

pub const DEFAULT_MODEL: &str = "gpt-5";
pub const DEFAULT_REASONING_EFFORT: &str = "medium";
pub const DEFAULT_VERSION: &str = "1.0.0";
pub const DEFAULT_PROJECT_ID: &str = "default";
pub const DEFAULT_TITLE: &str = "New Session";

#[derive(Debug, Clone, Default)]
pub struct CreateSessionOptions {
    pub directory: PathBuf,
    pub title: Option<String>,
    pub parent_id: Option<String>,
    pub fork_point: Option<String>,
    pub bypass_mode: Option<bool>,
    pub model: Option<String>,
    pub reasoning_effort: Option<String>,
    pub plugins: Option<Vec<String>>,
}

impl CreateSessionOptions {
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct UpdateSessionOptions {
    pub title: Option<String>,
    pub archived: Option<bool>,
    pub model: Option<String>,
    pub reasoning_effort: Option<String>,
    pub plugins: Option<Vec<String>>,
}

/// Outcome of `undoTurns`: turns actually undone, messages removed, the
/// paths reverted, and the snapshot the session landed on (absent in the
/// no-op case).
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct UndoOutcome {
    pub turns_undone: u32,
    pub messages_removed: u32,
    pub files_reverted: Vec<PathBuf>,
    pub snapshot: Option<String>,
}
