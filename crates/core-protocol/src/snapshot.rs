//! Snapshot and diff types.
//!
//! The core treats the version-control backend as an opaque commit handle;
//! only the operations and ordering guarantees in spec §4.B matter here.

use chrono::DateTime;
use chrono::Utc;
use serde::Deserialize;
use serde::Serialize;

/// Opaque handle to a version-control commit.
pub type SnapshotHandle = String;

/// A version-control commit handle plus the metadata the core cares about.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotInfo {
    pub change_id: String,
    pub commit_id: String,
    pub description: String,
    pub timestamp: DateTime<Utc>,
    pub is_empty: bool,
}

/// How a path changed between two snapshots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeType {
    Added,
    Modified,
    Deleted,
}

/// One file's diff between two snapshots.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileDiff {
    pub path: std::path::PathBuf,
    pub change_type: ChangeType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub before_content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub after_content: Option<String>,
    pub added_lines: u32,
    pub deleted_lines: u32,
}
