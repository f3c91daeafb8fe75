//! Version-control-backed snapshot store (spec §4.B).
//!
//! Every session's working directory is a git repository. `SnapshotStore`
//! owns the git-level primitives (init, commit, diff, restore); the commit
//! retry ladder in [`retry`] is shared by callers that treat a commit as
//! best-effort rather than fatal.

mod git;
mod retry;
mod store;

pub use retry::with_commit_retry;
pub use retry::BACKOFF;
pub use store::SnapshotStore;
