//! Tool registry (spec §4.H): name → callable with a declared schema,
//! dispatched under a deadline and the session's cancellation token.
//!
//! Grounded on `core/tools/src/tool.rs` and `context.rs`, trimmed to the
//! three pipeline stages the spec actually requires (see `DESIGN.md`).

mod context;
mod registry;
mod tool;

pub use context::FileChange;
pub use context::ToolContext;
pub use registry::ToolRegistry;
pub use tool::Tool;
