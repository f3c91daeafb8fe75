use std::time::Duration;

/// Per-run tunables (spec §4.G "Timeout" and §4.H "dispatched under a deadline").
#[derive(Debug, Clone)]
pub struct LoopConfig {
    /// Wall-clock deadline for one `run_agent` call, from start to either
    /// end-of-turn, cancellation, or `task.timeout`.
    pub run_deadline: Duration,
    /// Per-tool-invocation deadline passed to `ToolRegistry::dispatch`.
    pub tool_deadline: Duration,
}

impl LoopConfig {
    pub const DEFAULT_RUN_DEADLINE: Duration = Duration::from_secs(600);
    pub const DEFAULT_TOOL_DEADLINE: Duration = Duration::from_secs(120);
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            run_deadline: Self::DEFAULT_RUN_DEADLINE,
            tool_deadline: Self::DEFAULT_TOOL_DEADLINE,
        }
    }
}
