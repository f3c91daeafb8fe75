//! Composition root (spec §9 design note: "explicit `Core` value constructed
//! at startup" rather than a global/singleton registry).
//!
//! [`Core`] threads the event bus, persistent store, snapshot store, runtime
//! state, session manager, message store, tool registry and agent loop
//! together behind one value an embedder constructs once and then clones
//! cheaply — every field is already `Arc`-backed or `Clone`.

use std::sync::Arc;
use std::time::Duration;

use forge_bus::BroadcastBus;
use forge_loop::AgentLoop;
use forge_loop::LoopConfig;
use forge_loop::ModelProvider;
use forge_loop::PermissionBroker;
use forge_message::MessageStore;
use forge_runtime::RuntimeState;
use forge_session::SessionManager;
use forge_snapshot::SnapshotStore;
use forge_store::Store;
use forge_tools::ToolRegistry;
use serde::Deserialize;
use serde::Serialize;

pub use forge_loop::AlwaysApprove;
pub use forge_loop::ApprovalDecision;
pub use forge_loop::PermissionQueue;
pub use forge_loop::ProviderEvent;
pub use forge_loop::ProviderRequest;
pub use forge_loop::ProviderStream;

/// Deploy-time tunables an embedder loads from their own config layer; the
/// core itself does not parse TOML/YAML (spec §1 "config layering" is out
/// of scope, spec §9 ambient-stack note).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Wall-clock deadline for one `run_agent` call (spec §4.G "Timeout").
    pub run_deadline_secs: u64,
    /// Per-tool-invocation deadline passed to `ToolRegistry::dispatch` (spec §4.H).
    pub tool_deadline_secs: u64,
    /// Per-subscriber event bus queue capacity (spec §4.A, "typical >= 64").
    pub bus_queue_capacity: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            run_deadline_secs: LoopConfig::DEFAULT_RUN_DEADLINE.as_secs(),
            tool_deadline_secs: LoopConfig::DEFAULT_TOOL_DEADLINE.as_secs(),
            bus_queue_capacity: forge_bus::DEFAULT_QUEUE_CAPACITY,
        }
    }
}

impl EngineConfig {
    fn loop_config(&self) -> LoopConfig {
        LoopConfig {
            run_deadline: Duration::from_secs(self.run_deadline_secs),
            tool_deadline: Duration::from_secs(self.tool_deadline_secs),
        }
    }
}

/// The fully-wired engine. One per embedding process; construct with
/// [`Core::new`], register tools via [`Core::tools`], then drive sessions
/// through [`Core::sessions`] and [`Core::agent_loop`].
#[derive(Clone)]
pub struct Core<S: Store + Clone> {
    bus: BroadcastBus,
    store: S,
    snapshots: SnapshotStore,
    runtime: RuntimeState,
    sessions: Arc<SessionManager<S>>,
    tools: ToolRegistry,
    agent_loop: Arc<AgentLoop<S>>,
}

impl<S> Core<S>
where
    S: Store + Clone + 'static,
{
    /// Wires a fresh engine around `store`, `provider`, and `permissions`.
    /// The returned `Core` starts with an empty [`ToolRegistry`]; register
    /// tools into it (via [`Core::tools`]) before the first `run_agent` call
    /// that needs them.
    pub fn new(
        store: S,
        provider: Arc<dyn ModelProvider>,
        permissions: Arc<dyn PermissionBroker>,
        config: EngineConfig,
    ) -> Self {
        let bus = BroadcastBus::with_capacity(config.bus_queue_capacity);
        let snapshots = SnapshotStore::new();
        let runtime = RuntimeState::new();
        let tools = ToolRegistry::new();
        let sessions = Arc::new(SessionManager::new(
            store.clone(),
            bus.clone(),
            snapshots.clone(),
            runtime.clone(),
        ));
        let messages = MessageStore::new(store.clone(), bus.clone());
        let agent_loop = Arc::new(AgentLoop::new(
            sessions.clone(),
            messages,
            tools.clone(),
            bus.clone(),
            provider,
            permissions,
            config.loop_config(),
        ));

        Self {
            bus,
            store,
            snapshots,
            runtime,
            sessions,
            tools,
            agent_loop,
        }
    }

    pub fn bus(&self) -> &BroadcastBus {
        &self.bus
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn snapshots(&self) -> &SnapshotStore {
        &self.snapshots
    }

    pub fn runtime(&self) -> &RuntimeState {
        &self.runtime
    }

    pub fn sessions(&self) -> &Arc<SessionManager<S>> {
        &self.sessions
    }

    pub fn tools(&self) -> &ToolRegistry {
        &self.tools
    }

    pub fn agent_loop(&self) -> &Arc<AgentLoop<S>> {
        &self.agent_loop
    }
}

#[cfg(test)]
#[path = "lib.test.rs"]
mod tests;
