//! Name → callable registry, plus the deadline/cancellation-aware dispatch
//! path used by the agent loop.

use std::sync::Arc;

use dashmap::DashMap;
use forge_error::Error;
use forge_error::Result;
use serde_json::Value;
use tracing::warn;

use crate::context::ToolContext;
use crate::tool::Tool;

/// Holds every tool the engine knows about, keyed by name.
#[derive(Default, Clone)]
pub struct ToolRegistry {
    tools: Arc<DashMap<String, Arc<dyn Tool>>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, tool: Arc<dyn Tool>) {
        self.tools.insert(tool.name().to_string(), tool);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).map(|entry| entry.value().clone())
    }

    pub fn list(&self) -> Vec<String> {
        self.tools.iter().map(|entry| entry.key().clone()).collect()
    }

    /// Runs the full pipeline for `name`: validate, check permission,
    /// execute under `ctx`'s deadline. Timeouts and validation failures are
    /// returned as errors for the caller to fold into a failed `tool-result`
    /// part rather than aborting the run (spec §4.H).
    pub async fn dispatch(&self, name: &str, input: Value, ctx: &mut ToolContext) -> Result<Value> {
        let tool = self
            .get(name)
            .ok_or_else(|| Error::not_found("Tool", name.to_string()))?;

        tool.validate(&input).await?;
        tool.check_permission(&input, ctx).await?;

        let remaining = ctx.deadline.saturating_duration_since(std::time::Instant::now());
        if remaining.is_zero() {
            return Err(Error::timeout(name.to_string(), 0));
        }

        let cancel_token = ctx.cancel_token.clone();
        tokio::select! {
            biased;
            _ = cancel_token.cancelled() => {
                warn!(tool = name, "tool dispatch observed cancellation");
                Err(Error::invalid_operation(format!("{name} cancelled")))
            }
            result = tokio::time::timeout(remaining, tool.execute(input, ctx)) => {
                match result {
                    Ok(inner) => inner,
                    Err(_) => Err(Error::timeout(name.to_string(), remaining.as_millis() as u64)),
                }
            }
        }
    }
}

#[cfg(test)]
#[path = "registry.test.rs"]
mod tests;
