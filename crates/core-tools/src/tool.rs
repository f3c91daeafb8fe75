//! `Tool` trait: the validate / check-permission / execute pipeline.
//!
//! Trimmed from a 5-stage pipeline to 3: post-processing and cleanup hooks
//! had no corresponding behaviour in this engine's tool model (see
//! `DESIGN.md`), so only the stages the spec actually calls out remain.

use async_trait::async_trait;
use forge_error::Error;
use forge_error::Result;
use serde_json::Value;

use crate::context::ToolContext;

/// A registered tool: a name, a declared input schema, and a handler.
#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    fn input_schema(&self) -> Value;

    /// Validate `input` against the declared schema. Default implementation
    /// checks that every field listed in the schema's `required` array is
    /// present; override for tools that need deeper validation.
    async fn validate(&self, input: &Value) -> Result<()> {
        let schema = self.input_schema();
        if let Some(required) = schema.get("required").and_then(|r| r.as_array()) {
            for field in required {
                if let Some(field_name) = field.as_str() {
                    if input.get(field_name).is_none() {
                        return Err(Error::validation(
                            Some(field_name.to_string()),
                            format!("missing required field: {field_name}"),
                        ));
                    }
                }
            }
        }
        Ok(())
    }

    /// Tool-specific permission check beyond the session-level permission
    /// broker (spec §6); most tools never need to override this.
    async fn check_permission(&self, _input: &Value, _ctx: &ToolContext) -> Result<()> {
        Ok(())
    }

    /// Whether invoking this tool with `input` requires the session's
    /// permission broker to approve first (spec §4.G step 4.c). Defaults to
    /// true; read-only or otherwise safe tools may override to false.
    fn requires_approval(&self, _input: &Value) -> bool {
        true
    }

    /// Perform the tool's work. Returns the raw output value that becomes a
    /// `tool-result` part's `output`.
    async fn execute(&self, input: Value, ctx: &mut ToolContext) -> Result<Value>;
}

#[cfg(test)]
#[path = "tool.test.rs"]
mod tests;
