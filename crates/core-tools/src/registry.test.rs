#![allow(clippy::unwrap_used, clippy::expect_used)]
use super::*;
use crate::context::ToolContext;
use crate::tool::Tool;
use async_trait::async_trait;
use std::time::Duration;
use std::time::Instant;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

struct EchoTool;

#[async_trait]
impl Tool for EchoTool {
    fn name(&self) -> &str {
        "echo"
    }
    fn description(&self) -> &str {
        "echoes input"
    }
    fn input_schema(&self) -> Value {
        serde_json::json!({"type": "object", "properties": {"message": {"type": "string"}}, "required": ["message"]})
    }
    async fn execute(&self, input: Value, _ctx: &mut ToolContext) -> Result<Value> {
        Ok(input)
    }
}

struct SlowTool;

#[async_trait]
impl Tool for SlowTool {
    fn name(&self) -> &str {
        "slow"
    }
    fn description(&self) -> &str {
        "sleeps longer than its deadline"
    }
    fn input_schema(&self) -> Value {
        serde_json::json!({"type": "object"})
    }
    async fn execute(&self, _input: Value, _ctx: &mut ToolContext) -> Result<Value> {
        tokio::time::sleep(Duration::from_secs(10)).await;
        Ok(Value::Null)
    }
}

fn context_with_deadline(remaining: Duration) -> ToolContext {
    let (tx, _rx) = mpsc::unbounded_channel();
    ToolContext::new(
        "ses_1",
        "/tmp",
        CancellationToken::new(),
        Instant::now() + remaining,
        tx,
    )
}

#[tokio::test]
async fn register_get_and_list_round_trip() {
    let registry = ToolRegistry::new();
    registry.register(Arc::new(EchoTool));

    assert_eq!(registry.list(), vec!["echo".to_string()]);
    assert!(registry.get("echo").is_some());
    assert!(registry.get("missing").is_none());
}

#[tokio::test]
async fn dispatch_unknown_tool_is_not_found() {
    let registry = ToolRegistry::new();
    let mut ctx = context_with_deadline(Duration::from_secs(5));
    let err = registry
        .dispatch("missing", Value::Null, &mut ctx)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), "not_found");
}

#[tokio::test]
async fn dispatch_surfaces_validation_error() {
    let registry = ToolRegistry::new();
    registry.register(Arc::new(EchoTool));
    let mut ctx = context_with_deadline(Duration::from_secs(5));

    let err = registry
        .dispatch("echo", serde_json::json!({}), &mut ctx)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), "validation");
}

#[tokio::test]
async fn dispatch_runs_tool_and_returns_output() {
    let registry = ToolRegistry::new();
    registry.register(Arc::new(EchoTool));
    let mut ctx = context_with_deadline(Duration::from_secs(5));

    let output = registry
        .dispatch("echo", serde_json::json!({"message": "hi"}), &mut ctx)
        .await
        .unwrap();
    assert_eq!(output, serde_json::json!({"message": "hi"}));
}

#[tokio::test]
async fn dispatch_times_out_slow_tool() {
    let registry = ToolRegistry::new();
    registry.register(Arc::new(SlowTool));
    let mut ctx = context_with_deadline(Duration::from_millis(20));

    let err = registry
        .dispatch("slow", Value::Null, &mut ctx)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), "timeout");
}

#[tokio::test]
async fn dispatch_observes_cancellation() {
    let registry = ToolRegistry::new();
    registry.register(Arc::new(SlowTool));
    let mut ctx = context_with_deadline(Duration::from_secs(30));
    ctx.cancel_token.cancel();

    let err = registry
        .dispatch("slow", Value::Null, &mut ctx)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), "invalid_operation");
}
