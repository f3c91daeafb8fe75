#![allow(clippy::unwrap_used, clippy::expect_used)]
use super::*;
use crate::context::ToolContext;
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
        "echoes the message field back"
    }

    fn input_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {"message": {"type": "string"}},
            "required": ["message"]
        })
    }

    async fn execute(&self, input: Value, _ctx: &mut ToolContext) -> Result<Value> {
        Ok(serde_json::json!({"echoed": input["message"]}))
    }
}

fn context() -> ToolContext {
    let (tx, _rx) = mpsc::unbounded_channel();
    ToolContext::new(
        "ses_1",
        "/tmp",
        CancellationToken::new(),
        Instant::now() + Duration::from_secs(30),
        tx,
    )
}

#[tokio::test]
async fn validate_accepts_complete_input() {
    let tool = EchoTool;
    let input = serde_json::json!({"message": "hi"});
    tool.validate(&input).await.unwrap();
}

#[tokio::test]
async fn validate_rejects_missing_required_field() {
    let tool = EchoTool;
    let input = serde_json::json!({});
    let err = tool.validate(&input).await.unwrap_err();
    assert_eq!(err.kind(), "validation");
}

#[tokio::test]
async fn check_permission_defaults_to_allowed() {
    let tool = EchoTool;
    let ctx = context();
    tool.check_permission(&serde_json::json!({}), &ctx)
        .await
        .unwrap();
}

#[tokio::test]
async fn execute_returns_tool_output() {
    let tool = EchoTool;
    let mut ctx = context();
    let output = tool
        .execute(serde_json::json!({"message": "hi"}), &mut ctx)
        .await
        .unwrap();
    assert_eq!(output, serde_json::json!({"echoed": "hi"}));
}
