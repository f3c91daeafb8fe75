//! Model provider: the external streaming interface the loop drives (spec §6).

use forge_error::Result;
use forge_protocol::Message;
use forge_protocol::SessionId;
use futures::stream::BoxStream;
use serde_json::Value;
use tokio_util::sync::CancellationToken;

/// Input built from the session's message history for one provider turn.
/// The implementer may trim or compress long histories; the only contract is
/// that the tail containing the last unanswered user turn (plus any
/// intervening tool calls) remains visible (spec §4.G step 4.a).
#[derive(Debug, Clone)]
pub struct ProviderRequest {
    pub session_id: SessionId,
    pub model: String,
    pub reasoning_effort: String,
    pub messages: Vec<Message>,
}

/// One event in a provider's streamed response.
#[derive(Debug, Clone)]
pub enum ProviderEvent {
    Text { delta: String },
    Reasoning { delta: String },
    ToolCall { id: String, name: String, input: Value },
    ToolCallDelta { id: String, delta: String },
    End { metadata: Option<Value> },
}

pub type ProviderStream = BoxStream<'static, Result<ProviderEvent>>;

/// Consumed external interface: a streaming model backend.
///
/// `stream` must honour `cancel_token`: once cancelled, the returned stream
/// should close promptly (spec §4.G cancellation contract: within 500ms).
#[async_trait::async_trait]
pub trait ModelProvider: Send + Sync {
    async fn stream(
        &self,
        request: ProviderRequest,
        cancel_token: CancellationToken,
    ) -> Result<ProviderStream>;
}
