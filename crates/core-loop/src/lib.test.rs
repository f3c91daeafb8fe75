#![allow(clippy::unwrap_used, clippy::expect_used)]
use super::*;

use std::collections::VecDeque;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;
use std::time::Duration;

use async_trait::async_trait;
use forge_protocol::ChangeType;
use forge_session::CreateSessionOptions;
use forge_snapshot::SnapshotStore;
use forge_store::InMemoryStore;
use forge_tools::Tool;
use serde_json::json;
use tempfile::TempDir;
use tokio::sync::Mutex as AsyncMutex;

struct FakeProvider {
    batches: AsyncMutex<VecDeque<Vec<ProviderEvent>>>,
}

impl FakeProvider {
    fn new(batches: Vec<Vec<ProviderEvent>>) -> Self {
        Self {
            batches: AsyncMutex::new(batches.into_iter().collect()),
        }
    }
}

#[async_trait]
impl ModelProvider for FakeProvider {
    async fn stream(&self, _request: ProviderRequest, _cancel_token: CancellationToken) -> Result<ProviderStream> {
        let events = self
            .batches
            .lock()
            .await
            .pop_front()
            .unwrap_or_else(|| vec![ProviderEvent::End { metadata: None }]);
        Ok(Box::pin(futures::stream::iter(events.into_iter().map(Ok))))
    }
}

/// A provider whose stream never produces an event, used to exercise the
/// cancellation path: the loop must observe `token.cancelled()` before the
/// stream yields anything.
struct HangingProvider;

#[async_trait]
impl ModelProvider for HangingProvider {
    async fn stream(&self, _request: ProviderRequest, _cancel_token: CancellationToken) -> Result<ProviderStream> {
        Ok(Box::pin(futures::stream::pending()))
    }
}

struct DenyAll;

#[async_trait]
impl PermissionBroker for DenyAll {
    async fn request(&self, _kind: &str, _detail: Value, _session_id: &str) -> ApprovalDecision {
        ApprovalDecision::denied("policy denies all tools in this test")
    }
}

struct CountingTool {
    requires_approval: bool,
    calls: Arc<AtomicUsize>,
}

#[async_trait]
impl Tool for CountingTool {
    fn name(&self) -> &str {
        "touch"
    }

    fn description(&self) -> &str {
        "writes a file and reports it"
    }

    fn input_schema(&self) -> Value {
        json!({"type": "object"})
    }

    fn requires_approval(&self, _input: &Value) -> bool {
        self.requires_approval
    }

    async fn execute(&self, _input: Value, ctx: &mut ToolContext) -> Result<Value> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let path = ctx.resolve_path("touched.txt");
        let _ = tokio::fs::write(&path, b"hello").await;
        ctx.emit_file("touched.txt", ChangeType::Added);
        Ok(json!({"wrote": "touched.txt"}))
    }
}

async fn setup(
    provider: Arc<dyn ModelProvider>,
    permissions: Arc<dyn PermissionBroker>,
    tools: ToolRegistry,
) -> (
    AgentLoop<Arc<InMemoryStore>>,
    Arc<SessionManager<Arc<InMemoryStore>>>,
    BroadcastBus,
    TempDir,
    Session,
) {
    let dir = TempDir::new().unwrap();
    let store = Arc::new(InMemoryStore::default());
    let bus = BroadcastBus::new();
    let sessions = Arc::new(SessionManager::new(
        store.clone(),
        bus.clone(),
        SnapshotStore::new(),
        RuntimeState::new(),
    ));
    let session = sessions
        .create_session(CreateSessionOptions::new(dir.path()))
        .await
        .unwrap();
    let messages = MessageStore::new(store, bus.clone());
    let agent_loop = AgentLoop::new(
        sessions.clone(),
        messages,
        tools,
        bus.clone(),
        provider,
        permissions,
        LoopConfig::default(),
    );
    (agent_loop, sessions, bus, dir, session)
}

async fn next_matching<F: Fn(&Event) -> bool>(bus_sub: &mut forge_bus::Subscription, pred: F) -> bool {
    loop {
        match tokio::time::timeout(Duration::from_secs(2), bus_sub.recv()).await {
            Ok(Some(event)) if pred(&event) => return true,
            Ok(Some(_)) => continue,
            _ => return false,
        }
    }
}

#[tokio::test]
async fn run_agent_without_tool_calls_completes_and_writes_messages() {
    let provider = Arc::new(FakeProvider::new(vec![vec![
        ProviderEvent::Text { delta: "hi".to_string() },
        ProviderEvent::Text { delta: " there".to_string() },
        ProviderEvent::End { metadata: None },
    ]]));
    let (agent_loop, sessions, bus, _dir, session) =
        setup(provider, Arc::new(AlwaysApprove), ToolRegistry::new()).await;
    let mut sub = bus.subscribe(Some(session.id.clone())).await;

    agent_loop.run_agent(&session.id, "hello").await.unwrap();

    assert!(next_matching(&mut sub, |e| matches!(e, Event::TaskCompleted { .. })).await);

    let messages = sessions.store().get_messages(&session.id).await.unwrap();
    assert_eq!(messages.len(), 2);
    assert!(messages[1].is_complete());

    let text_part = messages[1]
        .parts
        .iter()
        .find(|p| matches!(p.kind, PartKind::Text { .. }))
        .unwrap();
    match &text_part.kind {
        PartKind::Text { content, streaming } => {
            assert_eq!(content, "hi there");
            assert!(!streaming);
        }
        _ => unreachable!(),
    }

    assert!(!sessions.runtime().has_active_task(&session.id));

    let history = sessions.store().get_snapshot_history(&session.id).await.unwrap();
    assert_eq!(history.len(), 3); // init, user-message, agent-turn
}

#[tokio::test]
async fn run_agent_rejects_a_second_concurrent_run() {
    let provider = Arc::new(HangingProvider);
    let (agent_loop, sessions, _bus, _dir, session) =
        setup(provider, Arc::new(AlwaysApprove), ToolRegistry::new()).await;

    let session_id = session.id.clone();
    let loop_arc = Arc::new(agent_loop);
    let first = {
        let loop_arc = loop_arc.clone();
        let session_id = session_id.clone();
        tokio::spawn(async move { loop_arc.run_agent(&session_id, "hello").await })
    };

    while !sessions.runtime().has_active_task(&session_id) {
        tokio::time::sleep(Duration::from_millis(5)).await;
    }

    let err = loop_arc.run_agent(&session_id, "again").await.unwrap_err();
    assert_eq!(err.kind(), "invalid_operation");

    sessions.abort_session(&session_id).await.unwrap();
    first.await.unwrap().unwrap();
}

#[tokio::test]
async fn tool_call_in_bypass_mode_skips_approval_and_emits_file_part() {
    let provider = Arc::new(FakeProvider::new(vec![
        vec![
            ProviderEvent::ToolCall {
                id: "call_1".to_string(),
                name: "touch".to_string(),
                input: json!({}),
            },
            ProviderEvent::End { metadata: None },
        ],
        vec![
            ProviderEvent::Text { delta: "done".to_string() },
            ProviderEvent::End { metadata: None },
        ],
    ]));
    let calls = Arc::new(AtomicUsize::new(0));
    let tools = ToolRegistry::new();
    tools.register(Arc::new(CountingTool {
        requires_approval: true,
        calls: calls.clone(),
    }));

    let (agent_loop, sessions, _bus, _dir, session) = setup(provider, Arc::new(DenyAll), tools).await;
    sessions
        .update_session(
            &session.id,
            forge_session::UpdateSessionOptions::default(),
        )
        .await
        .unwrap();
    // Force bypass mode directly through the store since UpdateSessionOptions
    // has no bypass_mode field (bypass is set at creation time per spec §4.E).
    let mut bypassed = sessions.get_session(&session.id).await.unwrap();
    bypassed.bypass_mode = true;
    sessions.store().save_session(&bypassed).await.unwrap();

    agent_loop.run_agent(&session.id, "please touch a file").await.unwrap();

    assert_eq!(calls.load(Ordering::SeqCst), 1);

    let messages = sessions.store().get_messages(&session.id).await.unwrap();
    let assistant = &messages[1];
    let tool_call = assistant
        .parts
        .iter()
        .find(|p| p.is_tool_call())
        .expect("tool-call part present");
    match &tool_call.kind {
        PartKind::ToolCall { status, .. } => assert_eq!(*status, ToolCallStatus::Completed),
        _ => unreachable!(),
    }
    assert!(assistant.parts.iter().any(|p| p.tool_call_id_if_result() == Some("call_1")));
    assert!(assistant
        .parts
        .iter()
        .any(|p| matches!(p.kind, PartKind::File { change_type: ChangeType::Added, .. })));
}

#[tokio::test]
async fn permission_denied_tool_call_is_not_executed() {
    let provider = Arc::new(FakeProvider::new(vec![vec![
        ProviderEvent::ToolCall {
            id: "call_1".to_string(),
            name: "touch".to_string(),
            input: json!({}),
        },
        ProviderEvent::End { metadata: None },
    ]]));
    let calls = Arc::new(AtomicUsize::new(0));
    let tools = ToolRegistry::new();
    tools.register(Arc::new(CountingTool {
        requires_approval: true,
        calls: calls.clone(),
    }));

    let (agent_loop, sessions, _bus, _dir, session) = setup(provider, Arc::new(DenyAll), tools).await;

    agent_loop.run_agent(&session.id, "please touch a file").await.unwrap();

    assert_eq!(calls.load(Ordering::SeqCst), 0);

    let messages = sessions.store().get_messages(&session.id).await.unwrap();
    let assistant = &messages[1];
    let tool_call = assistant.parts.iter().find(|p| p.is_tool_call()).unwrap();
    match &tool_call.kind {
        PartKind::ToolCall { status, .. } => assert_eq!(*status, ToolCallStatus::Cancelled),
        _ => unreachable!(),
    }
    let result = assistant
        .parts
        .iter()
        .find(|p| p.tool_call_id_if_result() == Some("call_1"))
        .unwrap();
    match &result.kind {
        PartKind::ToolResult { error, .. } => assert!(error.is_some()),
        _ => unreachable!(),
    }
}

#[tokio::test]
async fn abort_session_cancels_an_in_flight_run() {
    let provider = Arc::new(HangingProvider);
    let (agent_loop, sessions, bus, _dir, session) =
        setup(provider, Arc::new(AlwaysApprove), ToolRegistry::new()).await;
    let mut sub = bus.subscribe(Some(session.id.clone())).await;

    let session_id = session.id.clone();
    let loop_arc = Arc::new(agent_loop);
    let handle = {
        let loop_arc = loop_arc.clone();
        let session_id = session_id.clone();
        tokio::spawn(async move { loop_arc.run_agent(&session_id, "hello").await })
    };

    while !sessions.runtime().has_active_task(&session_id) {
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    assert!(sessions.abort_session(&session_id).await.unwrap());

    handle.await.unwrap().unwrap();

    assert!(next_matching(&mut sub, |e| matches!(e, Event::TaskCancelled { .. })).await);
    assert!(!sessions.runtime().has_active_task(&session_id));
}
