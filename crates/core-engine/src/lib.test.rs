#![allow(clippy::unwrap_used, clippy::expect_used)]
use super::*;

use async_trait::async_trait;
use forge_loop::ModelProvider;
use forge_loop::ProviderEvent;
use forge_loop::ProviderRequest;
use forge_loop::ProviderStream;
use forge_protocol::Event;
use forge_session::CreateSessionOptions;
use forge_store::InMemoryStore;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

struct OneShotProvider;

#[async_trait]
impl ModelProvider for OneShotProvider {
    async fn stream(&self, _request: ProviderRequest, _cancel_token: CancellationToken) -> forge_error::Result<ProviderStream> {
        let events = vec![
            ProviderEvent::Text { delta: "hello from the core".to_string() },
            ProviderEvent::End { metadata: None },
        ];
        Ok(Box::pin(futures::stream::iter(events.into_iter().map(Ok))))
    }
}

#[tokio::test]
async fn core_wires_a_session_through_to_a_completed_run() {
    let dir = TempDir::new().unwrap();
    let store = Arc::new(InMemoryStore::new());
    let core = Core::new(
        store,
        Arc::new(OneShotProvider),
        Arc::new(AlwaysApprove),
        EngineConfig::default(),
    );

    let session = core
        .sessions()
        .create_session(CreateSessionOptions::new(dir.path()))
        .await
        .unwrap();

    let mut sub = core.bus().subscribe(Some(session.id.clone())).await;

    core.agent_loop().run_agent(&session.id, "hi").await.unwrap();

    let mut saw_completed = false;
    while let Ok(Some(event)) = tokio::time::timeout(Duration::from_secs(2), sub.recv()).await {
        if matches!(event, Event::TaskCompleted { .. }) {
            saw_completed = true;
            break;
        }
    }
    assert!(saw_completed);

    let messages = core.store().get_messages(&session.id).await.unwrap();
    assert_eq!(messages.len(), 2);
    assert!(!core.runtime().has_active_task(&session.id));
}

#[tokio::test]
async fn engine_config_defaults_match_loop_defaults() {
    let config = EngineConfig::default();
    assert_eq!(config.run_deadline_secs, LoopConfig::DEFAULT_RUN_DEADLINE.as_secs());
    assert_eq!(config.tool_deadline_secs, LoopConfig::DEFAULT_TOOL_DEADLINE.as_secs());
    assert_eq!(config.bus_queue_capacity, forge_bus::DEFAULT_QUEUE_CAPACITY);
}
