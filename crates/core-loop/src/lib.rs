//! Agent execution loop (spec §4.G).
//!
//! `AgentLoop::run_agent` drives a [`ModelProvider`] through repeated
//! tool-calling turns under a per-run deadline and the session's
//! cancellation token, dispatching tool calls through the [`ToolRegistry`]
//! and consulting a [`PermissionBroker`] unless the session runs in bypass
//! mode. Grounded on `core/loop/src/driver.rs`'s `AgentLoop` driver shape
//! (event channel, cancel token, turn counting).

mod config;
mod ids;
mod permission;
mod provider;

pub use config::LoopConfig;
pub use permission::AlwaysApprove;
pub use permission::ApprovalDecision;
pub use permission::PermissionBroker;
pub use permission::PermissionQueue;
pub use provider::ModelProvider;
pub use provider::ProviderEvent;
pub use provider::ProviderRequest;
pub use provider::ProviderStream;

use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use forge_bus::BroadcastBus;
use forge_error::Error;
use forge_error::Result;
use forge_message::MessageStore;
use forge_message::PartPatch;
use forge_protocol::Event;
use forge_protocol::MessageRole;
use forge_protocol::PartKind;
use forge_protocol::Session;
use forge_protocol::ToolCallStatus;
use forge_runtime::RuntimeState;
use forge_session::SessionManager;
use forge_store::Store;
use forge_tools::ToolContext;
use forge_tools::ToolRegistry;
use futures::StreamExt;
use serde_json::Value;
use sha2::Digest;
use sha2::Sha256;
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing::warn;

use crate::ids::new_message_id;
use crate::ids::new_part_id;

/// How a single `run_agent` call ended, before the caller decides which
/// terminal bus event to publish (spec §4.G steps 5-7).
enum Outcome {
    Completed,
    Cancelled,
}

/// Accumulates a streaming text/reasoning part's full content locally, since
/// [`PartPatch`] replaces content rather than appending to it.
struct StreamingSlot {
    part_id: String,
    content: String,
}

/// Drives provider turns for sessions backed by store `S`. One instance is
/// shared across every session; at most one run per session is enforced via
/// `sessions.runtime()`.
pub struct AgentLoop<S> {
    sessions: Arc<SessionManager<S>>,
    messages: MessageStore<S>,
    tools: ToolRegistry,
    bus: BroadcastBus,
    provider: Arc<dyn ModelProvider>,
    permissions: Arc<dyn PermissionBroker>,
    config: LoopConfig,
}

impl<S> AgentLoop<S>
where
    S: Store + Clone + 'static,
{
    pub fn new(
        sessions: Arc<SessionManager<S>>,
        messages: MessageStore<S>,
        tools: ToolRegistry,
        bus: BroadcastBus,
        provider: Arc<dyn ModelProvider>,
        permissions: Arc<dyn PermissionBroker>,
        config: LoopConfig,
    ) -> Self {
        Self {
            sessions,
            messages,
            tools,
            bus,
            provider,
            permissions,
            config,
        }
    }

    fn runtime(&self) -> &RuntimeState {
        self.sessions.runtime()
    }

    /// Runs one full agent turn for `session_id`, from appending the user's
    /// message through the final `task.*` event. Never returns an error out
    /// to the caller for failures that occur mid-run (spec §7: "Agent-loop
    /// failures emit `task.failed`... they never propagate out of
    /// `runAgent`"); the `Result` here only reports setup failures (missing
    /// session, a run already active).
    pub async fn run_agent(&self, session_id: &str, user_input: impl Into<String>) -> Result<()> {
        let user_input = user_input.into();
        self.sessions.get_session(session_id).await?;

        if self.runtime().has_active_task(session_id) {
            return Err(Error::invalid_operation(format!(
                "session {session_id} already has an active run"
            )));
        }

        let token = self.runtime().begin_task(session_id);
        let _guard = TaskGuard {
            runtime: self.runtime().clone(),
            session_id: session_id.to_string(),
        };

        self.bus
            .publish(Event::TaskStarted {
                session_id: session_id.to_string(),
                task_id: session_id.to_string(),
            })
            .await;

        let sleep = tokio::time::sleep(self.config.run_deadline);
        tokio::pin!(sleep);
        let mut drive_fut = Box::pin(self.drive(session_id, user_input, token.clone()));
        let mut timed_out = false;
        let outcome = loop {
            tokio::select! {
                biased;
                result = &mut drive_fut => break result,
                () = &mut sleep, if !timed_out => {
                    timed_out = true;
                    warn!(session_id, "agent run exceeded its deadline, cancelling");
                    token.cancel();
                }
            }
        };

        match outcome {
            Ok(Outcome::Completed) => {
                info!(session_id, "agent run completed");
                self.bus
                    .publish(Event::TaskCompleted {
                        session_id: session_id.to_string(),
                        task_id: session_id.to_string(),
                    })
                    .await;
            }
            Ok(Outcome::Cancelled) if timed_out => {
                self.bus
                    .publish(Event::TaskTimeout {
                        session_id: session_id.to_string(),
                        task_id: session_id.to_string(),
                        timeout_ms: self.config.run_deadline.as_millis() as u64,
                    })
                    .await;
            }
            Ok(Outcome::Cancelled) => {
                info!(session_id, "agent run cancelled");
                self.bus
                    .publish(Event::TaskCancelled {
                        session_id: session_id.to_string(),
                        task_id: session_id.to_string(),
                    })
                    .await;
            }
            Err(err) => {
                warn!(session_id, error = %err, "agent run failed");
                self.best_effort_commit(session_id, "agent-turn").await;
                self.bus
                    .publish(Event::TaskFailed {
                        session_id: session_id.to_string(),
                        task_id: session_id.to_string(),
                        error: err.to_string(),
                    })
                    .await;
            }
        }
        Ok(())
    }

    async fn drive(&self, session_id: &str, user_input: String, token: CancellationToken) -> Result<Outcome> {
        let session = self.sessions.get_session(session_id).await?;

        let user_message_id = new_message_id();
        self.messages
            .append_message(session_id, &user_message_id, MessageRole::User)
            .await?;
        self.messages
            .append_part(
                session_id,
                &user_message_id,
                &new_part_id(),
                PartKind::Text {
                    content: user_input,
                    streaming: false,
                },
            )
            .await?;
        self.sessions.commit_snapshot(session_id, "user-message").await?;

        if token.is_cancelled() {
            return Ok(Outcome::Cancelled);
        }

        let assistant_message_id = new_message_id();
        self.messages
            .append_message(session_id, &assistant_message_id, MessageRole::Assistant)
            .await?;

        let mut in_flight_tool_calls: Vec<String> = Vec::new();

        loop {
            if token.is_cancelled() {
                self.cancel_in_flight(session_id, &assistant_message_id, &mut in_flight_tool_calls)
                    .await;
                self.best_effort_commit(session_id, "agent-turn").await;
                return Ok(Outcome::Cancelled);
            }

            let messages = self.sessions.store().get_messages(session_id).await?;
            let request = ProviderRequest {
                session_id: session_id.to_string(),
                model: session.model.clone(),
                reasoning_effort: session.reasoning_effort.clone(),
                messages,
            };

            let mut stream = self.provider.stream(request, token.clone()).await?;

            let mut saw_tool_call = false;
            let mut text_slot: Option<StreamingSlot> = None;
            let mut reasoning_slot: Option<StreamingSlot> = None;

            loop {
                tokio::select! {
                    biased;
                    () = token.cancelled() => {
                        self.cancel_in_flight(session_id, &assistant_message_id, &mut in_flight_tool_calls)
                            .await;
                        self.best_effort_commit(session_id, "agent-turn").await;
                        return Ok(Outcome::Cancelled);
                    }
                    next = stream.next() => {
                        let Some(event) = next else { break };
                        let event = event?;
                        match event {
                            ProviderEvent::Text { delta } => {
                                self.accumulate(session_id, &assistant_message_id, &mut text_slot, delta, false)
                                    .await?;
                            }
                            ProviderEvent::Reasoning { delta } => {
                                self.accumulate(session_id, &assistant_message_id, &mut reasoning_slot, delta, true)
                                    .await?;
                            }
                            ProviderEvent::ToolCall { id, name, input } => {
                                saw_tool_call = true;
                                self.handle_tool_call(
                                    session_id,
                                    &assistant_message_id,
                                    &session,
                                    &token,
                                    &mut in_flight_tool_calls,
                                    id,
                                    name,
                                    input,
                                )
                                .await?;
                            }
                            ProviderEvent::ToolCallDelta { .. } => {
                                // Raw argument streaming; only the assembled `ToolCall`
                                // event is materialized as a part (spec §6).
                            }
                            ProviderEvent::End { .. } => break,
                        }
                    }
                }
            }

            self.finish(session_id, &assistant_message_id, text_slot).await?;
            self.finish(session_id, &assistant_message_id, reasoning_slot).await?;

            if !saw_tool_call {
                break;
            }
        }

        self.sessions.commit_snapshot(session_id, "agent-turn").await?;
        self.messages.complete_message(session_id, &assistant_message_id, None).await?;
        Ok(Outcome::Completed)
    }

    async fn accumulate(
        &self,
        session_id: &str,
        message_id: &str,
        slot: &mut Option<StreamingSlot>,
        delta: String,
        is_reasoning: bool,
    ) -> Result<()> {
        match slot {
            None => {
                let part_id = new_part_id();
                let kind = if is_reasoning {
                    PartKind::Reasoning {
                        content: delta.clone(),
                        streaming: true,
                    }
                } else {
                    PartKind::Text {
                        content: delta.clone(),
                        streaming: true,
                    }
                };
                self.messages.append_part(session_id, message_id, &part_id, kind).await?;
                *slot = Some(StreamingSlot {
                    part_id,
                    content: delta,
                });
            }
            Some(existing) => {
                existing.content.push_str(&delta);
                self.messages
                    .update_part(
                        session_id,
                        message_id,
                        &existing.part_id,
                        PartPatch::streaming_text(existing.content.clone(), true),
                    )
                    .await?;
            }
        }
        Ok(())
    }

    async fn finish(&self, session_id: &str, message_id: &str, slot: Option<StreamingSlot>) -> Result<()> {
        if let Some(slot) = slot {
            self.messages
                .update_part(
                    session_id,
                    message_id,
                    &slot.part_id,
                    PartPatch::streaming_text(slot.content, false),
                )
                .await?;
        }
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    async fn handle_tool_call(
        &self,
        session_id: &str,
        message_id: &str,
        session: &Session,
        token: &CancellationToken,
        in_flight: &mut Vec<String>,
        call_id: String,
        name: String,
        input: Value,
    ) -> Result<()> {
        let part_id = new_part_id();
        self.messages
            .append_part(
                session_id,
                message_id,
                &part_id,
                PartKind::ToolCall {
                    tool_name: name.clone(),
                    input: input.clone(),
                    status: ToolCallStatus::Pending,
                    started_at: None,
                    finished_at: None,
                },
            )
            .await?;
        in_flight.push(part_id.clone());

        let tool = self.tools.get(&name);
        let needs_approval = !session.bypass_mode && tool.as_ref().is_none_or(|t| t.requires_approval(&input));

        if needs_approval {
            let request_id = format!("perm_{}", nanoid::nanoid!(10));
            self.bus
                .publish(Event::PermissionRequested {
                    session_id: session_id.to_string(),
                    request_id: request_id.clone(),
                    kind: name.clone(),
                    detail: input.clone(),
                })
                .await;
            let decision = self.permissions.request(&name, input.clone(), session_id).await;
            self.bus
                .publish(Event::PermissionResponded {
                    session_id: session_id.to_string(),
                    request_id,
                    granted: decision.granted,
                    reason: decision.reason.clone(),
                })
                .await;

            if !decision.granted {
                self.messages
                    .update_part(
                        session_id,
                        message_id,
                        &part_id,
                        PartPatch::tool_call_status(ToolCallStatus::Cancelled),
                    )
                    .await?;
                self.messages
                    .append_part(
                        session_id,
                        message_id,
                        &new_part_id(),
                        PartKind::ToolResult {
                            tool_call_id: call_id,
                            output: Value::Null,
                            error: Some(decision.reason.unwrap_or_else(|| "permission denied".to_string())),
                        },
                    )
                    .await?;
                in_flight.retain(|id| id != &part_id);
                return Ok(());
            }
        }

        self.messages
            .update_part(
                session_id,
                message_id,
                &part_id,
                PartPatch::tool_call_status(ToolCallStatus::Running),
            )
            .await?;

        let (file_tx, mut file_rx) = tokio::sync::mpsc::unbounded_channel();
        let deadline = Instant::now() + self.config.tool_deadline;
        let mut ctx = ToolContext::new(session_id, session.directory.clone(), token.clone(), deadline, file_tx);

        let dispatch_result = self.tools.dispatch(&name, input, &mut ctx).await;
        drop(ctx);

        match dispatch_result {
            Ok(output) => {
                self.messages
                    .update_part(
                        session_id,
                        message_id,
                        &part_id,
                        PartPatch::tool_call_status(ToolCallStatus::Completed),
                    )
                    .await?;
                self.messages
                    .append_part(
                        session_id,
                        message_id,
                        &new_part_id(),
                        PartKind::ToolResult {
                            tool_call_id: call_id,
                            output,
                            error: None,
                        },
                    )
                    .await?;
            }
            Err(err) => {
                // A cancelled token surfaces through `dispatch` as an error
                // (it has no dedicated error kind), but the part must still
                // land in `Cancelled`, not `Failed` (spec §4.G step 6).
                let status = if token.is_cancelled() {
                    ToolCallStatus::Cancelled
                } else {
                    ToolCallStatus::Failed
                };
                self.messages
                    .update_part(
                        session_id,
                        message_id,
                        &part_id,
                        PartPatch::tool_call_status(status),
                    )
                    .await?;
                self.messages
                    .append_part(
                        session_id,
                        message_id,
                        &new_part_id(),
                        PartKind::ToolResult {
                            tool_call_id: call_id,
                            output: Value::Null,
                            error: Some(err.to_string()),
                        },
                    )
                    .await?;
            }
        }
        in_flight.retain(|id| id != &part_id);

        while let Ok(change) = file_rx.try_recv() {
            let abs_path = if change.path.is_absolute() {
                change.path.clone()
            } else {
                session.directory.join(&change.path)
            };
            let after_hash = hash_file(&abs_path).await;
            self.messages
                .append_part(
                    session_id,
                    message_id,
                    &new_part_id(),
                    PartKind::File {
                        path: change.path,
                        before_hash: None,
                        after_hash,
                        change_type: change.change_type,
                    },
                )
                .await?;
        }

        Ok(())
    }

    async fn cancel_in_flight(&self, session_id: &str, message_id: &str, in_flight: &mut Vec<String>) {
        for part_id in in_flight.drain(..) {
            let _ = self
                .messages
                .update_part(
                    session_id,
                    message_id,
                    &part_id,
                    PartPatch::tool_call_status(ToolCallStatus::Cancelled),
                )
                .await;
        }
    }

    async fn best_effort_commit(&self, session_id: &str, description: &str) {
        let _ = self.sessions.commit_snapshot(session_id, description).await;
    }
}

/// Removes the session's active-task entry on every exit path of
/// `run_agent`, matching spec §4.G step 8 ("Always: remove the entry from
/// `activeTasks`").
struct TaskGuard {
    runtime: RuntimeState,
    session_id: String,
}

impl Drop for TaskGuard {
    fn drop(&mut self) {
        self.runtime.end_task(&self.session_id);
    }
}

async fn hash_file(path: &Path) -> String {
    let bytes = tokio::fs::read(path).await.unwrap_or_default();
    sha256_hex(&bytes)
}

fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
#[path = "lib.test.rs"]
mod tests;
