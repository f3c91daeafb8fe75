//! Permission broker: the external approval interface the loop consults
//! before invoking a tool that requires it (spec §6).

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::sync::oneshot;
use tracing::debug;
use tracing::warn;

use serde_json::Value;

/// The broker's three-way-reduced answer to a permission request. The
/// broker may offer richer UX internally (approve/deny/remember, a queue of
/// pending requests, ...) but the core only ever sees this.
#[derive(Debug, Clone)]
pub struct ApprovalDecision {
    pub granted: bool,
    pub reason: Option<String>,
}

impl ApprovalDecision {
    pub fn granted() -> Self {
        Self {
            granted: true,
            reason: None,
        }
    }

    pub fn denied(reason: impl Into<String>) -> Self {
        Self {
            granted: false,
            reason: Some(reason.into()),
        }
    }
}

/// Consumed external interface: grants or denies a tool invocation.
///
/// The core publishes `permission.requested` on the bus with a correlation
/// id before calling `request`, and `permission.responded` after it
/// resolves; the broker's own UX (queueing, out-of-band callbacks) is
/// entirely its concern.
#[async_trait::async_trait]
pub trait PermissionBroker: Send + Sync {
    async fn request(&self, kind: &str, detail: Value, session_id: &str) -> ApprovalDecision;
}

/// A broker that grants everything; used when a session runs in bypass mode
/// or in tests that don't exercise the approval path.
#[derive(Debug, Clone, Copy, Default)]
pub struct AlwaysApprove;

#[async_trait::async_trait]
impl PermissionBroker for AlwaysApprove {
    async fn request(&self, _kind: &str, _detail: Value, _session_id: &str) -> ApprovalDecision {
        ApprovalDecision::granted()
    }
}

/// Default timeout for a queued permission request before it is treated as
/// denied.
pub const DEFAULT_PERMISSION_TIMEOUT: Duration = Duration::from_secs(300);

struct PendingRequest {
    kind: String,
    detail: Value,
    session_id: String,
    response_tx: Option<oneshot::Sender<ApprovalDecision>>,
}

/// A queue-backed [`PermissionBroker`] for embedders whose approval UI lives
/// out-of-process: `request` enqueues and waits, while the UI thread drains
/// the queue with [`PermissionQueue::pending_requests`] and resolves it with
/// [`PermissionQueue::respond`].
///
/// Grounded on the teacher's `WorkerPermissionQueue` (request/response
/// channel pairs keyed by request id, with a default timeout that denies an
/// abandoned request rather than hanging the loop forever).
#[derive(Clone, Default)]
pub struct PermissionQueue {
    pending: Arc<Mutex<HashMap<String, PendingRequest>>>,
}

impl PermissionQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every pending request's id, session, kind, and detail, for a UI to
    /// render (and to let a multi-session UI filter to the session it's
    /// showing).
    pub async fn pending_requests(&self) -> Vec<(String, String, String, Value)> {
        self.pending
            .lock()
            .await
            .iter()
            .map(|(id, req)| (id.clone(), req.session_id.clone(), req.kind.clone(), req.detail.clone()))
            .collect()
    }

    /// Resolve a pending request by id. Returns `false` if no such request
    /// is pending (already resolved, timed out, or never existed).
    pub async fn respond(&self, request_id: &str, decision: ApprovalDecision) -> bool {
        let tx = {
            let mut pending = self.pending.lock().await;
            pending.get_mut(request_id).and_then(|req| req.response_tx.take())
        };
        match tx {
            Some(tx) => {
                let _ = tx.send(decision);
                true
            }
            None => {
                warn!(request_id, "permission response for unknown or resolved request");
                false
            }
        }
    }
}

#[async_trait::async_trait]
impl PermissionBroker for PermissionQueue {
    async fn request(&self, kind: &str, detail: Value, session_id: &str) -> ApprovalDecision {
        let request_id = format!("perm_{}", nanoid::nanoid!(10));
        let (tx, rx) = oneshot::channel();
        self.pending.lock().await.insert(
            request_id.clone(),
            PendingRequest {
                kind: kind.to_string(),
                detail,
                session_id: session_id.to_string(),
                response_tx: Some(tx),
            },
        );

        let decision = match tokio::time::timeout(DEFAULT_PERMISSION_TIMEOUT, rx).await {
            Ok(Ok(decision)) => decision,
            Ok(Err(_)) => {
                warn!(request_id, "permission request channel closed before a response");
                ApprovalDecision::denied("request cancelled before approval")
            }
            Err(_) => {
                warn!(request_id, "permission request timed out");
                ApprovalDecision::denied("permission request timed out")
            }
        };
        debug!(request_id, granted = decision.granted, "permission request resolved");
        self.pending.lock().await.remove(&request_id);
        decision
    }
}
