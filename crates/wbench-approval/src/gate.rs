//! The approval gate (C5, spec §4.5).
//!
//! Grounded on `astrid-approval::manager::ApprovalManager`, simplified: no
//! allowance-store persistence, no deferred-resolution priority queue (the
//! spec's gate only ever has the handler's own timeout-free settle delay).
//! Adds the rule-parsing-scope nested counter, which the teacher doesn't
//! have, via [`RuleParsingScopeGuard`].

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{oneshot, Mutex};
use tracing::{debug, info};

use wbench_core::{AgentId, ApprovalDecision, ApprovalRequest, ApprovalStatus};

use crate::error::ApprovalError;

/// How long a resolved request stays visible before eviction (spec §4.5
/// step 3, §5 budgets).
const SETTLE_DELAY: Duration = Duration::from_secs(1);

struct PendingEntry {
    request: ApprovalRequest,
    sender: Option<oneshot::Sender<ApprovalDecision>>,
}

struct GateState {
    pending: HashMap<String, PendingEntry>,
}

/// The approval gate. Cheap to clone: internal state is reference-counted.
#[derive(Clone)]
pub struct ApprovalGate {
    state: Arc<Mutex<GateState>>,
    auto_approve: Arc<AtomicBool>,
    rule_parsing_depth: Arc<AtomicU32>,
}

impl Default for ApprovalGate {
    fn default() -> Self {
        Self::new()
    }
}

impl ApprovalGate {
    /// Build a gate with auto-approve disabled and no pending requests.
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(GateState { pending: HashMap::new() })),
            auto_approve: Arc::new(AtomicBool::new(false)),
            rule_parsing_depth: Arc::new(AtomicU32::new(0)),
        }
    }

    /// Toggle the global auto-approve mode (`toggle-auto-approve` command, §6).
    pub fn set_auto_approve(&self, enabled: bool) {
        self.auto_approve.store(enabled, Ordering::SeqCst);
    }

    /// `true` if auto-approve is currently enabled.
    #[must_use]
    pub fn auto_approve_enabled(&self) -> bool {
        self.auto_approve.load(Ordering::SeqCst)
    }

    /// `true` if a rule-parsing scope is currently active (nested or not).
    #[must_use]
    pub fn in_rule_parsing_scope(&self) -> bool {
        self.rule_parsing_depth.load(Ordering::SeqCst) > 0
    }

    /// Enter a rule-parsing scope (spec §4.5 "counter-based scope"). Tool
    /// invocations performed while any guard from this gate is alive are
    /// auto-approved; scopes nest, and auto-approval ends only when the
    /// outermost guard drops.
    #[must_use]
    pub fn enter_rule_parsing_scope(&self) -> RuleParsingScopeGuard {
        self.rule_parsing_depth.fetch_add(1, Ordering::SeqCst);
        RuleParsingScopeGuard { depth: Arc::clone(&self.rule_parsing_depth) }
    }

    /// Request approval for a side-effectful action. Resolves to `true`
    /// (approved) or `false` (rejected). Auto-approved requests resolve
    /// immediately without ever reaching a UI surface (spec §4.5 step 1).
    pub async fn request_approval(
        &self,
        agent_id: AgentId,
        action: impl Into<String>,
        target: impl Into<String>,
        details: impl Into<String>,
    ) -> ApprovalDecision {
        let action = action.into();
        let target = target.into();
        let details = details.into();

        if self.auto_approve_enabled() || self.in_rule_parsing_scope() {
            let request = ApprovalRequest::new_auto_approved(agent_id, action, target, details);
            info!(request_id = %request.id, "auto-approved tool request");
            self.insert_and_schedule_eviction(request, None).await;
            return ApprovalDecision::Approved;
        }

        let (tx, rx) = oneshot::channel();
        let request = ApprovalRequest::new(agent_id, action, target, details);
        debug!(request_id = %request.id, "raised approval request, awaiting a decision");
        self.insert_and_schedule_eviction(request, Some(tx)).await;

        // A cancelled cell execution drops its future without ever polling
        // `rx` again; the gate still holds the request until resolved or
        // the calling runner's select! races it against the abort signal
        // (spec §5 "Awaiting the user's approval decision...must honour
        // the abort signal").
        rx.await.unwrap_or(ApprovalDecision::Rejected)
    }

    async fn insert_and_schedule_eviction(&self, request: ApprovalRequest, sender: Option<oneshot::Sender<ApprovalDecision>>) {
        let id = request.id.to_string();
        let mut state = self.state.lock().await;
        state.pending.insert(id, PendingEntry { request, sender });
    }

    /// Resolve a pending request from any UI surface (sidebar, notification,
    /// command). A second resolution of the same id is a no-op (spec §9
    /// "Approval cross-UI resolution").
    pub async fn resolve(&self, request_id: &str, decision: ApprovalDecision) -> Result<(), ApprovalError> {
        let sender = {
            let mut state = self.state.lock().await;
            let Some(entry) = state.pending.get_mut(request_id) else {
                return Err(ApprovalError::UnknownRequest(request_id.to_string()));
            };
            if entry.request.status != ApprovalStatus::Pending {
                return Ok(());
            }
            entry.request.status = decision.into();
            entry.sender.take()
        };

        if let Some(sender) = sender {
            let _ = sender.send(decision);
        }

        self.schedule_settle_eviction(request_id.to_string());
        Ok(())
    }

    /// Reject a request because its owning cell execution was cancelled
    /// while the user had not yet decided (spec §5 cancellation, §7.1 and
    /// §8 "abort during approval... propagates cancellation").
    pub async fn cancel(&self, request_id: &str) {
        let _ = self.resolve(request_id, ApprovalDecision::Rejected).await;
    }

    fn schedule_settle_eviction(&self, request_id: String) {
        let state = Arc::clone(&self.state);
        tokio::spawn(async move {
            tokio::time::sleep(SETTLE_DELAY).await;
            let mut state = state.lock().await;
            state.pending.remove(&request_id);
        });
    }

    /// Snapshot every currently-pending (or recently-resolved, still
    /// settling) request, for the sidebar projection (C12).
    pub async fn list_pending(&self) -> Vec<ApprovalRequest> {
        let state = self.state.lock().await;
        state.pending.values().map(|entry| entry.request.clone()).collect()
    }
}

/// RAII guard for a rule-parsing scope; dropping it exits the scope.
pub struct RuleParsingScopeGuard {
    depth: Arc<AtomicU32>,
}

impl Drop for RuleParsingScopeGuard {
    fn drop(&mut self) {
        self.depth.fetch_sub(1, Ordering::SeqCst);
    }
}
