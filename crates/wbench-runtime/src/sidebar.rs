//! Sidebar projection (C12, spec §4 "supplemented" component): a read-only
//! tree view over the registry, fork sessions, and approval gate, assembled
//! fresh on demand rather than maintained incrementally — the registry,
//! fork-session manager, and approval gate are each already the source of
//! truth, so this module only ever reads them.

use std::collections::HashMap;

use serde::Serialize;

use wbench_approval::ApprovalGate;
use wbench_core::{AgentId, AgentRecord, ApprovalRequest};
use wbench_orchestrator::Orchestrator;

/// One row of the sidebar tree.
#[derive(Debug, Clone, Serialize)]
pub struct SidebarNode {
    pub id: AgentId,
    pub name: String,
    pub running: bool,
    pub task_finished: bool,
    pub window_open: bool,
    pub has_pending_fork: bool,
    pub children: Vec<SidebarNode>,
}

/// The full sidebar projection, rebuilt on every query.
#[derive(Debug, Clone, Serialize, Default)]
pub struct SidebarSnapshot {
    /// Root agents, each with their descendant tree attached.
    pub roots: Vec<SidebarNode>,
    /// Approval requests awaiting (or settling after) a decision.
    pub pending_approvals: Vec<ApprovalRequest>,
    /// `true` if the global auto-approve toggle is on.
    pub auto_approve_enabled: bool,
}

/// Assemble a fresh sidebar snapshot from the orchestrator's registry and
/// fork-session manager, plus the approval gate.
pub async fn snapshot(orchestrator: &Orchestrator, approval_gate: &ApprovalGate) -> SidebarSnapshot {
    let all = orchestrator.registry().all().await;
    let mut by_id: HashMap<AgentId, AgentRecord> = HashMap::with_capacity(all.len());
    let mut children_of: HashMap<Option<AgentId>, Vec<AgentId>> = HashMap::new();
    for record in all {
        children_of.entry(record.parent_id.clone()).or_default().push(record.id.clone());
        by_id.insert(record.id.clone(), record);
    }

    let mut pending_forks = Vec::new();
    for id in by_id.keys() {
        if orchestrator.fork_sessions().has(id).await {
            pending_forks.push(id.clone());
        }
    }

    let roots = children_of
        .get(&None)
        .cloned()
        .unwrap_or_default()
        .into_iter()
        .filter_map(|id| build_node(&id, &by_id, &children_of, &pending_forks))
        .collect();

    SidebarSnapshot {
        roots,
        pending_approvals: approval_gate.list_pending().await,
        auto_approve_enabled: approval_gate.auto_approve_enabled(),
    }
}

fn build_node(
    id: &AgentId,
    by_id: &HashMap<AgentId, AgentRecord>,
    children_of: &HashMap<Option<AgentId>, Vec<AgentId>>,
    pending_forks: &[AgentId],
) -> Option<SidebarNode> {
    let record = by_id.get(id)?;
    let children = children_of
        .get(&Some(id.clone()))
        .cloned()
        .unwrap_or_default()
        .into_iter()
        .filter_map(|child_id| build_node(&child_id, by_id, children_of, pending_forks))
        .collect();

    Some(SidebarNode {
        id: record.id.clone(),
        name: record.name.clone(),
        running: record.running,
        task_finished: record.task_finished,
        window_open: record.window_open,
        has_pending_fork: pending_forks.contains(id),
        children,
    })
}
