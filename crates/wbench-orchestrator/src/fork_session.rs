//! The fork/join session manager (C2, spec §4.4): tracks one outstanding
//! `fork` call per parent agent and resolves it once every expected child
//! has either reported completion or been deleted.
//!
//! Grounded on `astrid-runtime::subagent::JoinBarrier`'s single-shot
//! "resolve once all parties check in" shape, re-expressed with a
//! `oneshot::Sender` per session instead of a `Notify`, since here exactly
//! one waiter (the parent's `fork` tool call) ever awaits the result.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use thiserror::Error;
use tokio::sync::{oneshot, Mutex};

use wbench_core::AgentId;

use crate::registry::AgentRegistry;

/// The separator placed between per-child report sections (spec §4.4).
const REPORT_SEPARATOR: &str = "\n\n";

/// Errors a fork session can resolve with.
#[derive(Debug, Error, Clone)]
pub enum ForkError {
    /// The parent's cell execution was cancelled before every child
    /// reported (spec §4.3 "Cancellation").
    #[error("fork was cancelled")]
    Cancelled,
}

struct Session {
    expected: Vec<AgentId>,
    results: HashMap<AgentId, String>,
    deleted: HashSet<AgentId>,
}

impl Session {
    fn is_complete(&self) -> bool {
        self.expected.iter().all(|id| self.results.contains_key(id) || self.deleted.contains(id))
    }

    /// Build the joined report (spec §4.4 `buildReport(parentId, registry)`):
    /// a finished child's section names it by its *current* registry name
    /// (which may have been renamed since the child was spawned), not by
    /// its id — only the deleted-child section uses the short id, per spec.
    async fn build_report(&self, registry: &AgentRegistry) -> String {
        let mut sections = Vec::with_capacity(self.expected.len());
        for id in &self.expected {
            if let Some(text) = self.results.get(id) {
                let name = registry.get(id).await.map_or_else(|| id.short().to_string(), |record| record.name);
                sections.push(format!("### Sub-agent '{name}' Finished:\n{text}"));
            } else if self.deleted.contains(id) {
                sections.push(format!("### Sub-agent {} was deleted (Cancelled).", id.short()));
            }
        }
        if self.results.is_empty() {
            "All sub-agents were deleted or produced no output.".to_string()
        } else {
            sections.join(REPORT_SEPARATOR)
        }
    }
}

struct Entry {
    session: Session,
    sender: Option<oneshot::Sender<Result<String, ForkError>>>,
}

/// Tracks at most one pending fork session per parent agent.
#[derive(Clone)]
pub struct ForkSessionManager {
    sessions: Arc<Mutex<HashMap<AgentId, Entry>>>,
    registry: AgentRegistry,
}

impl ForkSessionManager {
    /// Build an empty manager over the given registry, used to resolve a
    /// finished child's current name when building a joined report.
    #[must_use]
    pub fn new(registry: AgentRegistry) -> Self {
        Self { sessions: Arc::new(Mutex::new(HashMap::new())), registry }
    }

    /// Start a new session for `parent_id` expecting reports from
    /// `expected_children` (in order). Returns the receiver half the
    /// caller awaits for the joined report.
    ///
    /// Returns `None` if `parent_id` already has a pending session (spec
    /// §4.3 step 1 invariant: forked only once per cell).
    pub async fn create(&self, parent_id: AgentId, expected_children: Vec<AgentId>) -> Option<oneshot::Receiver<Result<String, ForkError>>> {
        let mut sessions = self.sessions.lock().await;
        if sessions.contains_key(&parent_id) {
            return None;
        }
        let (tx, rx) = oneshot::channel();
        sessions.insert(
            parent_id,
            Entry {
                session: Session { expected: expected_children, results: HashMap::new(), deleted: HashSet::new() },
                sender: Some(tx),
            },
        );
        Some(rx)
    }

    /// `true` if `parent_id` has a pending session.
    pub async fn has(&self, parent_id: &AgentId) -> bool {
        self.sessions.lock().await.contains_key(parent_id)
    }

    /// Record a child's completion report. If this was the last outstanding
    /// child, resolves and clears the parent's session.
    pub async fn record_result(&self, parent_id: &AgentId, child_id: AgentId, summary: String) {
        self.resolve_if_ready(parent_id, |session| {
            session.results.insert(child_id, summary);
        })
        .await;
    }

    /// Mark a child as deleted without a report (spec §4.3 "deletion of a
    /// running or pending child" counts toward completion). If this was the
    /// last outstanding child, resolves and clears the parent's session.
    pub async fn mark_deleted(&self, parent_id: &AgentId, child_id: AgentId) {
        self.resolve_if_ready(parent_id, |session| {
            session.deleted.insert(child_id);
        })
        .await;
    }

    async fn resolve_if_ready(&self, parent_id: &AgentId, mutate: impl FnOnce(&mut Session)) {
        let entry = {
            let mut sessions = self.sessions.lock().await;
            let Some(entry) = sessions.get_mut(parent_id) else { return };
            mutate(&mut entry.session);
            if !entry.session.is_complete() {
                return;
            }
            sessions.remove(parent_id).expect("just looked up")
        };
        let report = entry.session.build_report(&self.registry).await;
        if let Some(sender) = entry.sender {
            let _ = sender.send(Ok(report));
        }
    }

    /// Cancel `parent_id`'s pending session, resolving its waiter with
    /// [`ForkError::Cancelled`] (spec §4.3 "Cancellation", §8 "Fork
    /// cancellation"). A no-op if no session is pending.
    pub async fn cancel(&self, parent_id: &AgentId) {
        let mut sessions = self.sessions.lock().await;
        if let Some(entry) = sessions.remove(parent_id) {
            if let Some(sender) = entry.sender {
                let _ = sender.send(Err(ForkError::Cancelled));
            }
        }
    }

    /// Drop every pending session without resolving their waiters, used
    /// when the whole runtime is shutting down.
    pub async fn clear_all(&self) {
        self.sessions.lock().await.clear();
    }
}
