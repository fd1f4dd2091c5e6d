//! Shared data model for the approval gate (spec §3 `ApprovalRequest`).
//!
//! The gate's behavior — pending bookkeeping, auto-approve, rule-parsing
//! scope — lives in `wbench-approval`; this module only owns the types that
//! cross the boundary between a tool call, the gate, and a host UI surface.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::{AgentId, ApprovalId};

/// A pending-or-resolved human decision (spec §3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApprovalRequest {
    /// Unique id for this request, minted when it is raised.
    pub id: ApprovalId,
    /// The agent whose tool call raised this request.
    pub agent_id: AgentId,
    /// The action being requested, e.g. `write_file`.
    pub action: String,
    /// The resource the action targets, e.g. a path.
    pub target: String,
    /// A short human-readable description of the action (spec §4.5).
    pub details: String,
    /// When the request was raised.
    pub timestamp: DateTime<Utc>,
    /// Current resolution state.
    pub status: ApprovalStatus,
    /// `true` if this request was resolved by auto-approve rather than a
    /// human decision (spec §4.5 step 1).
    pub auto_approved: bool,
}

/// The resolution state of an [`ApprovalRequest`] (spec §3 `status`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalStatus {
    /// Awaiting a decision.
    Pending,
    /// Approved (by a human or by auto-approve).
    Approved,
    /// Rejected.
    Rejected,
}

impl ApprovalRequest {
    /// Build a fresh pending request, minting its id and timestamp.
    #[must_use]
    pub fn new(agent_id: AgentId, action: impl Into<String>, target: impl Into<String>, details: impl Into<String>) -> Self {
        Self {
            id: ApprovalId::new(),
            agent_id,
            action: action.into(),
            target: target.into(),
            details: details.into(),
            timestamp: Utc::now(),
            status: ApprovalStatus::Pending,
            auto_approved: false,
        }
    }

    /// Build an already-resolved, auto-approved request (spec §4.5 step 1).
    #[must_use]
    pub fn new_auto_approved(agent_id: AgentId, action: impl Into<String>, target: impl Into<String>, details: impl Into<String>) -> Self {
        let mut request = Self::new(agent_id, action, target, details);
        request.status = ApprovalStatus::Approved;
        request.auto_approved = true;
        request
    }
}

/// The outcome a UI surface resolves a pending request with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ApprovalDecision {
    /// The action may proceed.
    Approved,
    /// The action must not proceed.
    Rejected,
}

impl ApprovalDecision {
    /// `true` for [`Self::Approved`].
    #[must_use]
    pub fn is_approved(self) -> bool {
        matches!(self, Self::Approved)
    }
}

impl From<ApprovalDecision> for ApprovalStatus {
    fn from(decision: ApprovalDecision) -> Self {
        match decision {
            ApprovalDecision::Approved => Self::Approved,
            ApprovalDecision::Rejected => Self::Rejected,
        }
    }
}
