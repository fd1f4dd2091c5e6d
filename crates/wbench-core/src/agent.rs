//! The `AgentRecord` data model (spec §3) and its on-disk document shape (§6).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::ids::AgentId;
use crate::message::ConversationMessage;

/// One entry in the in-memory agent registry (C1).
///
/// Mutated only by the orchestrator in response to lifecycle events
/// (spec §4.3); a runner never writes a record directly.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentRecord {
    /// Stable id, assigned at creation and never reused (invariant 1).
    pub id: AgentId,
    /// Id of the spawning agent, or `None` for a root agent.
    pub parent_id: Option<AgentId>,
    /// Authoritative in-memory set of spawned children; mirrored on disk.
    pub child_ids: BTreeSet<AgentId>,
    /// Short human label, shown in the sidebar and reports.
    pub name: String,
    /// Opaque location string for the host file system.
    pub document_location: String,
    /// Whether any editor view currently shows this document.
    pub window_open: bool,
    /// Whether a cell of this agent is currently executing.
    pub running: bool,
    /// Whether this agent has invoked its completion tool at least once.
    ///
    /// Monotonic: once `true`, never reverts within the record's lifetime
    /// (invariant 5).
    pub task_finished: bool,
    /// Path prefixes this agent is authorized to touch. Assigned at
    /// creation and never widened (invariant 6).
    pub allowed_paths: Vec<String>,
    /// Optional override LLM identifier.
    pub model: Option<String>,
    /// Cached first user message, if any.
    pub initial_prompt: Option<String>,
    /// Creation timestamp, persisted in the document metadata.
    pub created_at: DateTime<Utc>,
}

impl AgentRecord {
    /// Build a fresh root or child record. Callers choose the id so the
    /// orchestrator can write the on-disk document and the registry entry
    /// under the same id (spec §4.3 step 2).
    #[must_use]
    pub fn new(
        id: AgentId,
        parent_id: Option<AgentId>,
        name: impl Into<String>,
        document_location: impl Into<String>,
        allowed_paths: Vec<String>,
        model: Option<String>,
        initial_prompt: Option<String>,
    ) -> Self {
        Self {
            id,
            parent_id,
            child_ids: BTreeSet::new(),
            name: name.into(),
            document_location: document_location.into(),
            window_open: false,
            running: false,
            task_finished: false,
            allowed_paths,
            model,
            initial_prompt,
            created_at: Utc::now(),
        }
    }

    /// `true` if this agent has no parent (spec's "root-only" tool scope).
    #[must_use]
    pub fn is_root(&self) -> bool {
        self.parent_id.is_none()
    }
}

/// The persisted metadata header of an agent document (spec §6 canonical
/// layout). Distinct from [`AgentRecord`] because the document's
/// `children_list` is a plain vector (on-disk mirror) while the registry
/// keeps a set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentMetadata {
    /// Stable id, matches [`AgentRecord::id`].
    pub id: AgentId,
    /// Short human label.
    pub name: String,
    /// ISO-8601 creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Id of the spawning agent, or `None` for a root agent.
    pub parent_id: Option<AgentId>,
    /// Path prefixes this agent is authorized to touch.
    pub allowed_paths: Vec<String>,
    /// Whether this agent has invoked its completion tool at least once.
    pub task_finished: bool,
    /// Optional override LLM identifier.
    pub model: Option<String>,
    /// On-disk mirror of the children set.
    pub children_list: Vec<AgentId>,
}

impl From<&AgentRecord> for AgentMetadata {
    fn from(record: &AgentRecord) -> Self {
        Self {
            id: record.id.clone(),
            name: record.name.clone(),
            created_at: record.created_at,
            parent_id: record.parent_id.clone(),
            allowed_paths: record.allowed_paths.clone(),
            task_finished: record.task_finished,
            model: record.model.clone(),
            children_list: record.child_ids.iter().cloned().collect(),
        }
    }
}

/// The full canonical document: metadata header plus conversation history
/// (spec §6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentDocument {
    /// The metadata header.
    pub metadata: AgentMetadata,
    /// The ordered conversation history.
    pub context: Vec<ConversationMessage>,
}

/// A patch applied to a document's metadata by
/// [`wbench_orchestrator`](crate)'s file store (spec §4.2 `updateMetadata`).
/// Every field is optional; `None` leaves the existing value untouched.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MetadataPatch {
    /// New name, if changing.
    pub name: Option<String>,
    /// New `taskFinished` value, if changing.
    pub task_finished: Option<bool>,
    /// New parent id, if changing (including clearing it to orphan).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<Option<AgentId>>,
    /// New children list, if changing.
    pub children_list: Option<Vec<AgentId>>,
    /// New model override, if changing.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<Option<String>>,
}
