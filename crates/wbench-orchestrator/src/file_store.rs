//! The agent file store (C3, spec §4.2): persists each agent as a
//! self-describing JSON document via the injected [`HostEditor`].
//!
//! Every agent document lives at the deterministic location
//! `agents/<id>.json` (a simplification over a real host's arbitrary
//! workspace layout, but one the spec's own `fork` step 2 already implies:
//! a fresh id and a fresh document are minted together). This lets tree
//! hydration (§4.9) resolve a referenced parent/child id to a location
//! without a side index.

use std::sync::Arc;

use chrono::Utc;

use wbench_core::{AgentDocument, AgentId, AgentMetadata, ConversationMessage, DocumentLocation, HostEditor, MetadataPatch, Role};

use crate::error::{OrchestratorError, OrchestratorResult};

/// Persists and loads agent documents through a [`HostEditor`].
#[derive(Clone)]
pub struct AgentFileStore {
    host: Arc<dyn HostEditor>,
}

impl AgentFileStore {
    /// Build a store over the given host capability object.
    #[must_use]
    pub fn new(host: Arc<dyn HostEditor>) -> Self {
        Self { host }
    }

    /// The deterministic on-disk location for an agent id.
    #[must_use]
    pub fn location_for(id: &AgentId) -> DocumentLocation {
        DocumentLocation::bare(format!("agents/{id}.json"))
    }

    /// Create a fresh agent document (spec §4.2 `create`) and write it,
    /// returning its location.
    pub async fn create(
        &self,
        id: AgentId,
        parent_id: Option<AgentId>,
        prompt: Option<String>,
        allowed_paths: Vec<String>,
        model: Option<String>,
    ) -> OrchestratorResult<DocumentLocation> {
        let location = Self::location_for(&id);
        let metadata = AgentMetadata {
            id: id.clone(),
            name: short_name(&id),
            created_at: Utc::now(),
            parent_id,
            allowed_paths,
            task_finished: false,
            model,
            children_list: Vec::new(),
        };
        let context = prompt.into_iter().map(ConversationMessage::user).collect();
        let document = AgentDocument { metadata, context };
        self.write(&location, &document).await?;
        Ok(location)
    }

    /// Load a document (spec §4.2 `load`).
    pub async fn load(&self, location: &DocumentLocation) -> OrchestratorResult<AgentDocument> {
        let bytes = self.host.read_file(location).await?;
        let document = serde_json::from_slice(&bytes)?;
        Ok(document)
    }

    /// Apply a metadata patch, total-replacing the metadata header (spec
    /// §4.2 `updateMetadata`: "last writer wins").
    pub async fn update_metadata(&self, location: &DocumentLocation, patch: MetadataPatch) -> OrchestratorResult<()> {
        let mut document = self.load(location).await?;
        if let Some(name) = patch.name {
            document.metadata.name = name;
        }
        if let Some(task_finished) = patch.task_finished {
            document.metadata.task_finished = task_finished;
        }
        if let Some(parent_id) = patch.parent_id {
            document.metadata.parent_id = parent_id;
        }
        if let Some(children_list) = patch.children_list {
            document.metadata.children_list = children_list;
        }
        if let Some(model) = patch.model {
            document.metadata.model = model;
        }
        self.write(location, &document).await
    }

    /// Record the turns produced by one cell execution (spec §4.2
    /// `updateCellInteraction`).
    ///
    /// `context` alternates user turns with the assistant/tool turns that
    /// followed them (spec §6): a "cell" is the span from one `User`
    /// message up to (but excluding) the next. This totally replaces the
    /// interaction attached to `cell_index` and drops anything recorded
    /// after it, matching "total replacement of...the targeted cell's
    /// attached interaction".
    pub async fn update_cell_interaction(
        &self,
        location: &DocumentLocation,
        cell_index: usize,
        new_messages: Vec<ConversationMessage>,
    ) -> OrchestratorResult<()> {
        let mut document = self.load(location).await?;
        let boundary = nth_cell_start(&document.context, cell_index);
        document.context.truncate(boundary);
        document.context.extend(new_messages);
        self.write(location, &document).await
    }

    async fn write(&self, location: &DocumentLocation, document: &AgentDocument) -> OrchestratorResult<()> {
        let bytes = serde_json::to_vec_pretty(document)?;
        self.host.write_file(location, &bytes).await?;
        Ok(())
    }

    /// Delete an agent's document from the host file system.
    pub async fn delete(&self, location: &DocumentLocation) -> OrchestratorResult<()> {
        self.host.delete_file(location).await.map_err(OrchestratorError::from)
    }
}

/// The index of the first message belonging to the `n`-th cell (0-based):
/// the position of the `n`-th `Role::User` message, or `context.len()` if
/// there are fewer than `n + 1` user turns (appends a new cell).
fn nth_cell_start(context: &[ConversationMessage], n: usize) -> usize {
    context
        .iter()
        .enumerate()
        .filter(|(_, m)| m.role == Role::User)
        .nth(n)
        .map_or(context.len(), |(idx, _)| idx)
}

fn short_name(id: &AgentId) -> String {
    format!("agent-{}", id.short())
}
