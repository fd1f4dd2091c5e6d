//! The orchestrator (C9, spec §4.3): the single event receiver that keeps
//! [`AgentRegistry`], [`AgentFileStore`], and [`ForkSessionManager`] in sync,
//! plus tree hydration (§4.9) and the `fork`/`task_finish` mediation that
//! `wbench-tools` calls through via [`ForkSpawner`]/[`TaskFinishReporter`].
//!
//! Grounded on `astrid-runtime::orchestrator::SubAgentOrchestrator`'s
//! single-struct-owns-the-singletons shape; the injected-trait pattern for
//! `fork`/`task_finish` mirrors `astrid-tools::subagent_spawner`.

use std::collections::{BTreeSet, HashSet, VecDeque};
use std::sync::Arc;

use async_trait::async_trait;
use tracing::warn;

use wbench_core::{
    AgentId, AgentMetadata, AgentRecord, DocumentLocation, HostEditor, HostEvent, MetadataPatch,
};
use wbench_tools::{ChildSpec, ForkSpawner, TaskFinishReporter, ToolError};

use crate::error::{OrchestratorError, OrchestratorResult};
use crate::file_store::AgentFileStore;
use crate::fork_session::{ForkError, ForkSessionManager};
use crate::registry::AgentRegistry;

/// Describes why `hydrate_tree` is trying to load a given id, so a dangling
/// link can be repaired on the correct side (spec §4.9).
enum Referrer {
    /// `id` is supposed to be `AgentId`'s parent.
    ParentOf(AgentId),
    /// `id` is supposed to be one of `AgentId`'s children.
    ChildOf(AgentId),
}

/// Coordinates C1–C3 on lifecycle events and mediates `fork`/`task_finish`
/// between a parent and its children via C2.
#[derive(Clone)]
pub struct Orchestrator {
    registry: AgentRegistry,
    file_store: AgentFileStore,
    fork_sessions: ForkSessionManager,
    host: Arc<dyn HostEditor>,
}

impl Orchestrator {
    /// Build an orchestrator over the given collaborators.
    #[must_use]
    pub fn new(registry: AgentRegistry, file_store: AgentFileStore, fork_sessions: ForkSessionManager, host: Arc<dyn HostEditor>) -> Self {
        Self { registry, file_store, fork_sessions, host }
    }

    /// Borrow the agent registry (for the sidebar projection, C12, and the
    /// controller glue, C11).
    #[must_use]
    pub fn registry(&self) -> &AgentRegistry {
        &self.registry
    }

    /// Borrow the fork session manager (for the sidebar projection, C12).
    #[must_use]
    pub fn fork_sessions(&self) -> &ForkSessionManager {
        &self.fork_sessions
    }

    /// Borrow the file store (for the controller glue, C11, which records
    /// cell interactions directly).
    #[must_use]
    pub fn file_store(&self) -> &AgentFileStore {
        &self.file_store
    }

    /// Dispatch one host-delivered event (spec §4.3 event table). Events
    /// outside the orchestrator's concern (`DocumentClosed`, `DocumentSaved`,
    /// `CellExecuteRequested`) are ignored here; the latter is handled by
    /// the controller glue (C11).
    pub async fn handle_event(&self, event: HostEvent) -> OrchestratorResult<()> {
        match event {
            HostEvent::DocumentOpened { location, metadata } => self.document_opened(location, metadata).await,
            HostEvent::VisibleDocumentsChanged { locations } => {
                self.visible_set_changed(locations.iter().map(ToString::to_string).collect()).await;
                Ok(())
            }
            HostEvent::FileDeleted { location } => self.file_deleted(location).await,
            HostEvent::DocumentClosed { .. } | HostEvent::DocumentSaved { .. } | HostEvent::CellExecuteRequested { .. } => Ok(()),
        }
    }

    /// `documentOpened(id, location, meta)`: upsert the record, merge
    /// `taskFinished`/children from the on-disk metadata, then hydrate the
    /// whole reachable tree (§4.9).
    pub async fn document_opened(&self, location: DocumentLocation, metadata: serde_json::Value) -> OrchestratorResult<()> {
        let metadata: AgentMetadata = serde_json::from_value(metadata)?;
        let id = metadata.id.clone();

        let mut children: BTreeSet<AgentId> = metadata.children_list.iter().cloned().collect();
        let mut task_finished = metadata.task_finished;
        let existing = self.registry.get(&id).await;
        if let Some(existing) = &existing {
            children.extend(existing.child_ids.iter().cloned());
            task_finished = task_finished || existing.task_finished;
        }

        let record = match existing {
            Some(mut record) => {
                record.name = metadata.name.clone();
                record.parent_id = metadata.parent_id.clone();
                record.allowed_paths = metadata.allowed_paths.clone();
                record.model = metadata.model.clone();
                record.document_location = location.to_string();
                record.task_finished = task_finished;
                record.child_ids = children;
                record
            }
            None => {
                let mut record = AgentRecord::new(
                    id.clone(),
                    metadata.parent_id.clone(),
                    metadata.name.clone(),
                    location.to_string(),
                    metadata.allowed_paths.clone(),
                    metadata.model.clone(),
                    None,
                );
                record.created_at = metadata.created_at;
                record.task_finished = task_finished;
                record.child_ids = children;
                record
            }
        };
        self.registry.insert(record).await;
        self.hydrate_tree(id).await
    }

    /// `windowOpenedForId(id, …)`.
    pub async fn window_opened_for_id(&self, id: &AgentId) {
        self.registry.update(id, |record| record.window_open = true).await;
    }

    /// `visibleSetChanged(locations)`.
    pub async fn visible_set_changed(&self, locations: Vec<String>) {
        for record in self.registry.all().await {
            let visible = locations.contains(&record.document_location);
            self.registry.update(&record.id, |record| record.window_open = visible).await;
        }
    }

    /// `agentStarted(id)`.
    pub async fn agent_started(&self, id: &AgentId) {
        self.registry.update(id, |record| record.running = true).await;
    }

    /// `agentStopped(id)`.
    pub async fn agent_stopped(&self, id: &AgentId) {
        self.registry.update(id, |record| record.running = false).await;
    }

    /// `nameChanged(id, newName)`.
    pub async fn name_changed(&self, id: &AgentId, new_name: String) -> OrchestratorResult<()> {
        let Some(record) = self.registry.update(id, |record| record.name = new_name.clone()).await else {
            return Err(OrchestratorError::UnknownAgent(id.to_string()));
        };
        let location = AgentFileStore::location_for(id);
        self.file_store
            .update_metadata(&location, MetadataPatch { name: Some(record.name), ..Default::default() })
            .await
    }

    /// `fileDeleted(location)`: orphan children, detach from the parent,
    /// remove the record, and resolve any fork session waiting on it.
    pub async fn file_deleted(&self, location: DocumentLocation) -> OrchestratorResult<()> {
        let location_key = location.to_string();
        let Some(record) = self.registry.get_by_location(&location_key).await else {
            return Ok(());
        };

        if let Some(parent_id) = &record.parent_id {
            if let Some(parent) = self.registry.update(parent_id, |parent| { parent.child_ids.remove(&record.id); }).await {
                self.file_store
                    .update_metadata(
                        &AgentFileStore::location_for(parent_id),
                        MetadataPatch { children_list: Some(parent.child_ids.into_iter().collect()), ..Default::default() },
                    )
                    .await?;
            }
        }

        for child_id in &record.child_ids {
            self.registry.update(child_id, |child| child.parent_id = None).await;
            self.file_store
                .update_metadata(&AgentFileStore::location_for(child_id), MetadataPatch { parent_id: Some(None), ..Default::default() })
                .await?;
        }

        self.registry.remove(&record.id).await;

        if let Some(parent_id) = &record.parent_id {
            self.fork_sessions.mark_deleted(parent_id, record.id.clone()).await;
        }

        Ok(())
    }

    /// Tree hydration (spec §4.9): breadth-first over `parentId`/children
    /// links, repairing any dangling reference it finds.
    async fn hydrate_tree(&self, start: AgentId) -> OrchestratorResult<()> {
        let mut visited = HashSet::new();
        let mut queue = VecDeque::new();
        queue.push_back((start, None::<Referrer>));

        while let Some((id, referrer)) = queue.pop_front() {
            if !visited.insert(id.clone()) {
                continue;
            }

            if let Some(record) = self.registry.get(&id).await {
                if let Some(parent_id) = record.parent_id.clone() {
                    queue.push_back((parent_id, Some(Referrer::ChildOf(id.clone()))));
                }
                for child_id in &record.child_ids {
                    queue.push_back((child_id.clone(), Some(Referrer::ParentOf(id.clone()))));
                }
                continue;
            }

            let location = AgentFileStore::location_for(&id);
            match self.file_store.load(&location).await {
                Ok(document) => {
                    let mut record = AgentRecord::new(
                        document.metadata.id.clone(),
                        document.metadata.parent_id.clone(),
                        document.metadata.name.clone(),
                        location.to_string(),
                        document.metadata.allowed_paths.clone(),
                        document.metadata.model.clone(),
                        document.context.iter().find_map(|m| (m.role == wbench_core::Role::User).then(|| m.text()).flatten()).map(str::to_string),
                    );
                    record.created_at = document.metadata.created_at;
                    record.task_finished = document.metadata.task_finished;
                    record.child_ids = document.metadata.children_list.iter().cloned().collect();
                    self.registry.insert(record.clone()).await;

                    if let Some(parent_id) = record.parent_id.clone() {
                        queue.push_back((parent_id, Some(Referrer::ChildOf(id.clone()))));
                    }
                    for child_id in &record.child_ids {
                        queue.push_back((child_id.clone(), Some(Referrer::ParentOf(id.clone()))));
                    }
                }
                Err(_) => match referrer {
                    Some(Referrer::ChildOf(child_id)) => self.repair_dangling_parent(&child_id).await?,
                    Some(Referrer::ParentOf(parent_id)) => self.repair_dangling_child(&parent_id, &id).await?,
                    None => {}
                },
            }
        }
        Ok(())
    }

    async fn repair_dangling_parent(&self, child_id: &AgentId) -> OrchestratorResult<()> {
        self.registry.update(child_id, |record| record.parent_id = None).await;
        self.file_store
            .update_metadata(&AgentFileStore::location_for(child_id), MetadataPatch { parent_id: Some(None), ..Default::default() })
            .await
    }

    async fn repair_dangling_child(&self, parent_id: &AgentId, missing_child_id: &AgentId) -> OrchestratorResult<()> {
        let Some(parent) = self.registry.update(parent_id, |record| { record.child_ids.remove(missing_child_id); }).await else {
            return Ok(());
        };
        self.file_store
            .update_metadata(
                &AgentFileStore::location_for(parent_id),
                MetadataPatch { children_list: Some(parent.child_ids.into_iter().collect()), ..Default::default() },
            )
            .await
    }

    async fn spawn_child(&self, parent_id: &AgentId, child_id: AgentId, spec: ChildSpec) -> OrchestratorResult<()> {
        let location = self
            .file_store
            .create(child_id.clone(), Some(parent_id.clone()), Some(spec.prompt.clone()), spec.allowed_paths.clone(), spec.model.clone())
            .await?;

        let mut record = AgentRecord::new(
            child_id.clone(),
            Some(parent_id.clone()),
            format!("agent-{}", child_id.short()),
            location.to_string(),
            spec.allowed_paths,
            spec.model,
            Some(spec.prompt),
        );
        record.window_open = true;
        self.registry.insert(record).await;

        if let Some(parent) = self.registry.update(parent_id, |record| { record.child_ids.insert(child_id.clone()); }).await {
            self.file_store
                .update_metadata(
                    &AgentFileStore::location_for(parent_id),
                    MetadataPatch { children_list: Some(parent.child_ids.into_iter().collect()), ..Default::default() },
                )
                .await?;
        }

        self.host.show_document(&location, true).await?;
        Ok(())
    }
}

#[async_trait]
impl ForkSpawner for Orchestrator {
    async fn fork(&self, parent_id: AgentId, _context_summary: Option<String>, children: Vec<ChildSpec>) -> Result<String, ToolError> {
        let child_ids: Vec<AgentId> = children.iter().map(|_| AgentId::new()).collect();

        let Some(receiver) = self.fork_sessions.create(parent_id.clone(), child_ids.clone()).await else {
            return Err(ToolError::ExecutionFailed(format!("agent {parent_id} already has an active fork session")));
        };

        for (child_id, spec) in child_ids.into_iter().zip(children) {
            if let Err(err) = self.spawn_child(&parent_id, child_id, spec).await {
                self.fork_sessions.cancel(&parent_id).await;
                return Err(ToolError::ExecutionFailed(err.to_string()));
            }
        }

        match receiver.await {
            Ok(Ok(report)) => Ok(report),
            Ok(Err(ForkError::Cancelled)) => Err(ToolError::Cancelled),
            Err(_) => Err(ToolError::ExecutionFailed("fork session was dropped before resolving".to_string())),
        }
    }

    async fn cancel_fork(&self, parent_id: AgentId) {
        self.fork_sessions.cancel(&parent_id).await;
    }
}

#[async_trait]
impl TaskFinishReporter for Orchestrator {
    async fn report_task_finish(&self, agent_id: AgentId, summary: String) {
        let Some(record) = self.registry.update(&agent_id, |record| record.task_finished = true).await else {
            warn!(%agent_id, "task_finish reported for an unregistered agent");
            return;
        };

        let location = AgentFileStore::location_for(&agent_id);
        if let Err(err) = self.file_store.update_metadata(&location, MetadataPatch { task_finished: Some(true), ..Default::default() }).await {
            warn!(%agent_id, %err, "failed to persist taskFinished");
        }

        if let Some(parent_id) = record.parent_id {
            self.fork_sessions.record_result(&parent_id, agent_id, summary).await;
        }
    }
}
