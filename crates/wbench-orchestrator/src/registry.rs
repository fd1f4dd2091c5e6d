//! The agent registry (C1, spec §4.1): an in-memory id→record directory.
//!
//! All persistence is delegated to [`crate::file_store::AgentFileStore`];
//! this module is pure in-memory bookkeeping. Grounded in spirit on
//! `astrid-runtime::subagent::SubAgentPool`'s id-keyed map, simplified to
//! drop semaphore-gated concurrency (spec §5 says the registry itself needs
//! no locks beyond what's required to be `Send`+`Sync` across `.await`
//! points in an async runtime).

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;

use wbench_core::{AgentId, AgentRecord};

#[derive(Default)]
struct State {
    by_id: HashMap<AgentId, AgentRecord>,
    by_location: HashMap<String, AgentId>,
}

/// In-memory directory of every known agent (C1). Cheap to clone.
#[derive(Clone, Default)]
pub struct AgentRegistry {
    state: Arc<RwLock<State>>,
}

impl AgentRegistry {
    /// Build an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a record.
    pub async fn insert(&self, record: AgentRecord) {
        let mut state = self.state.write().await;
        state.by_location.insert(record.document_location.clone(), record.id.clone());
        state.by_id.insert(record.id.clone(), record);
    }

    /// Look up a record by id.
    pub async fn get(&self, id: &AgentId) -> Option<AgentRecord> {
        self.state.read().await.by_id.get(id).cloned()
    }

    /// Look up a record by its document location.
    pub async fn get_by_location(&self, location: &str) -> Option<AgentRecord> {
        let state = self.state.read().await;
        let id = state.by_location.get(location)?;
        state.by_id.get(id).cloned()
    }

    /// `true` if an agent with this id is known.
    pub async fn contains(&self, id: &AgentId) -> bool {
        self.state.read().await.by_id.contains_key(id)
    }

    /// Mutate a record in place, returning the updated record, or `None` if
    /// no record exists under that id.
    pub async fn update(&self, id: &AgentId, f: impl FnOnce(&mut AgentRecord)) -> Option<AgentRecord> {
        let mut state = self.state.write().await;
        let old_location = state.by_id.get(id)?.document_location.clone();
        let record = state.by_id.get_mut(id)?;
        f(record);
        if record.document_location != old_location {
            state.by_location.remove(&old_location);
            state.by_location.insert(record.document_location.clone(), id.clone());
        }
        state.by_id.get(id).cloned()
    }

    /// Remove a record entirely (spec §3 invariant 1: deletion removes the
    /// record, the id is never reused).
    pub async fn remove(&self, id: &AgentId) -> Option<AgentRecord> {
        let mut state = self.state.write().await;
        let record = state.by_id.remove(id)?;
        state.by_location.remove(&record.document_location);
        Some(record)
    }

    /// Snapshot every known record, for the sidebar projection (C12).
    pub async fn all(&self) -> Vec<AgentRecord> {
        self.state.read().await.by_id.values().cloned().collect()
    }
}
