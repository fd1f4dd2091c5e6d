//! User-facing commands (spec §6 command table), dispatched against the
//! same registry/approval-gate/orchestrator handles the rest of the crate
//! uses — grounded on `astrid-runtime`'s pattern of exposing its runtime
//! state through a small set of host-registered commands rather than a
//! bespoke RPC layer per action.

use std::sync::Arc;

use wbench_approval::ApprovalGate;
use wbench_core::{AgentId, AgentRecord, ApprovalDecision, HostEditor, MetadataPatch};
use wbench_llm::LlmProvider;
use wbench_orchestrator::{AgentFileStore, Orchestrator};

use crate::controller::generate_title;
use crate::error::{RuntimeError, RuntimeResult};

/// One user-facing command (spec §6).
#[derive(Debug, Clone)]
pub enum Command {
    /// Create a fresh root agent and open its document.
    NewAgent { prompt: String, allowed_paths: Vec<String>, model: Option<String> },
    /// Change (or clear) an agent's model override.
    SelectModel { agent_id: AgentId, model: Option<String> },
    /// Regenerate an agent's display name via the title generator (spec
    /// §6), sharing [`crate::controller::generate_title`] with the
    /// automatic post-first-cell trigger (spec §4.8).
    RegenerateTitle { agent_id: AgentId },
    /// Open an agent's document in the host editor.
    OpenAgentFile { agent_id: AgentId },
    /// Copy a `REF[]` reference to this agent's document onto the
    /// clipboard.
    CopyReference { agent_id: AgentId },
    /// Approve a pending approval request.
    ApproveRequest { request_id: String },
    /// Reject a pending approval request.
    RejectRequest { request_id: String },
    /// Flip the global auto-approve toggle.
    ToggleAutoApprove,
}

/// Dispatches [`Command`]s against the orchestrator, approval gate, and
/// host (C11's command-handling half).
#[derive(Clone)]
pub struct CommandDispatcher {
    orchestrator: Orchestrator,
    approval_gate: ApprovalGate,
    host: Arc<dyn HostEditor>,
    title_llm: Option<Arc<dyn LlmProvider>>,
}

impl CommandDispatcher {
    /// Build a dispatcher over the given collaborators. `title_llm` serves
    /// the `regenerate-title` command (spec §6); pass `None` when no
    /// title-generator model is configured — the command then becomes a
    /// no-op, matching the post-cell trigger's own behavior (spec §4.8).
    #[must_use]
    pub fn new(orchestrator: Orchestrator, approval_gate: ApprovalGate, host: Arc<dyn HostEditor>, title_llm: Option<Arc<dyn LlmProvider>>) -> Self {
        Self { orchestrator, approval_gate, host, title_llm }
    }

    /// Run one command to completion.
    pub async fn dispatch(&self, command: Command) -> RuntimeResult<()> {
        match command {
            Command::NewAgent { prompt, allowed_paths, model } => self.new_agent(prompt, allowed_paths, model).await,
            Command::SelectModel { agent_id, model } => self.select_model(agent_id, model).await,
            Command::RegenerateTitle { agent_id } => {
                let Some(llm) = self.title_llm.clone() else { return Ok(()) };
                let location = AgentFileStore::location_for(&agent_id);
                generate_title(&self.orchestrator, &llm, &agent_id, &location).await
            }
            Command::OpenAgentFile { agent_id } => {
                let location = AgentFileStore::location_for(&agent_id);
                self.host.open_document(&location).await.map_err(wbench_orchestrator::OrchestratorError::from).map_err(RuntimeError::from)
            }
            Command::CopyReference { agent_id } => {
                let location = AgentFileStore::location_for(&agent_id);
                self.host
                    .clipboard_write(&format!("REF[{location}]"))
                    .await
                    .map_err(wbench_orchestrator::OrchestratorError::from)
                    .map_err(RuntimeError::from)
            }
            Command::ApproveRequest { request_id } => {
                self.approval_gate.resolve(&request_id, ApprovalDecision::Approved).await.map_err(RuntimeError::from)
            }
            Command::RejectRequest { request_id } => {
                self.approval_gate.resolve(&request_id, ApprovalDecision::Rejected).await.map_err(RuntimeError::from)
            }
            Command::ToggleAutoApprove => {
                self.approval_gate.set_auto_approve(!self.approval_gate.auto_approve_enabled());
                Ok(())
            }
        }
    }

    async fn new_agent(&self, prompt: String, allowed_paths: Vec<String>, model: Option<String>) -> RuntimeResult<()> {
        let id = AgentId::new();
        let location = self.orchestrator.file_store().create(id.clone(), None, Some(prompt.clone()), allowed_paths.clone(), model.clone()).await?;

        let mut record = AgentRecord::new(id.clone(), None, format!("agent-{}", id.short()), location.to_string(), allowed_paths, model, Some(prompt));
        record.window_open = true;
        self.orchestrator.registry().insert(record).await;
        self.host.open_document(&location).await.map_err(wbench_orchestrator::OrchestratorError::from)?;
        Ok(())
    }

    async fn select_model(&self, agent_id: AgentId, model: Option<String>) -> RuntimeResult<()> {
        let Some(_record) = self.orchestrator.registry().update(&agent_id, |record| record.model = model.clone()).await else {
            return Err(RuntimeError::UnknownAgent(agent_id.to_string()));
        };
        let location = AgentFileStore::location_for(&agent_id);
        self.orchestrator.file_store().update_metadata(&location, MetadataPatch { model: Some(model), ..Default::default() }).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;
    use wbench_core::{CoreError, DirEntry, DocumentLocation};
    use wbench_orchestrator::{AgentFileStore as FileStore, AgentRegistry, ForkSessionManager};

    use super::*;

    struct MapHost {
        files: Mutex<std::collections::HashMap<String, Vec<u8>>>,
        opened: Mutex<Vec<String>>,
    }

    impl MapHost {
        fn new() -> Self {
            Self { files: Mutex::new(std::collections::HashMap::new()), opened: Mutex::new(Vec::new()) }
        }
    }

    #[async_trait]
    impl HostEditor for MapHost {
        async fn open_document(&self, location: &DocumentLocation) -> Result<(), CoreError> {
            self.opened.lock().unwrap().push(location.to_string());
            Ok(())
        }
        async fn show_document(&self, _: &DocumentLocation, _: bool) -> Result<(), CoreError> {
            Ok(())
        }
        async fn write_file(&self, loc: &DocumentLocation, contents: &[u8]) -> Result<(), CoreError> {
            self.files.lock().unwrap().insert(loc.to_string(), contents.to_vec());
            Ok(())
        }
        async fn read_file(&self, loc: &DocumentLocation) -> Result<Vec<u8>, CoreError> {
            self.files.lock().unwrap().get(&loc.to_string()).cloned().ok_or_else(|| CoreError::NotFound(loc.to_string()))
        }
        async fn delete_file(&self, loc: &DocumentLocation) -> Result<(), CoreError> {
            self.files.lock().unwrap().remove(&loc.to_string());
            Ok(())
        }
        async fn rename_file(&self, _: &DocumentLocation, _: &DocumentLocation) -> Result<(), CoreError> {
            Ok(())
        }
        async fn create_directory(&self, _: &DocumentLocation) -> Result<(), CoreError> {
            Ok(())
        }
        async fn read_directory(&self, _: &DocumentLocation) -> Result<Vec<DirEntry>, CoreError> {
            Ok(Vec::new())
        }
        async fn watch_deletions(&self, _: &DocumentLocation) -> Result<(), CoreError> {
            Ok(())
        }
        async fn show_notification(&self, _: &str) {}
        async fn clipboard_write(&self, _: &str) -> Result<(), CoreError> {
            Ok(())
        }
        async fn register_command(&self, _: &str) -> Result<(), CoreError> {
            Ok(())
        }
        async fn create_file_system_watcher(&self, _: &std::path::Path) -> Result<(), CoreError> {
            Ok(())
        }
    }

    fn dispatcher() -> CommandDispatcher {
        let host = Arc::new(MapHost::new());
        let registry = AgentRegistry::new();
        let orchestrator = Orchestrator::new(registry.clone(), FileStore::new(host.clone()), ForkSessionManager::new(registry), host.clone());
        CommandDispatcher::new(orchestrator, ApprovalGate::new(), host, None)
    }

    #[tokio::test]
    async fn new_agent_creates_a_document_and_a_registry_entry() {
        let dispatcher = dispatcher();
        dispatcher
            .dispatch(Command::NewAgent { prompt: "do it".to_string(), allowed_paths: vec!["/".to_string()], model: None })
            .await
            .unwrap();
        assert_eq!(dispatcher.orchestrator.registry().all().await.len(), 1);
    }

    #[tokio::test]
    async fn select_model_on_an_unknown_agent_fails() {
        let dispatcher = dispatcher();
        let err = dispatcher.dispatch(Command::SelectModel { agent_id: AgentId::new(), model: Some("gpt-4o".to_string()) }).await.unwrap_err();
        assert!(matches!(err, RuntimeError::UnknownAgent(_)));
    }

    #[tokio::test]
    async fn toggle_auto_approve_flips_the_gate() {
        let dispatcher = dispatcher();
        assert!(!dispatcher.approval_gate.auto_approve_enabled());
        dispatcher.dispatch(Command::ToggleAutoApprove).await.unwrap();
        assert!(dispatcher.approval_gate.auto_approve_enabled());
    }

    struct FixedTitleProvider;

    #[async_trait]
    impl LlmProvider for FixedTitleProvider {
        fn name(&self) -> &str {
            "fixed-title"
        }
        fn model(&self) -> &str {
            "fixed-title-model"
        }
        async fn stream(&self, _: &[wbench_core::ConversationMessage], _: &[serde_json::Value], _: Option<&str>) -> wbench_llm::LlmResult<wbench_llm::StreamBox> {
            use futures::stream;
            Ok(Box::pin(stream::iter(vec![Ok(wbench_llm::StreamEvent::TextDelta("Sunset Plans".to_string())), Ok(wbench_llm::StreamEvent::Done)])))
        }
    }

    #[tokio::test]
    async fn regenerate_title_with_no_provider_is_a_harmless_no_op() {
        let dispatcher = dispatcher();
        dispatcher.dispatch(Command::RegenerateTitle { agent_id: AgentId::new() }).await.unwrap();
    }

    #[tokio::test]
    async fn regenerate_title_renames_the_agent() {
        let host = Arc::new(MapHost::new());
        let registry = AgentRegistry::new();
        let orchestrator = Orchestrator::new(registry.clone(), FileStore::new(host.clone()), ForkSessionManager::new(registry), host.clone());
        let title_llm: Arc<dyn LlmProvider> = Arc::new(FixedTitleProvider);
        let dispatcher = CommandDispatcher::new(orchestrator.clone(), ApprovalGate::new(), host, Some(title_llm));

        let agent_id = AgentId::new();
        let location = orchestrator.file_store().create(agent_id.clone(), None, Some("plan my evening".to_string()), vec!["/".to_string()], None).await.unwrap();
        orchestrator.registry().insert(AgentRecord::new(agent_id.clone(), None, "agent-x", location.to_string(), vec!["/".to_string()], None, Some("plan my evening".to_string()))).await;

        dispatcher.dispatch(Command::RegenerateTitle { agent_id: agent_id.clone() }).await.unwrap();

        let record = orchestrator.registry().get(&agent_id).await.unwrap();
        assert_eq!(record.name, "Sunset Plans");
    }

    #[tokio::test]
    async fn approve_request_resolves_a_pending_decision() {
        let dispatcher = dispatcher();
        let gate = dispatcher.approval_gate.clone();
        let join = tokio::spawn(async move { gate.request_approval(AgentId::new(), "write_file", "/a.txt", "details").await });
        tokio::task::yield_now().await;
        let request_id = dispatcher.approval_gate.list_pending().await[0].id.to_string();
        dispatcher.dispatch(Command::ApproveRequest { request_id }).await.unwrap();
        assert!(join.await.unwrap().is_approved());
    }
}
