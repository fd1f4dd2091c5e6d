//! Controller glue (C11, spec §4.11): wires one cell execution end to end —
//! configuration, history assembly (C10), the runner (C7), and persistence
//! through the orchestrator's file store (C3).
//!
//! Grounded on `astrid-runtime::runtime::execution::run_turn_streaming`'s
//! per-call sequence (build a `ToolContext`, inject the sub-agent spawner,
//! run the loop, save the session), adapted to this workbench's
//! document-per-agent persistence model and its own cancellation-shaped
//! vs. other-error distinction (spec §7, §8 scenario 6).

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::warn;

use wbench_approval::ApprovalGate;
use wbench_core::{AgentId, AllowedPaths, ConversationMessage, DocumentLocation, HostEditor, Role};
use wbench_llm::LlmProvider;
use wbench_orchestrator::{AgentFileStore, ContextAssembler, Orchestrator};
use wbench_tools::ToolRegistry;

use crate::config::RuntimeConfig;
use crate::error::{RuntimeError, RuntimeResult};
use crate::runner::{AgentRunner, RunOutcome, RunnerConfig};
use crate::ui::UiRenderer;

/// What one cell execution request carries (spec §6
/// `CellExecuteRequested`).
#[derive(Debug, Clone)]
pub struct CellExecution {
    /// The agent whose document this cell belongs to.
    pub agent_id: AgentId,
    /// That agent's document location.
    pub location: DocumentLocation,
    /// Which cell (0-based, by its ordinal `User` turn) is executing.
    pub cell_index: usize,
    /// The cell's current text, spliced in as the newest user turn after
    /// `REF[]` expansion.
    pub cell_text: String,
}

/// What a host receives once a cell execution ends (spec §8 scenario 6).
#[derive(Debug, Clone)]
pub struct CellResult {
    pub success: bool,
    pub executed: bool,
    pub transcript: UiRenderer,
}

/// Coordinates one cell execution: configuration, context assembly, the
/// runner, and persistence.
#[derive(Clone)]
pub struct Controller {
    orchestrator: Orchestrator,
    llm: Arc<dyn LlmProvider>,
    title_llm: Option<Arc<dyn LlmProvider>>,
    tool_registry: Arc<ToolRegistry>,
    approval_gate: ApprovalGate,
    host: Arc<dyn HostEditor>,
    context_assembler: ContextAssembler,
    config: RuntimeConfig,
}

impl Controller {
    /// Build a controller over the given collaborators. `title_llm` is
    /// `None` when `config.title_generator_model` is unset (spec §4.8
    /// "never block the main return" — omitting it entirely is simpler
    /// than a conditional call site).
    #[must_use]
    pub fn new(
        orchestrator: Orchestrator,
        llm: Arc<dyn LlmProvider>,
        title_llm: Option<Arc<dyn LlmProvider>>,
        tool_registry: Arc<ToolRegistry>,
        approval_gate: ApprovalGate,
        host: Arc<dyn HostEditor>,
        config: RuntimeConfig,
    ) -> Self {
        let context_assembler = ContextAssembler::new(Arc::clone(&host), Arc::clone(&tool_registry), approval_gate.clone());
        Self { orchestrator, llm, title_llm, tool_registry, approval_gate, host, context_assembler, config }
    }

    /// Run one cell to completion, cancellation, or failure (spec §4.11).
    pub async fn run_cell(&self, execution: CellExecution, abort: CancellationToken) -> RuntimeResult<CellResult> {
        if self.config.api_key.is_none() {
            return Err(RuntimeError::MissingApiKey);
        }

        let record = self
            .orchestrator
            .registry()
            .get(&execution.agent_id)
            .await
            .ok_or_else(|| RuntimeError::UnknownAgent(execution.agent_id.to_string()))?;
        let is_child = !record.is_root();
        let allowed_paths = AllowedPaths::compile(&record.allowed_paths);

        let document = self.orchestrator.file_store().load(&execution.location).await?;
        let assembled = self.context_assembler.assemble(&execution.cell_text, &allowed_paths).await;

        let mut history = document.context.clone();
        history.push(ConversationMessage::user(assembled.content));

        self.orchestrator.agent_started(&execution.agent_id).await;

        let ctx = wbench_tools::ToolContext::new(execution.agent_id.clone(), is_child, allowed_paths, Arc::clone(&self.host), self.approval_gate.clone(), abort);
        ctx.set_fork_spawner(Arc::new(self.orchestrator.clone())).await;
        ctx.set_task_finish_reporter(Arc::new(self.orchestrator.clone())).await;

        let runner = AgentRunner::new(Arc::clone(&self.llm), Arc::clone(&self.tool_registry), RunnerConfig { max_loops: self.config.max_loops }, is_child);

        let mut renderer = UiRenderer::new();
        let outcome: RunOutcome = runner.run(history, None, &ctx, &mut renderer).await;

        self.orchestrator.agent_stopped(&execution.agent_id).await;

        if outcome.executed {
            self.orchestrator.file_store().update_cell_interaction(&execution.location, execution.cell_index, outcome.new_messages.clone()).await?;
        }

        if execution.cell_index == 0 && !is_child && outcome.executed {
            self.maybe_generate_title(execution.agent_id.clone(), execution.location.clone());
        }

        Ok(CellResult { success: outcome.success, executed: outcome.executed, transcript: renderer })
    }

    /// Fire-and-forget title generation for the first cell of a root agent
    /// (spec §4.8). Never awaited by the caller; failures are logged, not
    /// propagated.
    fn maybe_generate_title(&self, agent_id: AgentId, location: DocumentLocation) {
        let Some(llm) = self.title_llm.clone() else { return };
        let orchestrator = self.orchestrator.clone();
        tokio::spawn(async move {
            if let Err(err) = generate_title(&orchestrator, &llm, &agent_id, &location).await {
                warn!(%agent_id, %err, "title generation failed");
            }
        });
    }
}

/// Synchronously request a short title for `agent_id`'s document and, on
/// success, persist it via `orchestrator.name_changed`. Shared by the
/// post-cell fire-and-forget trigger (spec §4.8) and the explicit
/// `regenerate-title` command (spec §6), which awaits the same call.
pub(crate) async fn generate_title(orchestrator: &Orchestrator, llm: &Arc<dyn LlmProvider>, agent_id: &AgentId, location: &DocumentLocation) -> RuntimeResult<()> {
    let document = orchestrator.file_store().load(location).await?;
    let Some(prompt_text) = document.context.iter().find(|message| message.role == Role::User).and_then(ConversationMessage::text) else {
        return Ok(());
    };
    let prompt = format!("Suggest a short (3-6 word) title for this conversation. Respond with only the title.\n\n{prompt_text}");
    let response = llm.complete(&[ConversationMessage::user(prompt)], &[], None).await?;
    let Some(title) = response.content else { return Ok(()) };
    let title = title.trim().trim_matches('"').to_string();
    if !title.is_empty() {
        orchestrator.name_changed(agent_id, title).await?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;
    use futures::stream;
    use serde_json::Value;
    use wbench_core::{AgentRecord, CoreError, DirEntry};
    use wbench_llm::{LlmResult, StreamBox, StreamEvent};
    use wbench_orchestrator::{AgentFileStore as FileStore, AgentRegistry, ForkSessionManager};

    use super::*;

    struct MapHost {
        files: Mutex<std::collections::HashMap<String, Vec<u8>>>,
    }

    impl MapHost {
        fn new() -> Self {
            Self { files: Mutex::new(std::collections::HashMap::new()) }
        }
    }

    #[async_trait]
    impl HostEditor for MapHost {
        async fn open_document(&self, _: &DocumentLocation) -> Result<(), CoreError> {
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

    struct ScriptedProvider {
        events: Mutex<Vec<StreamEvent>>,
    }

    #[async_trait]
    impl LlmProvider for ScriptedProvider {
        fn name(&self) -> &str {
            "scripted"
        }
        fn model(&self) -> &str {
            "scripted-model"
        }
        async fn stream(&self, _: &[ConversationMessage], _: &[Value], _: Option<&str>) -> LlmResult<StreamBox> {
            let events: Vec<LlmResult<StreamEvent>> = self.events.lock().unwrap().drain(..).map(Ok).collect();
            Ok(Box::pin(stream::iter(events)))
        }
    }

    fn controller(config: RuntimeConfig) -> (Controller, Orchestrator) {
        let host = Arc::new(MapHost::new());
        let registry = AgentRegistry::new();
        let orchestrator = Orchestrator::new(registry.clone(), FileStore::new(host.clone()), ForkSessionManager::new(registry), host.clone());
        let provider: Arc<dyn LlmProvider> = Arc::new(ScriptedProvider { events: Mutex::new(vec![StreamEvent::TextDelta("done".to_string()), StreamEvent::Done]) });
        let controller = Controller::new(
            orchestrator.clone(),
            Arc::clone(&provider),
            None,
            Arc::new(ToolRegistry::with_defaults()),
            ApprovalGate::new(),
            host,
            config,
        );
        (controller, orchestrator)
    }

    #[tokio::test]
    async fn missing_api_key_fails_before_touching_the_registry() {
        let (controller, _orchestrator) = controller(RuntimeConfig { api_key: None, ..RuntimeConfig::default() });
        let execution = CellExecution { agent_id: AgentId::new(), location: DocumentLocation::bare("agents/x.json"), cell_index: 0, cell_text: "hi".to_string() };
        let err = controller.run_cell(execution, CancellationToken::new()).await.unwrap_err();
        assert!(matches!(err, RuntimeError::MissingApiKey));
    }

    #[tokio::test]
    async fn running_a_cell_persists_the_new_messages() {
        let (controller, orchestrator) = controller(RuntimeConfig { api_key: Some("key".to_string()), ..RuntimeConfig::default() });
        let agent_id = AgentId::new();
        let location = orchestrator.file_store().create(agent_id.clone(), None, None, vec!["/".to_string()], None).await.unwrap();
        orchestrator.registry().insert(AgentRecord::new(agent_id.clone(), None, "root", location.to_string(), vec!["/".to_string()], None, None)).await;

        let execution = CellExecution { agent_id: agent_id.clone(), location: location.clone(), cell_index: 0, cell_text: "hello".to_string() };
        let result = controller.run_cell(execution, CancellationToken::new()).await.unwrap();
        assert!(result.success);
        assert!(result.executed);

        let document = orchestrator.file_store().load(&location).await.unwrap();
        assert_eq!(document.context.last().and_then(|message| message.text()), Some("done"));
    }
}
