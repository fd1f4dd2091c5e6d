//! The agent runner (C7, spec §4.8): the bounded tool-calling loop over one
//! streamed LLM turn at a time.
//!
//! Grounded on `astrid-runtime::runtime::execution::run_loop`'s
//! stream-then-dispatch-tool-calls shape (register a turn, drain its
//! stream, append an assistant message, run any tool calls in order,
//! continue or return), rebuilt around this workbench's already-coalesced
//! turn contract (`wbench_llm::coalesce::run_turn`) in place of the
//! teacher's raw `StreamEvent` match, and around the spec's own bounded
//! loop (§4.8): an explicit `maxLoops` cap, a cancellation-shaped branch
//! distinct from any other stream error, an empty-turn diagnostic badge,
//! and `taskFinished` handling deferred until a turn's tool calls have all
//! run.

use std::sync::Arc;

use serde_json::Value;
use tracing::{error, warn};

use wbench_core::{ConversationMessage, MessageContent, Role, ToolCall as CoreToolCall};
use wbench_llm::coalesce::run_turn;
use wbench_llm::{LlmError, LlmProvider};
use wbench_tools::{ToolContext, ToolRegistry};

use crate::config::DEFAULT_MAX_LOOPS;
use crate::ui::UiRenderer;

/// Per-runner settings, resolved from [`crate::config::RuntimeConfig`] and
/// an agent's own override before the runner is built.
#[derive(Debug, Clone)]
pub struct RunnerConfig {
    /// Upper bound on LLM rounds (spec §4.8, §5).
    pub max_loops: u32,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self { max_loops: DEFAULT_MAX_LOOPS }
    }
}

/// The outcome of one cell execution (spec §4.11, §8 scenario 6:
/// `success`/`executed` are reported separately so a host can distinguish
/// "cancelled before anything ran" from "ran, then failed").
#[derive(Debug, Clone, Default)]
pub struct RunOutcome {
    /// Newly produced messages only — the runner never returns the
    /// messages it was handed as input (spec §4.8 "returns only the
    /// newly-produced messages").
    pub new_messages: Vec<ConversationMessage>,
    /// `false` if the execution was cancelled or hit an unrecoverable
    /// stream error.
    pub success: bool,
    /// `false` only if cancellation landed before the first stream request
    /// was even issued.
    pub executed: bool,
    /// `true` if a tool call in this execution signalled termination via
    /// [`ToolContext::signal_termination`].
    pub task_finished: bool,
    /// Count of tool-call slots the LLM layer dropped because their
    /// arguments never became parseable (spec §9 open question: surfaced,
    /// not treated as a hard failure).
    pub dropped_tool_calls: u64,
}

/// Runs the bounded tool-calling loop for one cell execution (C7).
pub struct AgentRunner {
    llm: Arc<dyn LlmProvider>,
    tools: Arc<ToolRegistry>,
    config: RunnerConfig,
    is_child_agent: bool,
}

impl AgentRunner {
    /// Build a runner over the given provider and tool registry.
    /// `is_child_agent` selects the caller-appropriate tool schema set and
    /// the common/root-only/child-only dispatcher partition (spec §4.6).
    #[must_use]
    pub fn new(llm: Arc<dyn LlmProvider>, tools: Arc<ToolRegistry>, config: RunnerConfig, is_child_agent: bool) -> Self {
        Self { llm, tools, config, is_child_agent }
    }

    /// Run the loop to completion, cancellation, or the `max_loops` bound.
    ///
    /// `history` is the full conversation so far, including the newest
    /// user turn (spec §4.10's assembled context is spliced in by the
    /// caller before this is invoked). `system` is the assembled system
    /// prompt, if any. `ctx` carries this execution's abort signal and is
    /// shared with every tool dispatch.
    pub async fn run(
        &self,
        mut history: Vec<ConversationMessage>,
        system: Option<&str>,
        ctx: &ToolContext,
        renderer: &mut UiRenderer,
    ) -> RunOutcome {
        let mut new_messages = Vec::new();
        let mut dropped_tool_calls = 0u64;
        let schemas = self.tools.schemas_for(self.is_child_agent);

        for _ in 0..self.config.max_loops.max(1) {
            if ctx.abort.is_cancelled() {
                return RunOutcome {
                    new_messages,
                    success: false,
                    executed: false,
                    task_finished: ctx.is_terminated(),
                    dropped_tool_calls,
                };
            }

            let stream = tokio::select! {
                biased;
                () = ctx.abort.cancelled() => {
                    return RunOutcome { new_messages, success: false, executed: false, task_finished: ctx.is_terminated(), dropped_tool_calls };
                }
                result = self.llm.stream(&history, &schemas, system) => result,
            };

            let stream = match stream {
                Ok(stream) => stream,
                Err(LlmError::Cancelled) => {
                    return RunOutcome { new_messages, success: false, executed: false, task_finished: ctx.is_terminated(), dropped_tool_calls };
                }
                Err(err) => {
                    error!(%err, "LLM stream request failed");
                    renderer.error_badge(err.to_string());
                    return RunOutcome { new_messages, success: false, executed: true, task_finished: ctx.is_terminated(), dropped_tool_calls };
                }
            };

            let turn = tokio::select! {
                biased;
                () = ctx.abort.cancelled() => {
                    return RunOutcome { new_messages, success: false, executed: true, task_finished: ctx.is_terminated(), dropped_tool_calls };
                }
                result = run_turn(stream, |content, reasoning, calls| renderer.progress(content, reasoning, calls)) => result,
            };

            let turn = match turn {
                Ok(turn) => turn,
                Err(LlmError::Cancelled) => {
                    return RunOutcome { new_messages, success: false, executed: true, task_finished: ctx.is_terminated(), dropped_tool_calls };
                }
                Err(err) => {
                    error!(%err, "LLM stream failed mid-turn");
                    renderer.error_badge(err.to_string());
                    return RunOutcome { new_messages, success: false, executed: true, task_finished: ctx.is_terminated(), dropped_tool_calls };
                }
            };
            dropped_tool_calls += turn.dropped_tool_calls;

            if turn.content.is_none() && turn.reasoning.is_none() && turn.tool_calls.is_empty() {
                renderer.diagnostic_badge("the model returned an empty turn");
                let empty = ConversationMessage { role: Role::Assistant, content: None, reasoning: None, tool_calls: None, tool_call_id: None, name: None };
                history.push(empty.clone());
                new_messages.push(empty);
                break;
            }

            if turn.tool_calls.is_empty() {
                let message = ConversationMessage {
                    role: Role::Assistant,
                    content: turn.content.map(MessageContent::Text),
                    reasoning: turn.reasoning,
                    tool_calls: None,
                    tool_call_id: None,
                    name: None,
                };
                history.push(message.clone());
                new_messages.push(message);
                return RunOutcome { new_messages, success: true, executed: true, task_finished: ctx.is_terminated(), dropped_tool_calls };
            }

            let core_calls: Vec<CoreToolCall> =
                turn.tool_calls.iter().map(|call| CoreToolCall { id: call.id.clone(), name: call.name.clone(), arguments: call.arguments.clone() }).collect();
            let assistant_message = ConversationMessage::assistant_tool_calls(turn.content, turn.reasoning, core_calls.clone());
            history.push(assistant_message.clone());
            new_messages.push(assistant_message);
            renderer.commit_round();

            for call in &core_calls {
                if ctx.abort.is_cancelled() {
                    return RunOutcome { new_messages, success: false, executed: true, task_finished: ctx.is_terminated(), dropped_tool_calls };
                }

                renderer.tool_started(&call.id, &call.name, &call.arguments);
                let text = self.dispatch_one(call, ctx).await;
                renderer.tool_completed(&call.id, &text);

                let tool_message = ConversationMessage::tool_result(call.id.clone(), call.name.clone(), text);
                history.push(tool_message.clone());
                new_messages.push(tool_message);
            }

            // `task_finish` is child-only and always the last call a child
            // makes, but a turn may carry other tool calls alongside or
            // after it; finalization only happens once every call in this
            // turn has run (spec §4.8 "deferred until after all of a
            // turn's tool calls complete").
            if ctx.is_terminated() {
                return RunOutcome { new_messages, success: true, executed: true, task_finished: true, dropped_tool_calls };
            }
        }

        RunOutcome { new_messages, success: true, executed: true, task_finished: ctx.is_terminated(), dropped_tool_calls }
    }

    async fn dispatch_one(&self, call: &CoreToolCall, ctx: &ToolContext) -> String {
        let args: Value = call.arguments.clone();
        match self.tools.dispatch(&call.name, args, ctx).await {
            Ok(text) => text,
            Err(err) => {
                warn!(tool = %call.name, %err, "tool dispatch failed");
                format!("Error: {err}")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use async_trait::async_trait;
    use futures::stream;
    use tokio_util::sync::CancellationToken;

    use wbench_approval::ApprovalGate;
    use wbench_core::{AgentId, AllowedPaths, CoreError, DirEntry, DocumentLocation, HostEditor};
    use wbench_llm::{LlmResult, StreamBox, StreamEvent, StopReason, Usage};

    use super::*;

    struct NullHost;

    #[async_trait]
    impl HostEditor for NullHost {
        async fn open_document(&self, _: &DocumentLocation) -> Result<(), CoreError> {
            Ok(())
        }
        async fn show_document(&self, _: &DocumentLocation, _: bool) -> Result<(), CoreError> {
            Ok(())
        }
        async fn write_file(&self, _: &DocumentLocation, _: &[u8]) -> Result<(), CoreError> {
            Ok(())
        }
        async fn read_file(&self, _: &DocumentLocation) -> Result<Vec<u8>, CoreError> {
            Ok(Vec::new())
        }
        async fn delete_file(&self, _: &DocumentLocation) -> Result<(), CoreError> {
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
        events: std::sync::Mutex<Vec<Vec<StreamEvent>>>,
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
            let mut events = self.events.lock().unwrap();
            let batch = if events.is_empty() { Vec::new() } else { events.remove(0) };
            let items: Vec<LlmResult<StreamEvent>> = batch.into_iter().map(Ok).collect();
            Ok(Box::pin(stream::iter(items)))
        }
    }

    fn ctx(is_child: bool) -> ToolContext {
        ToolContext::new(AgentId::new(), is_child, AllowedPaths::compile(&["/".to_string()]), Arc::new(NullHost), ApprovalGate::new(), CancellationToken::new())
    }

    #[tokio::test]
    async fn a_text_only_turn_ends_the_loop_successfully() {
        let provider = ScriptedProvider {
            events: std::sync::Mutex::new(vec![vec![
                StreamEvent::TextDelta("hi there".to_string()),
                StreamEvent::FinishReason(StopReason::EndTurn),
                StreamEvent::Usage(Usage { input_tokens: 1, output_tokens: 1 }),
                StreamEvent::Done,
            ]]),
        };
        let runner = AgentRunner::new(Arc::new(provider), Arc::new(ToolRegistry::with_defaults()), RunnerConfig::default(), false);
        let ctx = ctx(false);
        let mut renderer = UiRenderer::new();
        let outcome = runner.run(vec![ConversationMessage::user("hello")], None, &ctx, &mut renderer).await;

        assert!(outcome.success);
        assert!(outcome.executed);
        assert_eq!(outcome.new_messages.len(), 1);
        assert_eq!(outcome.new_messages[0].text(), Some("hi there"));
    }

    #[tokio::test]
    async fn an_empty_turn_records_a_diagnostic_and_a_placeholder_message() {
        let provider = ScriptedProvider { events: std::sync::Mutex::new(vec![vec![StreamEvent::Done]]) };
        let runner = AgentRunner::new(Arc::new(provider), Arc::new(ToolRegistry::with_defaults()), RunnerConfig::default(), false);
        let ctx = ctx(false);
        let mut renderer = UiRenderer::new();
        let outcome = runner.run(vec![ConversationMessage::user("hello")], None, &ctx, &mut renderer).await;

        assert!(outcome.success);
        assert_eq!(outcome.new_messages.len(), 1);
        assert!(outcome.new_messages[0].text().is_none());
        assert_eq!(renderer.diagnostic_badges.len(), 1);
    }

    #[tokio::test]
    async fn a_tool_call_turn_executes_the_call_and_continues() {
        let call_args = serde_json::json!({"uri": "/notes.txt"});
        let provider = ScriptedProvider {
            events: std::sync::Mutex::new(vec![
                vec![
                    StreamEvent::ToolCallStart { index: 0, id: Some("call_1".to_string()), name: Some("read_file".to_string()) },
                    StreamEvent::ToolCallDelta { index: 0, args_delta: call_args.to_string() },
                    StreamEvent::FinishReason(StopReason::ToolUse),
                    StreamEvent::Done,
                ],
                vec![StreamEvent::TextDelta("done".to_string()), StreamEvent::Done],
            ]),
        };
        let runner = AgentRunner::new(Arc::new(provider), Arc::new(ToolRegistry::with_defaults()), RunnerConfig::default(), false);
        let ctx = ctx(false);
        let mut renderer = UiRenderer::new();
        let outcome = runner.run(vec![ConversationMessage::user("read my notes")], None, &ctx, &mut renderer).await;

        assert!(outcome.success);
        // assistant-with-tool-call, tool-result, final assistant text.
        assert_eq!(outcome.new_messages.len(), 3);
        assert_eq!(outcome.new_messages[1].role, Role::Tool);
    }

    #[tokio::test]
    async fn a_pre_cancelled_token_yields_unexecuted_failure() {
        let provider = ScriptedProvider { events: std::sync::Mutex::new(Vec::new()) };
        let runner = AgentRunner::new(Arc::new(provider), Arc::new(ToolRegistry::with_defaults()), RunnerConfig::default(), false);
        let ctx = ctx(false);
        ctx.abort.cancel();
        let mut renderer = UiRenderer::new();
        let outcome = runner.run(vec![ConversationMessage::user("hello")], None, &ctx, &mut renderer).await;

        assert!(!outcome.success);
        assert!(!outcome.executed);
        assert!(outcome.new_messages.is_empty());
    }

    #[tokio::test]
    async fn the_loop_stops_at_max_loops_even_if_the_model_keeps_calling_tools() {
        let call_args = serde_json::json!({"uri": "/notes.txt"});
        let batch = vec![
            StreamEvent::ToolCallStart { index: 0, id: Some("call_1".to_string()), name: Some("read_file".to_string()) },
            StreamEvent::ToolCallDelta { index: 0, args_delta: call_args.to_string() },
            StreamEvent::Done,
        ];
        let provider = ScriptedProvider { events: std::sync::Mutex::new(vec![batch.clone(), batch.clone(), batch]) };
        let runner = AgentRunner::new(Arc::new(provider), Arc::new(ToolRegistry::with_defaults()), RunnerConfig { max_loops: 2 }, false);
        let ctx = ctx(false);
        let mut renderer = UiRenderer::new();
        let outcome = runner.run(vec![ConversationMessage::user("loop forever")], None, &ctx, &mut renderer).await;

        assert!(outcome.success);
        // two rounds of (assistant-with-call, tool-result) = 4 messages.
        assert_eq!(outcome.new_messages.len(), 4);
    }
}
