//! `ToolContext`: everything an `execute` call receives (spec §4.6).
//!
//! Grounded on `astrid-tools::ToolContext`, with the injectable-spawner
//! pattern (`subagent_spawner` there, [`ForkSpawner`] here) carried over
//! verbatim: the trait is defined in this lower crate and implemented by
//! `wbench-orchestrator`, which injects itself at startup, avoiding a
//! `wbench-tools -> wbench-orchestrator` dependency cycle.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;

use wbench_approval::ApprovalGate;
use wbench_core::{AgentId, HostEditor};

use crate::error::ToolError;

/// One child agent to spawn, as requested by a `fork` call (spec §4.3 step 2).
#[derive(Debug, Clone)]
pub struct ChildSpec {
    /// The child's initial user-message prompt.
    pub prompt: String,
    /// Path prefixes the child is authorized to touch.
    pub allowed_paths: Vec<String>,
    /// Optional override LLM identifier.
    pub model: Option<String>,
}

/// Injected into `ToolContext` so the `fork` tool can spawn children without
/// `wbench-tools` depending on `wbench-orchestrator`.
#[async_trait]
pub trait ForkSpawner: Send + Sync {
    /// Spawn `children` under `parent_id` and return a future that resolves
    /// to the joined report string once every child reports or is deleted
    /// (spec §4.3, §4.4). `context_summary` is advisory (spec §9 open
    /// question: accepted, currently unused by anything downstream).
    async fn fork(
        &self,
        parent_id: AgentId,
        context_summary: Option<String>,
        children: Vec<ChildSpec>,
    ) -> Result<String, ToolError>;

    /// Reject `parent_id`'s pending fork session because its owning cell
    /// execution was cancelled (spec §4.3 "Cancellation", §8 "Fork
    /// cancellation"). A no-op if no session is pending.
    async fn cancel_fork(&self, parent_id: AgentId);
}

/// Injected into `ToolContext` so the child-only `task_finish` tool can
/// notify the orchestrator without a dependency cycle.
#[async_trait]
pub trait TaskFinishReporter: Send + Sync {
    /// Record that `agent_id` has finished, carrying its summary text, and
    /// notify any fork session waiting on it (spec §4.3 `taskFinishReported`).
    async fn report_task_finish(&self, agent_id: AgentId, summary: String);
}

/// Everything one tool call needs to execute (spec §4.6 `ToolContext`).
pub struct ToolContext {
    /// The calling agent's id.
    pub agent_id: AgentId,
    /// `true` if this agent has a parent (child-only tools require this).
    pub is_child: bool,
    /// Compiled access-control list for this agent.
    pub allowed_paths: wbench_core::AllowedPaths,
    /// The host file-system/editor capability object.
    pub host: Arc<dyn HostEditor>,
    /// The shared approval gate.
    pub approval_gate: ApprovalGate,
    /// This cell execution's cancellation token (spec §5 "abortSignal").
    pub abort: CancellationToken,
    fork_spawner: RwLock<Option<Arc<dyn ForkSpawner>>>,
    task_finish_reporter: RwLock<Option<Arc<dyn TaskFinishReporter>>>,
    output_sink: Option<Arc<dyn Fn(&str) + Send + Sync>>,
    terminated: Arc<AtomicBool>,
}

impl ToolContext {
    /// Build a context for one tool call.
    #[must_use]
    pub fn new(
        agent_id: AgentId,
        is_child: bool,
        allowed_paths: wbench_core::AllowedPaths,
        host: Arc<dyn HostEditor>,
        approval_gate: ApprovalGate,
        abort: CancellationToken,
    ) -> Self {
        Self {
            agent_id,
            is_child,
            allowed_paths,
            host,
            approval_gate,
            abort,
            fork_spawner: RwLock::new(None),
            task_finish_reporter: RwLock::new(None),
            output_sink: None,
            terminated: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Attach a live-output callback, used by tools that stream partial
    /// results to the UI renderer (C8) as they run.
    #[must_use]
    pub fn with_output_sink(mut self, sink: Arc<dyn Fn(&str) + Send + Sync>) -> Self {
        self.output_sink = Some(sink);
        self
    }

    /// Inject the fork spawner (called once at runtime startup).
    pub async fn set_fork_spawner(&self, spawner: Arc<dyn ForkSpawner>) {
        *self.fork_spawner.write().await = Some(spawner);
    }

    /// Borrow the injected fork spawner, if any.
    pub async fn fork_spawner(&self) -> Option<Arc<dyn ForkSpawner>> {
        self.fork_spawner.read().await.clone()
    }

    /// Inject the task-finish reporter (called once at runtime startup).
    pub async fn set_task_finish_reporter(&self, reporter: Arc<dyn TaskFinishReporter>) {
        *self.task_finish_reporter.write().await = Some(reporter);
    }

    /// Borrow the injected task-finish reporter, if any.
    pub async fn task_finish_reporter(&self) -> Option<Arc<dyn TaskFinishReporter>> {
        self.task_finish_reporter.read().await.clone()
    }

    /// Append live output for the currently-executing tool, if a sink is attached.
    pub fn append_output(&self, text: &str) {
        if let Some(sink) = &self.output_sink {
            sink(text);
        }
    }

    /// Signal that the runner loop should terminate after this tool-call
    /// step finishes (used by the child-only completion tool; spec §4.6
    /// `signalTermination()`).
    pub fn signal_termination(&self) {
        self.terminated.store(true, Ordering::SeqCst);
    }

    /// `true` if [`Self::signal_termination`] has been called.
    #[must_use]
    pub fn is_terminated(&self) -> bool {
        self.terminated.load(Ordering::SeqCst)
    }
}
