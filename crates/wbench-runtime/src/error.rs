//! Runtime-crate error type (spec §7): wraps every collaborator's error so
//! the controller glue (C11) has one type to route to a cell's error
//! channel, distinct from the cancellation-shaped outcomes a [`RunOutcome`]
//! already encodes.
//!
//! [`RunOutcome`]: crate::runner::RunOutcome

use thiserror::Error;

/// Errors the controller surfaces on a cell's error channel (spec §4.11:
/// "fail the cell with a clear error"). Cancellation and tool-level
/// failures never reach here — they flow back through the transcript or a
/// [`RunOutcome`](crate::runner::RunOutcome) instead.
#[derive(Debug, Error)]
pub enum RuntimeError {
    /// No API key is configured for this agent (spec §4.11 "fail fast...
    /// before instantiating a runner").
    #[error("no API key is configured for this agent")]
    MissingApiKey,
    /// The orchestrator (registry, file store, fork sessions) failed.
    #[error(transparent)]
    Orchestrator(#[from] wbench_orchestrator::OrchestratorError),
    /// The approval gate rejected an operation (e.g. resolving an unknown
    /// request id from a stale UI surface).
    #[error(transparent)]
    Approval(#[from] wbench_approval::ApprovalError),
    /// No agent is registered under the id a command referenced.
    #[error("no agent with id {0}")]
    UnknownAgent(String),
    /// The title-generator (or primary) LLM call failed.
    #[error(transparent)]
    Llm(#[from] wbench_llm::LlmError),
}

/// Convenience alias used throughout this crate.
pub type RuntimeResult<T> = Result<T, RuntimeError>;
