//! Orchestrator-crate error type.

use thiserror::Error;

/// Errors from the registry, file store, fork-session manager, or
/// orchestrator itself.
#[derive(Debug, Error)]
pub enum OrchestratorError {
    /// The host reported an I/O failure.
    #[error(transparent)]
    Host(#[from] wbench_core::CoreError),

    /// A document's on-disk JSON could not be parsed.
    #[error("failed to decode agent document: {0}")]
    Decode(#[from] serde_json::Error),

    /// No agent is registered under the given id.
    #[error("no agent with id {0}")]
    UnknownAgent(String),

    /// A fork session already exists for this parent (spec §4.3 step 1
    /// invariant).
    #[error("agent {0} already has an active fork session")]
    ForkSessionAlreadyActive(String),
}

/// Convenience alias used throughout this crate.
pub type OrchestratorResult<T> = Result<T, OrchestratorError>;
