//! Tool execution errors. Grounded on `astrid-tools::ToolError`.

use thiserror::Error;

/// Errors a [`crate::BuiltinTool`] may surface. These are distinct from the
/// sentinel strings a tool *returns* on a normal failure (rejection, access
/// denial) — those flow back to the model as ordinary text (spec §7);
/// `ToolError` is reserved for failures the dispatcher itself cannot hand
/// back as a tool-role message (unknown tool, host I/O failure, etc).
#[derive(Debug, Error)]
pub enum ToolError {
    /// The host file system reported an error.
    #[error("I/O error: {0}")]
    Io(#[from] wbench_core::CoreError),

    /// The model supplied arguments that don't match the tool's schema.
    #[error("invalid arguments: {0}")]
    InvalidArguments(String),

    /// The tool ran but failed for a reason not covered above.
    #[error("execution failed: {0}")]
    ExecutionFailed(String),

    /// No tool is registered under the requested name, in any set.
    #[error("Unknown tool '{0}'")]
    UnknownTool(String),

    /// The tool exists but is not in the caller's set (a sub-agent calling
    /// a root-only tool).
    #[error("Tool '{0}' is not available for sub-agents")]
    NotAvailableForSubAgents(String),

    /// The tool exists but is not in the caller's set (a root agent calling
    /// a child-only tool).
    #[error("Tool '{0}' is only available for sub-agents")]
    OnlyAvailableForSubAgents(String),

    /// The tool call was cancelled via its abort signal.
    #[error("cancelled")]
    Cancelled,
}

/// Convenience alias used throughout this crate.
pub type ToolResult = Result<String, ToolError>;
