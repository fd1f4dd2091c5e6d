//! Approval gate errors.

use thiserror::Error;

/// Errors raised by the approval gate.
#[derive(Debug, Error)]
pub enum ApprovalError {
    /// `resolve` was called for a request id that is not (or no longer)
    /// pending.
    #[error("no pending approval request with id {0}")]
    UnknownRequest(String),
}
