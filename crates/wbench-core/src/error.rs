//! Shared error type for the core data model and host contract.

use thiserror::Error;

/// Errors surfaced by [`crate::host::HostEditor`] implementations and the
/// core data model helpers.
#[derive(Debug, Error)]
pub enum CoreError {
    /// The host could not find the requested document or path.
    #[error("not found: {0}")]
    NotFound(String),

    /// A host I/O operation failed.
    #[error("host I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A document's on-disk representation was not valid JSON, or was
    /// missing a required field.
    #[error("malformed document: {0}")]
    MalformedDocument(String),

    /// The host rejected the operation (e.g. permission denied at the OS
    /// level, independent of the `allowedPaths` access-control layer).
    #[error("host rejected operation: {0}")]
    HostRejected(String),
}
