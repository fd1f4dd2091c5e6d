//! The host-editor contract the core consumes (spec §6).
//!
//! Modeled on `astrid-core::frontend::Frontend`: a single async trait object
//! handed to the runtime at construction time, so the orchestrator and
//! runner never know whether they're talking to a real editor shell or a
//! test double.

use async_trait::async_trait;
use serde_json::Value;
use std::path::{Path, PathBuf};

use crate::error::CoreError;

/// A location the host understands: a document path plus a logical root
/// name for multi-root workspaces (spec §6 "Multi-root workspace paths").
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentLocation {
    /// The named workspace root this path resolves against, if any.
    pub root: Option<String>,
    /// The path relative to that root (or absolute, if `root` is `None`).
    pub path: PathBuf,
}

impl DocumentLocation {
    /// Build a location with no named root.
    #[must_use]
    pub fn bare(path: impl Into<PathBuf>) -> Self {
        Self { root: None, path: path.into() }
    }
}

impl std::fmt::Display for DocumentLocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.root {
            Some(root) => write!(f, "{root}/{}", self.path.display()),
            None => write!(f, "{}", self.path.display()),
        }
    }
}

/// A directory entry as reported by [`HostEditor::read_directory`].
#[derive(Debug, Clone)]
pub struct DirEntry {
    /// Entry name (not a full path).
    pub name: String,
    /// `true` if this entry is itself a directory.
    pub is_dir: bool,
}

/// A lifecycle event the host delivers to the orchestrator (spec §6 event set).
#[derive(Debug, Clone)]
pub enum HostEvent {
    /// A document was opened, with its parsed metadata header.
    DocumentOpened { location: DocumentLocation, metadata: Value },
    /// A document was closed.
    DocumentClosed { location: DocumentLocation },
    /// A document was saved to disk.
    DocumentSaved { location: DocumentLocation },
    /// The set of currently-visible documents changed.
    VisibleDocumentsChanged { locations: Vec<DocumentLocation> },
    /// A file was deleted from the workspace.
    FileDeleted { location: DocumentLocation },
    /// The host asked to execute one cell of a document.
    CellExecuteRequested { location: DocumentLocation, cell_index: usize, text: String },
}

/// The capability surface a host editor shell must provide (spec §6).
///
/// Every method is fallible and async: the host may be a remote editor
/// process, a virtual file system, or (in tests) an in-memory double.
#[async_trait]
pub trait HostEditor: Send + Sync {
    /// Open a document in a visible editor view.
    async fn open_document(&self, location: &DocumentLocation) -> Result<(), CoreError>;

    /// Open a document in a background view without stealing focus
    /// (used when spawning a child agent, spec §4.3 step 3).
    async fn show_document(&self, location: &DocumentLocation, background: bool) -> Result<(), CoreError>;

    /// Write the full contents of a file, creating it if absent.
    async fn write_file(&self, location: &DocumentLocation, contents: &[u8]) -> Result<(), CoreError>;

    /// Read the full contents of a file.
    async fn read_file(&self, location: &DocumentLocation) -> Result<Vec<u8>, CoreError>;

    /// Delete a file.
    async fn delete_file(&self, location: &DocumentLocation) -> Result<(), CoreError>;

    /// Rename or move a file.
    async fn rename_file(&self, from: &DocumentLocation, to: &DocumentLocation) -> Result<(), CoreError>;

    /// Create a directory (and any missing ancestors).
    async fn create_directory(&self, location: &DocumentLocation) -> Result<(), CoreError>;

    /// List the immediate children of a directory.
    async fn read_directory(&self, location: &DocumentLocation) -> Result<Vec<DirEntry>, CoreError>;

    /// Register interest in deletions under a path prefix; events surface
    /// via the host's own event delivery mechanism, not a return value.
    async fn watch_deletions(&self, location: &DocumentLocation) -> Result<(), CoreError>;

    /// Show a non-modal notification to the user (spec §4.5, §7.2).
    async fn show_notification(&self, message: &str);

    /// Write text to the system clipboard (`copy-reference` command, §6).
    async fn clipboard_write(&self, text: &str) -> Result<(), CoreError>;

    /// Register a user-facing command by name (spec §6 "User-facing commands").
    async fn register_command(&self, name: &str) -> Result<(), CoreError>;

    /// Start watching a directory subtree for filesystem changes.
    async fn create_file_system_watcher(&self, root: &Path) -> Result<(), CoreError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_location_displays_without_a_root() {
        let loc = DocumentLocation::bare("agents/root.json");
        assert_eq!(loc.to_string(), "agents/root.json");
    }

    #[test]
    fn rooted_location_displays_with_its_root_prefix() {
        let loc = DocumentLocation { root: Some("workspace".into()), path: PathBuf::from("notes.md") };
        assert_eq!(loc.to_string(), "workspace/notes.md");
    }
}
