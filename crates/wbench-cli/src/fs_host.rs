//! A [`HostEditor`] backed by a real directory on disk, rooted at a single
//! workspace path. Grounded on `astrid-cli::main`'s direct `std::fs`/
//! `tokio::fs` use for its own config and session files — this binary has
//! no editor shell to delegate to, so it *is* the host.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::debug;

use wbench_core::{CoreError, DirEntry, DocumentLocation, HostEditor};

/// Resolves every [`DocumentLocation`] under one workspace root directory.
pub struct FsHost {
    root: PathBuf,
}

impl FsHost {
    /// Build a host rooted at `root`, creating it if it doesn't exist yet.
    pub async fn new(root: impl Into<PathBuf>) -> Result<Self, CoreError> {
        let root = root.into();
        tokio::fs::create_dir_all(&root).await?;
        Ok(Self { root })
    }

    fn resolve(&self, location: &DocumentLocation) -> PathBuf {
        match &location.root {
            Some(named) => self.root.join(named).join(&location.path),
            None => self.root.join(&location.path),
        }
    }
}

#[async_trait]
impl HostEditor for FsHost {
    async fn open_document(&self, location: &DocumentLocation) -> Result<(), CoreError> {
        debug!(%location, "open_document");
        Ok(())
    }

    async fn show_document(&self, location: &DocumentLocation, background: bool) -> Result<(), CoreError> {
        debug!(%location, background, "show_document");
        Ok(())
    }

    async fn write_file(&self, location: &DocumentLocation, contents: &[u8]) -> Result<(), CoreError> {
        let path = self.resolve(location);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&path, contents).await?;
        Ok(())
    }

    async fn read_file(&self, location: &DocumentLocation) -> Result<Vec<u8>, CoreError> {
        let path = self.resolve(location);
        tokio::fs::read(&path).await.map_err(|err| match err.kind() {
            std::io::ErrorKind::NotFound => CoreError::NotFound(location.to_string()),
            _ => CoreError::Io(err),
        })
    }

    async fn delete_file(&self, location: &DocumentLocation) -> Result<(), CoreError> {
        let path = self.resolve(location);
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(CoreError::Io(err)),
        }
    }

    async fn rename_file(&self, from: &DocumentLocation, to: &DocumentLocation) -> Result<(), CoreError> {
        let from_path = self.resolve(from);
        let to_path = self.resolve(to);
        if let Some(parent) = to_path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::rename(&from_path, &to_path).await?;
        Ok(())
    }

    async fn create_directory(&self, location: &DocumentLocation) -> Result<(), CoreError> {
        tokio::fs::create_dir_all(self.resolve(location)).await?;
        Ok(())
    }

    async fn read_directory(&self, location: &DocumentLocation) -> Result<Vec<DirEntry>, CoreError> {
        let path = self.resolve(location);
        let mut read_dir = match tokio::fs::read_dir(&path).await {
            Ok(read_dir) => read_dir,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(CoreError::Io(err)),
        };

        let mut entries = Vec::new();
        while let Some(entry) = read_dir.next_entry().await? {
            let file_type = entry.file_type().await?;
            entries.push(DirEntry { name: entry.file_name().to_string_lossy().into_owned(), is_dir: file_type.is_dir() });
        }
        Ok(entries)
    }

    async fn watch_deletions(&self, location: &DocumentLocation) -> Result<(), CoreError> {
        debug!(%location, "watch_deletions (no-op: this binary runs one command and exits)");
        Ok(())
    }

    async fn show_notification(&self, message: &str) {
        eprintln!("[wbench] {message}");
    }

    async fn clipboard_write(&self, text: &str) -> Result<(), CoreError> {
        println!("{text}");
        Ok(())
    }

    async fn register_command(&self, name: &str) -> Result<(), CoreError> {
        debug!(name, "register_command (no-op: no command palette to register against)");
        Ok(())
    }

    async fn create_file_system_watcher(&self, root: &Path) -> Result<(), CoreError> {
        debug!(root = %root.display(), "create_file_system_watcher (no-op)");
        Ok(())
    }
}
