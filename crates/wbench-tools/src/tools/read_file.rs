//! Read file tool — read-only, never gated, but still access-controlled
//! (spec §4.6 "Read-only tools may proceed unconditionally" refers to the
//! approval gate only; `allowedPaths` still applies to every tool).
//!
//! Grounded on `astrid-tools::read_file::ReadFileTool`, simplified: no
//! offset/limit windowing, no binary-file sniffing (out of scope for this
//! crate's representative tool set; the full behavior belongs to "the
//! individual tool implementations", spec §1 Out-of-scope).

use serde_json::Value;

use crate::context::ToolContext;
use crate::error::ToolError;
use crate::{truncate_output, BuiltinTool, ToolResult};

/// Built-in tool for reading a file within the caller's allowed paths.
pub struct ReadFileTool;

#[async_trait::async_trait]
impl BuiltinTool for ReadFileTool {
    fn name(&self) -> &'static str {
        "read_file"
    }

    fn description(&self) -> &'static str {
        "Reads a file's full contents from the workspace. Fails if the path \
         is outside this agent's allowed paths."
    }

    fn input_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "uri": {
                    "type": "string",
                    "description": "Path to the file to read"
                }
            },
            "required": ["uri"]
        })
    }

    fn prettify(&self, args: &Value) -> String {
        let uri = args.get("uri").and_then(Value::as_str).unwrap_or("?");
        format!("read {uri}")
    }

    async fn execute(&self, args: Value, ctx: &ToolContext) -> ToolResult {
        let uri = args
            .get("uri")
            .and_then(Value::as_str)
            .ok_or_else(|| ToolError::InvalidArguments("uri is required".into()))?;

        if !ctx.allowed_paths.allows(uri) {
            return Ok(format!("Access denied: '{uri}' is outside this agent's allowed paths"));
        }

        let location = wbench_core::DocumentLocation::bare(uri);
        let bytes = ctx.host.read_file(&location).await?;
        let content = String::from_utf8_lossy(&bytes).into_owned();
        Ok(truncate_output(content))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};
    use tokio_util::sync::CancellationToken;
    use wbench_approval::ApprovalGate;
    use wbench_core::{AgentId, AllowedPaths, CoreError, DirEntry, DocumentLocation, HostEditor};

    struct MapHost {
        files: Mutex<std::collections::HashMap<String, Vec<u8>>>,
    }

    #[async_trait::async_trait]
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
            self.files
                .lock()
                .unwrap()
                .get(&loc.to_string())
                .cloned()
                .ok_or_else(|| CoreError::NotFound(loc.to_string()))
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

    fn ctx(allowed: &[&str]) -> ToolContext {
        let host = Arc::new(MapHost { files: Mutex::new(std::collections::HashMap::new()) });
        ToolContext::new(
            AgentId::new(),
            false,
            AllowedPaths::compile(&allowed.iter().map(|s| s.to_string()).collect::<Vec<_>>()),
            host,
            ApprovalGate::new(),
            CancellationToken::new(),
        )
    }

    #[tokio::test]
    async fn denies_a_path_outside_allowed_paths() {
        let ctx = ctx(&["/workspace"]);
        let result = ReadFileTool.execute(serde_json::json!({"uri": "/etc/passwd"}), &ctx).await.unwrap();
        assert!(result.starts_with("Access denied"));
    }

    #[tokio::test]
    async fn missing_uri_is_an_invalid_argument() {
        let ctx = ctx(&["/"]);
        let result = ReadFileTool.execute(serde_json::json!({}), &ctx).await;
        assert!(matches!(result, Err(ToolError::InvalidArguments(_))));
    }

    #[tokio::test]
    async fn reads_file_contents_within_allowed_paths() {
        let ctx = ctx(&["/"]);
        ctx.host.write_file(&DocumentLocation::bare("/workspace/a.txt"), b"hello").await.unwrap();
        let result = ReadFileTool.execute(serde_json::json!({"uri": "/workspace/a.txt"}), &ctx).await.unwrap();
        assert_eq!(result, "hello");
    }
}
