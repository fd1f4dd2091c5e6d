//! Write file tool — approval-gated (spec §4.6 "Every tool that mutates
//! state... must call the approval gate").
//!
//! Grounded on `astrid-tools::write_file::WriteFileTool`.

use serde_json::Value;

use crate::context::ToolContext;
use crate::error::ToolError;
use crate::{BuiltinTool, ToolResult};

/// Built-in tool for writing a file within the caller's allowed paths.
pub struct WriteFileTool;

#[async_trait::async_trait]
impl BuiltinTool for WriteFileTool {
    fn name(&self) -> &'static str {
        "write_file"
    }

    fn description(&self) -> &'static str {
        "Writes content to a file, creating it if absent. Requires human \
         approval unless auto-approve is active."
    }

    fn input_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "uri": {"type": "string", "description": "Path to the file to write"},
                "content": {"type": "string", "description": "The content to write"}
            },
            "required": ["uri", "content"]
        })
    }

    fn prettify(&self, args: &Value) -> String {
        let uri = args.get("uri").and_then(Value::as_str).unwrap_or("?");
        format!("write {uri}")
    }

    async fn execute(&self, args: Value, ctx: &ToolContext) -> ToolResult {
        let uri = args
            .get("uri")
            .and_then(Value::as_str)
            .ok_or_else(|| ToolError::InvalidArguments("uri is required".into()))?;
        let content = args
            .get("content")
            .and_then(Value::as_str)
            .ok_or_else(|| ToolError::InvalidArguments("content is required".into()))?;

        if !ctx.allowed_paths.allows(uri) {
            return Ok(format!("Access denied: '{uri}' is outside this agent's allowed paths"));
        }

        let details = format!("write {} bytes to {uri}", content.len());
        let decision = ctx
            .approval_gate
            .request_approval(ctx.agent_id.clone(), "write_file", uri, details)
            .await;
        if !decision.is_approved() {
            return Ok("User rejected the write".to_string());
        }

        let location = wbench_core::DocumentLocation::bare(uri);
        ctx.host.write_file(&location, content.as_bytes()).await?;
        Ok(format!("Wrote {} bytes to {uri}", content.len()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::read_file::ReadFileTool;
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
            self.files.lock().unwrap().get(&loc.to_string()).cloned().ok_or_else(|| CoreError::NotFound(loc.to_string()))
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

    fn ctx_with_auto_approve(allowed: &[&str]) -> ToolContext {
        let host = Arc::new(MapHost { files: Mutex::new(std::collections::HashMap::new()) });
        let gate = ApprovalGate::new();
        gate.set_auto_approve(true);
        ToolContext::new(
            AgentId::new(),
            false,
            AllowedPaths::compile(&allowed.iter().map(|s| s.to_string()).collect::<Vec<_>>()),
            host,
            gate,
            CancellationToken::new(),
        )
    }

    #[tokio::test]
    async fn writes_and_reads_back_within_allowed_paths() {
        let ctx = ctx_with_auto_approve(&["/"]);
        WriteFileTool.execute(serde_json::json!({"uri": "/a.txt", "content": "hi"}), &ctx).await.unwrap();
        let read_back = ReadFileTool.execute(serde_json::json!({"uri": "/a.txt"}), &ctx).await.unwrap();
        assert_eq!(read_back, "hi");
    }

    #[tokio::test]
    async fn rejected_approval_yields_the_sentinel_string() {
        let host = Arc::new(MapHost { files: Mutex::new(std::collections::HashMap::new()) });
        let gate = ApprovalGate::new();
        let ctx = ToolContext::new(AgentId::new(), false, AllowedPaths::compile(&["/".to_string()]), host, gate.clone(), CancellationToken::new());

        let call = tokio::spawn({
            let gate = gate.clone();
            async move {
                WriteFileTool.execute(serde_json::json!({"uri": "/a.txt", "content": "hi"}), &ctx).await
            }
        });

        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        let pending = gate.list_pending().await;
        assert_eq!(pending.len(), 1);
        gate.resolve(&pending[0].id.to_string(), wbench_core::ApprovalDecision::Rejected).await.unwrap();

        let result = call.await.unwrap().unwrap();
        assert_eq!(result, "User rejected the write");
    }

    #[tokio::test]
    async fn denies_a_path_outside_allowed_paths_before_requesting_approval() {
        let ctx = ctx_with_auto_approve(&["/workspace"]);
        let result = WriteFileTool.execute(serde_json::json!({"uri": "/etc/passwd", "content": "x"}), &ctx).await.unwrap();
        assert!(result.starts_with("Access denied"));
    }
}
