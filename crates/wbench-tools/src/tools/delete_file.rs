//! Delete file tool — approval-gated, destructive.
//!
//! Grounded on `astrid-tools`'s mutating-tool shape (e.g. `write_file.rs`),
//! adapted to deletion; the teacher has no delete tool of its own.

use serde_json::Value;

use crate::context::ToolContext;
use crate::error::ToolError;
use crate::{BuiltinTool, ToolResult};

/// Built-in tool for deleting a file within the caller's allowed paths.
pub struct DeleteFileTool;

#[async_trait::async_trait]
impl BuiltinTool for DeleteFileTool {
    fn name(&self) -> &'static str {
        "delete_file"
    }

    fn description(&self) -> &'static str {
        "Deletes a file. Requires human approval unless auto-approve is active."
    }

    fn input_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "uri": {"type": "string", "description": "Path to the file to delete"}
            },
            "required": ["uri"]
        })
    }

    fn prettify(&self, args: &Value) -> String {
        let uri = args.get("uri").and_then(Value::as_str).unwrap_or("?");
        format!("delete {uri}")
    }

    async fn execute(&self, args: Value, ctx: &ToolContext) -> ToolResult {
        let uri = args
            .get("uri")
            .and_then(Value::as_str)
            .ok_or_else(|| ToolError::InvalidArguments("uri is required".into()))?;

        if !ctx.allowed_paths.allows(uri) {
            return Ok(format!("Access denied: '{uri}' is outside this agent's allowed paths"));
        }

        let decision = ctx
            .approval_gate
            .request_approval(ctx.agent_id.clone(), "delete_file", uri, format!("delete {uri}"))
            .await;
        if !decision.is_approved() {
            return Ok("User rejected the delete".to_string());
        }

        let location = wbench_core::DocumentLocation::bare(uri);
        ctx.host.delete_file(&location).await?;
        Ok(format!("Deleted {uri}"))
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

    fn ctx(auto_approve: bool) -> ToolContext {
        let mut files = std::collections::HashMap::new();
        files.insert("/a.txt".to_string(), b"x".to_vec());
        let host = Arc::new(MapHost { files: Mutex::new(files) });
        let gate = ApprovalGate::new();
        gate.set_auto_approve(auto_approve);
        ToolContext::new(AgentId::new(), false, AllowedPaths::compile(&["/".to_string()]), host, gate, CancellationToken::new())
    }

    #[tokio::test]
    async fn approved_delete_removes_the_file() {
        let ctx = ctx(true);
        let result = DeleteFileTool.execute(serde_json::json!({"uri": "/a.txt"}), &ctx).await.unwrap();
        assert_eq!(result, "Deleted /a.txt");
        assert!(ctx.host.read_file(&DocumentLocation::bare("/a.txt")).await.is_err());
    }

    #[tokio::test]
    async fn rejected_delete_leaves_the_file_untouched() {
        let ctx = ctx(false);
        let gate = ctx.approval_gate.clone();
        let host = Arc::clone(&ctx.host);
        let call = async move { DeleteFileTool.execute(serde_json::json!({"uri": "/a.txt"}), &ctx).await };
        let call = tokio::spawn(call);

        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        let pending = gate.list_pending().await;
        gate.resolve(&pending[0].id.to_string(), wbench_core::ApprovalDecision::Rejected).await.unwrap();

        let result = call.await.unwrap().unwrap();
        assert_eq!(result, "User rejected the delete");
        assert!(host.read_file(&DocumentLocation::bare("/a.txt")).await.is_ok());
    }
}
