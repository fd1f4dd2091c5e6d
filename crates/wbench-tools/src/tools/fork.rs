//! The `fork` primitive (spec §4.3, §4.6): suspends the caller until every
//! spawned child reports or is deleted.
//!
//! Grounded on `astrid-tools::subagent_spawner`'s dependency-inversion
//! pattern: this crate defines [`crate::context::ForkSpawner`] and calls
//! through it; `wbench-orchestrator` implements and injects it, avoiding a
//! `wbench-tools -> wbench-orchestrator` dependency cycle.

use serde_json::Value;

use crate::context::{ChildSpec, ToolContext};
use crate::error::ToolError;
use crate::{BuiltinTool, ToolResult};

/// Built-in tool for spawning one or more child agents and joining on
/// their results.
pub struct ForkTool;

#[async_trait::async_trait]
impl BuiltinTool for ForkTool {
    fn name(&self) -> &'static str {
        "fork"
    }

    fn description(&self) -> &'static str {
        "Spawns one or more child agents, each with its own prompt and \
         allowed paths, and waits for all of them to finish or be deleted. \
         Returns a joined report of each child's outcome."
    }

    fn input_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "context_summary": {
                    "type": "string",
                    "description": "Advisory summary of why these children are being spawned"
                },
                "children": {
                    "type": "array",
                    "items": {
                        "type": "object",
                        "properties": {
                            "prompt": {"type": "string"},
                            "allowed_paths": {"type": "array", "items": {"type": "string"}},
                            "model": {"type": "string"}
                        },
                        "required": ["prompt", "allowed_paths"]
                    }
                }
            },
            "required": ["children"]
        })
    }

    fn prettify(&self, args: &Value) -> String {
        let count = args.get("children").and_then(Value::as_array).map_or(0, Vec::len);
        format!("fork {count} child agent(s)")
    }

    async fn execute(&self, args: Value, ctx: &ToolContext) -> ToolResult {
        let context_summary = args.get("context_summary").and_then(Value::as_str).map(str::to_string);

        let children_value = args
            .get("children")
            .and_then(Value::as_array)
            .ok_or_else(|| ToolError::InvalidArguments("children is required".into()))?;

        if children_value.is_empty() {
            return Err(ToolError::InvalidArguments("children must not be empty".into()));
        }

        let mut children = Vec::with_capacity(children_value.len());
        for spec in children_value {
            let prompt = spec
                .get("prompt")
                .and_then(Value::as_str)
                .ok_or_else(|| ToolError::InvalidArguments("each child requires a prompt".into()))?
                .to_string();
            let allowed_paths = spec
                .get("allowed_paths")
                .and_then(Value::as_array)
                .ok_or_else(|| ToolError::InvalidArguments("each child requires allowed_paths".into()))?
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect();
            let model = spec.get("model").and_then(Value::as_str).map(str::to_string);
            children.push(ChildSpec { prompt, allowed_paths, model });
        }

        let Some(spawner) = ctx.fork_spawner().await else {
            return Err(ToolError::ExecutionFailed("no fork spawner is attached to this context".into()));
        };

        tokio::select! {
            result = spawner.fork(ctx.agent_id.clone(), context_summary, children) => result,
            () = ctx.abort.cancelled() => {
                spawner.cancel_fork(ctx.agent_id.clone()).await;
                Err(ToolError::Cancelled)
            }
        }
    }
}
