//! The child-only completion tool (spec §3 `taskFinished`, §4.6
//! `signalTermination()`, §7.6).
//!
//! Grounded on the completion-signal role `astrid-tools::task::TaskTool`
//! plays for its own sub-agent loop, adapted to the spec's
//! report-then-terminate contract.

use serde_json::Value;

use crate::context::ToolContext;
use crate::error::ToolError;
use crate::{BuiltinTool, ToolResult};

/// Built-in tool a child agent calls exactly once to report completion and
/// end its own runner loop.
pub struct TaskFinishTool;

#[async_trait::async_trait]
impl BuiltinTool for TaskFinishTool {
    fn name(&self) -> &'static str {
        "task_finish"
    }

    fn description(&self) -> &'static str {
        "Reports this agent's final result to its parent and ends this \
         conversation. Only available to agents spawned via `fork`."
    }

    fn input_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "summary": {
                    "type": "string",
                    "description": "The final result to report to the parent agent"
                }
            },
            "required": ["summary"]
        })
    }

    fn prettify(&self, _args: &Value) -> String {
        "task_finish".to_string()
    }

    async fn execute(&self, args: Value, ctx: &ToolContext) -> ToolResult {
        let summary = args
            .get("summary")
            .and_then(Value::as_str)
            .ok_or_else(|| ToolError::InvalidArguments("summary is required".into()))?
            .to_string();

        if let Some(reporter) = ctx.task_finish_reporter().await {
            reporter.report_task_finish(ctx.agent_id.clone(), summary.clone()).await;
        }

        // Signalling termination, not raising an error: the runner (spec
        // §4.8) checks `ctx.is_terminated()` after this call returns and
        // breaks its loop; it does not treat this as a failure.
        ctx.signal_termination();

        Ok(format!("Reported completion: {summary}"))
    }
}
