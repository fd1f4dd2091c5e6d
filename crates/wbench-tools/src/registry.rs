//! The tool registry and dispatcher (C4, spec §4.6).
//!
//! Grounded on `astrid-tools::ToolRegistry`, adding the spec's
//! common/root-only/child-only partitioning and exact dispatcher error
//! strings, which the teacher's single flat registry does not have.

use std::collections::HashMap;

use serde_json::Value;

use crate::context::ToolContext;
use crate::error::ToolError;
use crate::tools::{DeleteFileTool, ForkTool, ReadFileTool, TaskFinishTool, WriteFileTool};
use crate::BuiltinTool;

/// Which partition a tool belongs to (spec §4.6).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallerRole {
    /// Available to every agent, root or child.
    Common,
    /// Available only to agents with no parent.
    RootOnly,
    /// Available only to agents with a parent.
    ChildOnly,
}

/// Holds the set of callable tools, partitioned by caller role, and
/// dispatches a named call against a [`ToolContext`].
pub struct ToolRegistry {
    tools: HashMap<&'static str, (Box<dyn BuiltinTool>, CallerRole)>,
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ToolRegistry {
    /// Build an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self { tools: HashMap::new() }
    }

    /// Build a registry with the representative builtin set registered
    /// (spec §4.6: `read_file`, `write_file`, `delete_file` as common
    /// tools, `fork` as common — any agent may spawn children per §4.3 —
    /// and `task_finish` as child-only).
    #[must_use]
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(Box::new(ReadFileTool), CallerRole::Common);
        registry.register(Box::new(WriteFileTool), CallerRole::Common);
        registry.register(Box::new(DeleteFileTool), CallerRole::Common);
        registry.register(Box::new(ForkTool), CallerRole::Common);
        registry.register(Box::new(TaskFinishTool), CallerRole::ChildOnly);
        registry
    }

    /// Register a tool under a given role partition.
    pub fn register(&mut self, tool: Box<dyn BuiltinTool>, role: CallerRole) {
        self.tools.insert(tool.name(), (tool, role));
    }

    /// Look up a tool definition without regard to caller role, for
    /// building the LLM's function-calling schema.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&dyn BuiltinTool> {
        self.tools.get(name).map(|(tool, _)| tool.as_ref())
    }

    /// Export the JSON schema set visible to a caller of the given role
    /// (spec §4.7 "caller-appropriate tool schemas").
    #[must_use]
    pub fn schemas_for(&self, is_child: bool) -> Vec<Value> {
        self.tools
            .values()
            .filter(|(_, role)| visible_to(*role, is_child))
            .map(|(tool, _)| {
                serde_json::json!({
                    "type": "function",
                    "function": {
                        "name": tool.name(),
                        "description": tool.description(),
                        "parameters": tool.input_schema(),
                    }
                })
            })
            .collect()
    }

    /// Execute a named tool against `ctx`, enforcing the caller-role
    /// partition (spec §4.6 dispatcher contract).
    pub async fn dispatch(&self, name: &str, args: Value, ctx: &ToolContext) -> Result<String, ToolError> {
        let Some((tool, role)) = self.tools.get(name) else {
            return Err(ToolError::UnknownTool(name.to_string()));
        };

        match (*role, ctx.is_child) {
            (CallerRole::RootOnly, true) => return Err(ToolError::NotAvailableForSubAgents(name.to_string())),
            (CallerRole::ChildOnly, false) => return Err(ToolError::OnlyAvailableForSubAgents(name.to_string())),
            _ => {}
        }

        tool.execute(args, ctx).await
    }
}

fn visible_to(role: CallerRole, is_child: bool) -> bool {
    match role {
        CallerRole::Common => true,
        CallerRole::RootOnly => !is_child,
        CallerRole::ChildOnly => is_child,
    }
}
