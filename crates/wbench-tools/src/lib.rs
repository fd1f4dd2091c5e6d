//! Tool registry and dispatcher (C4, spec §4.6), plus a representative set
//! of builtin tools: `read_file`, `write_file`, `delete_file` (approval-
//! gated), `fork`, and `task_finish`.

pub mod context;
pub mod error;
pub mod registry;
pub mod tools;

pub use context::{ChildSpec, ForkSpawner, TaskFinishReporter, ToolContext};
pub use error::{ToolError, ToolResult};
pub use registry::{CallerRole, ToolRegistry};

/// A built-in tool callable by the model through the LLM function-calling
/// protocol. Grounded on `astrid-tools::BuiltinTool`.
#[async_trait::async_trait]
pub trait BuiltinTool: Send + Sync {
    /// Tool name, as it appears in the model's function-calling schema.
    fn name(&self) -> &'static str;

    /// Human-readable description shown to the LLM.
    fn description(&self) -> &'static str;

    /// JSON schema for this tool's input parameters.
    fn input_schema(&self) -> serde_json::Value;

    /// Execute the tool against the given arguments and context.
    async fn execute(&self, args: serde_json::Value, ctx: &ToolContext) -> ToolResult;

    /// Render a short human-readable summary of a call to this tool, for
    /// approval-request `details` text and UI tool cards (spec §4.6
    /// "optional pretty-print summariser"). Defaults to the tool name.
    fn prettify(&self, _args: &serde_json::Value) -> String {
        self.name().to_string()
    }
}

/// Maximum output size in characters before truncation, matching the
/// teacher's `MAX_OUTPUT_CHARS` (`astrid-tools::truncate_output`).
const MAX_OUTPUT_CHARS: usize = 30_000;

/// Truncate a tool result to stay within LLM context limits.
#[must_use]
pub fn truncate_output(output: String) -> String {
    if output.len() <= MAX_OUTPUT_CHARS {
        return output;
    }
    let mut end = MAX_OUTPUT_CHARS;
    while !output.is_char_boundary(end) {
        end -= 1;
    }
    let mut truncated = output[..end].to_string();
    truncated.push_str("\n\n... (output truncated — exceeded 30000 character limit)");
    truncated
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn small_output_is_unchanged() {
        assert_eq!(truncate_output("hello".to_string()), "hello");
    }

    #[test]
    fn large_output_is_truncated_with_a_notice() {
        let result = truncate_output("x".repeat(40_000));
        assert!(result.len() < 40_000);
        assert!(result.contains("output truncated"));
    }

    #[test]
    fn truncation_does_not_split_a_multibyte_char_at_the_boundary() {
        // A run of 3-byte characters straddling byte offset 30000 (30000 is
        // not a multiple of 3) exercises the char-boundary backoff.
        let output = "€".repeat(11_000);
        let result = truncate_output(output);
        assert!(result.is_char_boundary(result.len() - "\n\n... (output truncated — exceeded 30000 character limit)".len()));
    }
}
