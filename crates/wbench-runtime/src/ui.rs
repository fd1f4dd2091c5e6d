//! The UI renderer (C8, spec §4.8's `progress` callback and §2 "accumulates
//! the running transcript of one cell execution").
//!
//! Grounded on `astrid-runtime::runtime::execution`'s `Frontend` trait
//! (`show_status`/`tool_started`/`tool_completed`), re-expressed as a
//! concrete accumulator rather than a trait object: this workbench has one
//! renderer shape (the sidebar/editor transcript), not pluggable frontends,
//! so a struct the controller can snapshot and hand to a host is simpler
//! than an injected trait.

use serde::Serialize;
use serde_json::Value;

use wbench_llm::coalesce::PartialToolCall;

/// One tool invocation's live-then-settled rendering state.
#[derive(Debug, Clone, Serialize, Default)]
pub struct ToolCard {
    /// Call id, once known.
    pub id: Option<String>,
    /// Tool name, once known.
    pub name: Option<String>,
    /// Best-effort argument preview while the call is still streaming.
    pub arguments_preview: Value,
    /// The tool's result text, once it has executed.
    pub result: Option<String>,
    /// `true` once the tool has returned.
    pub completed: bool,
}

/// Accumulates the running transcript of one cell execution: committed
/// rounds, the currently-streaming round, and any badges raised along the
/// way (spec §4.8 empty-turn diagnostic, §7 stream-error surfacing).
#[derive(Debug, Clone, Serialize, Default)]
pub struct UiRenderer {
    /// Assistant text committed at the end of each LLM round that made at
    /// least one tool call (spec §4.8: a round's content is retained even
    /// when it also carries tool calls).
    pub committed_rounds: Vec<String>,
    /// The current round's assistant text, live while streaming.
    pub live_content: String,
    /// The current round's reasoning trace, live while streaming.
    pub live_reasoning: String,
    /// The current round's tool cards, live while streaming.
    pub live_tool_cards: Vec<ToolCard>,
    /// Stream- or provider-level error messages (spec §7 "surfaced to the
    /// cell's error channel" is the controller's job; these are the
    /// renderer's visible record of the same event).
    pub error_badges: Vec<String>,
    /// Non-fatal diagnostics, e.g. an empty LLM turn (spec §4.8).
    pub diagnostic_badges: Vec<String>,
}

impl UiRenderer {
    /// Build an empty renderer for a fresh cell execution.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The `progress` callback handed to [`wbench_llm::coalesce::run_turn`]:
    /// replaces the live round's content/reasoning/tool-card preview with
    /// the latest coalesced state on every stream event.
    pub fn progress(&mut self, content: &str, reasoning: &str, calls: &[PartialToolCall]) {
        self.live_content = content.to_string();
        self.live_reasoning = reasoning.to_string();
        self.live_tool_cards = calls
            .iter()
            .map(|call| ToolCard {
                id: call.id.clone(),
                name: call.name.clone(),
                arguments_preview: call.arguments_preview.clone(),
                result: None,
                completed: false,
            })
            .collect();
    }

    /// Move the live round's content into the committed log and clear the
    /// live reasoning, called once a round's tool calls have been recorded
    /// as an assistant turn (spec §4.8 "append an assistant turn").
    pub fn commit_round(&mut self) {
        if !self.live_content.is_empty() {
            self.committed_rounds.push(std::mem::take(&mut self.live_content));
        }
        self.live_reasoning.clear();
    }

    /// Mark a tool call as started, in case it was not already present
    /// from the streaming preview (e.g. the call resolved only after
    /// `Done`).
    pub fn tool_started(&mut self, id: &str, name: &str, arguments: &Value) {
        if self.live_tool_cards.iter().any(|card| card.id.as_deref() == Some(id)) {
            return;
        }
        self.live_tool_cards.push(ToolCard {
            id: Some(id.to_string()),
            name: Some(name.to_string()),
            arguments_preview: arguments.clone(),
            result: None,
            completed: false,
        });
    }

    /// Attach a tool's result to its card.
    pub fn tool_completed(&mut self, id: &str, result: &str) {
        if let Some(card) = self.live_tool_cards.iter_mut().rev().find(|card| card.id.as_deref() == Some(id)) {
            card.result = Some(result.to_string());
            card.completed = true;
        }
    }

    /// Raise an error badge (stream failure, provider error).
    pub fn error_badge(&mut self, message: impl Into<String>) {
        self.error_badges.push(message.into());
    }

    /// Raise a non-fatal diagnostic badge (empty turn).
    pub fn diagnostic_badge(&mut self, message: impl Into<String>) {
        self.diagnostic_badges.push(message.into());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn progress_replaces_the_live_round_each_call() {
        let mut renderer = UiRenderer::new();
        renderer.progress("hello", "", &[]);
        renderer.progress("hello world", "thinking", &[]);
        assert_eq!(renderer.live_content, "hello world");
        assert_eq!(renderer.live_reasoning, "thinking");
    }

    #[test]
    fn commit_round_moves_live_content_into_the_log() {
        let mut renderer = UiRenderer::new();
        renderer.progress("draft", "", &[]);
        renderer.commit_round();
        assert_eq!(renderer.committed_rounds, vec!["draft".to_string()]);
        assert!(renderer.live_content.is_empty());
    }

    #[test]
    fn tool_completed_attaches_to_the_matching_card_by_id() {
        let mut renderer = UiRenderer::new();
        renderer.tool_started("call_1", "read_file", &serde_json::json!({"path": "a.txt"}));
        renderer.tool_completed("call_1", "contents");
        assert_eq!(renderer.live_tool_cards[0].result.as_deref(), Some("contents"));
        assert!(renderer.live_tool_cards[0].completed);
    }
}
