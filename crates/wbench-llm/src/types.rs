//! Wire-level types shared between the provider trait and its implementations.

use serde::{Deserialize, Serialize};

/// Why the model stopped producing a turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StopReason {
    /// The model produced a complete turn on its own.
    EndTurn,
    /// The model requested one or more tool calls.
    ToolUse,
    /// `max_tokens` was reached.
    MaxTokens,
    /// The endpoint's content filter intervened.
    StopSequence,
}

/// Token accounting for one request.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct Usage {
    /// Tokens in the prompt.
    pub input_tokens: u32,
    /// Tokens in the completion.
    pub output_tokens: u32,
}

/// One incremental event emitted while a turn streams in (C6 §4.7).
///
/// Tool-call fragments are addressed by `index` (the model's function-call
/// slot within this turn), not by the eventual call id, since the id itself
/// may arrive split across deltas.
#[derive(Debug, Clone)]
pub enum StreamEvent {
    /// A chunk of assistant-visible text content.
    TextDelta(String),
    /// A chunk of the model's reasoning trace (either wire field, spec §4.7).
    ReasoningDelta(String),
    /// The first delta for a new tool-call slot; carries whichever of
    /// `id`/`name` this delta supplied (the first delta to supply a field
    /// wins, per spec §4.7).
    ToolCallStart {
        /// Slot index within this turn.
        index: usize,
        /// Call id, if this delta carried one.
        id: Option<String>,
        /// Function name, if this delta carried one.
        name: Option<String>,
    },
    /// A chunk of a tool call's JSON arguments, to be concatenated in order.
    ToolCallDelta {
        /// Slot index within this turn.
        index: usize,
        /// Raw argument text fragment.
        args_delta: String,
    },
    /// The model finished emitting this turn.
    FinishReason(StopReason),
    /// Token usage, typically on the final chunk.
    Usage(Usage),
    /// The stream is complete.
    Done,
}

/// A single, now-complete tool call (after coalescing).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawToolCall {
    /// The call id (model-assigned, or freshly minted during recovery).
    pub id: String,
    /// The tool's name.
    pub name: String,
    /// The raw, not-yet-parsed arguments text accumulated across deltas.
    pub arguments: String,
}

/// The non-streaming result of a complete chat-completion round.
#[derive(Debug, Clone)]
pub struct LlmResponse {
    /// Assistant text content, if any.
    pub content: Option<String>,
    /// Reasoning trace, if any.
    pub reasoning: Option<String>,
    /// Requested tool calls, if any.
    pub tool_calls: Vec<RawToolCall>,
    /// Why the model stopped.
    pub stop_reason: StopReason,
    /// Token usage, if reported.
    pub usage: Option<Usage>,
}
