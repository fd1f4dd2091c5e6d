//! Stream reassembly and coalescing (C6, spec §4.7).
//!
//! Turns a sequence of [`StreamEvent`]s into progress snapshots (for live
//! rendering of partially-formed tool cards) and a single coalesced result.

use serde_json::Value;

use futures::StreamExt;

use crate::error::{LlmError, LlmResult};
use crate::provider::StreamBox;
use crate::types::{LlmResponse, RawToolCall, StopReason, StreamEvent, Usage};

/// One in-progress tool-call slot, tracked by its position in the turn
/// rather than by call id (the id itself may arrive split across deltas,
/// spec §4.7).
#[derive(Debug, Default, Clone)]
struct PendingCall {
    id: Option<String>,
    name: Option<String>,
    arguments: String,
}

/// A tool call as rendered mid-stream: best-effort parsed arguments so a UI
/// can show a partially-formed tool card before the call is complete.
#[derive(Debug, Clone)]
pub struct PartialToolCall {
    /// Call id, if known yet.
    pub id: Option<String>,
    /// Tool name, if known yet.
    pub name: Option<String>,
    /// Best-effort parse of the arguments accumulated so far. Always a
    /// valid JSON value (an empty object if nothing parses yet) so the
    /// tool's name can render even with no usable argument data.
    pub arguments_preview: Value,
}

/// One fully-resolved tool call, after final coalescence and any bracket
/// recovery.
#[derive(Debug, Clone)]
pub struct ToolInvocation {
    /// The call id (model-assigned, or freshly minted by recovery).
    pub id: String,
    /// The tool's name.
    pub name: String,
    /// Parsed arguments.
    pub arguments: Value,
}

/// The fully-assembled result of one LLM turn.
#[derive(Debug, Clone)]
pub struct CoalescedTurn {
    /// Assistant text content, if any.
    pub content: Option<String>,
    /// Reasoning trace, if any.
    pub reasoning: Option<String>,
    /// Resolved tool calls, in the order the model emitted their slots.
    pub tool_calls: Vec<ToolInvocation>,
    /// Why the model stopped.
    pub stop_reason: StopReason,
    /// Token usage, if the stream reported it.
    pub usage: Option<Usage>,
    /// Count of tool-call slots whose arguments never became parseable,
    /// even after bracket recovery, and were therefore dropped silently
    /// (spec §9 open question: policy preserved, made observable here).
    pub dropped_tool_calls: u64,
}

/// Attempt to parse `raw` as JSON; on failure, run the stack-based
/// bracket-closing repair and retry; on repeated failure, fall back to an
/// empty object so a tool's name still renders (spec §4.7).
fn best_effort_parse(raw: &str) -> Value {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Value::Object(serde_json::Map::new());
    }
    if let Ok(value) = serde_json::from_str::<Value>(trimmed) {
        return value;
    }
    let repaired = close_brackets(trimmed);
    serde_json::from_str::<Value>(&repaired).unwrap_or_else(|_| Value::Object(serde_json::Map::new()))
}

/// Close any open `"`, `{`, `[` in `raw` with their matching terminator in
/// LIFO order, respecting backslash escapes and string context, so a
/// truncated-mid-stream JSON fragment parses as valid (if incomplete) JSON.
fn close_brackets(raw: &str) -> String {
    let mut stack = Vec::new();
    let mut in_string = false;
    let mut escaped = false;

    for ch in raw.chars() {
        if in_string {
            if escaped {
                escaped = false;
            } else if ch == '\\' {
                escaped = true;
            } else if ch == '"' {
                in_string = false;
            }
            continue;
        }
        match ch {
            '"' => in_string = true,
            '{' => stack.push('}'),
            '[' => stack.push(']'),
            '}' | ']' => {
                stack.pop();
            }
            _ => {}
        }
    }

    let mut repaired = raw.to_string();
    if in_string {
        repaired.push('"');
    }
    while let Some(closer) = stack.pop() {
        repaired.push(closer);
    }
    repaired
}

/// Recover a raw arguments string that looks like several JSON objects
/// concatenated back-to-back (e.g. `{"a":1}{"a":1}`) by splitting on each
/// `}{` boundary, parsing each piece, and de-duplicating identical objects
/// (spec §4.7, §8 "recovered as a single call, not two").
fn recover_concatenated_objects(raw: &str) -> Option<Vec<Value>> {
    let trimmed = raw.trim();
    if !trimmed.contains("}{") {
        return None;
    }
    let mut pieces = Vec::new();
    let mut depth = 0i32;
    let mut start = 0usize;
    let bytes = trimmed.as_bytes();
    let mut in_string = false;
    let mut escaped = false;

    for (idx, &byte) in bytes.iter().enumerate() {
        let ch = byte as char;
        if in_string {
            if escaped {
                escaped = false;
            } else if ch == '\\' {
                escaped = true;
            } else if ch == '"' {
                in_string = false;
            }
            continue;
        }
        match ch {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    pieces.push(&trimmed[start..=idx]);
                    start = idx + 1;
                }
            }
            _ => {}
        }
    }

    if pieces.len() < 2 {
        return None;
    }

    let mut values = Vec::new();
    let mut seen = Vec::new();
    for piece in pieces {
        let Ok(value) = serde_json::from_str::<Value>(piece) else {
            return None;
        };
        if !seen.contains(&value) {
            seen.push(value.clone());
            values.push(value);
        }
    }
    if values.is_empty() {
        None
    } else {
        Some(values)
    }
}

/// Drive a stream of [`StreamEvent`]s to completion, invoking `progress`
/// after every event with the content/reasoning accumulated so far and a
/// snapshot of every in-progress tool call.
pub async fn run_turn(
    mut stream: StreamBox,
    mut progress: impl FnMut(&str, &str, &[PartialToolCall]) + Send,
) -> LlmResult<CoalescedTurn> {
    let mut content = String::new();
    let mut reasoning = String::new();
    let mut calls: Vec<PendingCall> = Vec::new();
    let mut stop_reason = StopReason::EndTurn;
    let mut usage = None;
    let mut saw_done = false;

    while let Some(event) = stream.next().await {
        match event? {
            StreamEvent::TextDelta(delta) => content.push_str(&delta),
            StreamEvent::ReasoningDelta(delta) => reasoning.push_str(&delta),
            StreamEvent::ToolCallStart { index, id, name } => {
                if calls.len() <= index {
                    calls.resize_with(index + 1, PendingCall::default);
                }
                let slot = &mut calls[index];
                if slot.id.is_none() {
                    slot.id = id;
                }
                if slot.name.is_none() {
                    slot.name = name;
                }
            }
            StreamEvent::ToolCallDelta { index, args_delta } => {
                if calls.len() <= index {
                    calls.resize_with(index + 1, PendingCall::default);
                }
                calls[index].arguments.push_str(&args_delta);
            }
            StreamEvent::FinishReason(reason) => stop_reason = reason,
            StreamEvent::Usage(u) => usage = Some(u),
            StreamEvent::Done => {
                saw_done = true;
                break;
            }
        }

        let previews: Vec<PartialToolCall> = calls
            .iter()
            .map(|call| PartialToolCall {
                id: call.id.clone(),
                name: call.name.clone(),
                arguments_preview: best_effort_parse(&call.arguments),
            })
            .collect();
        progress(&content, &reasoning, &previews);
    }

    if !saw_done && usage.is_none() && content.is_empty() && reasoning.is_empty() && calls.is_empty() {
        return Err(LlmError::StreamTruncated);
    }

    let mut resolved = Vec::new();
    let mut dropped = 0u64;
    for (slot_index, call) in calls.into_iter().enumerate() {
        let name = match call.name {
            Some(name) => name,
            None => {
                dropped += 1;
                continue;
            }
        };
        let fallback_id = || format!("call_{slot_index}");
        let id = call.id.clone().unwrap_or_else(fallback_id);

        if let Ok(value) = serde_json::from_str::<Value>(call.arguments.trim()) {
            if value.is_object() {
                resolved.push(ToolInvocation { id, name, arguments: value });
                continue;
            }
        }

        if let Some(values) = recover_concatenated_objects(&call.arguments) {
            for (i, value) in values.into_iter().enumerate() {
                let recovered_id = if i == 0 { id.clone() } else { format!("{id}_{i}") };
                resolved.push(ToolInvocation { id: recovered_id, name: name.clone(), arguments: value });
            }
            continue;
        }

        dropped += 1;
    }

    Ok(CoalescedTurn {
        content: if content.is_empty() { None } else { Some(content) },
        reasoning: if reasoning.is_empty() { None } else { Some(reasoning) },
        tool_calls: resolved,
        stop_reason,
        usage,
        dropped_tool_calls: dropped,
    })
}

/// Drain a stream with no progress observer, for [`crate::provider::LlmProvider::complete`]'s
/// default implementation.
pub(crate) async fn drain_to_response(stream: StreamBox) -> LlmResult<LlmResponse> {
    let turn = run_turn(stream, |_, _, _| {}).await?;
    Ok(LlmResponse {
        content: turn.content,
        reasoning: turn.reasoning,
        tool_calls: turn
            .tool_calls
            .into_iter()
            .map(|call| RawToolCall { id: call.id, name: call.name, arguments: call.arguments.to_string() })
            .collect(),
        stop_reason: turn.stop_reason,
        usage: turn.usage,
    })
}
