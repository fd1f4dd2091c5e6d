//! LLM transport: an `LlmProvider` trait, an OpenAI-compatible streaming
//! implementation, and the turn-coalescing logic (C6).

pub mod coalesce;
pub mod error;
pub mod openai_compat;
pub mod provider;
pub mod types;

pub use coalesce::{run_turn, CoalescedTurn, PartialToolCall, ToolInvocation};
pub use error::{LlmError, LlmResult};
pub use openai_compat::OpenAiCompatProvider;
pub use provider::{LlmProvider, ProviderConfig, StreamBox};
pub use types::{LlmResponse, RawToolCall, StopReason, StreamEvent, Usage};
