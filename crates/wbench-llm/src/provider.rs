//! The `LlmProvider` trait: an opaque streaming chat-completion source.

use async_trait::async_trait;
use futures::stream::BoxStream;
use serde_json::Value;

use wbench_core::ConversationMessage;

use crate::error::LlmResult;
use crate::types::{LlmResponse, StreamEvent};

/// A boxed stream of [`StreamEvent`]s, yielding `LlmResult` items so a
/// mid-stream transport error can be surfaced without losing what
/// has already arrived.
pub type StreamBox = BoxStream<'static, LlmResult<StreamEvent>>;

/// Configuration shared by every provider implementation.
#[derive(Clone)]
pub struct ProviderConfig {
    /// The API key, if the endpoint requires one.
    pub api_key: Option<String>,
    /// The model identifier to request.
    pub model: String,
    /// Override base URL (defaults to the provider's own default).
    pub base_url: Option<String>,
    /// Sampling temperature, clamped to `[0.0, 2.0]`.
    pub temperature: f32,
    /// Maximum completion tokens.
    pub max_tokens: u32,
}

impl std::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .finish()
    }
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self { api_key: None, model: String::new(), base_url: None, temperature: 0.7, max_tokens: 4096 }
    }
}

/// An opaque async chat-completion source (spec §1 "LLM transport... treated
/// as an opaque async stream source").
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// A short name for logging (e.g. `"openai-compat"`).
    fn name(&self) -> &str;

    /// The model identifier currently configured.
    fn model(&self) -> &str;

    /// Issue a streaming chat completion. `tools` is the caller-appropriate
    /// tool schema set (empty for a child agent with no tools enabled,
    /// etc.); `system` is the assembled system prompt (C10's output).
    async fn stream(
        &self,
        messages: &[ConversationMessage],
        tools: &[Value],
        system: Option<&str>,
    ) -> LlmResult<StreamBox>;

    /// Issue a non-streaming completion, draining the full stream
    /// internally. The default implementation is adequate for any provider
    /// whose only primitive is streaming.
    async fn complete(
        &self,
        messages: &[ConversationMessage],
        tools: &[Value],
        system: Option<&str>,
    ) -> LlmResult<LlmResponse> {
        crate::coalesce::drain_to_response(self.stream(messages, tools, system).await?).await
    }

    /// A rough token estimate (~4 characters per token), used only for
    /// client-side context-window bookkeeping, never sent to the endpoint.
    fn count_tokens(&self, text: &str) -> u32 {
        (text.len() as u32 / 4).max(1)
    }

    /// The provider's advertised context window, if known.
    fn max_context_length(&self) -> Option<u32> {
        None
    }
}

#[async_trait]
impl LlmProvider for Box<dyn LlmProvider> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn model(&self) -> &str {
        (**self).model()
    }

    async fn stream(
        &self,
        messages: &[ConversationMessage],
        tools: &[Value],
        system: Option<&str>,
    ) -> LlmResult<StreamBox> {
        (**self).stream(messages, tools, system).await
    }

    fn count_tokens(&self, text: &str) -> u32 {
        (**self).count_tokens(text)
    }

    fn max_context_length(&self) -> Option<u32> {
        (**self).max_context_length()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debug_redacts_the_api_key() {
        let config = ProviderConfig { api_key: Some("sk-secret".into()), ..Default::default() };
        let rendered = format!("{config:?}");
        assert!(!rendered.contains("sk-secret"));
        assert!(rendered.contains("<redacted>"));
    }
}
