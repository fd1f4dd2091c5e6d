//! An OpenAI-compatible streaming chat-completion provider (spec §6 "LLM
//! transport"). Grounded on `astrid-llm::openai_compat::OpenAiCompatProvider`.

use async_stream::try_stream;
use async_trait::async_trait;
use futures::StreamExt;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use serde::Deserialize;
use serde_json::{json, Value};

use wbench_core::{ConversationMessage, MessageContent, Role};

use crate::error::{LlmError, LlmResult};
use crate::provider::{LlmProvider, ProviderConfig, StreamBox};
use crate::types::{StopReason, StreamEvent, Usage};

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

fn is_local_url(url: &str) -> bool {
    url.contains("localhost") || url.contains("127.0.0.1") || url.contains("[::1]")
}

/// A chat-completions client speaking the OpenAI wire format, usable
/// against OpenAI itself or any compatible local/self-hosted endpoint.
pub struct OpenAiCompatProvider {
    client: reqwest::Client,
    config: ProviderConfig,
}

impl std::fmt::Debug for OpenAiCompatProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiCompatProvider").field("config", &self.config).finish()
    }
}

impl OpenAiCompatProvider {
    /// Build a provider against an explicit base URL and model.
    #[must_use]
    pub fn custom(base_url: impl Into<String>, api_key: Option<String>, model: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            config: ProviderConfig {
                api_key,
                model: model.into(),
                base_url: Some(base_url.into()),
                ..Default::default()
            },
        }
    }

    /// Build a provider against the real OpenAI endpoint.
    #[must_use]
    pub fn openai(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            config: ProviderConfig {
                api_key: Some(api_key.into()),
                model: model.into(),
                base_url: Some(DEFAULT_BASE_URL.to_string()),
                ..Default::default()
            },
        }
    }

    /// Override the sampling temperature, clamped to `[0.0, 2.0]`.
    #[must_use]
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.config.temperature = temperature.clamp(0.0, 2.0);
        self
    }

    /// Override the maximum completion tokens.
    #[must_use]
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.config.max_tokens = max_tokens;
        self
    }

    fn base_url(&self) -> &str {
        self.config.base_url.as_deref().unwrap_or(DEFAULT_BASE_URL)
    }

    fn build_headers(&self) -> LlmResult<HeaderMap> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        if let Some(api_key) = &self.config.api_key {
            let mut value = HeaderValue::from_str(&format!("Bearer {api_key}")).map_err(|_| LlmError::InvalidApiKey)?;
            value.set_sensitive(true);
            headers.insert(AUTHORIZATION, value);
        } else if !is_local_url(self.base_url()) {
            return Err(LlmError::InvalidApiKey);
        }
        Ok(headers)
    }

    fn build_request(&self, messages: &[ConversationMessage], tools: &[Value], system: Option<&str>) -> Value {
        let mut wire_messages = Vec::new();
        if let Some(system) = system {
            wire_messages.push(json!({"role": "system", "content": system}));
        }
        for message in messages {
            wire_messages.push(convert_message(message));
        }

        let mut body = json!({
            "model": self.config.model,
            "messages": wire_messages,
            "temperature": self.config.temperature,
            "max_tokens": self.config.max_tokens,
            "stream": true,
        });
        if !tools.is_empty() {
            body["tools"] = json!(tools);
        }
        body
    }
}

fn convert_message(message: &ConversationMessage) -> Value {
    let role = match message.role {
        Role::System => "system",
        Role::User => "user",
        Role::Assistant => "assistant",
        Role::Tool => "tool",
    };

    let text = message.text().map(str::to_string);

    if message.role == Role::Tool {
        return json!({
            "role": role,
            "tool_call_id": message.tool_call_id,
            "content": text.unwrap_or_default(),
        });
    }

    if let Some(tool_calls) = &message.tool_calls {
        let calls: Vec<Value> = tool_calls
            .iter()
            .map(|call| {
                json!({
                    "id": call.id,
                    "type": "function",
                    "function": {"name": call.name, "arguments": call.arguments.to_string()},
                })
            })
            .collect();
        let mut out = json!({"role": role, "tool_calls": calls});
        if let Some(text) = text {
            out["content"] = json!(text);
        } else {
            out["content"] = Value::Null;
        }
        return out;
    }

    match &message.content {
        Some(MessageContent::Parts(parts)) => {
            let rendered: Vec<Value> = parts
                .iter()
                .map(|part| match part {
                    wbench_core::ContentPart::Text { text } => json!({"type": "text", "text": text}),
                    wbench_core::ContentPart::Image { data, media_type } => {
                        json!({"type": "image_url", "image_url": {"url": format!("data:{media_type};base64,{data}")}})
                    }
                })
                .collect();
            json!({"role": role, "content": rendered})
        }
        _ => json!({"role": role, "content": text.unwrap_or_default()}),
    }
}

fn context_window_for_model(model: &str) -> u32 {
    if model.contains("gpt-4o") || model.contains("gpt-4.1") {
        128_000
    } else if model.contains("gpt-4-turbo") {
        128_000
    } else if model.contains("gpt-3.5") {
        16_385
    } else {
        8_192
    }
}

#[derive(Debug, Deserialize)]
struct OpenAiStreamEvent {
    choices: Vec<OpenAiStreamChoice>,
    #[serde(default)]
    usage: Option<OpenAiUsage>,
}

#[derive(Debug, Deserialize)]
struct OpenAiStreamChoice {
    delta: OpenAiDelta,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct OpenAiDelta {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    reasoning: Option<String>,
    #[serde(default)]
    reasoning_content: Option<String>,
    #[serde(default)]
    tool_calls: Option<Vec<OpenAiStreamToolCall>>,
}

#[derive(Debug, Deserialize)]
struct OpenAiStreamToolCall {
    index: usize,
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    function: Option<OpenAiStreamFunction>,
}

#[derive(Debug, Default, Deserialize)]
struct OpenAiStreamFunction {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    arguments: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OpenAiUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
}

fn map_finish_reason(reason: &str) -> StopReason {
    match reason {
        "length" => StopReason::MaxTokens,
        "tool_calls" => StopReason::ToolUse,
        "content_filter" => StopReason::StopSequence,
        _ => StopReason::EndTurn,
    }
}

#[async_trait]
impl LlmProvider for OpenAiCompatProvider {
    fn name(&self) -> &str {
        "openai-compat"
    }

    fn model(&self) -> &str {
        &self.config.model
    }

    async fn stream(
        &self,
        messages: &[ConversationMessage],
        tools: &[Value],
        system: Option<&str>,
    ) -> LlmResult<StreamBox> {
        let headers = self.build_headers()?;
        let body = self.build_request(messages, tools, system);
        let url = format!("{}/chat/completions", self.base_url());
        let client = self.client.clone();

        let response = client.post(&url).headers(headers).json(&body).send().await?;
        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(LlmError::Http { status, body });
        }

        let byte_stream = response.bytes_stream();

        let events = try_stream! {
            futures::pin_mut!(byte_stream);
            let mut buffer = String::new();
            while let Some(chunk) = byte_stream.next().await {
                let chunk = chunk?;
                buffer.push_str(&String::from_utf8_lossy(&chunk));
                while let Some(boundary) = buffer.find("\n\n") {
                    let frame: String = buffer.drain(..boundary + 2).collect();
                    for line in frame.lines() {
                        let Some(data) = line.strip_prefix("data: ") else { continue };
                        if data == "[DONE]" {
                            yield StreamEvent::Done;
                            continue;
                        }
                        let parsed: OpenAiStreamEvent = serde_json::from_str(data)
                            .map_err(|e| LlmError::MalformedChunk(e.to_string()))?;
                        if let Some(usage) = parsed.usage {
                            yield StreamEvent::Usage(Usage {
                                input_tokens: usage.prompt_tokens,
                                output_tokens: usage.completion_tokens,
                            });
                        }
                        for choice in parsed.choices {
                            if let Some(content) = choice.delta.content {
                                if !content.is_empty() {
                                    yield StreamEvent::TextDelta(content);
                                }
                            }
                            let reasoning = choice.delta.reasoning.or(choice.delta.reasoning_content);
                            if let Some(reasoning) = reasoning {
                                if !reasoning.is_empty() {
                                    yield StreamEvent::ReasoningDelta(reasoning);
                                }
                            }
                            if let Some(tool_calls) = choice.delta.tool_calls {
                                for call in tool_calls {
                                    let name = call.function.as_ref().and_then(|f| f.name.clone());
                                    if call.id.is_some() || name.is_some() {
                                        yield StreamEvent::ToolCallStart { index: call.index, id: call.id, name };
                                    }
                                    if let Some(arguments) = call.function.and_then(|f| f.arguments) {
                                        if !arguments.is_empty() {
                                            yield StreamEvent::ToolCallDelta { index: call.index, args_delta: arguments };
                                        }
                                    }
                                }
                            }
                            if let Some(reason) = choice.finish_reason {
                                yield StreamEvent::FinishReason(map_finish_reason(&reason));
                            }
                        }
                    }
                }
            }
        };

        Ok(Box::pin(events))
    }

    fn max_context_length(&self) -> Option<u32> {
        Some(context_window_for_model(&self.config.model))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn custom_provider_uses_the_given_base_url() {
        let provider = OpenAiCompatProvider::custom("http://localhost:1234/v1", None, "local-model");
        assert_eq!(provider.base_url(), "http://localhost:1234/v1");
    }

    #[test]
    fn local_endpoint_without_a_key_is_allowed() {
        let provider = OpenAiCompatProvider::custom("http://127.0.0.1:1234/v1", None, "local-model");
        assert!(provider.build_headers().is_ok());
    }

    #[test]
    fn remote_endpoint_without_a_key_is_rejected() {
        let provider = OpenAiCompatProvider::custom("https://example.com/v1", None, "remote-model");
        assert!(matches!(provider.build_headers(), Err(LlmError::InvalidApiKey)));
    }

    #[test]
    fn invalid_api_key_characters_are_rejected() {
        let provider = OpenAiCompatProvider::openai("bad\nkey", "gpt-4o");
        assert!(matches!(provider.build_headers(), Err(LlmError::InvalidApiKey)));
    }

    #[test]
    fn tool_result_message_carries_its_call_id() {
        let message = ConversationMessage::tool_result("call_1", "read_file", "contents");
        let wire = convert_message(&message);
        assert_eq!(wire["tool_call_id"], "call_1");
        assert_eq!(wire["content"], "contents");
    }

    #[test]
    fn build_request_includes_the_system_prompt_first() {
        let provider = OpenAiCompatProvider::openai("sk-test", "gpt-4o");
        let messages = vec![ConversationMessage::user("hello")];
        let request = provider.build_request(&messages, &[], Some("be terse"));
        assert_eq!(request["messages"][0]["role"], "system");
        assert_eq!(request["messages"][1]["role"], "user");
    }

    #[test]
    fn context_window_lookup_matches_known_model_families() {
        assert_eq!(context_window_for_model("gpt-4o-mini"), 128_000);
        assert_eq!(context_window_for_model("gpt-3.5-turbo"), 16_385);
        assert_eq!(context_window_for_model("some-local-model"), 8_192);
    }
}
