//! The retry/backoff wrapper around the completion service.
//!
//! `ask` is the single entry point: it rewrites messages through the
//! tool-call text protocol when tools are supplied, retries transport
//! failures and empty responses with exponential backoff (1s, 2s, 4s), and
//! decodes at most one tool call out of the reply text.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use stride_core::{
    ChatMessage, ClientError, CompletionBackend, CompletionRequest, ToolCall, ToolDescriptor,
};

/// How the caller wants tools handled for one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ToolMode {
    /// Encode supplied tools into the prompt and decode calls from the reply.
    #[default]
    Auto,
    /// Ignore supplied tools entirely.
    None,
}

/// The decoded result of one model turn.
#[derive(Debug, Clone, Default)]
pub struct ModelReply {
    /// Visible text, with any matched tool-call block stripped.
    pub content: Option<String>,

    /// At most one tool call is ever synthesized per turn.
    pub tool_call: Option<ToolCall>,
}

/// Model client: protocol rewriting plus retry with exponential backoff.
pub struct ModelClient {
    backend: Arc<dyn CompletionBackend>,
    model: String,
    temperature: f32,
    max_tokens: u32,
    max_retries: u32,
    base_delay: Duration,
    extra: serde_json::Map<String, serde_json::Value>,
}

impl ModelClient {
    pub fn new(backend: Arc<dyn CompletionBackend>, model: impl Into<String>) -> Self {
        Self {
            backend,
            model: model.into(),
            temperature: 0.7,
            max_tokens: 4096,
            max_retries: 3,
            base_delay: Duration::from_secs(1),
            extra: serde_json::Map::new(),
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    /// Base delay for the backoff schedule. Tests shrink this.
    pub fn with_base_delay(mut self, base_delay: Duration) -> Self {
        self.base_delay = base_delay;
        self
    }

    /// Provider-specific request extras passed through verbatim.
    pub fn with_extra(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.extra.insert(key.into(), value);
        self
    }

    /// Delay before retry `attempt` (1-based): `base * 2^(attempt-1)`.
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        self.base_delay * 2u32.saturating_pow(attempt.saturating_sub(1))
    }

    /// Run one model turn.
    ///
    /// When `tools` is non-empty and `tool_mode` is not [`ToolMode::None`],
    /// the message history is rewritten through the text protocol and any
    /// caller-supplied `response_format` is suppressed for this call; the
    /// two mechanisms are mutually exclusive on that path.
    pub async fn ask(
        &self,
        messages: &[ChatMessage],
        tools: &[ToolDescriptor],
        response_format: Option<serde_json::Value>,
        tool_mode: ToolMode,
    ) -> Result<ModelReply, ClientError> {
        let use_text_tools = !tools.is_empty() && tool_mode != ToolMode::None;

        let api_messages = if use_text_tools {
            stride_protocol::encode(tools, messages)
        } else {
            messages.to_vec()
        };

        let request = CompletionRequest {
            model: self.model.clone(),
            temperature: self.temperature,
            max_tokens: self.max_tokens,
            messages: api_messages,
            response_format: if use_text_tools { None } else { response_format },
            extra: self.extra.clone(),
        };

        let mut last_error = ClientError::EmptyResponse;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                let delay = self.backoff_delay(attempt);
                info!(
                    attempt = attempt + 1,
                    total = self.max_retries + 1,
                    delay_ms = delay.as_millis() as u64,
                    "retrying completion request"
                );
                tokio::time::sleep(delay).await;
            }

            debug!(
                model = %self.model,
                backend = %self.backend.name(),
                tools_in_prompt = use_text_tools,
                attempt = attempt + 1,
                "sending completion request"
            );

            let response = match self.backend.create(request.clone()).await {
                Ok(response) => response,
                Err(error) => {
                    warn!(attempt = attempt + 1, %error, "completion request failed");
                    last_error = error;
                    continue;
                }
            };

            let Some(choice) = response.choices.into_iter().next() else {
                warn!(attempt = attempt + 1, "completion response carried no choices");
                last_error = ClientError::EmptyResponse;
                continue;
            };

            return Ok(self.decode_reply(choice.message.content, use_text_tools));
        }

        Err(ClientError::RetriesExhausted {
            attempts: self.max_retries + 1,
            last: last_error.to_string(),
        })
    }

    /// Decode a reply: when the text protocol is active and a call is
    /// recognized, strip the block and synthesize a single `ToolCall` with a
    /// fresh correlation id.
    fn decode_reply(&self, content: Option<String>, use_text_tools: bool) -> ModelReply {
        let Some(text) = content else {
            return ModelReply::default();
        };

        if use_text_tools
            && let Some(decoded) = stride_protocol::decode(&text)
        {
            info!(tool = %decoded.name, "parsed text-based tool call");
            return ModelReply {
                content: decoded.remaining,
                tool_call: Some(ToolCall::new(decoded.name, decoded.arguments)),
            };
        }

        ModelReply {
            content: Some(text),
            tool_call: None,
        }
    }
}
