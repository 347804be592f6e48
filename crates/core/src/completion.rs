//! CompletionBackend trait: the seam to the opaque chat-completion service.
//!
//! The backend knows nothing about tools: it takes a message list and
//! returns choices. Tool availability is folded into the message text by the
//! protocol layer before a request reaches this trait, and tool calls are
//! decoded back out of the reply text above it.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::ClientError;
use crate::message::ChatMessage;

/// One request to the completion service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionRequest {
    pub model: String,

    pub temperature: f32,

    pub max_tokens: u32,

    pub messages: Vec<ChatMessage>,

    /// Structured-output request, e.g. `{"type": "json_object"}`. Suppressed
    /// whenever the tool-call text protocol is active.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_format: Option<serde_json::Value>,

    /// Provider-specific extras passed through verbatim.
    #[serde(default, skip_serializing_if = "serde_json::Map::is_empty")]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// The assistant message inside a choice.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AssistantReply {
    #[serde(default)]
    pub content: Option<String>,
}

/// One completion choice.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Choice {
    pub message: AssistantReply,
}

/// The raw response from the completion service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionResponse {
    #[serde(default)]
    pub choices: Vec<Choice>,
}

/// The opaque chat-completion service.
#[async_trait]
pub trait CompletionBackend: Send + Sync {
    /// A human-readable name for this backend (e.g., "openai-compat").
    fn name(&self) -> &str;

    /// Send one request and get the raw response. May fail with a transport
    /// or API error; retry policy lives above this trait.
    async fn create(
        &self,
        request: CompletionRequest,
    ) -> std::result::Result<CompletionResponse, ClientError>;
}
