//! OpenAI-compatible completion backend.
//!
//! Works with any `/v1/chat/completions` endpoint: OpenAI, OpenRouter,
//! Ollama, vLLM, and friends. Tool traffic is text by the time it gets
//! here, so this is plain messages in, choices out.

use async_trait::async_trait;
use serde::Serialize;
use tracing::{debug, warn};

use stride_core::{
    ChatMessage, ClientError, CompletionBackend, CompletionRequest, CompletionResponse, Role,
};

pub struct OpenAiCompatBackend {
    name: String,
    base_url: String,
    api_key: String,
    client: reqwest::Client,
}

impl OpenAiCompatBackend {
    pub fn new(
        name: impl Into<String>,
        base_url: impl Into<String>,
        api_key: impl Into<String>,
    ) -> Result<Self, ClientError> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(120))
            .build()
            .map_err(|e| ClientError::Transport(e.to_string()))?;

        Ok(Self {
            name: name.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            client,
        })
    }

    /// Convenience constructor for OpenAI itself.
    pub fn openai(api_key: impl Into<String>) -> Result<Self, ClientError> {
        Self::new("openai", "https://api.openai.com/v1", api_key)
    }

    /// Convenience constructor for a local Ollama endpoint.
    pub fn ollama(base_url: Option<&str>) -> Result<Self, ClientError> {
        Self::new(
            "ollama",
            base_url.unwrap_or("http://localhost:11434/v1"),
            "ollama",
        )
    }

    fn to_api_messages(messages: &[ChatMessage]) -> Vec<ApiMessage> {
        messages
            .iter()
            .map(|m| ApiMessage {
                // The protocol layer rewrites tool-role messages before they
                // reach a backend; anything left over degrades to user.
                role: match m.role {
                    Role::System => "system",
                    Role::User | Role::Tool => "user",
                    Role::Assistant => "assistant",
                },
                content: m.content.clone(),
            })
            .collect()
    }
}

#[async_trait]
impl CompletionBackend for OpenAiCompatBackend {
    fn name(&self) -> &str {
        &self.name
    }

    async fn create(&self, request: CompletionRequest) -> Result<CompletionResponse, ClientError> {
        let url = format!("{}/chat/completions", self.base_url);

        let mut body = serde_json::json!({
            "model": request.model,
            "temperature": request.temperature,
            "max_tokens": request.max_tokens,
            "messages": Self::to_api_messages(&request.messages),
        });

        if let Some(format) = &request.response_format {
            body["response_format"] = format.clone();
        }
        for (key, value) in &request.extra {
            body[key] = value.clone();
        }

        debug!(backend = %self.name, model = %request.model, "sending completion request");

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| ClientError::Transport(e.to_string()))?;

        let status = response.status().as_u16();
        if status != 200 {
            let error_body = response.text().await.unwrap_or_default();
            warn!(status, body = %error_body, "completion endpoint returned error");
            return Err(ClientError::Api {
                status_code: status,
                message: error_body,
            });
        }

        response
            .json::<CompletionResponse>()
            .await
            .map_err(|e| ClientError::Api {
                status_code: 200,
                message: format!("failed to parse response: {e}"),
            })
    }
}

#[derive(Debug, Serialize)]
struct ApiMessage {
    role: &'static str,
    content: String,
}
