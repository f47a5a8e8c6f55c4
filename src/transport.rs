//! The chat-completion collaborator's interface. Implementing a real
//! provider integration is out of scope for this crate — the parser and
//! validator only care about the text a model returns — but the interface
//! is specified so embedders have a seam to plug one in, mirroring the
//! teacher's `Provider` trait (`src/providers/traits.rs`).

use crate::config::ModelConfig;
use crate::error::TransportError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

#[async_trait]
pub trait ModelClient: Send + Sync {
    async fn complete(&self, query: &str, params: &ModelConfig) -> Result<String, TransportError>;
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    temperature: f64,
    messages: Vec<ChatMessage<'a>>,
}

#[derive(Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatCompletionChoice>,
}

#[derive(Deserialize)]
struct ChatCompletionChoice {
    message: ChatCompletionMessage,
}

#[derive(Deserialize)]
struct ChatCompletionMessage {
    content: Option<String>,
}

/// A thin OpenAI-chat-completions-compatible client. Returns the raw
/// assistant text — it does not interpret `<think>`/`<plan>` structure or
/// JSON shape, that is `plan::parser`'s job.
pub struct HttpModelClient {
    client: reqwest::Client,
}

impl Default for HttpModelClient {
    fn default() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }
}

impl HttpModelClient {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ModelClient for HttpModelClient {
    async fn complete(&self, query: &str, params: &ModelConfig) -> Result<String, TransportError> {
        let endpoint = params
            .endpoint
            .as_deref()
            .ok_or_else(|| TransportError::Request("no endpoint configured".to_string()))?;

        let request = ChatCompletionRequest {
            model: &params.default_model,
            temperature: params.default_temperature,
            messages: vec![ChatMessage {
                role: "user",
                content: query,
            }],
        };

        let mut builder = self.client.post(endpoint).json(&request);
        if let Some(api_key) = &params.api_key {
            builder = builder.bearer_auth(api_key);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| TransportError::Request(e.to_string()))?
            .error_for_status()
            .map_err(|e| TransportError::Request(e.to_string()))?
            .json::<ChatCompletionResponse>()
            .await
            .map_err(|e| TransportError::Request(e.to_string()))?;

        let text = response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .unwrap_or_default();

        if text.trim().is_empty() {
            Err(TransportError::EmptyResponse)
        } else {
            Ok(text)
        }
    }
}

/// Fixed-response client for the CLI's `--offline` demo mode and for tests
/// that should not require a live endpoint.
pub struct StaticModelClient {
    response: String,
}

impl StaticModelClient {
    pub fn new(response: impl Into<String>) -> Self {
        Self {
            response: response.into(),
        }
    }
}

#[async_trait]
impl ModelClient for StaticModelClient {
    async fn complete(&self, _query: &str, _params: &ModelConfig) -> Result<String, TransportError> {
        if self.response.trim().is_empty() {
            Err(TransportError::EmptyResponse)
        } else {
            Ok(self.response.clone())
        }
    }
}
